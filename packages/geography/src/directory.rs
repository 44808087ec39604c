//! Zone and ward lookups over the decoded ward table.

use std::collections::BTreeSet;

use civic_watch_geography_models::{WardBoundary, WardRecord, Zone};
use civic_watch_report_models::WardId;

use crate::boundary::parse_boundary_value;

/// Every ward row with its boundary decoded.
///
/// Wards whose boundary could not be decoded are kept with an empty ring
/// so they still appear in zone/ward listings.
#[derive(Debug, Clone, Default)]
pub struct WardDirectory {
    wards: Vec<WardBoundary>,
}

impl WardDirectory {
    /// Decodes the boundaries of all `records`.
    #[must_use]
    pub fn from_records(records: &[WardRecord]) -> Self {
        let wards: Vec<WardBoundary> = records
            .iter()
            .map(|record| WardBoundary {
                id: record.id,
                ward_no: record.ward_no,
                zone_no: record.zone_no,
                zone_name: record.zone_name.clone(),
                parsed_boundary: parse_boundary_value(&record.boundary),
            })
            .collect();

        let drawable = wards.iter().filter(|w| w.is_renderable()).count();
        log::info!(
            "Loaded {} wards ({drawable} with drawable boundaries)",
            wards.len()
        );

        Self { wards }
    }

    /// All wards in table order.
    #[must_use]
    pub fn wards(&self) -> &[WardBoundary] {
        &self.wards
    }

    /// Looks up a ward by primary key.
    #[must_use]
    pub fn get(&self, id: WardId) -> Option<&WardBoundary> {
        self.wards.iter().find(|ward| ward.id == id)
    }

    /// Wards whose boundary can be drawn.
    pub fn renderable(&self) -> impl Iterator<Item = &WardBoundary> {
        self.wards.iter().filter(|ward| ward.is_renderable())
    }

    /// Distinct zones ordered by name.
    ///
    /// Rows missing a zone number or name are skipped; the first name seen
    /// for a zone number wins.
    #[must_use]
    pub fn zones(&self) -> Vec<Zone> {
        let mut seen = BTreeSet::new();
        let mut zones: Vec<Zone> = self
            .wards
            .iter()
            .filter_map(|ward| {
                let zone_no = ward.zone_no?;
                let zone_name = ward.zone_name.as_ref()?;
                seen.insert(zone_no).then(|| Zone {
                    zone_no,
                    zone_name: zone_name.clone(),
                })
            })
            .collect();

        zones.sort_by(|a, b| a.zone_name.cmp(&b.zone_name));
        zones
    }

    /// Zones whose name contains `term`, ignoring case.
    #[must_use]
    pub fn search_zones(&self, term: &str) -> Vec<Zone> {
        let needle = term.to_lowercase();
        self.zones()
            .into_iter()
            .filter(|zone| zone.zone_name.to_lowercase().contains(&needle))
            .collect()
    }

    /// Numbered wards of a zone ordered by ward number.
    #[must_use]
    pub fn wards_in_zone(&self, zone_no: i32) -> Vec<&WardBoundary> {
        let mut wards: Vec<&WardBoundary> = self
            .wards
            .iter()
            .filter(|ward| ward.zone_no == Some(zone_no) && ward.ward_no.is_some())
            .collect();

        wards.sort_by_key(|ward| ward.ward_no);
        wards
    }

    /// Wards of a zone matching `term` either as a bare number fragment
    /// (`"1"` matches ward 12) or as a `"ward N"` label, ignoring case.
    #[must_use]
    pub fn search_wards(&self, zone_no: i32, term: &str) -> Vec<&WardBoundary> {
        let needle = term.trim().to_lowercase();
        self.wards_in_zone(zone_no)
            .into_iter()
            .filter(|ward| {
                ward.ward_no.is_some_and(|no| {
                    no.to_string().contains(&needle) || format!("ward {no}").contains(&needle)
                })
            })
            .collect()
    }
}
