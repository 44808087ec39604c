#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial index for ward attribution.
//!
//! Builds an R-tree over the drawable ward polygons of a
//! [`WardDirectory`] and answers "which ward contains this point".

use civic_watch_geography::{WardDirectory, to_polygon};
use civic_watch_report_models::WardId;
use geo::{BoundingRect, Contains, Polygon};
use rstar::{AABB, RTree, RTreeObject};

/// A ward polygon stored in the R-tree.
#[derive(Debug)]
struct WardEntry {
    id: WardId,
    envelope: AABB<[f64; 2]>,
    polygon: Polygon<f64>,
}

impl RTreeObject for WardEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built R-tree of ward outlines.
#[derive(Debug, Default)]
pub struct WardIndex {
    wards: RTree<WardEntry>,
}

impl WardIndex {
    /// Indexes every ward with a drawable boundary.
    #[must_use]
    pub fn build(directory: &WardDirectory) -> Self {
        let entries: Vec<WardEntry> = directory
            .renderable()
            .filter_map(|ward| {
                let polygon = to_polygon(&ward.parsed_boundary)?;
                Some(WardEntry {
                    id: ward.id,
                    envelope: compute_envelope(&polygon),
                    polygon,
                })
            })
            .collect();

        let wards = RTree::bulk_load(entries);
        log::info!("Loaded {} wards into spatial index", wards.size());

        Self { wards }
    }

    /// Number of indexed wards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.wards.size()
    }

    /// Whether no ward could be indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.wards.size() == 0
    }

    /// Look up the ward containing a point.
    ///
    /// Ward outlines tile the city without overlap, so first match wins.
    #[must_use]
    pub fn locate(&self, lat: f64, lng: f64) -> Option<WardId> {
        if !lat.is_finite() || !lng.is_finite() {
            return None;
        }

        let point = geo::Point::new(lng, lat);
        let query_env = AABB::from_point([lng, lat]);

        self.wards
            .locate_in_envelope_intersecting(&query_env)
            .find(|entry| entry.polygon.contains(&point))
            .map(|entry| entry.id)
    }
}

/// Compute the bounding box envelope for a [`Polygon`].
fn compute_envelope(polygon: &Polygon<f64>) -> AABB<[f64; 2]> {
    polygon.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_watch_geography_models::WardRecord;
    use serde_json::json;

    fn record(id: WardId, boundary: serde_json::Value) -> WardRecord {
        WardRecord {
            id,
            ward_no: Some(i32::try_from(id).unwrap()),
            zone_no: Some(1),
            zone_name: Some("Central".to_string()),
            area_value: None,
            perimeter: None,
            boundary,
        }
    }

    fn index() -> WardIndex {
        let directory = WardDirectory::from_records(&[
            record(
                1,
                json!("POLYGON((80.0 13.0, 80.1 13.0, 80.1 13.1, 80.0 13.1, 80.0 13.0))"),
            ),
            record(
                2,
                json!("POLYGON((80.1 13.0, 80.2 13.0, 80.2 13.1, 80.1 13.1, 80.1 13.0))"),
            ),
            record(3, json!("NOT_A_POLYGON")),
        ]);
        WardIndex::build(&directory)
    }

    #[test]
    fn skips_undrawable_wards() {
        assert_eq!(index().len(), 2);
    }

    #[test]
    fn locates_point_in_ward() {
        let index = index();
        assert_eq!(index.locate(13.05, 80.05), Some(1));
        assert_eq!(index.locate(13.05, 80.15), Some(2));
    }

    #[test]
    fn point_outside_every_ward() {
        let index = index();
        assert_eq!(index.locate(12.5, 80.05), None);
        assert_eq!(index.locate(f64::NAN, 80.05), None);
    }
}
