#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ward and zone boundary types.
//!
//! Wards are the smallest administrative areas a report can be attributed
//! to; zones group wards. Ward-scoped administrators only see reports from
//! their own ward, and the map draws ward outlines as overlays.

use civic_watch_report_models::WardId;
use serde::{Deserialize, Serialize};

/// A `[latitude, longitude]` pair in WGS84 degrees.
pub type LatLng = [f64; 2];

/// A ward row as stored in the `wards` table.
///
/// `boundary` is kept as an untyped JSON value because the column is
/// populated by several import tools and is not guaranteed to be text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WardRecord {
    /// Primary key.
    pub id: WardId,
    /// Ward number as printed on municipal maps.
    #[serde(default)]
    pub ward_no: Option<i32>,
    /// Zone the ward belongs to.
    #[serde(default)]
    pub zone_no: Option<i32>,
    /// Human-readable zone name.
    #[serde(default)]
    pub zone_name: Option<String>,
    /// Area of the ward as reported by the survey.
    #[serde(default)]
    pub area_value: Option<f64>,
    /// Perimeter of the ward as reported by the survey.
    #[serde(default)]
    pub perimeter: Option<f64>,
    /// Raw boundary encoding (`POLYGON((lng lat, ...))`).
    #[serde(default)]
    pub boundary: serde_json::Value,
}

/// A ward with its boundary decoded into map coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WardBoundary {
    /// Ward primary key.
    pub id: WardId,
    /// Ward number.
    pub ward_no: Option<i32>,
    /// Zone number.
    pub zone_no: Option<i32>,
    /// Zone name.
    pub zone_name: Option<String>,
    /// Outer ring as `[lat, lng]` pairs. Empty when the raw boundary was
    /// missing or unrecognized; may contain `NaN` components when
    /// individual pairs failed to parse.
    pub parsed_boundary: Vec<LatLng>,
}

/// Whether a ring can be drawn: at least three vertices, all finite.
#[must_use]
pub fn is_renderable(ring: &[LatLng]) -> bool {
    ring.len() >= 3 && ring.iter().all(|[lat, lng]| lat.is_finite() && lng.is_finite())
}

impl WardBoundary {
    /// Whether the decoded ring can be drawn. See [`is_renderable`].
    #[must_use]
    pub fn is_renderable(&self) -> bool {
        is_renderable(&self.parsed_boundary)
    }

    /// Display label, e.g. `"Ward 12"`.
    #[must_use]
    pub fn label(&self) -> String {
        self.ward_no
            .map_or_else(|| format!("Ward #{}", self.id), |no| format!("Ward {no}"))
    }
}

/// A zone with its display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    /// Zone number.
    pub zone_no: i32,
    /// Zone name.
    pub zone_name: String,
}
