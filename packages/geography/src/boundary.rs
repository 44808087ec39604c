//! Polygon text decoding.
//!
//! Only the single-ring `POLYGON((x1 y1, x2 y2, ...))` encoding is
//! recognized. Coordinates are stored as `x = longitude, y = latitude`
//! and are swapped into `[lat, lng]` on the way out. Anything else decodes
//! to an empty ring; nothing in this module returns an error.

pub use civic_watch_geography_models::is_renderable;

use civic_watch_geography_models::LatLng;
use geo::{LineString, Polygon};

const POLYGON_MARKER: &str = "POLYGON";

/// Maximum length of the raw input included in debug logs.
const RAW_PREVIEW_LEN: usize = 80;

/// Decodes a polygon string into an ordered `[lat, lng]` ring.
///
/// Returns an empty ring when `raw` is not a polygon encoding. Pairs whose
/// components fail to parse produce `NaN`; use [`is_renderable`] before
/// drawing.
#[must_use]
pub fn parse_boundary(raw: &str) -> Vec<LatLng> {
    let Some(body) = polygon_body(raw) else {
        if !raw.trim().is_empty() {
            log::debug!("Unrecognized boundary encoding: {}", preview(raw));
        }
        return Vec::new();
    };

    if body.trim().is_empty() {
        return Vec::new();
    }

    let ring: Vec<LatLng> = body.split(',').map(parse_pair).collect();

    if !is_renderable(&ring) {
        log::debug!("Boundary has malformed coordinates: {}", preview(raw));
    }

    ring
}

/// Decodes a boundary column of unknown JSON type.
///
/// Only string values are considered; `null`, numbers, arrays and objects
/// decode to an empty ring.
#[must_use]
pub fn parse_boundary_value(raw: &serde_json::Value) -> Vec<LatLng> {
    match raw {
        serde_json::Value::String(text) => parse_boundary(text),
        serde_json::Value::Null => Vec::new(),
        other => {
            log::debug!("Ignoring non-text boundary value: {other}");
            Vec::new()
        }
    }
}

/// Converts a renderable ring into a [`Polygon`] with `x = lng, y = lat`.
#[must_use]
pub fn to_polygon(ring: &[LatLng]) -> Option<Polygon<f64>> {
    if !is_renderable(ring) {
        return None;
    }

    let exterior: LineString<f64> = ring.iter().map(|&[lat, lng]| (lng, lat)).collect();
    Some(Polygon::new(exterior, vec![]))
}

/// Returns the text between `POLYGON((` and the closing parentheses.
fn polygon_body(raw: &str) -> Option<&str> {
    let rest = raw.trim().strip_prefix(POLYGON_MARKER)?.trim_start();
    let rest = rest.strip_prefix("((")?;
    Some(rest.trim_end().trim_end_matches(')'))
}

fn parse_pair(pair: &str) -> LatLng {
    let mut parts = pair.split_whitespace();
    let lng = parse_component(parts.next());
    let lat = parse_component(parts.next());
    [lat, lng]
}

fn parse_component(token: Option<&str>) -> f64 {
    token.and_then(|t| t.parse().ok()).unwrap_or(f64::NAN)
}

fn preview(raw: &str) -> String {
    raw.chars().take(RAW_PREVIEW_LEN).collect()
}
