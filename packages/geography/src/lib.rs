#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ward boundary parsing and the zone/ward directory.
//!
//! Ward rows store their outline as a well-known-text polygon with
//! longitude first. [`boundary`] turns that text into `[lat, lng]` rings
//! the map can draw, and [`directory`] keeps every ward (drawable or not)
//! available for zone and ward lookups.

pub mod boundary;
pub mod directory;

pub use boundary::{is_renderable, parse_boundary, parse_boundary_value, to_polygon};
pub use directory::WardDirectory;
