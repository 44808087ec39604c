#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Derived views over a report snapshot.
//!
//! Everything here is a pure function of a
//! [`ReportSnapshot`](civic_watch_store::ReportSnapshot) and the UI's
//! [`FilterCriteria`](civic_watch_analytics_models::FilterCriteria):
//! the filtered list, the cluster key of the markers in view, and the
//! aggregate counts behind the status chart.

pub mod cluster;
pub mod filter;
pub mod stats;

pub use cluster::{ClusterKeyTracker, ClusterUpdate, cluster_key};
pub use filter::{FilterEngine, filter_reports, matches};
pub use stats::{ScopedStats, ScopedStatsCache, aggregate, chart_slices, has_data};
