#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Live civic-issue dashboard.
//!
//! [`LiveDashboard`] ties the pieces together: it compiles the session's
//! role scope, opens the change stream, loads the scoped baseline while
//! buffering early changes, and serves the filtered list, cluster key,
//! aggregate counts and ward overlays derived from the store.

pub mod config;
pub mod live;
pub mod notice;

pub use config::DashboardConfig;
pub use live::LiveDashboard;
pub use notice::{Notice, NoticeLevel};

use civic_watch_report_models::ReportId;
use civic_watch_store::BackendError;
use thiserror::Error;

/// Errors loading a [`DashboardConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for [`DashboardConfig`].
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Errors surfaced by [`LiveDashboard`] operations.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// The backend rejected a request.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// No session scope is active.
    #[error("No reports are visible to the current session")]
    NoScope,

    /// The report is not in the current view.
    #[error("Report {id} is not visible")]
    UnknownReport {
        /// Requested key.
        id: ReportId,
    },
}
