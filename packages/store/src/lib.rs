#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Role-scoped report store.
//!
//! [`ReportStore`] owns the canonical set of reports visible to one
//! [`RoleScope`](civic_watch_scope::RoleScope). It is fed by a bulk read
//! and by the change events of a [`Subscription`]; events that arrive
//! before the bulk read lands are buffered and replayed over it, so the
//! final contents do not depend on which arrived first.
//!
//! The persistence collaborator is abstracted by [`ReportBackend`];
//! [`memory::MemoryBackend`] implements it in memory.

pub mod backend;
pub mod memory;
pub mod store;

pub use backend::{ReadRequest, ReportBackend, Subscription};
pub use store::{
    ApplyOutcome, LoadOutcome, LoadState, LoadTicket, ReportSnapshot, ReportStore,
    SnapshotVersion, Visibility,
};

use civic_watch_report_models::ReportId;
use thiserror::Error;

/// Errors reported by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The bulk read failed.
    #[error("Read failed: {message}")]
    Read {
        /// Description of what went wrong.
        message: String,
    },

    /// The change stream could not be opened.
    #[error("Subscribe failed: {message}")]
    Subscribe {
        /// Description of what went wrong.
        message: String,
    },

    /// A status transition was rejected.
    #[error("Status transition for report {id} failed: {message}")]
    Transition {
        /// Report the transition was requested for.
        id: ReportId,
        /// Description of what went wrong.
        message: String,
    },
}
