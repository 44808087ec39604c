//! Persistence collaborator interface.

use async_trait::async_trait;
use civic_watch_geography_models::WardRecord;
use civic_watch_report_models::{Report, ReportChange, ReportId, ReportStatus};
use civic_watch_scope::RoleScope;
use tokio::sync::mpsc;

use crate::BackendError;

/// Parameters of a bulk read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    /// Scope the rows must fall in.
    pub scope: RoleScope,
    /// Only rows with this status, or every status when `None`.
    pub status: Option<ReportStatus>,
}

impl ReadRequest {
    /// Equality filters the backend should apply, as `(column, value)`.
    #[must_use]
    pub fn filters(&self) -> Vec<(&'static str, String)> {
        let mut filters = Vec::with_capacity(2);
        if let Some(filter) = self.scope.equality_filter() {
            filters.push((filter.column, filter.value.to_string()));
        }
        if let Some(status) = self.status {
            filters.push(("status", status.to_string()));
        }
        filters
    }
}

/// The backing store of reports and wards.
#[async_trait]
pub trait ReportBackend: Send + Sync {
    /// Reads every report matching `request`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Read`] if the read fails.
    async fn bulk_read(&self, request: &ReadRequest) -> Result<Vec<Report>, BackendError>;

    /// Opens a change stream over the `reports` table.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Subscribe`] if the stream cannot be opened.
    async fn subscribe(&self) -> Result<Subscription, BackendError>;

    /// Asks the backend to move a report to `status`.
    ///
    /// The outcome is observed through the change stream, not through the
    /// store.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Transition`] if the backend rejects the
    /// request.
    async fn request_status_transition(
        &self,
        id: &ReportId,
        status: ReportStatus,
    ) -> Result<(), BackendError>;

    /// Reads the ward table.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Read`] if the read fails.
    async fn read_wards(&self) -> Result<Vec<WardRecord>, BackendError>;
}

/// A live change stream.
///
/// Dropping the subscription, or calling [`Subscription::unsubscribe`],
/// detaches it from the backend; no event is delivered afterwards.
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<ReportChange>,
    on_unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wraps a receiver; `on_unsubscribe` runs exactly once when the
    /// subscription is torn down.
    #[must_use]
    pub fn new(
        receiver: mpsc::UnboundedReceiver<ReportChange>,
        on_unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            receiver,
            on_unsubscribe: Some(Box::new(on_unsubscribe)),
        }
    }

    /// Waits for the next change. Returns `None` once the stream closes.
    pub async fn recv(&mut self) -> Option<ReportChange> {
        self.receiver.recv().await
    }

    /// Returns the next change if one is already queued.
    pub fn try_recv(&mut self) -> Option<ReportChange> {
        self.receiver.try_recv().ok()
    }

    /// Detaches from the backend.
    pub fn unsubscribe(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if let Some(on_unsubscribe) = self.on_unsubscribe.take() {
            on_unsubscribe();
            self.receiver.close();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.on_unsubscribe.is_some())
            .finish_non_exhaustive()
    }
}
