//! Transient user-facing notices.

use chrono::{DateTime, Utc};
use civic_watch_report_models::{ChangeKind, ReportId};
use civic_watch_store::ApplyOutcome;
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NoticeLevel {
    /// Something happened.
    Info,
    /// Something the user asked for happened.
    Success,
    /// Something failed.
    Error,
}

/// A message for the UI to show once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Text to show.
    pub message: String,
    /// Report the notice is about, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ReportId>,
    /// When the notice was raised.
    pub at: DateTime<Utc>,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>, report: Option<ReportId>) -> Self {
        Self {
            level,
            message: message.into(),
            report,
            at: Utc::now(),
        }
    }

    /// Notice for a change applied to the live view, if it warrants one.
    ///
    /// `completed` tells whether the change carried a completed status.
    #[must_use]
    pub fn for_change(
        kind: ChangeKind,
        completed: bool,
        outcome: ApplyOutcome,
        id: &ReportId,
    ) -> Option<Self> {
        let id = Some(id.clone());
        match (kind, outcome) {
            (ChangeKind::Insert, ApplyOutcome::Inserted) => {
                Some(Self::new(NoticeLevel::Info, "New Issue Reported!", id))
            }
            (ChangeKind::Update, ApplyOutcome::Replaced | ApplyOutcome::Removed) if completed => {
                Some(Self::new(
                    NoticeLevel::Success,
                    "A report has been completed!",
                    id,
                ))
            }
            (ChangeKind::Delete, ApplyOutcome::Removed) => {
                Some(Self::new(NoticeLevel::Info, "Report Deleted!", id))
            }
            _ => None,
        }
    }

    /// A bulk read failed.
    #[must_use]
    pub fn load_failed(error: &impl std::fmt::Display) -> Self {
        Self::new(
            NoticeLevel::Error,
            format!("Failed to load reports: {error}"),
            None,
        )
    }

    /// The change stream could not be opened.
    #[must_use]
    pub fn subscribe_failed(error: &impl std::fmt::Display) -> Self {
        Self::new(
            NoticeLevel::Error,
            format!("Live updates unavailable: {error}"),
            None,
        )
    }

    /// A status transition was rejected.
    #[must_use]
    pub fn resolve_failed(id: &ReportId, error: &impl std::fmt::Display) -> Self {
        Self::new(
            NoticeLevel::Error,
            format!("Failed to resolve report: {error}"),
            Some(id.clone()),
        )
    }

    /// The session could not be scoped, so nothing is shown.
    #[must_use]
    pub fn access_denied(error: &impl std::fmt::Display) -> Self {
        Self::new(
            NoticeLevel::Error,
            format!("No reports visible: {error}"),
            None,
        )
    }
}
