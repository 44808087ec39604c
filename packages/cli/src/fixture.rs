//! Recorded dashboard inputs.

use std::path::Path;

use async_trait::async_trait;
use civic_watch_analytics_models::FilterCriteria;
use civic_watch_geography_models::WardRecord;
use civic_watch_report_models::{Report, ReportChange};
use civic_watch_scope::{ScopeError, Session, SessionResolver};
use civic_watch_store::memory::MemoryBackend;
use serde::Deserialize;

/// A backend state, a session and the changes that followed.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Fixture {
    /// Signed-in session, or `null` for signed out.
    pub session: Option<Session>,
    /// Rows of the `reports` table.
    pub reports: Vec<Report>,
    /// Rows of the `wards` table.
    pub wards: Vec<WardRecord>,
    /// Changes delivered after the initial load, in order.
    pub events: Vec<ReportChange>,
    /// Criteria to view the result with, instead of the configured ones.
    pub criteria: Option<FilterCriteria>,
}

impl Fixture {
    /// Reads a JSON fixture.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let raw = std::fs::read_to_string(path)?;
        let fixture: Self = serde_json::from_str(&raw)?;
        log::info!(
            "Loaded fixture with {} reports, {} wards and {} events",
            fixture.reports.len(),
            fixture.wards.len(),
            fixture.events.len()
        );
        Ok(fixture)
    }

    /// Seeds an in-memory backend with the recorded tables.
    #[must_use]
    pub fn backend(&self) -> MemoryBackend {
        let backend = MemoryBackend::with_reports(self.reports.clone());
        backend.set_wards(self.wards.clone());
        backend
    }
}

/// Plays one recorded change against the backend so subscribers see it.
pub fn replay(backend: &MemoryBackend, change: ReportChange) {
    match change {
        ReportChange::Insert(report) => backend.insert(report),
        ReportChange::Update(report) => backend.update(report),
        ReportChange::Delete(id) => backend.delete(&id),
    }
}

/// Hands out the fixture's session.
#[derive(Debug)]
pub struct FixtureSession(pub Option<Session>);

#[async_trait]
impl SessionResolver for FixtureSession {
    async fn resolve_session(&self) -> Result<Option<Session>, ScopeError> {
        Ok(self.0.clone())
    }
}
