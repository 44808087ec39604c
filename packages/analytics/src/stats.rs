//! Aggregate report counts.

use civic_watch_analytics_models::{ChartSlice, ReportStats};
use civic_watch_report_models::{Report, ReportStatus};
use civic_watch_scope::RoleScope;
use civic_watch_store::ReportSnapshot;

/// Counts the reports of a scoped snapshot.
#[must_use]
pub fn aggregate(reports: &[Report]) -> ReportStats {
    let total = reports.len() as u64;
    let pending = reports
        .iter()
        .filter(|report| report.status == ReportStatus::Pending)
        .count() as u64;
    ReportStats::from_counts(total, pending)
}

/// Status chart slices, pending first.
#[must_use]
pub fn chart_slices(stats: &ReportStats) -> Vec<ChartSlice> {
    vec![
        ChartSlice {
            name: "Pending".to_string(),
            value: stats.pending,
        },
        ChartSlice {
            name: "Completed".to_string(),
            value: stats.completed,
        },
    ]
}

/// Whether there is anything to chart.
#[must_use]
pub const fn has_data(stats: &ReportStats) -> bool {
    stats.total > 0
}

/// Counts computed elsewhere, tagged with the scope they were computed
/// for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedStats {
    /// Scope the counts cover.
    pub scope: RoleScope,
    /// The counts.
    pub stats: ReportStats,
}

/// Holds an externally computed aggregate for the active scope.
///
/// Counts tagged with any other scope are rejected, and binding a new
/// scope drops whatever was held.
#[derive(Debug, Default)]
pub struct ScopedStatsCache {
    scope: Option<RoleScope>,
    external: Option<ReportStats>,
}

impl ScopedStatsCache {
    /// Creates a cache bound to no scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the cache to `scope`, dropping held counts if it changed.
    pub fn bind(&mut self, scope: Option<&RoleScope>) {
        if self.scope.as_ref() != scope {
            if self.external.take().is_some() {
                log::debug!("Scope changed, dropping external aggregate");
            }
            self.scope = scope.cloned();
        }
    }

    /// Offers externally computed counts. Returns whether they were kept.
    pub fn offer(&mut self, scoped: ScopedStats) -> bool {
        if self.scope.as_ref() != Some(&scoped.scope) {
            log::warn!(
                "Rejecting aggregate computed for {} scope while bound to {}",
                scoped.scope,
                self.scope
                    .as_ref()
                    .map_or_else(|| "no".to_string(), ToString::to_string)
            );
            return false;
        }
        if !scoped.stats.is_consistent() {
            log::warn!("Rejecting inconsistent aggregate {:?}", scoped.stats);
            return false;
        }
        self.external = Some(scoped.stats);
        true
    }

    /// Held external counts, if any.
    #[must_use]
    pub const fn external(&self) -> Option<&ReportStats> {
        self.external.as_ref()
    }

    /// Counts to display.
    ///
    /// Once the store is authoritative the snapshot is counted directly so
    /// the chart agrees with the map and list; before that the external
    /// counts, if held, stand in.
    #[must_use]
    pub fn resolve(&self, snapshot: &ReportSnapshot, authoritative: bool) -> ReportStats {
        match (&self.external, authoritative) {
            (Some(external), false) => *external,
            _ => aggregate(snapshot.reports()),
        }
    }
}
