//! Marker cluster identity.

use civic_watch_analytics_models::ClusterKey;
use civic_watch_report_models::Report;

/// Key of the markers in view, in view order.
#[must_use]
pub fn cluster_key(reports: &[Report]) -> ClusterKey {
    ClusterKey::from_reports(reports)
}

/// Whether the map clusterer must be rebuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterUpdate {
    /// Membership or order changed; rebuild with the new key.
    Rebuild(ClusterKey),
    /// Same markers as last time.
    Unchanged,
}

/// Remembers the last cluster key handed to the map.
#[derive(Debug, Default)]
pub struct ClusterKeyTracker {
    current: Option<ClusterKey>,
}

impl ClusterKeyTracker {
    /// Creates a tracker that has seen nothing yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last key reported by [`observe`](Self::observe).
    #[must_use]
    pub const fn current(&self) -> Option<&ClusterKey> {
        self.current.as_ref()
    }

    /// Compares the view against the last key. The first observation
    /// always rebuilds.
    pub fn observe(&mut self, reports: &[Report]) -> ClusterUpdate {
        let key = cluster_key(reports);
        if self.current.as_ref() == Some(&key) {
            return ClusterUpdate::Unchanged;
        }

        log::debug!("Cluster membership changed ({} markers)", reports.len());
        self.current = Some(key.clone());
        ClusterUpdate::Rebuild(key)
    }

    /// Forgets the last key so the next observation rebuilds.
    pub fn reset(&mut self) {
        self.current = None;
    }
}
