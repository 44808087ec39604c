//! The canonical report collection.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use civic_watch_report_models::{Report, ReportChange, ReportId, ReportStatus};
use civic_watch_scope::RoleScope;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::BackendError;
use crate::backend::ReadRequest;

/// Events buffered before the first load lands, by default.
pub const DEFAULT_EVENT_BUFFER_LIMIT: usize = 10_000;

/// Which statuses the store keeps.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Visibility {
    /// Keep every report in scope regardless of status.
    #[default]
    AllStatuses,
    /// Keep only unresolved reports; a report leaves the store when it is
    /// completed.
    PendingOnly,
}

impl Visibility {
    /// Whether a report with `status` belongs in the store.
    #[must_use]
    pub const fn shows(self, status: ReportStatus) -> bool {
        match self {
            Self::AllStatuses => true,
            Self::PendingOnly => !status.is_terminal(),
        }
    }

    /// Status filter pushed down to the bulk read.
    #[must_use]
    pub const fn status_filter(self) -> Option<ReportStatus> {
        match self {
            Self::AllStatuses => None,
            Self::PendingOnly => Some(ReportStatus::Pending),
        }
    }
}

/// Whether the store holds a baseline it can be trusted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LoadState {
    /// No load has been started for the current scope.
    Idle,
    /// A load is in flight; changes are buffered.
    Loading,
    /// A baseline is installed and changes apply immediately.
    Ready,
    /// The first load for the current scope failed; changes are buffered
    /// until a retry lands.
    Failed,
}

/// Identifies the load a result belongs to.
///
/// A result carrying a ticket from before the last [`ReportStore::reset`]
/// is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct LoadTicket {
    epoch: u64,
}

/// Result of installing (or failing to install) a bulk read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The baseline was installed and buffered changes replayed over it.
    Loaded {
        /// Reports in the baseline after scope and visibility checks.
        reports: usize,
        /// Buffered changes replayed over the baseline.
        replayed: usize,
    },
    /// The load failed; the previous contents were kept.
    Failed {
        /// Reports still held.
        retained: usize,
    },
    /// The result belonged to a superseded scope and was discarded.
    Stale,
}

/// What a single change did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ApplyOutcome {
    /// Held until the current load lands.
    Buffered,
    /// The buffer overflowed; the store must be reloaded.
    Overflowed,
    /// Added a report that was not present.
    Inserted,
    /// Replaced a present report in place.
    Replaced,
    /// Removed a present report.
    Removed,
    /// The report is outside the scope or visibility of the store.
    Ignored,
    /// Update or delete for a report that is not present.
    Noop,
}

impl ApplyOutcome {
    /// Whether the visible contents changed.
    #[must_use]
    pub const fn changed(self) -> bool {
        matches!(self, Self::Inserted | Self::Replaced | Self::Removed)
    }
}

/// Identifies one state of the store.
///
/// `epoch` advances on every scope reset and `revision` on every change
/// to the contents, so equal versions imply equal contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotVersion {
    /// Scope generation.
    pub epoch: u64,
    /// Content revision within the epoch.
    pub revision: u64,
}

/// A cheap, immutable view of the store contents.
#[derive(Debug, Clone)]
pub struct ReportSnapshot {
    version: SnapshotVersion,
    reports: Arc<Vec<Report>>,
}

impl ReportSnapshot {
    /// Version of the store this snapshot was taken at.
    #[must_use]
    pub const fn version(&self) -> SnapshotVersion {
        self.version
    }

    /// Reports in insertion order.
    #[must_use]
    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    /// Looks up a report by key.
    #[must_use]
    pub fn get(&self, id: &ReportId) -> Option<&Report> {
        self.reports.iter().find(|report| report.id == *id)
    }

    /// Number of reports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Whether the snapshot holds no reports.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

/// The canonical, key-deduplicated set of reports visible to one scope.
///
/// The store is the only writer of report state. Contents change only
/// through [`finish_load`](Self::finish_load) and [`apply`](Self::apply).
#[derive(Debug)]
pub struct ReportStore {
    scope: RoleScope,
    visibility: Visibility,
    state: LoadState,
    has_baseline: bool,
    epoch: u64,
    revision: u64,
    reports: Arc<Vec<Report>>,
    buffered: VecDeque<ReportChange>,
    buffer_limit: usize,
    overflowed: bool,
}

impl ReportStore {
    /// Creates an empty store for `scope`.
    #[must_use]
    pub fn new(scope: RoleScope, visibility: Visibility) -> Self {
        Self {
            scope,
            visibility,
            state: LoadState::Idle,
            has_baseline: false,
            epoch: 0,
            revision: 0,
            reports: Arc::new(Vec::new()),
            buffered: VecDeque::new(),
            buffer_limit: DEFAULT_EVENT_BUFFER_LIMIT,
            overflowed: false,
        }
    }

    /// Sets how many changes may be buffered while a load is in flight.
    #[must_use]
    pub fn with_buffer_limit(mut self, limit: usize) -> Self {
        self.buffer_limit = limit.max(1);
        self
    }

    /// Scope the store is filtered by.
    #[must_use]
    pub const fn scope(&self) -> &RoleScope {
        &self.scope
    }

    /// Statuses the store keeps.
    #[must_use]
    pub const fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Current load state.
    #[must_use]
    pub const fn state(&self) -> LoadState {
        self.state
    }

    /// Whether the contents reflect a landed load plus every change since.
    ///
    /// A store that lost buffered changes to overflow is not
    /// authoritative until it is reloaded.
    #[must_use]
    pub fn is_authoritative(&self) -> bool {
        self.state == LoadState::Ready && !self.overflowed
    }

    /// Whether buffered changes were lost to overflow and a fresh load is
    /// required.
    #[must_use]
    pub const fn needs_reload(&self) -> bool {
        self.overflowed
    }

    /// Number of changes waiting for the current load.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffered.len()
    }

    /// The bulk read that establishes a baseline for this store.
    #[must_use]
    pub fn read_request(&self) -> ReadRequest {
        ReadRequest {
            scope: self.scope.clone(),
            status: self.visibility.status_filter(),
        }
    }

    /// Current contents.
    #[must_use]
    pub fn snapshot(&self) -> ReportSnapshot {
        ReportSnapshot {
            version: SnapshotVersion {
                epoch: self.epoch,
                revision: self.revision,
            },
            reports: Arc::clone(&self.reports),
        }
    }

    /// Clears the store and rebinds it to `scope`.
    ///
    /// Results of loads started before the reset are discarded when they
    /// land.
    pub fn reset(&mut self, scope: RoleScope) {
        log::debug!("Resetting report store from {} to {scope} scope", self.scope);
        self.scope = scope;
        self.epoch += 1;
        self.revision = 0;
        self.state = LoadState::Idle;
        self.has_baseline = false;
        self.reports = Arc::new(Vec::new());
        self.buffered.clear();
        self.overflowed = false;
    }

    /// Marks a load as in flight. Changes are buffered until it lands.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.state = LoadState::Loading;
        self.overflowed = false;
        LoadTicket { epoch: self.epoch }
    }

    /// Installs the rows of a bulk read as the new baseline and replays
    /// buffered changes over it in arrival order.
    ///
    /// Rows outside the scope or visibility are dropped; duplicate keys
    /// keep the last row.
    pub fn finish_load(&mut self, ticket: LoadTicket, rows: Vec<Report>) -> LoadOutcome {
        if ticket.epoch != self.epoch {
            log::debug!("Discarding load result from superseded scope");
            return LoadOutcome::Stale;
        }

        let total = rows.len();
        let mut positions: BTreeMap<ReportId, usize> = BTreeMap::new();
        let mut baseline: Vec<Report> = Vec::with_capacity(total);

        for report in rows {
            if !self.accepts(&report) {
                continue;
            }
            if let Some(&index) = positions.get(&report.id) {
                baseline[index] = report;
            } else {
                positions.insert(report.id.clone(), baseline.len());
                baseline.push(report);
            }
        }

        if baseline.len() < total {
            log::debug!(
                "Dropped {} of {total} loaded rows outside {} scope or duplicated",
                total - baseline.len(),
                self.scope
            );
        }

        self.reports = Arc::new(baseline);
        self.revision += 1;
        self.has_baseline = true;
        self.state = LoadState::Ready;

        let replayed = self.replay_buffered();
        let reports = self.reports.len();

        log::info!(
            "Loaded {reports} reports for {} scope ({replayed} buffered changes replayed)",
            self.scope
        );

        LoadOutcome::Loaded { reports, replayed }
    }

    /// Records a failed bulk read.
    ///
    /// The previous contents are kept. If a baseline existed, buffered
    /// changes are replayed over it and the store becomes authoritative
    /// again; otherwise they stay buffered for the next attempt.
    pub fn fail_load(&mut self, ticket: LoadTicket, error: &BackendError) -> LoadOutcome {
        if ticket.epoch != self.epoch {
            log::debug!("Discarding load failure from superseded scope: {error}");
            return LoadOutcome::Stale;
        }

        log::warn!(
            "Load for {} scope failed, keeping {} reports: {error}",
            self.scope,
            self.reports.len()
        );

        if self.has_baseline {
            self.state = LoadState::Ready;
            self.replay_buffered();
        } else {
            self.state = LoadState::Failed;
        }

        LoadOutcome::Failed {
            retained: self.reports.len(),
        }
    }

    /// Applies one change, or buffers it while no baseline is installed.
    pub fn apply(&mut self, change: ReportChange) -> ApplyOutcome {
        if self.state == LoadState::Ready {
            self.apply_now(change)
        } else {
            self.buffer(change)
        }
    }

    fn buffer(&mut self, change: ReportChange) -> ApplyOutcome {
        if self.buffered.len() >= self.buffer_limit {
            if !self.overflowed {
                log::warn!(
                    "Change buffer full ({} events) before load landed, a reload is required",
                    self.buffer_limit
                );
            }
            self.buffered.clear();
            self.overflowed = true;
            return ApplyOutcome::Overflowed;
        }

        self.buffered.push_back(change);
        ApplyOutcome::Buffered
    }

    fn replay_buffered(&mut self) -> usize {
        let pending: Vec<ReportChange> = self.buffered.drain(..).collect();
        let replayed = pending.len();
        for change in pending {
            self.apply_now(change);
        }
        replayed
    }

    fn apply_now(&mut self, change: ReportChange) -> ApplyOutcome {
        let kind = change.kind();
        let id = change.key().clone();

        let outcome = match change {
            ReportChange::Insert(report) => {
                if self.accepts(&report) {
                    self.upsert(report)
                } else if self.remove(&report.id) {
                    ApplyOutcome::Removed
                } else {
                    ApplyOutcome::Ignored
                }
            }
            ReportChange::Update(report) => {
                if self.position(&report.id).is_none() {
                    ApplyOutcome::Noop
                } else if self.accepts(&report) {
                    self.upsert(report)
                } else {
                    self.remove(&report.id);
                    ApplyOutcome::Removed
                }
            }
            ReportChange::Delete(id) => {
                if self.remove(&id) {
                    ApplyOutcome::Removed
                } else {
                    ApplyOutcome::Noop
                }
            }
        };

        if outcome.changed() {
            self.revision += 1;
        }

        log::debug!("{kind} {id}: {outcome}");
        outcome
    }

    fn accepts(&self, report: &Report) -> bool {
        self.scope.admits(report) && self.visibility.shows(report.status)
    }

    fn position(&self, id: &ReportId) -> Option<usize> {
        self.reports.iter().position(|report| report.id == *id)
    }

    fn upsert(&mut self, report: Report) -> ApplyOutcome {
        let position = self.position(&report.id);
        let reports = Arc::make_mut(&mut self.reports);
        if let Some(index) = position {
            reports[index] = report;
            ApplyOutcome::Replaced
        } else {
            reports.push(report);
            ApplyOutcome::Inserted
        }
    }

    fn remove(&mut self, id: &ReportId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        Arc::make_mut(&mut self.reports).remove(index);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_watch_report_models::DepartmentRef;

    fn report(id: &str, status: ReportStatus, department: i64) -> Report {
        Report {
            id: ReportId::new(id),
            status,
            department: Some(DepartmentRef::Id(department)),
            ward_id: None,
            description: Some(format!("report {id}")),
            latitude: 13.08,
            longitude: 80.27,
            image_url: None,
            created_at: None,
        }
    }

    fn pending(id: &str) -> Report {
        report(id, ReportStatus::Pending, 1)
    }

    fn ready_store(visibility: Visibility, rows: Vec<Report>) -> ReportStore {
        let mut store = ReportStore::new(RoleScope::Global, visibility);
        let ticket = store.begin_load();
        store.finish_load(ticket, rows);
        store
    }

    fn ids(store: &ReportStore) -> Vec<String> {
        store
            .snapshot()
            .reports()
            .iter()
            .map(|r| r.id.to_string())
            .collect()
    }

    #[test]
    fn insert_is_idempotent() {
        let mut store = ready_store(Visibility::AllStatuses, vec![]);
        assert_eq!(
            store.apply(ReportChange::Insert(pending("a"))),
            ApplyOutcome::Inserted
        );
        assert_eq!(
            store.apply(ReportChange::Insert(pending("a"))),
            ApplyOutcome::Replaced
        );
        assert_eq!(ids(&store), vec!["a"]);
    }

    #[test]
    fn unknown_key_update_and_delete_are_noops() {
        let mut store = ready_store(Visibility::AllStatuses, vec![pending("a")]);
        let before = store.snapshot();

        assert_eq!(
            store.apply(ReportChange::Delete(ReportId::new("zzz"))),
            ApplyOutcome::Noop
        );
        assert_eq!(
            store.apply(ReportChange::Update(pending("zzz"))),
            ApplyOutcome::Noop
        );

        let after = store.snapshot();
        assert_eq!(before.version(), after.version());
        assert_eq!(before.reports(), after.reports());
    }

    #[test]
    fn update_replaces_in_place() {
        let mut store =
            ready_store(Visibility::AllStatuses, vec![pending("a"), pending("b"), pending("c")]);
        let mut moved = pending("b");
        moved.description = Some("pothole near the bus stop".to_string());

        assert_eq!(
            store.apply(ReportChange::Update(moved.clone())),
            ApplyOutcome::Replaced
        );
        assert_eq!(ids(&store), vec!["a", "b", "c"]);
        assert_eq!(store.snapshot().get(&ReportId::new("b")), Some(&moved));
    }

    #[test]
    fn completion_removes_from_pending_only_store() {
        let mut store = ready_store(Visibility::PendingOnly, vec![pending("a"), pending("b")]);

        let outcome = store.apply(ReportChange::Update(report("a", ReportStatus::Completed, 1)));

        assert_eq!(outcome, ApplyOutcome::Removed);
        assert_eq!(ids(&store), vec!["b"]);
    }

    #[test]
    fn completion_relabels_in_all_statuses_store() {
        let mut store = ready_store(Visibility::AllStatuses, vec![pending("a")]);

        store.apply(ReportChange::Update(report("a", ReportStatus::Completed, 1)));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.reports()[0].status, ReportStatus::Completed);
    }

    #[test]
    fn buffered_changes_converge_with_late_load() {
        let baseline = vec![pending("a"), pending("b")];
        let e1 = ReportChange::Insert(pending("c"));
        let e2 = ReportChange::Delete(ReportId::new("a"));

        let mut load_first = ReportStore::new(RoleScope::Global, Visibility::AllStatuses);
        let ticket = load_first.begin_load();
        load_first.finish_load(ticket, baseline.clone());
        load_first.apply(e1.clone());
        load_first.apply(e2.clone());

        let mut events_first = ReportStore::new(RoleScope::Global, Visibility::AllStatuses);
        let ticket = events_first.begin_load();
        assert_eq!(events_first.apply(e1), ApplyOutcome::Buffered);
        assert_eq!(events_first.apply(e2), ApplyOutcome::Buffered);
        assert!(!events_first.is_authoritative());
        let outcome = events_first.finish_load(ticket, baseline);

        assert_eq!(
            outcome,
            LoadOutcome::Loaded {
                reports: 2,
                replayed: 2
            }
        );
        assert_eq!(ids(&load_first), ids(&events_first));
        assert_eq!(ids(&events_first), vec!["b", "c"]);
    }

    #[test]
    fn buffered_same_key_changes_replay_in_order() {
        let mut store = ReportStore::new(RoleScope::Global, Visibility::AllStatuses);
        let ticket = store.begin_load();
        store.apply(ReportChange::Insert(pending("a")));
        store.apply(ReportChange::Update(report("a", ReportStatus::Completed, 1)));
        store.finish_load(ticket, vec![]);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.reports()[0].status, ReportStatus::Completed);
    }

    #[test]
    fn events_outside_scope_are_ignored() {
        let mut store = ReportStore::new(
            RoleScope::Department {
                department_id: 1,
                department_name: None,
            },
            Visibility::AllStatuses,
        );
        let ticket = store.begin_load();
        store.finish_load(ticket, vec![pending("a"), report("x", ReportStatus::Pending, 2)]);
        assert_eq!(ids(&store), vec!["a"]);

        assert_eq!(
            store.apply(ReportChange::Insert(report("b", ReportStatus::Pending, 2))),
            ApplyOutcome::Ignored
        );
        assert_eq!(
            store.apply(ReportChange::Update(report("a", ReportStatus::Pending, 2))),
            ApplyOutcome::Removed
        );
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn reinsert_outside_scope_removes_stale_copy() {
        let mut store = ReportStore::new(
            RoleScope::Department {
                department_id: 1,
                department_name: None,
            },
            Visibility::AllStatuses,
        );
        let ticket = store.begin_load();
        store.finish_load(ticket, vec![pending("a")]);
        let before = store.snapshot().version();

        assert_eq!(
            store.apply(ReportChange::Insert(report("a", ReportStatus::Pending, 2))),
            ApplyOutcome::Removed
        );
        assert!(store.snapshot().is_empty());
        assert_ne!(store.snapshot().version(), before);

        assert_eq!(
            store.apply(ReportChange::Insert(report("a", ReportStatus::Pending, 2))),
            ApplyOutcome::Ignored
        );
    }

    #[test]
    fn duplicate_rows_in_load_keep_last() {
        let mut newer = pending("a");
        newer.description = Some("newer".to_string());
        let store = ready_store(Visibility::AllStatuses, vec![pending("a"), pending("b"), newer]);

        let snapshot = store.snapshot();
        assert_eq!(ids(&store), vec!["a", "b"]);
        assert_eq!(snapshot.reports()[0].description.as_deref(), Some("newer"));
    }

    #[test]
    fn failed_reload_keeps_last_snapshot() {
        let mut store = ready_store(Visibility::AllStatuses, vec![pending("a")]);
        let ticket = store.begin_load();
        store.apply(ReportChange::Insert(pending("b")));

        let outcome = store.fail_load(
            ticket,
            &BackendError::Read {
                message: "timeout".to_string(),
            },
        );

        assert_eq!(outcome, LoadOutcome::Failed { retained: 2 });
        assert!(store.is_authoritative());
        assert_eq!(ids(&store), vec!["a", "b"]);
    }

    #[test]
    fn failed_first_load_keeps_buffering() {
        let mut store = ReportStore::new(RoleScope::Global, Visibility::AllStatuses);
        let ticket = store.begin_load();
        store.apply(ReportChange::Insert(pending("a")));
        store.fail_load(
            ticket,
            &BackendError::Read {
                message: "offline".to_string(),
            },
        );

        assert_eq!(store.state(), LoadState::Failed);
        assert_eq!(store.apply(ReportChange::Insert(pending("b"))), ApplyOutcome::Buffered);

        let ticket = store.begin_load();
        store.finish_load(ticket, vec![]);
        assert_eq!(ids(&store), vec!["a", "b"]);
    }

    #[test]
    fn stale_load_is_discarded_after_reset() {
        let mut store = ReportStore::new(RoleScope::Global, Visibility::AllStatuses);
        let ticket = store.begin_load();
        store.reset(RoleScope::Ward { ward_id: 4 });

        assert_eq!(store.finish_load(ticket, vec![pending("a")]), LoadOutcome::Stale);
        assert!(store.snapshot().is_empty());
        assert_eq!(store.state(), LoadState::Idle);
    }

    #[test]
    fn buffer_overflow_requires_reload() {
        let mut store =
            ReportStore::new(RoleScope::Global, Visibility::AllStatuses).with_buffer_limit(2);
        let ticket = store.begin_load();
        store.apply(ReportChange::Insert(pending("a")));
        store.apply(ReportChange::Insert(pending("b")));
        assert_eq!(
            store.apply(ReportChange::Insert(pending("c"))),
            ApplyOutcome::Overflowed
        );
        assert_eq!(store.buffered_len(), 0);

        store.finish_load(ticket, vec![pending("z")]);
        assert!(store.needs_reload());
        assert_eq!(store.state(), LoadState::Ready);
        assert!(!store.is_authoritative());

        let ticket = store.begin_load();
        assert!(!store.needs_reload());
        store.finish_load(ticket, vec![pending("a"), pending("b"), pending("c")]);
        assert_eq!(ids(&store), vec!["a", "b", "c"]);
        assert!(store.is_authoritative());
    }

    #[test]
    fn pending_only_read_request_filters_status() {
        let store = ReportStore::new(RoleScope::Global, Visibility::PendingOnly);
        assert_eq!(store.read_request().status, Some(ReportStatus::Pending));
    }
}
