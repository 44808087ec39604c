//! Session-scoped live view over the report backend.

use std::sync::Arc;

use civic_watch_analytics::{
    ClusterKeyTracker, ClusterUpdate, FilterEngine, ScopedStats, ScopedStatsCache, chart_slices,
    cluster_key, has_data,
};
use civic_watch_analytics_models::{ChartSlice, ClusterKey, FilterCriteria, ReportStats};
use civic_watch_geography::WardDirectory;
use civic_watch_geography_models::WardBoundary;
use civic_watch_report_models::{Report, ReportChange, ReportId, ReportStatus};
use civic_watch_scope::{RoleScope, Session, SessionResolver, compile};
use civic_watch_spatial::WardIndex;
use civic_watch_store::{
    ApplyOutcome, LoadOutcome, ReportBackend, ReportSnapshot, ReportStore, Subscription,
};

use crate::{DashboardConfig, DashboardError, Notice};

/// Consecutive reloads attempted when the change buffer keeps
/// overflowing during a load.
const MAX_OVERFLOW_RELOADS: usize = 3;

/// The dashboard core for one signed-in user.
///
/// Owns the report store and the change subscription. All report state
/// changes go through the store; status transitions are sent to the
/// backend and only show up once the change stream echoes them back.
pub struct LiveDashboard {
    backend: Arc<dyn ReportBackend>,
    config: DashboardConfig,
    session: Option<Session>,
    scope: Option<RoleScope>,
    store: Option<ReportStore>,
    subscription: Option<Subscription>,
    criteria: FilterCriteria,
    filter: FilterEngine,
    clusters: ClusterKeyTracker,
    stats: ScopedStatsCache,
    wards: WardDirectory,
    ward_index: WardIndex,
    notices: Vec<Notice>,
}

impl std::fmt::Debug for LiveDashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveDashboard")
            .field("session", &self.session)
            .field("scope", &self.scope)
            .field("store", &self.store)
            .field("subscription", &self.subscription)
            .field("criteria", &self.criteria)
            .finish_non_exhaustive()
    }
}

impl LiveDashboard {
    /// Creates a signed-out dashboard.
    #[must_use]
    pub fn new(backend: Arc<dyn ReportBackend>, config: DashboardConfig) -> Self {
        let criteria = config.default_criteria.clone();
        Self {
            backend,
            config,
            session: None,
            scope: None,
            store: None,
            subscription: None,
            criteria,
            filter: FilterEngine::new(),
            clusters: ClusterKeyTracker::new(),
            stats: ScopedStatsCache::new(),
            wards: WardDirectory::default(),
            ward_index: WardIndex::default(),
            notices: Vec::new(),
        }
    }

    /// Active session, if signed in.
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Active scope. `None` when signed out or when the session could not
    /// be scoped.
    #[must_use]
    pub const fn scope(&self) -> Option<&RoleScope> {
        self.scope.as_ref()
    }

    /// Configuration the dashboard was created with.
    #[must_use]
    pub const fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Whether the live view reflects a landed load plus every change
    /// since.
    #[must_use]
    pub fn is_authoritative(&self) -> bool {
        self.store.as_ref().is_some_and(ReportStore::is_authoritative)
    }

    /// Whether a change stream is open.
    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Resolves the current session from `resolver` and switches to it.
    ///
    /// A resolver failure is treated as signed out.
    ///
    /// # Errors
    ///
    /// See [`set_session`](Self::set_session).
    pub async fn refresh_session(
        &mut self,
        resolver: &dyn SessionResolver,
    ) -> Result<Option<LoadOutcome>, DashboardError> {
        let session = match resolver.resolve_session().await {
            Ok(session) => session,
            Err(error) => {
                log::warn!("Session resolution failed, signing out: {error}");
                self.notices.push(Notice::access_denied(&error));
                None
            }
        };
        self.set_session(session).await
    }

    /// Switches to `session`.
    ///
    /// The previous subscription is torn down before anything else. The
    /// new scope is compiled and, if it compiles, a fresh subscription is
    /// opened and the scoped baseline loaded. A session that cannot be
    /// scoped sees nothing and issues no read. Setting the current session
    /// again does nothing.
    ///
    /// Returns the load outcome, or `None` when nothing was loaded. A
    /// failed load is reported as [`LoadOutcome::Failed`] and a notice.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Backend`] if the change stream cannot be
    /// opened. The scope stays active and [`reload`](Self::reload) retries.
    pub async fn set_session(
        &mut self,
        session: Option<Session>,
    ) -> Result<Option<LoadOutcome>, DashboardError> {
        if session == self.session {
            log::debug!("Session unchanged");
            return Ok(None);
        }

        self.teardown();

        let scope = match &session {
            None => {
                log::info!("Signed out");
                None
            }
            Some(session) => match compile(session) {
                Ok(scope) => {
                    log::info!("Session for {} scoped to {scope}", session.user_id);
                    Some(scope)
                }
                Err(error) => {
                    log::warn!("Denying every report to {}: {error}", session.user_id);
                    self.notices.push(Notice::access_denied(&error));
                    None
                }
            },
        };

        self.session = session;
        self.bind_scope(scope);

        if self.store.is_none() {
            return Ok(None);
        }
        self.connect().await
    }

    /// Signs out, detaching from the change stream and clearing every
    /// report.
    pub fn logout(&mut self) {
        self.teardown();
        self.session = None;
        self.bind_scope(None);
        log::info!("Signed out");
    }

    /// Re-reads the baseline for the current scope.
    ///
    /// The subscription is kept (or reopened if it was never established)
    /// and the last snapshot is kept if the read fails.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Backend`] if the change stream cannot be
    /// opened.
    pub async fn reload(&mut self) -> Result<Option<LoadOutcome>, DashboardError> {
        if self.store.is_none() {
            return Ok(None);
        }
        self.connect().await
    }

    /// Applies every change already queued on the subscription and
    /// returns how many altered the view.
    pub async fn pump(&mut self) -> usize {
        let mut changed = 0;
        while let Some(change) = self.subscription.as_mut().and_then(Subscription::try_recv) {
            if self.apply_change(change).changed() {
                changed += 1;
            }
        }
        self.reload_if_overflowed().await;
        changed
    }

    /// Waits for the next change and applies it.
    ///
    /// Returns `None` when not subscribed or once the stream closes.
    pub async fn next_event(&mut self) -> Option<ApplyOutcome> {
        let change = self.subscription.as_mut()?.recv().await?;
        let outcome = self.apply_change(change);
        self.reload_if_overflowed().await;
        Some(outcome)
    }

    /// Criteria the filtered view is built from.
    #[must_use]
    pub const fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// Replaces the filter criteria.
    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
    }

    /// Current contents of the store.
    #[must_use]
    pub fn snapshot(&self) -> Option<ReportSnapshot> {
        self.store.as_ref().map(ReportStore::snapshot)
    }

    /// Reports matching the criteria, in store order.
    pub fn filtered(&mut self) -> Arc<Vec<Report>> {
        match &self.store {
            Some(store) => self.filter.view(&store.snapshot(), &self.criteria),
            None => Arc::default(),
        }
    }

    /// Filtered reports that can be placed on the map.
    pub fn markers(&mut self) -> Vec<Report> {
        self.filtered()
            .iter()
            .filter(|report| report.has_location())
            .cloned()
            .collect()
    }

    /// Cluster key of the filtered view.
    pub fn cluster_key(&mut self) -> ClusterKey {
        cluster_key(&self.filtered())
    }

    /// Whether the map clusterer must be rebuilt since the last call.
    pub fn cluster_update(&mut self) -> ClusterUpdate {
        let view = self.filtered();
        self.clusters.observe(&view)
    }

    /// Aggregate counts over every report in scope.
    #[must_use]
    pub fn stats(&self) -> ReportStats {
        self.store.as_ref().map_or_else(ReportStats::default, |store| {
            self.stats
                .resolve(&store.snapshot(), store.is_authoritative())
        })
    }

    /// Status chart slices, or `None` when there is no report data.
    #[must_use]
    pub fn chart(&self) -> Option<Vec<ChartSlice>> {
        let stats = self.stats();
        has_data(&stats).then(|| chart_slices(&stats))
    }

    /// Offers counts computed by the backend. They are used until the
    /// first load lands, and only if computed for the active scope.
    pub fn offer_stats(&mut self, scoped: ScopedStats) -> bool {
        self.stats.offer(scoped)
    }

    /// Looks up one report in the current view.
    #[must_use]
    pub fn report(&self, id: &ReportId) -> Option<Report> {
        self.store
            .as_ref()
            .and_then(|store| store.snapshot().get(id).cloned())
    }

    /// Asks the backend to mark a report completed.
    ///
    /// Nothing changes locally until the backend echoes the update on the
    /// change stream.
    ///
    /// # Errors
    ///
    /// * [`DashboardError::NoScope`] if no scope is active
    /// * [`DashboardError::UnknownReport`] if the report is not in view
    /// * [`DashboardError::Backend`] if the backend rejects the transition
    pub async fn request_resolve(&mut self, id: &ReportId) -> Result<(), DashboardError> {
        let store = self.store.as_ref().ok_or(DashboardError::NoScope)?;
        if store.snapshot().get(id).is_none() {
            return Err(DashboardError::UnknownReport { id: id.clone() });
        }

        if let Err(error) = self
            .backend
            .request_status_transition(id, ReportStatus::Completed)
            .await
        {
            log::warn!("Failed to resolve report {id}: {error}");
            self.notices.push(Notice::resolve_failed(id, &error));
            return Err(error.into());
        }

        log::info!("Requested completion of report {id}");
        Ok(())
    }

    /// Reads the ward table and rebuilds the ward directory and index.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Backend`] if the ward read fails; the
    /// previous wards are kept.
    pub async fn load_wards(&mut self) -> Result<usize, DashboardError> {
        let records = self.backend.read_wards().await?;
        self.wards = WardDirectory::from_records(&records);
        self.ward_index = WardIndex::build(&self.wards);
        Ok(self.wards.wards().len())
    }

    /// Ward directory for zone and ward listings.
    #[must_use]
    pub const fn wards(&self) -> &WardDirectory {
        &self.wards
    }

    /// Ward outlines that can be drawn.
    #[must_use]
    pub fn ward_overlays(&self) -> Vec<&WardBoundary> {
        self.wards.renderable().collect()
    }

    /// Ward containing a point.
    #[must_use]
    pub fn ward_at(&self, lat: f64, lng: f64) -> Option<&WardBoundary> {
        self.ward_index
            .locate(lat, lng)
            .and_then(|id| self.wards.get(id))
    }

    /// Outline of the ward a ward-scoped session is limited to.
    #[must_use]
    pub fn scope_boundary(&self) -> Option<&WardBoundary> {
        match self.scope {
            Some(RoleScope::Ward { ward_id }) => self
                .wards
                .get(ward_id)
                .filter(|ward| ward.is_renderable()),
            _ => None,
        }
    }

    /// Drains the notices raised since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            log::info!("Detached from report changes");
        }
    }

    fn bind_scope(&mut self, scope: Option<RoleScope>) {
        self.stats.bind(scope.as_ref());
        self.clusters.reset();
        self.filter.invalidate();

        match scope.clone() {
            None => self.store = None,
            Some(scope) => {
                if let Some(store) = self.store.as_mut() {
                    store.reset(scope);
                } else {
                    self.store = Some(
                        ReportStore::new(scope, self.config.visibility)
                            .with_buffer_limit(self.config.event_buffer_limit),
                    );
                }
            }
        }

        self.scope = scope;
    }

    async fn connect(&mut self) -> Result<Option<LoadOutcome>, DashboardError> {
        if self.subscription.is_none() {
            match self.backend.subscribe().await {
                Ok(subscription) => {
                    log::info!("Subscribed to report changes");
                    self.subscription = Some(subscription);
                }
                Err(error) => {
                    log::warn!("Could not subscribe to report changes: {error}");
                    self.notices.push(Notice::subscribe_failed(&error));
                    return Err(error.into());
                }
            }
        }
        Ok(self.load().await)
    }

    async fn load(&mut self) -> Option<LoadOutcome> {
        let mut attempts = 0;
        loop {
            let outcome = self.load_once().await?;
            attempts += 1;

            let overflowed = self.store.as_ref().is_some_and(ReportStore::needs_reload);
            if !overflowed || attempts >= MAX_OVERFLOW_RELOADS {
                return Some(outcome);
            }
            log::warn!("Changes overflowed the buffer during load, reloading");
        }
    }

    async fn load_once(&mut self) -> Option<LoadOutcome> {
        let Self {
            backend,
            store,
            subscription,
            notices,
            ..
        } = self;
        let store = store.as_mut()?;

        let request = store.read_request();
        let ticket = store.begin_load();
        log::info!("Loading reports for {} scope", request.scope);

        let mut read = backend.bulk_read(&request);
        let mut stream_open = subscription.is_some();

        let result = loop {
            tokio::select! {
                result = &mut read => break result,
                change = next_change(subscription), if stream_open => match change {
                    Some(change) => {
                        store.apply(change);
                    }
                    None => {
                        log::warn!("Change stream closed during load");
                        stream_open = false;
                    }
                },
            }
        };

        Some(match result {
            Ok(rows) => store.finish_load(ticket, rows),
            Err(error) => {
                notices.push(Notice::load_failed(&error));
                store.fail_load(ticket, &error)
            }
        })
    }

    async fn reload_if_overflowed(&mut self) {
        if self.store.as_ref().is_some_and(ReportStore::needs_reload) {
            log::warn!("Changes were dropped while waiting for a load, reloading");
            self.load().await;
        }
    }

    fn apply_change(&mut self, change: ReportChange) -> ApplyOutcome {
        let Some(store) = self.store.as_mut() else {
            return ApplyOutcome::Ignored;
        };

        let kind = change.kind();
        let id = change.key().clone();
        let completed =
            matches!(&change, ReportChange::Update(report) if report.status.is_terminal());

        let outcome = store.apply(change);
        if let Some(notice) = Notice::for_change(kind, completed, outcome, &id) {
            self.notices.push(notice);
        }
        outcome
    }
}

async fn next_change(subscription: &mut Option<Subscription>) -> Option<ReportChange> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => None,
    }
}
