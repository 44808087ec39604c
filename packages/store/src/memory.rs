//! In-memory [`ReportBackend`].
//!
//! Holds rows in a vector, applies [`ReadRequest`] filters the way a
//! database would and broadcasts every mutation to open subscriptions.
//! Used by the fixture replay tool and by tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use civic_watch_geography_models::WardRecord;
use civic_watch_report_models::{Report, ReportChange, ReportId, ReportStatus};
use tokio::sync::mpsc;

use crate::backend::{ReadRequest, ReportBackend, Subscription};
use crate::BackendError;

type Subscribers = Arc<Mutex<BTreeMap<u64, mpsc::UnboundedSender<ReportChange>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Backend keeping every row in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    rows: Mutex<Vec<Report>>,
    wards: Mutex<Vec<WardRecord>>,
    subscribers: Subscribers,
    next_subscriber: AtomicU64,
    reads: Mutex<Vec<ReadRequest>>,
    fail_reads: AtomicBool,
    fail_transitions: AtomicBool,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend seeded with `reports`.
    #[must_use]
    pub fn with_reports(reports: Vec<Report>) -> Self {
        let backend = Self::new();
        *lock(&backend.rows) = reports;
        backend
    }

    /// Replaces the ward table.
    pub fn set_wards(&self, wards: Vec<WardRecord>) {
        *lock(&self.wards) = wards;
    }

    /// Adds a row and broadcasts an insert.
    pub fn insert(&self, report: Report) {
        {
            let mut rows = lock(&self.rows);
            rows.retain(|row| row.id != report.id);
            rows.push(report.clone());
        }
        self.emit(ReportChange::Insert(report));
    }

    /// Replaces a row and broadcasts an update.
    ///
    /// Rows that do not exist are left alone but the update is still
    /// broadcast, as a database trigger would for a concurrent writer.
    pub fn update(&self, report: Report) {
        {
            let mut rows = lock(&self.rows);
            if let Some(row) = rows.iter_mut().find(|row| row.id == report.id) {
                *row = report.clone();
            }
        }
        self.emit(ReportChange::Update(report));
    }

    /// Removes a row and broadcasts a delete.
    pub fn delete(&self, id: &ReportId) {
        lock(&self.rows).retain(|row| row.id != *id);
        self.emit(ReportChange::Delete(id.clone()));
    }

    /// Broadcasts a change without touching the rows.
    pub fn emit(&self, change: ReportChange) {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|id, sender| {
            let open = sender.send(change.clone()).is_ok();
            if !open {
                log::debug!("Dropping closed subscriber {id}");
            }
            open
        });
    }

    /// Number of open subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    /// Every bulk read issued so far, in order.
    #[must_use]
    pub fn read_requests(&self) -> Vec<ReadRequest> {
        lock(&self.reads).clone()
    }

    /// Makes subsequent bulk reads fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent status transitions fail.
    pub fn set_fail_transitions(&self, fail: bool) {
        self.fail_transitions.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReportBackend for MemoryBackend {
    async fn bulk_read(&self, request: &ReadRequest) -> Result<Vec<Report>, BackendError> {
        lock(&self.reads).push(request.clone());

        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BackendError::Read {
                message: "reports table unavailable".to_string(),
            });
        }

        let rows = lock(&self.rows)
            .iter()
            .filter(|row| request.scope.admits(row))
            .filter(|row| request.status.is_none_or(|status| row.status == status))
            .cloned()
            .collect::<Vec<_>>();

        log::debug!("bulk_read {:?}: {} rows", request.filters(), rows.len());

        Ok(rows)
    }

    async fn subscribe(&self) -> Result<Subscription, BackendError> {
        let id = self.next_subscriber.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::unbounded_channel();
        lock(&self.subscribers).insert(id, sender);

        let subscribers = Arc::clone(&self.subscribers);
        Ok(Subscription::new(receiver, move || {
            lock(&subscribers).remove(&id);
            log::debug!("Subscriber {id} detached");
        }))
    }

    async fn request_status_transition(
        &self,
        id: &ReportId,
        status: ReportStatus,
    ) -> Result<(), BackendError> {
        if self.fail_transitions.load(Ordering::SeqCst) {
            return Err(BackendError::Transition {
                id: id.clone(),
                message: "permission denied".to_string(),
            });
        }

        let updated = {
            let mut rows = lock(&self.rows);
            let row = rows
                .iter_mut()
                .find(|row| row.id == *id)
                .ok_or_else(|| BackendError::Transition {
                    id: id.clone(),
                    message: "no such report".to_string(),
                })?;
            row.status = status;
            row.clone()
        };

        self.emit(ReportChange::Update(updated));
        Ok(())
    }

    async fn read_wards(&self) -> Result<Vec<WardRecord>, BackendError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BackendError::Read {
                message: "ward table unavailable".to_string(),
            });
        }
        Ok(lock(&self.wards).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_watch_report_models::DepartmentRef;
    use civic_watch_scope::RoleScope;

    fn report(id: &str, department: i64, status: ReportStatus) -> Report {
        Report {
            id: ReportId::new(id),
            status,
            department: Some(DepartmentRef::Id(department)),
            ward_id: Some(department * 10),
            description: None,
            latitude: 0.0,
            longitude: 0.0,
            image_url: None,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn bulk_read_applies_scope_and_status() {
        let backend = MemoryBackend::with_reports(vec![
            report("a", 1, ReportStatus::Pending),
            report("b", 1, ReportStatus::Completed),
            report("c", 2, ReportStatus::Pending),
        ]);

        let rows = backend
            .bulk_read(&ReadRequest {
                scope: RoleScope::Department {
                    department_id: 1,
                    department_name: None,
                },
                status: Some(ReportStatus::Pending),
            })
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, ReportId::new("a"));
        assert_eq!(backend.read_requests().len(), 1);
    }

    #[tokio::test]
    async fn subscribe_cycles_do_not_leak() {
        let backend = MemoryBackend::new();
        for _ in 0..50 {
            let subscription = backend.subscribe().await.unwrap();
            assert_eq!(backend.subscriber_count(), 1);
            subscription.unsubscribe();
            assert_eq!(backend.subscriber_count(), 0);
        }
    }

    #[tokio::test]
    async fn no_events_after_unsubscribe() {
        let backend = MemoryBackend::new();
        let mut kept = backend.subscribe().await.unwrap();
        let dropped = backend.subscribe().await.unwrap();
        drop(dropped);

        backend.insert(report("a", 1, ReportStatus::Pending));

        assert_eq!(backend.subscriber_count(), 1);
        assert!(matches!(kept.try_recv(), Some(ReportChange::Insert(_))));
    }

    #[tokio::test]
    async fn transition_broadcasts_update() {
        let backend = MemoryBackend::with_reports(vec![report("a", 1, ReportStatus::Pending)]);
        let mut subscription = backend.subscribe().await.unwrap();

        backend
            .request_status_transition(&ReportId::new("a"), ReportStatus::Completed)
            .await
            .unwrap();

        match subscription.recv().await {
            Some(ReportChange::Update(report)) => {
                assert_eq!(report.status, ReportStatus::Completed);
            }
            other => panic!("unexpected change: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_transition_is_an_error() {
        let backend = MemoryBackend::with_reports(vec![report("a", 1, ReportStatus::Pending)]);
        backend.set_fail_transitions(true);

        let err = backend
            .request_status_transition(&ReportId::new("a"), ReportStatus::Completed)
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::Transition { .. }));
    }
}
