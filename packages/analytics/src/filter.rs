//! Filter and search over a report snapshot.

use std::sync::Arc;

use civic_watch_analytics_models::FilterCriteria;
use civic_watch_report_models::Report;
use civic_watch_store::{ReportSnapshot, SnapshotVersion};

/// Whether `report` passes every clause of `criteria`.
///
/// The status must equal the selected status, the department must match
/// unless every department is selected, and the description must contain
/// the search term ignoring case. A missing description is empty text.
#[must_use]
pub fn matches(report: &Report, criteria: &FilterCriteria) -> bool {
    report.status == criteria.status
        && criteria.department.admits(report)
        && contains_ignore_case(report.description_text(), &criteria.search_term)
}

/// Reports passing `criteria`, in their original order.
#[must_use]
pub fn filter_reports(reports: &[Report], criteria: &FilterCriteria) -> Vec<Report> {
    reports
        .iter()
        .filter(|report| matches(report, criteria))
        .cloned()
        .collect()
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Debug)]
struct CachedView {
    version: SnapshotVersion,
    criteria: FilterCriteria,
    reports: Arc<Vec<Report>>,
}

/// Memoizes the filtered view on `(snapshot version, criteria)`.
#[derive(Debug, Default)]
pub struct FilterEngine {
    cached: Option<CachedView>,
    recomputations: u64,
}

impl FilterEngine {
    /// Creates an engine with nothing cached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The filtered view of `snapshot`, recomputed only when the snapshot
    /// version or the criteria differ from the previous call.
    pub fn view(
        &mut self,
        snapshot: &ReportSnapshot,
        criteria: &FilterCriteria,
    ) -> Arc<Vec<Report>> {
        if let Some(cached) = &self.cached
            && cached.version == snapshot.version()
            && cached.criteria == *criteria
        {
            return Arc::clone(&cached.reports);
        }

        let reports = Arc::new(filter_reports(snapshot.reports(), criteria));
        self.recomputations += 1;
        log::debug!(
            "Filtered {} of {} reports (status={}, department={}, search={:?})",
            reports.len(),
            snapshot.len(),
            criteria.status,
            criteria.department,
            criteria.search_term
        );

        self.cached = Some(CachedView {
            version: snapshot.version(),
            criteria: criteria.clone(),
            reports: Arc::clone(&reports),
        });
        reports
    }

    /// Number of times the view was actually recomputed.
    #[must_use]
    pub const fn recomputations(&self) -> u64 {
        self.recomputations
    }

    /// Drops the cached view.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_watch_report_models::{DepartmentRef, ReportChange, ReportId, ReportStatus};
    use civic_watch_scope::RoleScope;
    use civic_watch_store::{ReportStore, Visibility};

    fn report(id: &str, status: ReportStatus, department: &str, description: Option<&str>) -> Report {
        Report {
            id: ReportId::new(id),
            status,
            department: Some(DepartmentRef::Name(department.to_string())),
            ward_id: None,
            description: description.map(str::to_string),
            latitude: 13.0,
            longitude: 80.2,
            image_url: None,
            created_at: None,
        }
    }

    fn loaded(rows: Vec<Report>) -> ReportStore {
        let mut store = ReportStore::new(RoleScope::Global, Visibility::AllStatuses);
        let ticket = store.begin_load();
        store.finish_load(ticket, rows);
        store
    }

    #[test]
    fn conjunction_of_clauses() {
        let rows = vec![
            report("1", ReportStatus::Pending, "D1", Some("Broken streetlight")),
            report("2", ReportStatus::Completed, "D1", Some("streetlight")),
            report("3", ReportStatus::Pending, "D2", Some("Light pole")),
        ];
        let criteria = FilterCriteria::default()
            .with_status(ReportStatus::Pending)
            .with_department("D1")
            .with_search_term("light");

        let ids: Vec<_> = filter_reports(&rows, &criteria)
            .into_iter()
            .map(|r| r.id)
            .collect();

        assert_eq!(ids, vec![ReportId::new("1")]);
    }

    #[test]
    fn missing_description_is_empty_text() {
        let rows = vec![report("1", ReportStatus::Pending, "D1", None)];

        assert_eq!(filter_reports(&rows, &FilterCriteria::default()).len(), 1);
        assert!(
            filter_reports(&rows, &FilterCriteria::default().with_search_term("pothole"))
                .is_empty()
        );
    }

    #[test]
    fn search_ignores_case() {
        let rows = vec![report("1", ReportStatus::Pending, "D1", Some("GARBAGE pile"))];
        let criteria = FilterCriteria::default().with_search_term("garbage");
        assert!(matches(&rows[0], &criteria));
    }

    #[test]
    fn all_departments_admits_unassigned() {
        let mut unassigned = report("1", ReportStatus::Pending, "D1", None);
        unassigned.department = None;
        assert!(matches(&unassigned, &FilterCriteria::default()));
        assert!(!matches(
            &unassigned,
            &FilterCriteria::default().with_department("D1")
        ));
    }

    #[test]
    fn view_is_memoized_on_version_and_criteria() {
        let mut store = loaded(vec![
            report("1", ReportStatus::Pending, "D1", Some("a")),
            report("2", ReportStatus::Pending, "D2", Some("b")),
        ]);
        let mut engine = FilterEngine::new();
        let criteria = FilterCriteria::default();

        let first = engine.view(&store.snapshot(), &criteria);
        let second = engine.view(&store.snapshot(), &criteria);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(engine.recomputations(), 1);

        engine.view(&store.snapshot(), &criteria.clone().with_department("D2"));
        assert_eq!(engine.recomputations(), 2);

        store.apply(ReportChange::Delete(ReportId::new("zzz")));
        engine.view(&store.snapshot(), &criteria.clone().with_department("D2"));
        assert_eq!(engine.recomputations(), 2);

        store.apply(ReportChange::Delete(ReportId::new("2")));
        let after = engine.view(&store.snapshot(), &criteria.with_department("D2"));
        assert_eq!(engine.recomputations(), 3);
        assert!(after.is_empty());
    }
}
