#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Types shared between the report view engine and its consumers.
//!
//! [`FilterCriteria`] is owned by the UI layer and describes what the map
//! and list show. [`ReportStats`] and [`ChartSlice`] describe the
//! aggregate panel, and [`ClusterKey`] identifies the set of markers the
//! map clusterer was built from.

use civic_watch_report_models::{Report, ReportStatus};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Wire value selecting every department.
pub const ALL_DEPARTMENTS: &str = "All";

/// Department part of the filter criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum DepartmentFilter {
    /// No department restriction.
    #[default]
    All,
    /// Only reports whose department reference reads as this value.
    Only(String),
}

impl DepartmentFilter {
    /// Whether `report` passes the department restriction.
    #[must_use]
    pub fn admits(&self, report: &Report) -> bool {
        match self {
            Self::All => true,
            Self::Only(value) => report
                .department
                .as_ref()
                .is_some_and(|department| department.label() == value.as_str()),
        }
    }
}

impl From<&str> for DepartmentFilter {
    fn from(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(ALL_DEPARTMENTS) {
            Self::All
        } else {
            Self::Only(value.to_string())
        }
    }
}

impl std::fmt::Display for DepartmentFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str(ALL_DEPARTMENTS),
            Self::Only(value) => f.write_str(value),
        }
    }
}

impl Serialize for DepartmentFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DepartmentFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map_or(Self::All, Self::from))
    }
}

/// What the map and list show.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterCriteria {
    /// The single status shown.
    pub status: ReportStatus,
    /// Department restriction.
    pub department: DepartmentFilter,
    /// Case-insensitive substring the description must contain.
    pub search_term: String,
}

impl FilterCriteria {
    /// Replaces the status.
    #[must_use]
    pub const fn with_status(mut self, status: ReportStatus) -> Self {
        self.status = status;
        self
    }

    /// Replaces the department restriction.
    #[must_use]
    pub fn with_department(mut self, department: impl Into<DepartmentFilter>) -> Self {
        self.department = department.into();
        self
    }

    /// Replaces the search term.
    #[must_use]
    pub fn with_search_term(mut self, term: impl Into<String>) -> Self {
        self.search_term = term.into();
        self
    }
}

/// Report counts for the aggregate panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportStats {
    /// Every report in scope.
    pub total: u64,
    /// Reports not yet completed.
    pub pending: u64,
    /// Completed reports.
    pub completed: u64,
}

impl ReportStats {
    /// Builds stats from a total and a pending count.
    #[must_use]
    pub const fn from_counts(total: u64, pending: u64) -> Self {
        Self {
            total,
            pending,
            completed: total.saturating_sub(pending),
        }
    }

    /// Whether `pending + completed == total`.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        matches!(self.pending.checked_add(self.completed), Some(sum) if sum == self.total)
    }
}

/// One slice of the status pie chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSlice {
    /// Legend label.
    pub name: String,
    /// Number of reports in the slice.
    pub value: u64,
}

/// Identity of the set of markers in view, in order.
///
/// Two views with the same key produce the same clusters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterKey(String);

impl ClusterKey {
    /// Joins report keys in view order.
    ///
    /// Keys are separated by `,`. A `,` or `\` inside a key is escaped
    /// with `\`, so distinct key lists never join to the same text.
    #[must_use]
    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a Report>) -> Self {
        let mut key = String::new();
        for (index, report) in reports.into_iter().enumerate() {
            if index > 0 {
                key.push(',');
            }
            for c in report.id.as_str().chars() {
                if matches!(c, ',' | '\\') {
                    key.push('\\');
                }
                key.push(c);
            }
        }
        Self(key)
    }

    /// Key as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether no marker is in view.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ClusterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn department_filter_parses_all() {
        assert_eq!(DepartmentFilter::from("All"), DepartmentFilter::All);
        assert_eq!(DepartmentFilter::from(" all "), DepartmentFilter::All);
        assert_eq!(DepartmentFilter::from(""), DepartmentFilter::All);
        assert_eq!(
            DepartmentFilter::from("Roads"),
            DepartmentFilter::Only("Roads".to_string())
        );
    }

    #[test]
    fn criteria_default_to_pending() {
        let criteria: FilterCriteria = serde_json::from_str("{}").unwrap();
        assert_eq!(criteria.status, ReportStatus::Pending);
        assert_eq!(criteria.department, DepartmentFilter::All);
        assert!(criteria.search_term.is_empty());
    }

    #[test]
    fn criteria_from_json() {
        let criteria: FilterCriteria = serde_json::from_str(
            r#"{"status": "Completed", "department": "D1", "searchTerm": "light"}"#,
        )
        .unwrap();
        assert_eq!(
            criteria,
            FilterCriteria::default()
                .with_status(ReportStatus::Completed)
                .with_department("D1")
                .with_search_term("light")
        );
    }

    #[test]
    fn stats_from_counts() {
        let stats = ReportStats::from_counts(10, 4);
        assert_eq!(stats.completed, 6);
        assert!(stats.is_consistent());
        assert!(!ReportStats {
            total: 3,
            pending: 1,
            completed: 1
        }
        .is_consistent());
    }

    #[test]
    fn cluster_key_escapes_separator_in_ids() {
        fn report(id: &str) -> Report {
            Report {
                id: civic_watch_report_models::ReportId::new(id),
                status: ReportStatus::Pending,
                department: None,
                ward_id: None,
                description: None,
                latitude: 13.0,
                longitude: 80.0,
                image_url: None,
                created_at: None,
            }
        }

        let joined = ClusterKey::from_reports(&[report("a"), report("b")]);
        let single = ClusterKey::from_reports(&[report("a,b")]);
        assert_eq!(joined.as_str(), "a,b");
        assert_eq!(single.as_str(), "a\\,b");
        assert_ne!(joined, single);

        assert_ne!(
            ClusterKey::from_reports(&[report("a\\"), report("b")]),
            ClusterKey::from_reports(&[report("a\\,b")])
        );
        assert!(ClusterKey::from_reports(std::iter::empty::<&Report>()).is_empty());
    }
}
