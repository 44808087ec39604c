#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Civic issue report types and the change events that mutate them.
//!
//! A [`Report`] is the single entity the live dashboard tracks. Reports
//! are created, resolved and deleted by external actors; the dashboard
//! only observes those mutations as [`ReportChange`] events.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::{AsRefStr, Display, EnumString};

/// Department primary key.
pub type DepartmentId = i64;

/// Ward primary key.
pub type WardId = i64;

/// Lifecycle status of a report.
///
/// The backing store writes `"Not Completed"` for open reports. Any value
/// that is not recognized is treated as [`ReportStatus::Pending`] so an
/// unexpected status never hides an unresolved issue.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum ReportStatus {
    /// Reported and not yet resolved.
    #[default]
    #[strum(to_string = "Not Completed", serialize = "Pending")]
    Pending,
    /// Resolved by the responsible department.
    #[strum(serialize = "Completed")]
    Completed,
}

impl ReportStatus {
    /// Parses a status as written by the backing store, falling back to
    /// [`Self::Pending`] for anything unrecognized.
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        raw.trim().parse().unwrap_or_else(|_| {
            log::debug!("Unknown report status {raw:?}, treating as pending");
            Self::Pending
        })
    }

    /// Whether this is the terminal status of the report lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Pending, Self::Completed]
    }
}

impl Serialize for ReportStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_ref())
    }
}

impl<'de> Deserialize<'de> for ReportStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map_or(Self::Pending, Self::from_wire))
    }
}

/// Primary key of a report.
///
/// The backing store hands out either numeric or textual keys depending
/// on the table definition, so both are accepted and kept as text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl ReportId {
    /// Creates a report key from any string-like value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReportId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<i64> for ReportId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for ReportId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(value) => Self::from(value),
            RawId::Text(value) => Self(value),
        })
    }
}

/// Reference to the department responsible for a report.
///
/// Rows carry either the department's numeric id or its embedded name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DepartmentRef {
    /// Foreign key into the departments table.
    Id(DepartmentId),
    /// Department name embedded in the report row.
    Name(String),
}

impl DepartmentRef {
    /// Text used when comparing against a user-selected department.
    #[must_use]
    pub fn label(&self) -> Cow<'_, str> {
        match self {
            Self::Id(id) => Cow::Owned(id.to_string()),
            Self::Name(name) => Cow::Borrowed(name),
        }
    }

    /// Whether this reference points at the given department.
    ///
    /// Name references match either the textual id or, when known, the
    /// department's name (ignoring ASCII case).
    #[must_use]
    pub fn refers_to(&self, id: DepartmentId, name: Option<&str>) -> bool {
        match self {
            Self::Id(value) => *value == id,
            Self::Name(value) => {
                value.trim() == id.to_string()
                    || name.is_some_and(|name| name.trim().eq_ignore_ascii_case(value.trim()))
            }
        }
    }
}

impl std::fmt::Display for DepartmentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// A civic issue report as stored in the `reports` table.
///
/// Rows may carry both the legacy and current column names; see
/// [`RawReport`] for how they are resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawReport")]
pub struct Report {
    /// Primary key.
    pub id: ReportId,
    /// Lifecycle status.
    pub status: ReportStatus,
    /// Responsible department.
    pub department: Option<DepartmentRef>,
    /// Ward the report was filed in, if attributed.
    pub ward_id: Option<WardId>,
    /// Free-text description written by the reporter.
    pub description: Option<String>,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Photo of the issue.
    pub image_url: Option<String>,
    /// When the report was filed.
    pub created_at: Option<DateTime<Utc>>,
}

/// Wire shape of a `reports` row.
///
/// `id` wins over the older `report_id`. A numeric `department_id` wins
/// over the embedded `department` name. `ward_id` wins over `ward`.
#[derive(Deserialize)]
struct RawReport {
    #[serde(default)]
    id: Option<ReportId>,
    #[serde(default)]
    report_id: Option<ReportId>,
    #[serde(default)]
    status: ReportStatus,
    #[serde(default)]
    department: Option<DepartmentRef>,
    #[serde(default)]
    department_id: Option<DepartmentId>,
    #[serde(default)]
    ward_id: Option<WardId>,
    #[serde(default)]
    ward: Option<WardId>,
    #[serde(default)]
    description: Option<String>,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl TryFrom<RawReport> for Report {
    type Error = String;

    fn try_from(raw: RawReport) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .or(raw.report_id)
            .ok_or_else(|| "missing field `id`".to_string())?;

        Ok(Self {
            id,
            status: raw.status,
            department: raw.department_id.map(DepartmentRef::Id).or(raw.department),
            ward_id: raw.ward_id.or(raw.ward),
            description: raw.description,
            latitude: raw.latitude,
            longitude: raw.longitude,
            image_url: raw.image_url,
            created_at: raw.created_at,
        })
    }
}

impl Report {
    /// Description text, empty when the reporter left none.
    #[must_use]
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }

    /// Whether the coordinates can be placed on a map.
    #[must_use]
    pub fn has_location(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Kind of mutation carried by a [`ReportChange`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    /// A report was created.
    Insert,
    /// A report was modified.
    Update,
    /// A report was removed.
    Delete,
}

/// An out-of-band mutation of the `reports` table.
///
/// Events for the same key arrive in commit order; no order is implied
/// across keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportChange {
    /// New row image.
    Insert(Report),
    /// Updated row image.
    Update(Report),
    /// Key of the removed row.
    Delete(ReportId),
}

impl ReportChange {
    /// Key of the report this change applies to.
    #[must_use]
    pub const fn key(&self) -> &ReportId {
        match self {
            Self::Insert(report) | Self::Update(report) => &report.id,
            Self::Delete(id) => id,
        }
    }

    /// Kind of mutation.
    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Insert(_) => ChangeKind::Insert,
            Self::Update(_) => ChangeKind::Update,
            Self::Delete(_) => ChangeKind::Delete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_wire_values() {
        assert_eq!(ReportStatus::from_wire("Not Completed"), ReportStatus::Pending);
        assert_eq!(ReportStatus::from_wire("pending"), ReportStatus::Pending);
        assert_eq!(ReportStatus::from_wire("Completed"), ReportStatus::Completed);
        assert_eq!(ReportStatus::from_wire(" completed "), ReportStatus::Completed);
    }

    #[test]
    fn unknown_status_is_pending() {
        assert_eq!(ReportStatus::from_wire("In Review"), ReportStatus::Pending);
        assert_eq!(ReportStatus::from_wire(""), ReportStatus::Pending);
    }

    #[test]
    fn status_serializes_as_wire_value() {
        assert_eq!(ReportStatus::Pending.to_string(), "Not Completed");
        assert_eq!(
            serde_json::to_string(&ReportStatus::Completed).unwrap(),
            "\"Completed\""
        );
    }

    #[test]
    fn report_accepts_legacy_key_and_null_status() {
        let report: Report = serde_json::from_str(
            r#"{
                "report_id": 17,
                "status": null,
                "department": "Roads",
                "latitude": 13.08,
                "longitude": 80.27
            }"#,
        )
        .unwrap();

        assert_eq!(report.id, ReportId::new("17"));
        assert_eq!(report.status, ReportStatus::Pending);
        assert_eq!(report.department, Some(DepartmentRef::Name("Roads".to_string())));
        assert_eq!(report.description_text(), "");
        assert!(report.has_location());
    }

    #[test]
    fn department_id_reference() {
        let report: Report = serde_json::from_str(
            r#"{"id": "a1", "department_id": 4, "latitude": 0.5, "longitude": 0.5}"#,
        )
        .unwrap();

        let department = report.department.unwrap();
        assert!(department.refers_to(4, None));
        assert!(!department.refers_to(5, None));
        assert_eq!(department.label(), "4");
    }

    #[test]
    fn row_with_both_key_and_department_columns() {
        let report: Report = serde_json::from_str(
            r#"{
                "id": 5,
                "report_id": 5,
                "department": "Roads",
                "department_id": 3,
                "ward": 7,
                "latitude": 13.0,
                "longitude": 80.2
            }"#,
        )
        .unwrap();

        assert_eq!(report.id, ReportId::new("5"));
        assert_eq!(report.department, Some(DepartmentRef::Id(3)));
        assert_eq!(report.ward_id, Some(7));
    }

    #[test]
    fn legacy_key_with_department_id_and_name() {
        let report: Report = serde_json::from_str(
            r#"{
                "report_id": 5,
                "department": "Roads",
                "department_id": null,
                "latitude": 13.0,
                "longitude": 80.2
            }"#,
        )
        .unwrap();

        assert_eq!(report.id, ReportId::new("5"));
        assert_eq!(report.department, Some(DepartmentRef::Name("Roads".to_string())));
    }

    #[test]
    fn row_without_key_is_rejected() {
        let result = serde_json::from_str::<Report>(r#"{"latitude": 1.0, "longitude": 2.0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn serialized_report_reads_back() {
        let report = Report {
            id: ReportId::new("r9"),
            status: ReportStatus::Completed,
            department: Some(DepartmentRef::Id(2)),
            ward_id: Some(4),
            description: Some("Pothole".to_string()),
            latitude: 13.0,
            longitude: 80.0,
            image_url: None,
            created_at: None,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(serde_json::from_str::<Report>(&json).unwrap(), report);
    }

    #[test]
    fn department_name_reference_matches_known_name() {
        let department = DepartmentRef::Name("Water Supply".to_string());
        assert!(department.refers_to(2, Some("water supply")));
        assert!(!department.refers_to(2, None));
        assert!(DepartmentRef::Name("2".to_string()).refers_to(2, None));
    }

    #[test]
    fn change_event_shape() {
        let change: ReportChange =
            serde_json::from_str(r#"{"type": "DELETE", "payload": 9}"#).unwrap();
        assert_eq!(change.kind(), ChangeKind::Delete);
        assert_eq!(change.key(), &ReportId::new("9"));
    }

    #[test]
    fn non_finite_coordinates_have_no_location() {
        let report = Report {
            id: ReportId::new("x"),
            status: ReportStatus::Pending,
            department: None,
            ward_id: None,
            description: None,
            latitude: f64::NAN,
            longitude: 80.0,
            image_url: None,
            created_at: None,
        };
        assert!(!report.has_location());
    }
}
