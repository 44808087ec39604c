//! Authenticated session and profile types.

use async_trait::async_trait;
use civic_watch_report_models::{DepartmentId, WardId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::{AsRefStr, EnumString};

use crate::ScopeError;

/// Administrative role attached to a user account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Role {
    /// Sees every report.
    #[strum(serialize = "super_admin", serialize = "superadmin")]
    SuperAdmin,
    /// Sees the reports of one department.
    #[strum(serialize = "department_admin", serialize = "admin")]
    DepartmentAdmin,
    /// Sees the reports of one ward.
    WardAdmin,
    /// Any role string the dashboard does not recognize.
    #[strum(default)]
    Unrecognized(String),
}

impl Role {
    /// Role name as written by the auth collaborator.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Unrecognized(raw) => raw,
            known => known.as_ref(),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw
            .trim()
            .parse()
            .unwrap_or_else(|_| Self::Unrecognized(raw.clone())))
    }
}

/// Scoping attributes from the user's profile row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Profile {
    /// Department a department admin is responsible for.
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
    /// Name of that department, used to match reports that embed it.
    #[serde(default)]
    pub department_name: Option<String>,
    /// Ward a ward admin is responsible for.
    #[serde(default)]
    pub ward_id: Option<WardId>,
}

/// An authenticated session.
///
/// `profile` is `None` when the profile fetch failed; the session is
/// still valid but can only be scoped if the role needs no profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Session {
    /// Authenticated user id.
    pub user_id: String,
    /// Role claimed by the session.
    pub role: Role,
    /// Profile attributes, if they could be fetched.
    #[serde(default)]
    pub profile: Option<Profile>,
}

/// Supplies the current authenticated session.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Returns the signed-in session, or `None` when signed out.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Resolver`] if the auth collaborator fails.
    async fn resolve_session(&self) -> Result<Option<Session>, ScopeError>;
}
