//! Role scope compilation and per-report evaluation.

use civic_watch_report_models::{DepartmentId, Report, WardId};
use serde::{Deserialize, Serialize};

use crate::{Role, ScopeError, Session};

/// Which reports a session may see.
///
/// The same value drives the server-side filter of the bulk read and the
/// client-side check applied to every change event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum RoleScope {
    /// Every report.
    Global,
    /// Reports assigned to one department.
    Department {
        /// Department primary key.
        department_id: DepartmentId,
        /// Department name, for reports that embed the name instead of the id.
        #[serde(default)]
        department_name: Option<String>,
    },
    /// Reports filed in one ward.
    Ward {
        /// Ward primary key.
        ward_id: WardId,
    },
}

/// Equality filter pushed down to the bulk read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScopeFilter {
    /// Column compared.
    pub column: &'static str,
    /// Value the column must equal.
    pub value: i64,
}

impl RoleScope {
    /// Whether `report` falls inside this scope.
    #[must_use]
    pub fn admits(&self, report: &Report) -> bool {
        match self {
            Self::Global => true,
            Self::Department {
                department_id,
                department_name,
            } => report.department.as_ref().is_some_and(|department| {
                department.refers_to(*department_id, department_name.as_deref())
            }),
            Self::Ward { ward_id } => report.ward_id == Some(*ward_id),
        }
    }

    /// The equality filter the backend can apply, or `None` for global
    /// reads.
    #[must_use]
    pub const fn equality_filter(&self) -> Option<ScopeFilter> {
        match self {
            Self::Global => None,
            Self::Department { department_id, .. } => Some(ScopeFilter {
                column: "department_id",
                value: *department_id,
            }),
            Self::Ward { ward_id } => Some(ScopeFilter {
                column: "ward_id",
                value: *ward_id,
            }),
        }
    }
}

impl std::fmt::Display for RoleScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Department { department_id, .. } => write!(f, "department {department_id}"),
            Self::Ward { ward_id } => write!(f, "ward {ward_id}"),
        }
    }
}

/// Derives the visibility scope of a session.
///
/// Fails closed: a scoped role without a fetched profile, a profile
/// missing its scoping id, or an unrecognized role is an error rather
/// than a wider scope.
///
/// # Errors
///
/// Returns [`ScopeError`] when the session cannot be scoped.
pub fn compile(session: &Session) -> Result<RoleScope, ScopeError> {
    let scope = match &session.role {
        Role::SuperAdmin => RoleScope::Global,
        Role::DepartmentAdmin => {
            let profile = session
                .profile
                .as_ref()
                .ok_or_else(|| ScopeError::ProfileUnavailable {
                    user_id: session.user_id.clone(),
                })?;
            let department_id = profile
                .department_id
                .ok_or_else(|| missing_id(session, "department_id"))?;
            RoleScope::Department {
                department_id,
                department_name: profile.department_name.clone(),
            }
        }
        Role::WardAdmin => {
            let profile = session
                .profile
                .as_ref()
                .ok_or_else(|| ScopeError::ProfileUnavailable {
                    user_id: session.user_id.clone(),
                })?;
            let ward_id = profile
                .ward_id
                .ok_or_else(|| missing_id(session, "ward_id"))?;
            RoleScope::Ward { ward_id }
        }
        Role::Unrecognized(role) => {
            return Err(ScopeError::UnknownRole { role: role.clone() });
        }
    };

    log::debug!("Compiled {scope} scope for user {}", session.user_id);
    Ok(scope)
}

fn missing_id(session: &Session, field: &'static str) -> ScopeError {
    ScopeError::MissingScopeId {
        user_id: session.user_id.clone(),
        role: session.role.to_string(),
        field,
    }
}
