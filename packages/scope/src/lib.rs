#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Session roles and the report visibility scope derived from them.
//!
//! A signed-in administrator sees either every report, the reports of one
//! department, or the reports of one ward. [`compile`] derives that
//! [`RoleScope`] from the [`Session`]; anything it cannot resolve is an
//! error, and callers treat an error as "nothing is visible".

pub mod predicate;
pub mod session;

pub use predicate::{RoleScope, ScopeFilter, compile};
pub use session::{Profile, Role, Session, SessionResolver};

use thiserror::Error;

/// Reasons a session could not be turned into a visibility scope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// The user's profile row could not be fetched.
    #[error("Profile unavailable for user {user_id}")]
    ProfileUnavailable {
        /// Authenticated user.
        user_id: String,
    },

    /// The profile lacks the id the role is scoped by.
    #[error("Profile for user {user_id} has no {field} for role {role}")]
    MissingScopeId {
        /// Authenticated user.
        user_id: String,
        /// Role that requires the id.
        role: String,
        /// Name of the missing profile field.
        field: &'static str,
    },

    /// The role is not one the dashboard knows how to scope.
    #[error("Unknown role: {role}")]
    UnknownRole {
        /// Role as reported by the session.
        role: String,
    },

    /// The session collaborator failed.
    #[error("Session resolution failed: {message}")]
    Resolver {
        /// Description of what went wrong.
        message: String,
    },
}
