//! Agent error types
//!
//! Directory failures are translated into this taxonomy at the boundary of
//! each agent operation.

use thiserror::Error;
use tracing::error;

use ldapadmin_directory::DirectoryError;

use crate::codec::RoleId;

/// Error returned by [`RoleAgent`](crate::RoleAgent) operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A mutating operation was attempted before `perform_bind`.
    #[error("not authenticated: call perform_bind before {operation}")]
    NotAuthenticated { operation: &'static str },

    /// A directory entry breaks the role naming invariant.
    #[error("malformed DN {dn:?}: {reason}")]
    MalformedDn { dn: String, reason: String },

    /// A referenced role or member does not exist.
    #[error("DN not found: {dn}")]
    NotFound { dn: String },

    /// Role creation hit an existing entry.
    #[error("role already exists: {dn}")]
    RoleAlreadyExists { dn: String },

    /// Role creation found no parent entry.
    #[error("parent DN missing (trying to create {dn})")]
    ParentMissing { dn: String },

    /// No role at or below the target lists the member.
    #[error("{member} is not a member of {role}")]
    NotAMember { member: String, role: String },

    /// Connection or transport failure; retry is the caller's policy.
    #[error("directory unavailable: {source}")]
    DirectoryUnavailable {
        #[source]
        source: DirectoryError,
    },

    /// An identifier failed validation.
    #[error("invalid identifier {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    /// A record field name outside the attribute map.
    #[error("unknown field: {field}")]
    UnknownField { field: String },

    /// The directory returned more than one entry for a single DN.
    #[error("directory invariant violated: {count} entries for {dn}")]
    InvariantViolation { dn: String, count: usize },

    /// A membership walk failed after modifying some roles.
    #[error("membership update interrupted after {} role(s): {source}", completed.len())]
    Interrupted {
        completed: Vec<RoleId>,
        #[source]
        source: Box<AgentError>,
    },

    /// A directory error with no meaning at this level.
    #[error(transparent)]
    Directory(DirectoryError),
}

impl From<DirectoryError> for AgentError {
    fn from(err: DirectoryError) -> Self {
        if err.is_transient() {
            AgentError::DirectoryUnavailable { source: err }
        } else {
            AgentError::Directory(err)
        }
    }
}

impl AgentError {
    /// Convert a directory error nothing upstream expected, logging it with
    /// the operation and target first.
    pub fn unexpected(operation: &str, dn: &str, err: DirectoryError) -> Self {
        if !err.is_transient() {
            error!(
                operation,
                dn,
                code = err.error_code(),
                error = %err,
                "Unrecognized directory error"
            );
        }
        err.into()
    }

    /// Wrap `self` as an interrupted walk when some roles were already
    /// modified.
    pub fn after(self, completed: &[RoleId]) -> Self {
        if completed.is_empty() {
            self
        } else {
            AgentError::Interrupted {
                completed: completed.to_vec(),
                source: Box::new(self),
            }
        }
    }

    /// Duplicate role or missing ancestor.
    pub fn is_creation_conflict(&self) -> bool {
        matches!(
            self,
            AgentError::RoleAlreadyExists { .. } | AgentError::ParentMissing { .. }
        )
    }

    /// Unbound session or rejected credentials.
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            AgentError::NotAuthenticated { .. }
                | AgentError::Directory(DirectoryError::InvalidCredentials)
        )
    }

    /// Check if this error is transient and the caller may retry.
    pub fn is_transient(&self) -> bool {
        match self {
            AgentError::DirectoryUnavailable { .. } => true,
            AgentError::Interrupted { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Roles modified before the failure, when the operation got that far.
    pub fn completed_roles(&self) -> &[RoleId] {
        match self {
            AgentError::Interrupted { completed, .. } => completed,
            _ => &[],
        }
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            AgentError::NotAuthenticated { .. } => "NOT_AUTHENTICATED",
            AgentError::MalformedDn { .. } => "MALFORMED_DN",
            AgentError::NotFound { .. } => "NOT_FOUND",
            AgentError::RoleAlreadyExists { .. } => "ROLE_ALREADY_EXISTS",
            AgentError::ParentMissing { .. } => "PARENT_MISSING",
            AgentError::NotAMember { .. } => "NOT_A_MEMBER",
            AgentError::DirectoryUnavailable { .. } => "DIRECTORY_UNAVAILABLE",
            AgentError::InvalidId { .. } => "INVALID_ID",
            AgentError::UnknownField { .. } => "UNKNOWN_FIELD",
            AgentError::InvariantViolation { .. } => "INVARIANT_VIOLATION",
            AgentError::Interrupted { .. } => "INTERRUPTED",
            AgentError::Directory(err) => err.error_code(),
        }
    }

    pub(crate) fn malformed(dn: &str, reason: impl Into<String>) -> Self {
        AgentError::MalformedDn {
            dn: dn.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_id(id: &str, reason: impl Into<String>) -> Self {
        AgentError::InvalidId {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;
