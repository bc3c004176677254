//! Directory error types
//!
//! The closed set of failures a directory round trip can produce, with the
//! transient/permanent classification used by callers' retry policies.

use thiserror::Error;

/// Numeric LDAP result codes (RFC 4511) this crate distinguishes.
pub mod result_code {
    pub const SUCCESS: u32 = 0;
    pub const NO_SUCH_ATTRIBUTE: u32 = 16;
    pub const TYPE_OR_VALUE_EXISTS: u32 = 20;
    pub const NO_SUCH_OBJECT: u32 = 32;
    pub const INVALID_CREDENTIALS: u32 = 49;
    pub const BUSY: u32 = 51;
    pub const UNAVAILABLE: u32 = 52;
    pub const OBJECT_CLASS_VIOLATION: u32 = 65;
    pub const NOT_ALLOWED_ON_NON_LEAF: u32 = 66;
    pub const ALREADY_EXISTS: u32 = 68;
    pub const OTHER: u32 = 80;
    pub const SERVER_DOWN: u32 = 81;
    pub const TIMEOUT: u32 = 85;
}

/// Error returned by a [`DirectoryClient`](crate::traits::DirectoryClient).
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The target entry (or the search base) does not exist.
    #[error("no such object: {dn}")]
    NoSuchObject { dn: String },

    /// An entry with this DN already exists.
    #[error("entry already exists: {dn}")]
    AlreadyExists { dn: String },

    /// The change would leave the entry violating its object classes.
    #[error("object class violation on {dn}: {message}")]
    ObjectClassViolation { dn: String, message: String },

    /// A value scheduled for deletion is not present.
    #[error("no such attribute value on {dn}: {message}")]
    NoSuchAttribute { dn: String, message: String },

    /// A value scheduled for addition is already present.
    #[error("attribute value already exists on {dn}: {message}")]
    TypeOrValueExists { dn: String, message: String },

    /// Bind rejected.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Delete attempted on an entry that still has children.
    #[error("entry has children, cannot delete: {dn}")]
    NotAllowedOnNonLeaf { dn: String },

    /// Transport failure, or the server reported itself busy or unavailable.
    #[error("directory unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The request did not complete within the operation timeout.
    #[error("directory operation timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Configuration rejected before a connection was attempted.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// A result code outside the set above.
    #[error("directory error (code {code}): {message}")]
    Other { code: u32, message: String },
}

impl DirectoryError {
    /// Build an error from a non-zero LDAP result code.
    ///
    /// `dn` is the entry the operation targeted, `text` the server's
    /// diagnostic message.
    pub fn from_result_code(code: u32, dn: &str, text: &str) -> Self {
        let dn = dn.to_string();
        let message = text.to_string();
        match code {
            result_code::NO_SUCH_OBJECT => DirectoryError::NoSuchObject { dn },
            result_code::ALREADY_EXISTS => DirectoryError::AlreadyExists { dn },
            result_code::OBJECT_CLASS_VIOLATION => {
                DirectoryError::ObjectClassViolation { dn, message }
            }
            result_code::NO_SUCH_ATTRIBUTE => DirectoryError::NoSuchAttribute { dn, message },
            result_code::TYPE_OR_VALUE_EXISTS => DirectoryError::TypeOrValueExists { dn, message },
            result_code::INVALID_CREDENTIALS => DirectoryError::InvalidCredentials,
            result_code::NOT_ALLOWED_ON_NON_LEAF => DirectoryError::NotAllowedOnNonLeaf { dn },
            result_code::BUSY | result_code::UNAVAILABLE | result_code::SERVER_DOWN => {
                DirectoryError::Unavailable {
                    message: format!("code {code}: {message}"),
                    source: None,
                }
            }
            _ => DirectoryError::Other { code, message },
        }
    }

    /// The LDAP result code this error corresponds to, when there is one.
    pub fn result_code(&self) -> Option<u32> {
        match self {
            DirectoryError::NoSuchObject { .. } => Some(result_code::NO_SUCH_OBJECT),
            DirectoryError::AlreadyExists { .. } => Some(result_code::ALREADY_EXISTS),
            DirectoryError::ObjectClassViolation { .. } => {
                Some(result_code::OBJECT_CLASS_VIOLATION)
            }
            DirectoryError::NoSuchAttribute { .. } => Some(result_code::NO_SUCH_ATTRIBUTE),
            DirectoryError::TypeOrValueExists { .. } => Some(result_code::TYPE_OR_VALUE_EXISTS),
            DirectoryError::InvalidCredentials => Some(result_code::INVALID_CREDENTIALS),
            DirectoryError::NotAllowedOnNonLeaf { .. } => {
                Some(result_code::NOT_ALLOWED_ON_NON_LEAF)
            }
            DirectoryError::Timeout { .. } => Some(result_code::TIMEOUT),
            DirectoryError::Other { code, .. } => Some(*code),
            DirectoryError::Unavailable { .. } | DirectoryError::InvalidConfiguration { .. } => {
                None
            }
        }
    }

    /// Check if this error is transient and the caller may retry.
    ///
    /// Retrying is the caller's policy; nothing in this workspace retries
    /// on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DirectoryError::Unavailable { .. } | DirectoryError::Timeout { .. }
        )
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            DirectoryError::NoSuchObject { .. } => "NO_SUCH_OBJECT",
            DirectoryError::AlreadyExists { .. } => "ALREADY_EXISTS",
            DirectoryError::ObjectClassViolation { .. } => "OBJECT_CLASS_VIOLATION",
            DirectoryError::NoSuchAttribute { .. } => "NO_SUCH_ATTRIBUTE",
            DirectoryError::TypeOrValueExists { .. } => "TYPE_OR_VALUE_EXISTS",
            DirectoryError::InvalidCredentials => "INVALID_CREDENTIALS",
            DirectoryError::NotAllowedOnNonLeaf { .. } => "NOT_ALLOWED_ON_NON_LEAF",
            DirectoryError::Unavailable { .. } => "UNAVAILABLE",
            DirectoryError::Timeout { .. } => "TIMEOUT",
            DirectoryError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            DirectoryError::Other { .. } => "OTHER",
        }
    }

    // Convenience constructors

    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        DirectoryError::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create an unavailable error with source.
    pub fn unavailable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::Unavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        DirectoryError::InvalidConfiguration {
            message: message.into(),
        }
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;
