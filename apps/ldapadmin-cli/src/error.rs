//! CLI error types and exit codes

use ldapadmin_agent::AgentError;
use ldapadmin_directory::DirectoryError;
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 2: Authentication required or rejected
/// - 3: Network error
/// - 4: Validation error, missing entry or conflict
/// - 5: Directory content breaks an invariant
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Directory invariant violated: {0}")]
    Invariant(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Directory error: {0}")]
    Directory(String),

    #[error("Output error: {0}")]
    Output(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NotAuthenticated(_) | CliError::AuthenticationFailed(_) => 2,
            CliError::Network(_) => 3,
            CliError::Validation(_) | CliError::NotFound(_) | CliError::Conflict(_) => 4,
            CliError::Invariant(_) => 5,
            CliError::Config(_) | CliError::Directory(_) | CliError::Output(_) => 1,
        }
    }

    /// Print the error to stderr
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::NotAuthenticated(_) => {
                Some("Set bind_password in the config file or LDAPADMIN_BIND_PASSWORD.")
            }
            CliError::AuthenticationFailed(_) => Some("Check bind_dn and the bind password."),
            CliError::Network(_) => {
                Some("Run 'ldapadmin check-config --connect' to test the connection.")
            }
            CliError::Config(_) => Some("Run 'ldapadmin check-config' to inspect the settings."),
            _ => None,
        }
    }
}

impl From<AgentError> for CliError {
    fn from(err: AgentError) -> Self {
        let message = err.to_string();
        if err.is_authentication() {
            return match err {
                AgentError::NotAuthenticated { .. } => CliError::NotAuthenticated(message),
                _ => CliError::AuthenticationFailed(message),
            };
        }
        if err.is_transient() {
            return CliError::Network(message);
        }
        match err {
            AgentError::NotFound { .. } | AgentError::NotAMember { .. } => {
                CliError::NotFound(message)
            }
            AgentError::RoleAlreadyExists { .. } | AgentError::ParentMissing { .. } => {
                CliError::Conflict(message)
            }
            AgentError::InvalidId { .. } | AgentError::UnknownField { .. } => {
                CliError::Validation(message)
            }
            AgentError::MalformedDn { .. } | AgentError::InvariantViolation { .. } => {
                CliError::Invariant(message)
            }
            // Keep the exit code of the underlying failure.
            AgentError::Interrupted { source, .. } => match CliError::from(*source) {
                CliError::Invariant(_) => CliError::Invariant(message),
                CliError::Conflict(_) => CliError::Conflict(message),
                CliError::NotFound(_) => CliError::NotFound(message),
                _ => CliError::Directory(message),
            },
            AgentError::Directory(DirectoryError::InvalidConfiguration { .. }) => {
                CliError::Config(message)
            }
            _ => CliError::Directory(message),
        }
    }
}

impl From<DirectoryError> for CliError {
    fn from(err: DirectoryError) -> Self {
        CliError::from(AgentError::from(err))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Output(err.to_string())
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        CliError::Output(err.to_string())
    }
}
