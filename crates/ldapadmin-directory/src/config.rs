//! Directory configuration
//!
//! Server address, bind credentials and the three DN suffixes the agent owns.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{DirectoryError, DirectoryResult};

/// Connection and request timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Connection timeout in seconds.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_operation_timeout() -> u64 {
    60
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connection_timeout_secs: default_connection_timeout(),
            operation_timeout_secs: default_operation_timeout(),
        }
    }
}

impl ConnectionSettings {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

/// Configuration for the directory the roles agent manages.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// LDAP server hostname or IP address.
    #[serde(default = "default_host")]
    pub host: String,

    /// LDAP server port (389 for LDAP, 636 for LDAPS).
    #[serde(default = "default_ldap_port")]
    pub port: u16,

    /// Use SSL/TLS (LDAPS).
    #[serde(default)]
    pub use_ssl: bool,

    /// Use STARTTLS upgrade on plain LDAP connection.
    #[serde(default)]
    pub use_starttls: bool,

    /// DN used by `perform_bind` for mutating operations.
    #[serde(default = "default_bind_dn")]
    pub bind_dn: String,

    /// Bind password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_password: Option<String>,

    /// Container of user entries (`uid=<id>,<users_dn>`).
    #[serde(default = "default_users_dn")]
    pub users_dn: String,

    /// Container of organisation entries (`cn=<id>,<orgs_dn>`).
    #[serde(default = "default_orgs_dn")]
    pub orgs_dn: String,

    /// Root of the roles tree.
    #[serde(default = "default_roles_dn")]
    pub roles_dn: String,

    /// Object classes written on new organisation entries.
    #[serde(default = "default_org_object_classes")]
    pub org_object_classes: Vec<String>,

    /// Timeouts.
    #[serde(default)]
    pub connection: ConnectionSettings,
}

impl std::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("use_starttls", &self.use_starttls)
            .field("bind_dn", &self.bind_dn)
            .field(
                "bind_password",
                &self.bind_password.as_ref().map(|_| "***REDACTED***"),
            )
            .field("users_dn", &self.users_dn)
            .field("orgs_dn", &self.orgs_dn)
            .field("roles_dn", &self.roles_dn)
            .field("org_object_classes", &self.org_object_classes)
            .field("connection", &self.connection)
            .finish()
    }
}

fn default_host() -> String {
    "ldap2.eionet.europa.eu".to_string()
}

fn default_ldap_port() -> u16 {
    389
}

fn default_bind_dn() -> String {
    "uid=_admin,ou=Users,o=EIONET,l=Europe".to_string()
}

fn default_users_dn() -> String {
    "ou=Users,o=EIONET,l=Europe".to_string()
}

fn default_orgs_dn() -> String {
    "ou=Organisations,o=EIONET,l=Europe".to_string()
}

fn default_roles_dn() -> String {
    "ou=Roles,o=EIONET,l=Europe".to_string()
}

fn default_org_object_classes() -> Vec<String> {
    vec![
        "top".to_string(),
        "organization".to_string(),
        "labeledURIObject".to_string(),
    ]
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_ldap_port(),
            use_ssl: false,
            use_starttls: false,
            bind_dn: default_bind_dn(),
            bind_password: None,
            users_dn: default_users_dn(),
            orgs_dn: default_orgs_dn(),
            roles_dn: default_roles_dn(),
            org_object_classes: default_org_object_classes(),
            connection: ConnectionSettings::default(),
        }
    }
}

impl DirectoryConfig {
    /// Create a config for `host` with the default suffixes.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Set bind credentials.
    pub fn with_credentials(mut self, dn: impl Into<String>, password: impl Into<String>) -> Self {
        self.bind_dn = dn.into();
        self.bind_password = Some(password.into());
        self
    }

    /// Set the three DN suffixes.
    pub fn with_suffixes(
        mut self,
        users_dn: impl Into<String>,
        orgs_dn: impl Into<String>,
        roles_dn: impl Into<String>,
    ) -> Self {
        self.users_dn = users_dn.into();
        self.orgs_dn = orgs_dn.into();
        self.roles_dn = roles_dn.into();
        self
    }

    /// Enable SSL (LDAPS).
    #[must_use]
    pub fn with_ssl(mut self) -> Self {
        self.use_ssl = true;
        self.port = 636;
        self
    }

    /// Enable STARTTLS.
    #[must_use]
    pub fn with_starttls(mut self) -> Self {
        self.use_starttls = true;
        self
    }

    /// Get the LDAP URL.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> DirectoryResult<()> {
        if self.host.trim().is_empty() {
            return Err(DirectoryError::invalid_configuration("host is required"));
        }

        if self.use_ssl && self.use_starttls {
            return Err(DirectoryError::invalid_configuration(
                "cannot use both SSL and STARTTLS",
            ));
        }

        let suffixes = [
            ("users_dn", &self.users_dn),
            ("orgs_dn", &self.orgs_dn),
            ("roles_dn", &self.roles_dn),
        ];
        for (name, value) in suffixes {
            if value.trim().is_empty() {
                return Err(DirectoryError::invalid_configuration(format!(
                    "{name} is required"
                )));
            }
            if !value.contains('=') {
                return Err(DirectoryError::invalid_configuration(format!(
                    "{name} is not a distinguished name: {value}"
                )));
            }
        }

        if self.users_dn == self.orgs_dn
            || self.users_dn == self.roles_dn
            || self.orgs_dn == self.roles_dn
        {
            return Err(DirectoryError::invalid_configuration(
                "users_dn, orgs_dn and roles_dn must be distinct",
            ));
        }

        Ok(())
    }

    /// Create a redacted version of this config (for logging/display).
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.bind_password.is_some() {
            config.bind_password = Some("***REDACTED***".to_string());
        }
        config
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> DirectoryResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DirectoryError::invalid_configuration(format!(
                "failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(content: &str) -> DirectoryResult<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            DirectoryError::invalid_configuration(format!("failed to parse config: {e}"))
        })
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("LDAPADMIN_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("LDAPADMIN_PORT") {
            match port.parse() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring unparsable LDAPADMIN_PORT"),
            }
        }
        if let Some(dn) = lookup("LDAPADMIN_BIND_DN") {
            self.bind_dn = dn;
        }
        if let Some(password) = lookup("LDAPADMIN_BIND_PASSWORD") {
            self.bind_password = Some(password);
        }
    }
}
