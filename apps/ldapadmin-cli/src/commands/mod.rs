//! CLI command implementations

pub mod check_config;
pub mod members;
pub mod orgs;
pub mod roles;
pub mod users;

use std::path::Path;

use ldapadmin_agent::{FieldMap, MemberRef, RoleAgent, RoleId};
use ldapadmin_directory::DirectoryConfig;
use ldapadmin_ldap::LdapDirectory;
use tracing::{debug, warn};

use crate::error::{CliError, CliResult};

/// Config path used when neither `--config` nor `LDAPADMIN_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "ldapadmin.yaml";

/// Settings shared by every command.
#[derive(Debug)]
pub struct Session {
    pub config: DirectoryConfig,
    pub json: bool,
}

impl Session {
    pub fn new(config: DirectoryConfig, json: bool) -> Self {
        Self { config, json }
    }

    /// Open an unbound agent, for reads.
    pub fn connect(&self) -> CliResult<RoleAgent<LdapDirectory>> {
        let directory = LdapDirectory::connect(&self.config)?;
        Ok(RoleAgent::new(directory, &self.config)?)
    }

    /// Open an agent bound with the configured credentials, for writes.
    pub fn connect_bound(&self) -> CliResult<RoleAgent<LdapDirectory>> {
        let password = self.config.bind_password.as_deref().ok_or_else(|| {
            CliError::NotAuthenticated(format!(
                "no bind password configured for {}",
                self.config.bind_dn
            ))
        })?;
        let mut agent = self.connect()?;
        agent.perform_bind(&self.config.bind_dn, password)?;
        Ok(agent)
    }
}

/// Load the config file, then apply environment overrides and validate.
///
/// A missing file at the default location falls back to built-in defaults;
/// a missing file anywhere else is an error.
pub fn load_config(path: &Path) -> CliResult<DirectoryConfig> {
    let mut config = if path.exists() {
        debug!(path = %path.display(), "Loading config file");
        DirectoryConfig::from_file(path)?
    } else if path == Path::new(DEFAULT_CONFIG_PATH) {
        warn!(path = %path.display(), "Config file not found, using defaults");
        DirectoryConfig::default()
    } else {
        return Err(CliError::Config(format!(
            "config file not found: {}",
            path.display()
        )));
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Parse a role id argument; `""` is the root.
pub fn parse_role(value: &str) -> Result<RoleId, String> {
    RoleId::parse(value).map_err(|e| e.to_string())
}

/// Parse a member argument: `user:<uid>`, `org:<id>`, or a bare uid.
pub fn parse_member(value: &str) -> Result<MemberRef, String> {
    let member = match value.split_once(':') {
        Some(("user", id)) => MemberRef::user(id),
        Some(("org", id)) => MemberRef::org(id),
        Some((kind, _)) => return Err(format!("unknown member kind {kind:?}, expected user or org")),
        None => MemberRef::user(value),
    };
    if member.id.is_empty() {
        return Err("member id is empty".to_string());
    }
    Ok(member)
}

/// Parse a `field=value` argument.
pub fn parse_field(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .filter(|(field, _)| !field.is_empty())
        .map(|(field, value)| (field.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected FIELD=VALUE, got {value:?}"))
}

pub fn field_map(pairs: Vec<(String, String)>) -> FieldMap {
    pairs.into_iter().collect()
}
