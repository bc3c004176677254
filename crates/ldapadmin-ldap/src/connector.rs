//! LDAP directory client
//!
//! Implements [`DirectoryClient`] over a blocking `ldap3` connection.

use std::collections::HashSet;
use std::time::Duration;

use ldap3::{LdapConn, LdapConnSettings, LdapError, LdapResult, Mod, SearchEntry};
use tracing::{debug, info, instrument, warn};

use ldapadmin_directory::config::DirectoryConfig;
use ldapadmin_directory::error::{DirectoryError, DirectoryResult};
use ldapadmin_directory::operation::{Entry, Modification, Projection, Scope, SearchRequest};
use ldapadmin_directory::traits::DirectoryClient;

/// Attribute list asking the server for no attributes (RFC 4511 4.5.1.8).
const NO_ATTRIBUTES: &str = "1.1";

/// A bound-or-unbound session with an LDAP server.
pub struct LdapDirectory {
    /// Live connection.
    conn: LdapConn,

    /// Server URL, for diagnostics.
    url: String,

    /// Per-request timeout.
    timeout: Duration,

    /// Whether a bind has succeeded.
    bound: bool,
}

impl LdapDirectory {
    /// Open a connection described by `config`. The session starts unbound.
    #[instrument(skip(config), fields(url = %config.url()))]
    pub fn connect(config: &DirectoryConfig) -> DirectoryResult<Self> {
        config.validate()?;
        let url = config.url();

        debug!("Connecting to LDAP server");

        let settings = LdapConnSettings::new()
            .set_conn_timeout(config.connection.connection_timeout())
            .set_starttls(config.use_starttls);

        let conn = LdapConn::with_settings(settings, &url).map_err(|e| {
            DirectoryError::unavailable_with_source(
                format!("Failed to connect to LDAP server at {url}"),
                e,
            )
        })?;

        info!(host = %config.host, "LDAP connection established");

        Ok(Self {
            conn,
            url,
            timeout: config.connection.operation_timeout(),
            bound: false,
        })
    }

    /// Server URL this session is connected to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Close the session.
    pub fn unbind(mut self) -> DirectoryResult<()> {
        self.bound = false;
        self.conn
            .unbind()
            .map_err(|e| transport_error("unbind", &self.url, self.timeout, e))
    }
}

impl std::fmt::Debug for LdapDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapDirectory")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("bound", &self.bound)
            .finish()
    }
}

/// Map a failed `ldap3` call. Result-code errors keep their code; anything
/// else is the transport and becomes `Unavailable` or `Timeout`.
fn transport_error(operation: &str, target: &str, timeout: Duration, e: LdapError) -> DirectoryError {
    match e {
        LdapError::Timeout { .. } => DirectoryError::Timeout {
            timeout_secs: timeout.as_secs(),
        },
        LdapError::LdapResult { result } => check_result(result, target).err().unwrap_or_else(|| {
            DirectoryError::unavailable(format!("LDAP {operation} failed for {target}"))
        }),
        other => DirectoryError::unavailable_with_source(
            format!("LDAP {operation} failed for {target}"),
            other,
        ),
    }
}

/// Turn a non-success result into the matching [`DirectoryError`].
fn check_result(result: LdapResult, dn: &str) -> DirectoryResult<()> {
    if result.rc == 0 {
        return Ok(());
    }
    Err(DirectoryError::from_result_code(result.rc, dn, &result.text))
}

fn ldap_scope(scope: Scope) -> ldap3::Scope {
    match scope {
        Scope::Base => ldap3::Scope::Base,
        Scope::OneLevel => ldap3::Scope::OneLevel,
        Scope::Subtree => ldap3::Scope::Subtree,
    }
}

fn requested_attributes(projection: &Projection) -> Vec<String> {
    match projection {
        Projection::All => vec!["*".to_string()],
        Projection::Only(names) if names.is_empty() => vec![NO_ATTRIBUTES.to_string()],
        Projection::Only(names) => names.clone(),
        Projection::NoAttributes => vec![NO_ATTRIBUTES.to_string()],
    }
}

fn to_ldap_mod(modification: &Modification) -> Mod<String> {
    let values: HashSet<String> = modification.values().iter().cloned().collect();
    let attribute = modification.attribute().to_string();
    match modification {
        Modification::Add { .. } => Mod::Add(attribute, values),
        Modification::Delete { .. } => Mod::Delete(attribute, values),
        Modification::Replace { .. } => Mod::Replace(attribute, values),
    }
}

fn to_entry(entry: SearchEntry) -> Entry {
    Entry {
        dn: entry.dn,
        attrs: entry.attrs.into_iter().collect(),
    }
}

impl DirectoryClient for LdapDirectory {
    #[instrument(skip(self, password))]
    fn bind(&mut self, dn: &str, password: &str) -> DirectoryResult<()> {
        self.bound = false;
        let (url, timeout) = (self.url.clone(), self.timeout);

        let result = self
            .conn
            .with_timeout(timeout)
            .simple_bind(dn, password)
            .map_err(|e| transport_error("bind", &url, timeout, e))?;

        if let Err(e) = check_result(result, dn) {
            warn!(error = %e, "LDAP bind rejected");
            return Err(e);
        }

        self.bound = true;
        info!("LDAP bind succeeded");
        Ok(())
    }

    fn is_bound(&self) -> bool {
        self.bound
    }

    #[instrument(skip(self), fields(base = %request.base, scope = %request.scope))]
    fn search(&mut self, request: &SearchRequest) -> DirectoryResult<Vec<Entry>> {
        let filter = request.filter_string();
        let attrs = requested_attributes(&request.attributes);
        let timeout = self.timeout;

        debug!(filter = %filter, "Searching LDAP");

        let result = self
            .conn
            .with_timeout(timeout)
            .search(&request.base, ldap_scope(request.scope), &filter, attrs)
            .map_err(|e| transport_error("search", &request.base, timeout, e))?;

        let ldap3::SearchResult(entries, status) = result;
        check_result(status, &request.base)?;

        let entries: Vec<Entry> = entries
            .into_iter()
            .map(|raw| to_entry(SearchEntry::construct(raw)))
            .collect();

        debug!(count = entries.len(), "LDAP search complete");
        Ok(entries)
    }

    #[instrument(skip(self, attributes))]
    fn add(&mut self, dn: &str, attributes: &[(String, Vec<String>)]) -> DirectoryResult<()> {
        let attrs: Vec<(String, HashSet<String>)> = attributes
            .iter()
            .map(|(name, values)| (name.clone(), values.iter().cloned().collect()))
            .collect();
        let timeout = self.timeout;

        let result = self
            .conn
            .with_timeout(timeout)
            .add(dn, attrs)
            .map_err(|e| transport_error("add", dn, timeout, e))?;
        check_result(result, dn)?;

        info!("LDAP entry added");
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete(&mut self, dn: &str) -> DirectoryResult<()> {
        let timeout = self.timeout;

        let result = self
            .conn
            .with_timeout(timeout)
            .delete(dn)
            .map_err(|e| transport_error("delete", dn, timeout, e))?;
        check_result(result, dn)?;

        info!("LDAP entry deleted");
        Ok(())
    }

    #[instrument(skip(self, modifications), fields(count = modifications.len()))]
    fn modify(&mut self, dn: &str, modifications: &[Modification]) -> DirectoryResult<()> {
        if modifications.is_empty() {
            return Ok(());
        }
        let mods: Vec<Mod<String>> = modifications.iter().map(to_ldap_mod).collect();
        let timeout = self.timeout;

        let result = self
            .conn
            .with_timeout(timeout)
            .modify(dn, mods)
            .map_err(|e| transport_error("modify", dn, timeout, e))?;
        check_result(result, dn)?;

        debug!("LDAP entry modified");
        Ok(())
    }
}
