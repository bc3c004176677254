//! Role agent
//!
//! Owns the directory session and the codec. The role, membership and
//! record operations are implemented in their own modules on this type.

use tracing::{info, instrument, warn};

use ldapadmin_directory::{
    DirectoryClient, DirectoryConfig, DirectoryError, Entry, Filter, SearchRequest,
};

use crate::codec::DnCodec;
use crate::error::{AgentError, AgentResult};

/// Object class of role entries.
pub const ROLE_OBJECT_CLASS: &str = "groupOfUniqueNames";

/// Member attribute of role entries.
pub const MEMBER_ATTRIBUTE: &str = "uniqueMember";

/// Value that keeps a role entry valid while it has no real members.
pub const PLACEHOLDER_MEMBER: &str = "";

pub(crate) fn role_filter() -> Filter {
    Filter::eq("objectClass", ROLE_OBJECT_CLASS)
}

/// Administrative agent over one directory session.
///
/// Every read re-queries the directory; nothing is cached between calls.
pub struct RoleAgent<C> {
    pub(crate) client: C,
    pub(crate) codec: DnCodec,
    pub(crate) org_object_classes: Vec<String>,
}

impl<C: DirectoryClient> RoleAgent<C> {
    /// Create an agent over `client`. The configuration is validated first.
    pub fn new(client: C, config: &DirectoryConfig) -> AgentResult<Self> {
        config.validate()?;
        Ok(Self {
            client,
            codec: DnCodec::from_config(config),
            org_object_classes: config.org_object_classes.clone(),
        })
    }

    pub fn codec(&self) -> &DnCodec {
        &self.codec
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn into_client(self) -> C {
        self.client
    }

    pub fn is_bound(&self) -> bool {
        self.client.is_bound()
    }

    /// Authenticate the session. Required before any mutating operation.
    #[instrument(skip(self, password))]
    pub fn perform_bind(&mut self, dn: &str, password: &str) -> AgentResult<()> {
        match self.client.bind(dn, password) {
            Ok(()) => {
                info!("Bound to directory");
                Ok(())
            }
            Err(DirectoryError::InvalidCredentials) => {
                warn!("Directory rejected credentials");
                Err(AgentError::Directory(DirectoryError::InvalidCredentials))
            }
            Err(err) => Err(AgentError::unexpected("perform_bind", dn, err)),
        }
    }

    pub(crate) fn require_bound(&self, operation: &'static str) -> AgentResult<()> {
        if self.client.is_bound() {
            Ok(())
        } else {
            Err(AgentError::NotAuthenticated { operation })
        }
    }

    /// Base-scope lookup of at most one entry.
    ///
    /// A missing base is `None`; more than one result breaks DN uniqueness
    /// and is reported as [`AgentError::InvariantViolation`].
    pub(crate) fn lookup_one(&mut self, request: SearchRequest) -> AgentResult<Option<Entry>> {
        let dn = request.base.clone();
        let mut entries = match self.client.search(&request) {
            Ok(entries) => entries,
            Err(DirectoryError::NoSuchObject { .. }) => return Ok(None),
            Err(err) => return Err(AgentError::unexpected("lookup", &dn, err)),
        };
        match entries.len() {
            0 => Ok(None),
            1 => Ok(entries.pop()),
            count => {
                tracing::error!(dn = %dn, count, "Directory returned several entries for one DN");
                Err(AgentError::InvariantViolation { dn, count })
            }
        }
    }

    /// Fail with [`AgentError::NotFound`] unless `dn` exists.
    pub(crate) fn ensure_exists(&mut self, dn: &str) -> AgentResult<()> {
        match self.lookup_one(SearchRequest::base(dn).dn_only())? {
            Some(_) => Ok(()),
            None => Err(AgentError::NotFound { dn: dn.to_string() }),
        }
    }
}

impl<C> std::fmt::Debug for RoleAgent<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleAgent")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}
