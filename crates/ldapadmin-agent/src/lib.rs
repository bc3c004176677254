//! # Roles Agent
//!
//! Administration of a delegated role tree kept in an LDAP directory.
//!
//! Roles are `groupOfUniqueNames` entries nested under a roles suffix, one
//! level per id segment. Membership is transitive: a member of `K-N-O` is
//! also listed on `K-N`, `K` and the root entry. The agent keeps that true
//! while other writers change the same entries, using the directory as the
//! only point of coordination.
//!
//! ## Example
//!
//! ```ignore
//! use ldapadmin_agent::prelude::*;
//! use ldapadmin_ldap::LdapDirectory;
//!
//! let config = DirectoryConfig::from_file("ldapadmin.yaml")?;
//! let mut agent = RoleAgent::new(LdapDirectory::connect(&config)?, &config)?;
//! agent.perform_bind(&config.bind_dn, "secret")?;
//!
//! let role = RoleId::parse("eionet-nfp")?;
//! let change = agent.add_to_role(&role, &MemberRef::user("anne"))?;
//! println!("updated {} roles", change.roles.len());
//! ```
//!
//! ## Crate Organization
//!
//! - [`codec`] - Role ids, member references and their DNs
//! - [`error`] - Agent error taxonomy
//! - [`agent`] - The agent and its session
//! - [`roles`] - Role tree operations
//! - [`membership`] - Membership propagation
//! - [`records`] - Organisation and user records

pub mod agent;
pub mod codec;
pub mod error;
pub mod membership;
pub mod records;
pub mod roles;

pub use agent::RoleAgent;
pub use codec::{DnCodec, MemberKind, MemberRef, RoleId};
pub use error::{AgentError, AgentResult};
pub use membership::{MembershipChange, PlaceholderStep, Tolerated, ToleratedRace, WalkOrder};
pub use records::{FieldMap, OrganisationRecord, UserRecord, ORG_FIELDS, USER_FIELDS};
pub use roles::{RoleInfo, RoleMembers, RolePattern};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::agent::RoleAgent;
    pub use crate::codec::{MemberKind, MemberRef, RoleId};
    pub use crate::error::{AgentError, AgentResult};
    pub use crate::membership::{MembershipChange, WalkOrder};
    pub use crate::records::{FieldMap, OrganisationRecord, UserRecord};
    pub use crate::roles::{RoleInfo, RoleMembers};

    pub use ldapadmin_directory::{DirectoryClient, DirectoryConfig};
}
