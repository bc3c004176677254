//! # Directory Boundary
//!
//! Everything the roles agent needs to talk to an LDAP-compatible directory
//! without knowing which one it is.
//!
//! - [`DirectoryClient`] - synchronous bind/search/add/delete/modify session
//! - [`DirectoryError`] - closed error taxonomy keyed by LDAP result code
//! - [`DirectoryConfig`] - server, credentials and DN suffixes
//! - [`MemoryDirectory`] - in-memory client for tests and offline fixtures
//!
//! ## Example
//!
//! ```
//! use ldapadmin_directory::prelude::*;
//!
//! let mut dir = MemoryDirectory::new().with_entry(Entry::new("ou=Roles,o=Test"));
//! let found = dir
//!     .search(&SearchRequest::base("ou=Roles,o=Test").dn_only())
//!     .unwrap();
//! assert_eq!(found.len(), 1);
//! ```
//!
//! ## Crate Organization
//!
//! - [`error`] - Error types with transient/permanent classification
//! - [`traits`] - The client trait
//! - [`operation`] - Search requests, entries, modifications and filters
//! - [`config`] - Configuration loading and validation
//! - [`memory`] - In-memory backend

pub mod config;
pub mod error;
pub mod memory;
pub mod operation;
pub mod traits;

pub use config::{ConnectionSettings, DirectoryConfig};
pub use error::{result_code, DirectoryError, DirectoryResult};
pub use memory::{Call, CallKind, MemoryDirectory};
pub use operation::{
    escape_filter_value, parent_dn, Entry, Filter, Modification, Projection, Scope, SearchRequest,
};
pub use traits::DirectoryClient;

/// Prelude module for convenient imports.
///
/// ```
/// use ldapadmin_directory::prelude::*;
/// ```
pub mod prelude {
    // Error handling
    pub use crate::error::{DirectoryError, DirectoryResult};

    // Traits
    pub use crate::traits::DirectoryClient;

    // Operations
    pub use crate::operation::{Entry, Filter, Modification, Projection, Scope, SearchRequest};

    // Configuration
    pub use crate::config::{ConnectionSettings, DirectoryConfig};

    // Backends
    pub use crate::memory::MemoryDirectory;
}
