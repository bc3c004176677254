//! # LDAP Directory
//!
//! Blocking LDAP v3 implementation of
//! [`DirectoryClient`](ldapadmin_directory::DirectoryClient), with plain,
//! LDAPS and STARTTLS transports.
//!
//! ## Example
//!
//! ```ignore
//! use ldapadmin_directory::prelude::*;
//! use ldapadmin_ldap::LdapDirectory;
//!
//! let config = DirectoryConfig::new("ldap.example.com").with_starttls();
//! let mut dir = LdapDirectory::connect(&config)?;
//! dir.bind(&config.bind_dn, "secret")?;
//! ```

pub mod connector;

pub use connector::LdapDirectory;
