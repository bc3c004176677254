//! Directory client trait
//!
//! The boundary between the roles agent and whatever speaks to the directory.

use crate::error::DirectoryResult;
use crate::operation::{Entry, Modification, SearchRequest};

/// A synchronous session against an LDAP-compatible directory.
///
/// Every call is one blocking request/response round trip. Implementations
/// own the live connection and track whether it has been bound; they never
/// cache entries between calls.
pub trait DirectoryClient {
    /// Authenticate the session.
    ///
    /// On success the session is bound until it is closed. A failed bind
    /// leaves it unbound and returns
    /// [`DirectoryError::InvalidCredentials`](crate::DirectoryError::InvalidCredentials)
    /// for rejected credentials.
    fn bind(&mut self, dn: &str, password: &str) -> DirectoryResult<()>;

    /// Whether a bind has succeeded on this session.
    fn is_bound(&self) -> bool;

    /// Run a search.
    ///
    /// A missing base entry is reported as
    /// [`DirectoryError::NoSuchObject`](crate::DirectoryError::NoSuchObject).
    fn search(&mut self, request: &SearchRequest) -> DirectoryResult<Vec<Entry>>;

    /// Add an entry. Attribute order is preserved on the wire.
    fn add(&mut self, dn: &str, attributes: &[(String, Vec<String>)]) -> DirectoryResult<()>;

    /// Delete a leaf entry.
    fn delete(&mut self, dn: &str) -> DirectoryResult<()>;

    /// Apply all modifications to one entry atomically.
    fn modify(&mut self, dn: &str, modifications: &[Modification]) -> DirectoryResult<()>;
}

impl<T: DirectoryClient + ?Sized> DirectoryClient for Box<T> {
    fn bind(&mut self, dn: &str, password: &str) -> DirectoryResult<()> {
        (**self).bind(dn, password)
    }

    fn is_bound(&self) -> bool {
        (**self).is_bound()
    }

    fn search(&mut self, request: &SearchRequest) -> DirectoryResult<Vec<Entry>> {
        (**self).search(request)
    }

    fn add(&mut self, dn: &str, attributes: &[(String, Vec<String>)]) -> DirectoryResult<()> {
        (**self).add(dn, attributes)
    }

    fn delete(&mut self, dn: &str) -> DirectoryResult<()> {
        (**self).delete(dn)
    }

    fn modify(&mut self, dn: &str, modifications: &[Modification]) -> DirectoryResult<()> {
        (**self).modify(dn, modifications)
    }
}
