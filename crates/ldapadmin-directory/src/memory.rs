//! In-memory directory
//!
//! A [`DirectoryClient`] holding entries in a map. It enforces the parts of
//! LDAP behaviour the roles agent depends on (scopes, parent/leaf rules,
//! value-level add/delete errors and the non-empty `uniqueMember` rule of
//! `groupOfUniqueNames`), records every call, and can fail chosen calls on
//! demand. Fixtures load from and dump to JSON.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{DirectoryError, DirectoryResult};
use crate::operation::{parent_dn, Entry, Modification, Projection, Scope, SearchRequest};
use crate::traits::DirectoryClient;

const GROUP_CLASS: &str = "groupOfUniqueNames";
const MEMBER_ATTR: &str = "uniqueMember";

/// Kind of a recorded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Bind,
    Search,
    Add,
    Delete,
    Modify,
}

/// A call made against the directory, in the order it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Bind {
        dn: String,
    },
    Search {
        base: String,
        scope: Scope,
        filter: Option<String>,
        attributes: Projection,
    },
    Add {
        dn: String,
        attributes: Vec<(String, Vec<String>)>,
    },
    Delete {
        dn: String,
    },
    Modify {
        dn: String,
        modifications: Vec<Modification>,
    },
}

impl Call {
    pub fn kind(&self) -> CallKind {
        match self {
            Call::Bind { .. } => CallKind::Bind,
            Call::Search { .. } => CallKind::Search,
            Call::Add { .. } => CallKind::Add,
            Call::Delete { .. } => CallKind::Delete,
            Call::Modify { .. } => CallKind::Modify,
        }
    }

    /// The DN the call targeted (the base DN for searches).
    pub fn dn(&self) -> &str {
        match self {
            Call::Bind { dn }
            | Call::Add { dn, .. }
            | Call::Delete { dn }
            | Call::Modify { dn, .. } => dn,
            Call::Search { base, .. } => base,
        }
    }
}

type CallMatcher = Box<dyn Fn(&Call) -> bool + Send>;

struct Fault {
    matcher: CallMatcher,
    error: DirectoryError,
}

/// In-memory [`DirectoryClient`].
#[derive(Default)]
pub struct MemoryDirectory {
    entries: BTreeMap<String, Entry>,
    credentials: Option<(String, String)>,
    bound: bool,
    calls: Vec<Call>,
    faults: Vec<Fault>,
}

impl std::fmt::Debug for MemoryDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDirectory")
            .field("entries", &self.entries.len())
            .field("bound", &self.bound)
            .field("calls", &self.calls.len())
            .field("pending_faults", &self.faults.len())
            .finish()
    }
}

fn key(dn: &str) -> String {
    dn.to_lowercase()
}

fn same_value(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept binds with these credentials.
    pub fn with_credentials(mut self, dn: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((dn.into(), password.into()));
        self
    }

    /// Seed an entry, bypassing parent and schema checks.
    pub fn with_entry(mut self, entry: Entry) -> Self {
        self.insert(entry);
        self
    }

    /// Seed an entry, bypassing parent and schema checks.
    pub fn insert(&mut self, entry: Entry) {
        self.entries.insert(key(&entry.dn), entry);
    }

    /// Load entries from a JSON object mapping DN to `{attribute: [values]}`.
    pub fn from_json(json: &str) -> DirectoryResult<Self> {
        let data: BTreeMap<String, BTreeMap<String, Vec<String>>> = serde_json::from_str(json)
            .map_err(|e| DirectoryError::invalid_configuration(format!("invalid fixture: {e}")))?;

        let mut directory = Self::new();
        for (dn, attrs) in data {
            directory.insert(Entry { dn, attrs });
        }
        Ok(directory)
    }

    /// Dump all entries in the [`from_json`](Self::from_json) format.
    pub fn to_json(&self) -> String {
        let data: BTreeMap<&str, &BTreeMap<String, Vec<String>>> = self
            .entries
            .values()
            .map(|entry| (entry.dn.as_str(), &entry.attrs))
            .collect();
        serde_json::to_string_pretty(&data).unwrap_or_default()
    }

    pub fn entry(&self, dn: &str) -> Option<&Entry> {
        self.entries.get(&key(dn))
    }

    pub fn contains(&self, dn: &str) -> bool {
        self.entries.contains_key(&key(dn))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every call received so far.
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Calls of one kind, in order.
    pub fn calls_of(&self, kind: CallKind) -> Vec<&Call> {
        self.calls.iter().filter(|c| c.kind() == kind).collect()
    }

    /// Drain the call log.
    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    /// Fail the next call of `kind` targeting `dn` with `error`.
    pub fn fail_next(&mut self, kind: CallKind, dn: impl Into<String>, error: DirectoryError) {
        let dn = dn.into();
        self.fail_next_matching(move |call| call.kind() == kind && same_value(call.dn(), &dn), error);
    }

    /// Fail the next call accepted by `matcher` with `error`.
    ///
    /// Faults fire once, in the order they were registered. The failing call
    /// is still recorded and has no effect on the stored entries.
    pub fn fail_next_matching(
        &mut self,
        matcher: impl Fn(&Call) -> bool + Send + 'static,
        error: DirectoryError,
    ) {
        self.faults.push(Fault {
            matcher: Box::new(matcher),
            error,
        });
    }

    fn record(&mut self, call: Call) -> DirectoryResult<()> {
        let fault = self.faults.iter().position(|fault| (fault.matcher)(&call));
        debug!(kind = ?call.kind(), dn = %call.dn(), injected = fault.is_some(), "memory directory call");
        self.calls.push(call);
        match fault {
            Some(idx) => Err(self.faults.remove(idx).error),
            None => Ok(()),
        }
    }

    fn has_children(&self, dn: &str) -> bool {
        let dn = key(dn);
        self.entries
            .keys()
            .any(|candidate| parent_dn(candidate).is_some_and(|parent| parent == dn))
    }

    fn in_scope(base: &str, scope: Scope, candidate: &str) -> bool {
        match scope {
            Scope::Base => candidate == base,
            Scope::OneLevel => parent_dn(candidate).is_some_and(|parent| parent == base),
            Scope::Subtree => {
                candidate == base || candidate.ends_with(&format!(",{base}"))
            }
        }
    }

    fn project(entry: &Entry, projection: &Projection) -> Entry {
        match projection {
            Projection::All => entry.clone(),
            Projection::NoAttributes => Entry::new(entry.dn.clone()),
            Projection::Only(names) => Entry {
                dn: entry.dn.clone(),
                attrs: entry
                    .attrs
                    .iter()
                    .filter(|(attr, _)| names.iter().any(|n| n.eq_ignore_ascii_case(attr)))
                    .map(|(attr, values)| (attr.clone(), values.clone()))
                    .collect(),
            },
        }
    }

    fn check_schema(entry: &Entry) -> DirectoryResult<()> {
        let is_group = entry
            .values("objectClass")
            .iter()
            .any(|class| class.eq_ignore_ascii_case(GROUP_CLASS));
        let has_members = !entry.values(MEMBER_ATTR).is_empty();
        if is_group && !has_members {
            return Err(DirectoryError::ObjectClassViolation {
                dn: entry.dn.clone(),
                message: format!("object class '{GROUP_CLASS}' requires attribute '{MEMBER_ATTR}'"),
            });
        }
        if !is_group && has_members {
            return Err(DirectoryError::ObjectClassViolation {
                dn: entry.dn.clone(),
                message: format!("attribute '{MEMBER_ATTR}' not allowed"),
            });
        }
        Ok(())
    }

    fn apply(entry: &mut Entry, modification: &Modification) -> DirectoryResult<()> {
        let attr_key = entry
            .attrs
            .keys()
            .find(|k| k.eq_ignore_ascii_case(modification.attribute()))
            .cloned();

        match modification {
            Modification::Add { attribute, values } => {
                let name = attr_key.unwrap_or_else(|| attribute.clone());
                let current = entry.attrs.entry(name).or_default();
                for value in values {
                    if current.iter().any(|v| same_value(v, value)) {
                        return Err(DirectoryError::TypeOrValueExists {
                            dn: entry.dn.clone(),
                            message: format!("{attribute}: value #{value:?} already exists"),
                        });
                    }
                    current.push(value.clone());
                }
            }
            Modification::Delete { attribute, values } => {
                let Some(name) = attr_key else {
                    return Err(DirectoryError::NoSuchAttribute {
                        dn: entry.dn.clone(),
                        message: format!("{attribute}: no such attribute"),
                    });
                };
                if values.is_empty() {
                    entry.attrs.remove(&name);
                    return Ok(());
                }
                let current = entry.attrs.entry(name.clone()).or_default();
                for value in values {
                    match current.iter().position(|v| same_value(v, value)) {
                        Some(idx) => {
                            current.remove(idx);
                        }
                        None => {
                            return Err(DirectoryError::NoSuchAttribute {
                                dn: entry.dn.clone(),
                                message: format!("{attribute}: no such value #{value:?}"),
                            })
                        }
                    }
                }
                if current.is_empty() {
                    entry.attrs.remove(&name);
                }
            }
            Modification::Replace { attribute, values } => {
                let name = attr_key.unwrap_or_else(|| attribute.clone());
                if values.is_empty() {
                    entry.attrs.remove(&name);
                } else {
                    entry.attrs.insert(name, values.clone());
                }
            }
        }
        Ok(())
    }
}

impl DirectoryClient for MemoryDirectory {
    fn bind(&mut self, dn: &str, password: &str) -> DirectoryResult<()> {
        self.record(Call::Bind { dn: dn.to_string() })?;
        if let Some((expected_dn, expected_password)) = &self.credentials {
            if !same_value(expected_dn, dn) || expected_password != password {
                self.bound = false;
                return Err(DirectoryError::InvalidCredentials);
            }
        }
        self.bound = true;
        Ok(())
    }

    fn is_bound(&self) -> bool {
        self.bound
    }

    fn search(&mut self, request: &SearchRequest) -> DirectoryResult<Vec<Entry>> {
        self.record(Call::Search {
            base: request.base.clone(),
            scope: request.scope,
            filter: request.filter.as_ref().map(|f| f.to_ldap_string()),
            attributes: request.attributes.clone(),
        })?;

        let base = key(&request.base);
        if !self.entries.contains_key(&base) {
            return Err(DirectoryError::NoSuchObject {
                dn: request.base.clone(),
            });
        }

        Ok(self
            .entries
            .iter()
            .filter(|(candidate, _)| Self::in_scope(&base, request.scope, candidate))
            .filter(|(_, entry)| request.filter.as_ref().map_or(true, |f| f.matches(entry)))
            .map(|(_, entry)| Self::project(entry, &request.attributes))
            .collect())
    }

    fn add(&mut self, dn: &str, attributes: &[(String, Vec<String>)]) -> DirectoryResult<()> {
        self.record(Call::Add {
            dn: dn.to_string(),
            attributes: attributes.to_vec(),
        })?;

        if self.contains(dn) {
            return Err(DirectoryError::AlreadyExists { dn: dn.to_string() });
        }
        if let Some(parent) = parent_dn(dn) {
            if !self.contains(parent) {
                return Err(DirectoryError::NoSuchObject {
                    dn: parent.to_string(),
                });
            }
        }

        let entry = Entry {
            dn: dn.to_string(),
            attrs: attributes.iter().cloned().collect(),
        };
        Self::check_schema(&entry)?;
        self.insert(entry);
        Ok(())
    }

    fn delete(&mut self, dn: &str) -> DirectoryResult<()> {
        self.record(Call::Delete { dn: dn.to_string() })?;

        if !self.contains(dn) {
            return Err(DirectoryError::NoSuchObject { dn: dn.to_string() });
        }
        if self.has_children(dn) {
            return Err(DirectoryError::NotAllowedOnNonLeaf { dn: dn.to_string() });
        }
        self.entries.remove(&key(dn));
        Ok(())
    }

    fn modify(&mut self, dn: &str, modifications: &[Modification]) -> DirectoryResult<()> {
        self.record(Call::Modify {
            dn: dn.to_string(),
            modifications: modifications.to_vec(),
        })?;

        let Some(current) = self.entry(dn) else {
            return Err(DirectoryError::NoSuchObject { dn: dn.to_string() });
        };

        // Work on a copy so a failing modification leaves the entry untouched.
        let mut updated = current.clone();
        for modification in modifications {
            Self::apply(&mut updated, modification)?;
        }
        Self::check_schema(&updated)?;
        self.insert(updated);
        Ok(())
    }
}
