//! Directory operation types
//!
//! Search requests and scopes, returned entries, modifications and filters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Search scope relative to the base DN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// The base entry only.
    Base,
    /// Immediate children of the base, excluding the base itself.
    OneLevel,
    /// The base entry and all of its descendants.
    Subtree,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Base => write!(f, "base"),
            Scope::OneLevel => write!(f, "onelevel"),
            Scope::Subtree => write!(f, "subtree"),
        }
    }
}

/// Which attributes a search should return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    /// All user attributes.
    #[default]
    All,
    /// Only the named attributes.
    Only(Vec<String>),
    /// No attributes at all, only DNs.
    NoAttributes,
}

/// A search against the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base: String,
    pub scope: Scope,
    pub filter: Option<Filter>,
    pub attributes: Projection,
}

impl SearchRequest {
    /// Create a search with no filter returning all attributes.
    pub fn new(base: impl Into<String>, scope: Scope) -> Self {
        Self {
            base: base.into(),
            scope,
            filter: None,
            attributes: Projection::All,
        }
    }

    /// Base-scope lookup of a single entry.
    pub fn base(dn: impl Into<String>) -> Self {
        Self::new(dn, Scope::Base)
    }

    /// Immediate children of `dn`.
    pub fn one_level(dn: impl Into<String>) -> Self {
        Self::new(dn, Scope::OneLevel)
    }

    /// `dn` and everything below it.
    pub fn subtree(dn: impl Into<String>) -> Self {
        Self::new(dn, Scope::Subtree)
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Restrict the returned attributes.
    pub fn with_attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = Projection::Only(names.into_iter().map(Into::into).collect());
        self
    }

    /// Return DNs only.
    pub fn dn_only(mut self) -> Self {
        self.attributes = Projection::NoAttributes;
        self
    }

    /// The filter rendered as RFC 4515 text; `(objectClass=*)` when unset.
    pub fn filter_string(&self) -> String {
        self.filter
            .as_ref()
            .map(Filter::to_ldap_string)
            .unwrap_or_else(|| "(objectClass=*)".to_string())
    }
}

/// An entry returned from a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub dn: String,
    pub attrs: BTreeMap<String, Vec<String>>,
}

impl Entry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attrs: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.attrs.insert(name.into(), values);
        self
    }

    /// All values of an attribute. Attribute names compare case-insensitively.
    pub fn values(&self, name: &str) -> &[String] {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    /// The first value of an attribute.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        !self.values(name).is_empty()
    }
}

/// One change inside a modify request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Modification {
    /// Add values to an attribute.
    Add { attribute: String, values: Vec<String> },
    /// Delete the listed values; an empty list deletes the whole attribute.
    Delete { attribute: String, values: Vec<String> },
    /// Replace all values of an attribute.
    Replace { attribute: String, values: Vec<String> },
}

impl Modification {
    pub fn add(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Modification::Add {
            attribute: attribute.into(),
            values: vec![value.into()],
        }
    }

    pub fn delete(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Modification::Delete {
            attribute: attribute.into(),
            values: vec![value.into()],
        }
    }

    pub fn replace(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Modification::Replace {
            attribute: attribute.into(),
            values: vec![value.into()],
        }
    }

    pub fn attribute(&self) -> &str {
        match self {
            Modification::Add { attribute, .. }
            | Modification::Delete { attribute, .. }
            | Modification::Replace { attribute, .. } => attribute,
        }
    }

    pub fn values(&self) -> &[String] {
        match self {
            Modification::Add { values, .. }
            | Modification::Delete { values, .. }
            | Modification::Replace { values, .. } => values,
        }
    }
}

/// Filter for search operations.
///
/// Rendered to RFC 4515 text by [`Filter::to_ldap_string`], which escapes
/// every assertion value. Build filters from caller input with this type
/// rather than by formatting strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    /// Match entries where attribute equals value.
    Equals { attribute: String, value: String },

    /// Match entries where attribute contains value (substring).
    Contains { attribute: String, value: String },

    /// Match entries where attribute exists (has any value).
    Present { attribute: String },

    /// Logical AND of multiple filters.
    And { filters: Vec<Filter> },

    /// Logical OR of multiple filters.
    Or { filters: Vec<Filter> },

    /// Logical NOT of a filter.
    Not { filter: Box<Filter> },
}

impl Filter {
    /// Create an equals filter.
    pub fn eq(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create a contains filter.
    pub fn contains(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Contains {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create a present (attribute exists) filter.
    pub fn present(attribute: impl Into<String>) -> Self {
        Filter::Present {
            attribute: attribute.into(),
        }
    }

    /// Create an AND filter.
    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And { filters }
    }

    /// Create an OR filter.
    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or { filters }
    }

    /// Create a NOT filter (negation).
    pub fn negate(filter: Filter) -> Self {
        Filter::Not {
            filter: Box::new(filter),
        }
    }

    /// Combine this filter with another using AND.
    pub fn and_with(self, other: Filter) -> Self {
        match self {
            Filter::And { mut filters } => {
                filters.push(other);
                Filter::And { filters }
            }
            _ => Filter::And {
                filters: vec![self, other],
            },
        }
    }

    /// Render as an RFC 4515 filter string.
    pub fn to_ldap_string(&self) -> String {
        match self {
            Filter::And { filters } => {
                let inner: Vec<String> = filters.iter().map(Self::to_ldap_string).collect();
                format!("(&{})", inner.join(""))
            }
            Filter::Or { filters } => {
                let inner: Vec<String> = filters.iter().map(Self::to_ldap_string).collect();
                format!("(|{})", inner.join(""))
            }
            Filter::Not { filter } => format!("(!{})", filter.to_ldap_string()),
            Filter::Equals { attribute, value } => {
                format!("({}={})", attribute, escape_filter_value(value))
            }
            Filter::Contains { attribute, value } => {
                format!("({}=*{}*)", attribute, escape_filter_value(value))
            }
            Filter::Present { attribute } => format!("({}=*)", attribute),
        }
    }

    /// Evaluate the filter against an entry.
    ///
    /// Values compare case-insensitively, matching the caseIgnore and DN
    /// matching rules of the attributes this workspace queries.
    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            Filter::And { filters } => filters.iter().all(|f| f.matches(entry)),
            Filter::Or { filters } => filters.iter().any(|f| f.matches(entry)),
            Filter::Not { filter } => !filter.matches(entry),
            Filter::Equals { attribute, value } => {
                if attribute.eq_ignore_ascii_case("dn") {
                    return entry.dn.eq_ignore_ascii_case(value);
                }
                entry
                    .values(attribute)
                    .iter()
                    .any(|v| v.to_lowercase() == value.to_lowercase())
            }
            Filter::Contains { attribute, value } => {
                let needle = value.to_lowercase();
                entry
                    .values(attribute)
                    .iter()
                    .any(|v| v.to_lowercase().contains(&needle))
            }
            Filter::Present { attribute } => entry.has_attribute(attribute),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_ldap_string())
    }
}

/// Escape special characters in LDAP filter values (RFC 4515).
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}

/// The parent DN: everything after the first unescaped `,`.
///
/// Returns `None` for a single-component DN.
pub fn parent_dn(dn: &str) -> Option<&str> {
    let mut escaped = false;
    for (idx, ch) in dn.char_indices() {
        match ch {
            '\\' if !escaped => escaped = true,
            ',' if !escaped => return Some(&dn[idx + 1..]),
            _ => escaped = false,
        }
    }
    None
}
