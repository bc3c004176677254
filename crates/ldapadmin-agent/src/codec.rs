//! Identifier codec
//!
//! Role ids, member references, and the DN encodings of each.
//!
//! A role id such as `eionet-nfp-mc` lives at the nested DN
//! `cn=eionet-nfp-mc,cn=eionet-nfp,cn=eionet,<roles_dn>`: every prefix of the
//! id is one level of the tree. Decoding checks that nesting strictly, so an
//! entry that merely looks like a role never gets mistaken for one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use ldapadmin_directory::DirectoryConfig;

use crate::error::{AgentError, AgentResult};

/// Separator between role id segments.
pub const SEGMENT_SEPARATOR: char = '-';

/// Hierarchical role identifier.
///
/// An immutable list of segments; the empty list is the root of the tree.
/// All navigation is pure: nothing here touches the directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleId {
    segments: Vec<String>,
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

impl RoleId {
    /// The root of the role tree.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dashed id. The empty string is the root.
    pub fn parse(id: &str) -> AgentResult<Self> {
        if id.is_empty() {
            return Ok(Self::root());
        }
        let segments: Vec<String> = id.split(SEGMENT_SEPARATOR).map(str::to_string).collect();
        if let Some(bad) = segments.iter().find(|s| !valid_segment(s)) {
            return Err(AgentError::invalid_id(
                id,
                format!("segment {bad:?} must be non-empty letters, digits or '_'"),
            ));
        }
        Ok(Self { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Number of segments; 0 for the root.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The enclosing role. `None` for the root.
    pub fn parent(&self) -> Option<RoleId> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// This role and every ancestor below the root, nearest first.
    pub fn ancestors(&self) -> Vec<RoleId> {
        (1..=self.depth())
            .rev()
            .map(|len| Self {
                segments: self.segments[..len].to_vec(),
            })
            .collect()
    }

    /// Root-first path down to this role, root and self included.
    pub fn lineage(&self) -> Vec<RoleId> {
        (0..=self.depth())
            .map(|len| Self {
                segments: self.segments[..len].to_vec(),
            })
            .collect()
    }

    /// A direct sub-role.
    pub fn child(&self, segment: &str) -> AgentResult<RoleId> {
        if !valid_segment(segment) {
            return Err(AgentError::invalid_id(
                segment,
                "segment must be non-empty letters, digits or '_'",
            ));
        }
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    /// Whether this role is `other` or lies below it, compared on whole
    /// segments (`A-BC` is not within `A-B`).
    pub fn is_within(&self, other: &RoleId) -> bool {
        self.segments.starts_with(&other.segments)
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("-"))
    }
}

impl FromStr for RoleId {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoleId {
    type Error = AgentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoleId> for String {
    fn from(role: RoleId) -> Self {
        role.to_string()
    }
}

/// What kind of entry a member is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    User,
    #[serde(rename = "org")]
    Organisation,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKind::User => write!(f, "user"),
            MemberKind::Organisation => write!(f, "org"),
        }
    }
}

/// A user or organisation that can be placed in a role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberRef {
    pub kind: MemberKind,
    pub id: String,
}

impl MemberRef {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            kind: MemberKind::User,
            id: id.into(),
        }
    }

    pub fn org(id: impl Into<String>) -> Self {
        Self {
            kind: MemberKind::Organisation,
            id: id.into(),
        }
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Strip `,suffix` from the end of `dn`. Only the exact spelling of the
/// suffix matches, so every accepted DN encodes back to itself.
fn strip_suffix<'a>(dn: &'a str, suffix: &str) -> Option<&'a str> {
    dn.strip_suffix(suffix)?.strip_suffix(',')
}

/// Value of an `attr=value` component, with `attr` spelled exactly.
fn strip_attr<'a>(rdn: &'a str, attr: &str) -> Option<&'a str> {
    rdn.strip_prefix(attr)?.strip_prefix('=')
}

/// Converts between ids and DNs under the configured suffixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnCodec {
    roles_dn: String,
    users_dn: String,
    orgs_dn: String,
}

impl DnCodec {
    pub fn new(
        roles_dn: impl Into<String>,
        users_dn: impl Into<String>,
        orgs_dn: impl Into<String>,
    ) -> Self {
        Self {
            roles_dn: roles_dn.into(),
            users_dn: users_dn.into(),
            orgs_dn: orgs_dn.into(),
        }
    }

    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self::new(&config.roles_dn, &config.users_dn, &config.orgs_dn)
    }

    pub fn roles_dn(&self) -> &str {
        &self.roles_dn
    }

    pub fn users_dn(&self) -> &str {
        &self.users_dn
    }

    pub fn orgs_dn(&self) -> &str {
        &self.orgs_dn
    }

    /// DN of a role: one `cn=` per prefix, longest first.
    pub fn role_dn(&self, role: &RoleId) -> String {
        let mut dn = String::new();
        for len in (1..=role.depth()).rev() {
            dn.push_str("cn=");
            dn.push_str(&role.segments[..len].join("-"));
            dn.push(',');
        }
        dn.push_str(&self.roles_dn);
        dn
    }

    /// Decode a role DN, rejecting any chain that does not nest exactly.
    pub fn role_id(&self, dn: &str) -> AgentResult<RoleId> {
        if dn == self.roles_dn {
            return Ok(RoleId::root());
        }
        let path = strip_suffix(dn, &self.roles_dn)
            .ok_or_else(|| AgentError::malformed(dn, "not under the roles suffix"))?;

        let mut current: Option<String> = None;
        for rdn in path.split(',').rev() {
            let name = strip_attr(rdn, "cn")
                .ok_or_else(|| AgentError::malformed(dn, format!("{rdn:?} is not a cn component")))?;

            let added = match &current {
                None => name,
                Some(prefix) => name
                    .strip_prefix(prefix.as_str())
                    .and_then(|rest| rest.strip_prefix(SEGMENT_SEPARATOR))
                    .ok_or_else(|| {
                        AgentError::malformed(dn, format!("{name:?} does not extend {prefix:?}"))
                    })?,
            };
            if !valid_segment(added) {
                return Err(AgentError::malformed(
                    dn,
                    format!("{name:?} adds an invalid segment {added:?}"),
                ));
            }
            current = Some(name.to_string());
        }

        let id = current.ok_or_else(|| AgentError::malformed(dn, "empty role path"))?;
        RoleId::parse(&id).map_err(|_| AgentError::malformed(dn, "invalid role id"))
    }

    fn leaf_dn(attr: &str, id: &str, suffix: &str) -> AgentResult<String> {
        if id.is_empty() {
            return Err(AgentError::invalid_id(id, "identifier is empty"));
        }
        if id.contains(',') {
            return Err(AgentError::invalid_id(id, "identifier contains ','"));
        }
        Ok(format!("{attr}={id},{suffix}"))
    }

    fn leaf_id(attr: &str, dn: &str, suffix: &str) -> AgentResult<String> {
        let rdn = strip_suffix(dn, suffix)
            .ok_or_else(|| AgentError::malformed(dn, format!("not under {suffix}")))?;
        let id = strip_attr(rdn, attr)
            .ok_or_else(|| AgentError::malformed(dn, format!("expected {attr}= component")))?;
        if id.is_empty() || id.contains(',') {
            return Err(AgentError::malformed(dn, "not a direct child of the suffix"));
        }
        Ok(id.to_string())
    }

    pub fn user_dn(&self, id: &str) -> AgentResult<String> {
        Self::leaf_dn("uid", id, &self.users_dn)
    }

    pub fn user_id(&self, dn: &str) -> AgentResult<String> {
        Self::leaf_id("uid", dn, &self.users_dn)
    }

    pub fn org_dn(&self, id: &str) -> AgentResult<String> {
        Self::leaf_dn("cn", id, &self.orgs_dn)
    }

    pub fn org_id(&self, dn: &str) -> AgentResult<String> {
        Self::leaf_id("cn", dn, &self.orgs_dn)
    }

    pub fn member_dn(&self, member: &MemberRef) -> AgentResult<String> {
        match member.kind {
            MemberKind::User => self.user_dn(&member.id),
            MemberKind::Organisation => self.org_dn(&member.id),
        }
    }

    /// Decode a `uniqueMember` value. `None` for the placeholder and for
    /// anything that is neither a user nor an organisation.
    pub fn member_ref(&self, dn: &str) -> Option<MemberRef> {
        if dn.is_empty() {
            return None;
        }
        if let Ok(id) = self.user_id(dn) {
            return Some(MemberRef::user(id));
        }
        self.org_id(dn).ok().map(MemberRef::org)
    }
}
