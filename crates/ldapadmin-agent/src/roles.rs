//! Role tree manager
//!
//! Creating, deleting, listing and filtering role entries, and computing
//! the direct members of a role.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use ldapadmin_directory::{DirectoryClient, DirectoryError, SearchRequest};

use crate::agent::{role_filter, RoleAgent, MEMBER_ATTRIBUTE, PLACEHOLDER_MEMBER, ROLE_OBJECT_CLASS};
use crate::codec::{MemberKind, MemberRef, RoleId};
use crate::error::{AgentError, AgentResult};

/// Segments given to `create_child_role`.
static CHILD_SEGMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]+$").expect("CHILD_SEGMENT_REGEX is a valid regex pattern"));

/// Description and location of one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleInfo {
    pub id: RoleId,
    pub dn: String,
    pub description: String,
}

/// Direct members of a role, each list sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleMembers {
    pub users: Vec<String>,
    pub orgs: Vec<String>,
}

impl RoleMembers {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.orgs.is_empty()
    }
}

/// A compiled `filter_roles` pattern.
///
/// Tokens are separated by `-`; `*` stands for exactly one segment. A role
/// matches when its leading segments match every token, so `A` matches
/// `A`, `A-B` and `A-B-C`. Matching ignores case and works on whole
/// segments.
#[derive(Debug, Clone)]
pub struct RolePattern {
    regex: Regex,
}

impl RolePattern {
    /// Compile `pattern`. `None` when it can never match: the empty
    /// pattern, an empty token, or a token mixing `*` with anything else
    /// (which includes `**`).
    pub fn parse(pattern: &str) -> Option<Self> {
        if pattern.is_empty() {
            return None;
        }
        let mut parts = Vec::new();
        for token in pattern.split('-') {
            if token.is_empty() {
                return None;
            }
            if token == "*" {
                parts.push("[^-]+".to_string());
            } else if token.contains('*') {
                return None;
            } else {
                parts.push(regex::escape(token));
            }
        }
        let source = format!("(?i)^{}(?:-.*)?$", parts.join("-"));
        Regex::new(&source).ok().map(|regex| Self { regex })
    }

    pub fn matches(&self, role: &RoleId) -> bool {
        !role.is_root() && self.regex.is_match(&role.to_string())
    }
}

/// Sort role ids so every sub-role precedes its ancestors: deepest first,
/// then by descending id.
pub(crate) fn sort_deepest_first(roles: &mut [RoleId]) {
    roles.sort_by(|a, b| b.depth().cmp(&a.depth()).then_with(|| b.cmp(a)));
}

impl<C: DirectoryClient> RoleAgent<C> {
    /// Create a role under its existing parent.
    #[instrument(skip(self), fields(role = %role))]
    pub fn create_role(&mut self, role: &RoleId, description: &str) -> AgentResult<()> {
        self.require_bound("create_role")?;
        let Some(last) = role.last_segment() else {
            return Err(AgentError::invalid_id("", "the root role cannot be created"));
        };

        let mut attrs = vec![
            (
                "objectClass".to_string(),
                vec!["top".to_string(), ROLE_OBJECT_CLASS.to_string()],
            ),
            ("ou".to_string(), vec![last.to_string()]),
            (MEMBER_ATTRIBUTE.to_string(), vec![PLACEHOLDER_MEMBER.to_string()]),
        ];
        if !description.is_empty() {
            attrs.push(("description".to_string(), vec![description.to_string()]));
        }

        let dn = self.codec.role_dn(role);
        debug!(dn = %dn, "Adding role entry");

        match self.client.add(&dn, &attrs) {
            Ok(()) => {
                info!(dn = %dn, "Role created");
                Ok(())
            }
            // Backends disagree on which of these two a duplicate produces.
            Err(DirectoryError::NoSuchObject { .. }) => Err(AgentError::ParentMissing { dn }),
            Err(DirectoryError::AlreadyExists { .. }) => Err(AgentError::RoleAlreadyExists { dn }),
            Err(err) if err.is_transient() => Err(err.into()),
            Err(err) => {
                warn!(
                    dn = %dn,
                    code = ?err.result_code(),
                    error = %err,
                    "Role creation failed with a code not known to signal a conflict"
                );
                Err(AgentError::unexpected("create_role", &dn, err))
            }
        }
    }

    /// Create `parent-segment`. The new segment must be lowercase letters.
    #[instrument(skip(self), fields(parent = %parent))]
    pub fn create_child_role(
        &mut self,
        parent: &RoleId,
        segment: &str,
        description: &str,
    ) -> AgentResult<RoleId> {
        if !CHILD_SEGMENT_REGEX.is_match(segment) {
            return Err(AgentError::invalid_id(
                segment,
                "role names may only contain lowercase letters",
            ));
        }
        let role = parent.child(segment)?;
        self.create_role(&role, description)?;
        Ok(role)
    }

    /// DNs of `role` and every role below it, deepest first.
    #[instrument(skip(self), fields(role = %role))]
    pub fn list_sub_roles(&mut self, role: &RoleId) -> AgentResult<Vec<String>> {
        let mut roles = self.sub_role_ids(role)?;
        sort_deepest_first(&mut roles);
        Ok(roles.iter().map(|r| self.codec.role_dn(r)).collect())
    }

    fn sub_role_ids(&mut self, role: &RoleId) -> AgentResult<Vec<RoleId>> {
        let dn = self.codec.role_dn(role);
        let request = SearchRequest::subtree(&dn)
            .with_filter(role_filter())
            .dn_only();
        let entries = match self.client.search(&request) {
            Ok(entries) => entries,
            Err(DirectoryError::NoSuchObject { .. }) => return Err(AgentError::NotFound { dn }),
            Err(err) => return Err(AgentError::unexpected("list_sub_roles", &dn, err)),
        };
        entries
            .iter()
            .map(|entry| self.codec.role_id(&entry.dn))
            .collect()
    }

    /// Delete a role and everything below it, leaves first.
    ///
    /// Returns the deleted roles in deletion order.
    #[instrument(skip(self), fields(role = %role))]
    pub fn delete_role(&mut self, role: &RoleId) -> AgentResult<Vec<RoleId>> {
        self.require_bound("delete_role")?;
        if role.is_root() {
            return Err(AgentError::invalid_id("", "the root role cannot be deleted"));
        }

        let mut roles = self.sub_role_ids(role)?;
        if roles.is_empty() {
            return Err(AgentError::NotFound {
                dn: self.codec.role_dn(role),
            });
        }
        sort_deepest_first(&mut roles);

        for (done, sub_role) in roles.iter().enumerate() {
            let dn = self.codec.role_dn(sub_role);
            debug!(dn = %dn, "Deleting role entry");
            if let Err(err) = self.client.delete(&dn) {
                return Err(AgentError::unexpected("delete_role", &dn, err).after(&roles[..done]));
            }
        }

        info!(count = roles.len(), "Role deleted");
        Ok(roles)
    }

    /// Immediate sub-roles with their descriptions (empty when unset).
    #[instrument(skip(self), fields(role = %role))]
    pub fn role_names_in_role(&mut self, role: &RoleId) -> AgentResult<BTreeMap<RoleId, String>> {
        let dn = self.codec.role_dn(role);
        let request = SearchRequest::one_level(&dn)
            .with_filter(role_filter())
            .with_attributes(["description"]);
        let entries = match self.client.search(&request) {
            Ok(entries) => entries,
            Err(DirectoryError::NoSuchObject { .. }) => return Err(AgentError::NotFound { dn }),
            Err(err) => return Err(AgentError::unexpected("role_names_in_role", &dn, err)),
        };

        entries
            .iter()
            .map(|entry| -> AgentResult<(RoleId, String)> {
                let id = self.codec.role_id(&entry.dn)?;
                let description = entry.first("description").unwrap_or_default().to_string();
                Ok((id, description))
            })
            .collect()
    }

    /// Every non-root role matching `pattern`. See [`RolePattern`].
    #[instrument(skip(self))]
    pub fn filter_roles(&mut self, pattern: &str) -> AgentResult<BTreeSet<RoleId>> {
        let Some(pattern) = RolePattern::parse(pattern) else {
            debug!("Pattern can never match");
            return Ok(BTreeSet::new());
        };

        let roles = self.sub_role_ids(&RoleId::root())?;
        Ok(roles.into_iter().filter(|r| pattern.matches(r)).collect())
    }

    /// Members listed on the role itself and on none of its sub-roles.
    ///
    /// A root that is a plain container rather than a group has no members.
    #[instrument(skip(self), fields(role = %role))]
    pub fn members_in_role(&mut self, role: &RoleId) -> AgentResult<RoleMembers> {
        let dn = self.codec.role_dn(role);

        let own = self.lookup_one(
            SearchRequest::base(&dn)
                .with_filter(role_filter())
                .with_attributes([MEMBER_ATTRIBUTE]),
        )?;
        let own = match own {
            Some(entry) => entry,
            None if role.is_root() => {
                debug!("Root is not a group");
                return Ok(RoleMembers::default());
            }
            None => return Err(AgentError::NotFound { dn }),
        };

        let below = self
            .client
            .search(
                &SearchRequest::subtree(&dn)
                    .with_filter(role_filter())
                    .with_attributes([MEMBER_ATTRIBUTE]),
            )
            .map_err(|err| AgentError::unexpected("members_in_role", &dn, err))?;

        let in_sub_roles: BTreeSet<MemberRef> = below
            .iter()
            .filter(|entry| !entry.dn.eq_ignore_ascii_case(&own.dn))
            .flat_map(|entry| entry.values(MEMBER_ATTRIBUTE))
            .filter_map(|member| self.codec.member_ref(member))
            .collect();

        let direct: BTreeSet<MemberRef> = own
            .values(MEMBER_ATTRIBUTE)
            .iter()
            .filter_map(|member| self.codec.member_ref(member))
            .filter(|member| !in_sub_roles.contains(member))
            .collect();

        let mut members = RoleMembers::default();
        for member in direct {
            match member.kind {
                MemberKind::User => members.users.push(member.id),
                MemberKind::Organisation => members.orgs.push(member.id),
            }
        }
        Ok(members)
    }

    #[instrument(skip(self), fields(role = %role))]
    pub fn role_info(&mut self, role: &RoleId) -> AgentResult<RoleInfo> {
        let dn = self.codec.role_dn(role);
        let entry = self
            .lookup_one(SearchRequest::base(&dn))?
            .ok_or_else(|| AgentError::NotFound { dn: dn.clone() })?;

        Ok(RoleInfo {
            id: role.clone(),
            description: entry.first("description").unwrap_or_default().to_string(),
            dn,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<RoleId> {
        list.iter().map(|id| RoleId::parse(id).unwrap()).collect()
    }

    #[test]
    fn test_pattern_prefix_and_wildcards() {
        let pattern = RolePattern::parse("K-*-O").unwrap();
        for id in ["K-L-O", "K-N-O-P", "k-m-o"] {
            assert!(pattern.matches(&RoleId::parse(id).unwrap()), "{id}");
        }
        for id in ["K-N", "K-N-T", "K-O-X", "A-L-O"] {
            assert!(!pattern.matches(&RoleId::parse(id).unwrap()), "{id}");
        }
    }

    #[test]
    fn test_pattern_matches_whole_segments() {
        let pattern = RolePattern::parse("A").unwrap();
        assert!(pattern.matches(&RoleId::parse("A-B").unwrap()));
        assert!(!pattern.matches(&RoleId::parse("AB").unwrap()));
        assert!(!pattern.matches(&RoleId::root()));
    }

    #[test]
    fn test_patterns_that_never_match() {
        for pattern in ["", "**", "A-**", "A--B", "-", "A*"] {
            assert!(RolePattern::parse(pattern).is_none(), "{pattern:?}");
        }
    }

    #[test]
    fn test_pattern_escapes_literals() {
        let pattern = RolePattern::parse("a_b").unwrap();
        assert!(pattern.matches(&RoleId::parse("A_B-c").unwrap()));
        assert!(RolePattern::parse("a.b").is_some_and(|p| !p.matches(&RoleId::parse("axb").unwrap())));
    }

    #[test]
    fn test_sort_deepest_first() {
        let mut roles = ids(&["K-N", "K-N-O", "K-N-P-Q", "K-N-P"]);
        sort_deepest_first(&mut roles);
        assert_eq!(roles, ids(&["K-N-P-Q", "K-N-P", "K-N-O", "K-N"]));
    }
}
