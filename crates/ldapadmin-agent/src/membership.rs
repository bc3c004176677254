//! Membership propagation
//!
//! Adding a member climbs from the target role to the root of the tree;
//! removing one clears every role at or below the target that lists it.
//! Role entries are `groupOfUniqueNames`, whose `uniqueMember` may never be
//! empty, so an empty-string placeholder member is juggled around the real
//! change.
//!
//! Each directory modification is one [`PlaceholderStep`]. The errors a
//! step may meet from concurrent writers are enumerated by
//! [`PlaceholderStep::tolerate`]; anything else aborts the walk.

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use ldapadmin_directory::{DirectoryClient, DirectoryError, Filter, Modification, SearchRequest};

use crate::agent::{role_filter, RoleAgent, MEMBER_ATTRIBUTE, PLACEHOLDER_MEMBER};
use crate::codec::{MemberRef, RoleId};
use crate::error::{AgentError, AgentResult};
use crate::roles::sort_deepest_first;

/// One modification in the membership protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderStep {
    /// Add: put the member on the role.
    AddMember,
    /// Add: drop the placeholder now that the role has a real member.
    DropPlaceholder,
    /// Remove: add the placeholder so the role cannot become empty.
    InsertPlaceholder,
    /// Remove: take the member off the role.
    DeleteMember,
    /// Remove: take the placeholder off again if others remain.
    TrimPlaceholder,
}

/// A directory error accepted as a benign race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tolerated {
    /// The member was already on the role, and so on every ancestor.
    AlreadyMember,
    /// There was no placeholder to drop.
    PlaceholderAbsent,
    /// The role refused the placeholder because it has other members.
    PlaceholderNotNeeded,
    /// The placeholder was already there.
    PlaceholderAlreadyPresent,
    /// Someone else removed the member first.
    AlreadyRemoved,
    /// The member was the last one; the placeholder stays.
    LastMemberKeepsPlaceholder,
}

impl Tolerated {
    /// Whether the outcome means another writer touched the role between
    /// our reads and writes, rather than the ordinary shape of the group.
    pub fn is_concurrent_write(self) -> bool {
        matches!(
            self,
            Tolerated::AlreadyRemoved | Tolerated::PlaceholderAlreadyPresent
        )
    }
}

impl PlaceholderStep {
    pub fn modification(self, member_dn: &str) -> Modification {
        match self {
            PlaceholderStep::AddMember => Modification::add(MEMBER_ATTRIBUTE, member_dn),
            PlaceholderStep::DropPlaceholder | PlaceholderStep::TrimPlaceholder => {
                Modification::delete(MEMBER_ATTRIBUTE, PLACEHOLDER_MEMBER)
            }
            PlaceholderStep::InsertPlaceholder => {
                Modification::add(MEMBER_ATTRIBUTE, PLACEHOLDER_MEMBER)
            }
            PlaceholderStep::DeleteMember => Modification::delete(MEMBER_ATTRIBUTE, member_dn),
        }
    }

    /// The benign outcome `err` signals for this step, or `None` when it
    /// must abort the walk.
    pub fn tolerate(self, err: &DirectoryError) -> Option<Tolerated> {
        use DirectoryError::{NoSuchAttribute, ObjectClassViolation, TypeOrValueExists};

        match (self, err) {
            // Servers report an existing member either way.
            (PlaceholderStep::AddMember, TypeOrValueExists { .. } | ObjectClassViolation { .. }) => {
                Some(Tolerated::AlreadyMember)
            }
            (PlaceholderStep::DropPlaceholder, NoSuchAttribute { .. }) => {
                Some(Tolerated::PlaceholderAbsent)
            }
            (PlaceholderStep::InsertPlaceholder, ObjectClassViolation { .. }) => {
                Some(Tolerated::PlaceholderNotNeeded)
            }
            (PlaceholderStep::InsertPlaceholder, TypeOrValueExists { .. }) => {
                Some(Tolerated::PlaceholderAlreadyPresent)
            }
            (PlaceholderStep::DeleteMember, NoSuchAttribute { .. }) => {
                Some(Tolerated::AlreadyRemoved)
            }
            (PlaceholderStep::TrimPlaceholder, ObjectClassViolation { .. }) => {
                Some(Tolerated::LastMemberKeepsPlaceholder)
            }
            _ => None,
        }
    }
}

/// Direction a membership walk visited roles in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkOrder {
    /// From the target role up to the root (adding).
    TargetToRoot,
    /// Deepest role first (removing).
    DeepestFirst,
}

/// A tolerated race met on one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToleratedRace {
    pub role: RoleId,
    pub step: PlaceholderStep,
    pub outcome: Tolerated,
}

/// What an add or remove did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipChange {
    pub member: MemberRef,
    /// Roles modified, in the order they were visited.
    pub roles: Vec<RoleId>,
    pub order: WalkOrder,
    /// Where an add stopped because the member was already present.
    pub stopped_at: Option<RoleId>,
    pub tolerated: Vec<ToleratedRace>,
}

impl MembershipChange {
    fn new(member: MemberRef, order: WalkOrder) -> Self {
        Self {
            member,
            roles: Vec::new(),
            order,
            stopped_at: None,
            tolerated: Vec::new(),
        }
    }

    /// Modified roles, most specific first.
    pub fn deepest_first(&self) -> Vec<&RoleId> {
        // Both walk orders visit deeper roles before shallower ones.
        self.roles.iter().collect()
    }

    /// Modified roles, root side first.
    pub fn root_first(&self) -> Vec<&RoleId> {
        let mut roles = self.deepest_first();
        roles.reverse();
        roles
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Result of running one step.
enum StepOutcome {
    Applied,
    Tolerated,
}

impl<C: DirectoryClient> RoleAgent<C> {
    fn run_step(
        &mut self,
        role: &RoleId,
        role_dn: &str,
        member_dn: &str,
        step: PlaceholderStep,
        change: &mut MembershipChange,
    ) -> Result<StepOutcome, DirectoryError> {
        debug!(role = %role, ?step, "Applying membership step");
        match self.client.modify(role_dn, &[step.modification(member_dn)]) {
            Ok(()) => Ok(StepOutcome::Applied),
            Err(err) => match step.tolerate(&err) {
                Some(outcome) => {
                    if outcome.is_concurrent_write() {
                        warn!(role = %role, ?step, ?outcome, "Tolerated concurrent membership change");
                    } else {
                        debug!(role = %role, ?step, ?outcome, "Tolerated directory outcome");
                    }
                    change.tolerated.push(ToleratedRace {
                        role: role.clone(),
                        step,
                        outcome,
                    });
                    Ok(StepOutcome::Tolerated)
                }
                None => Err(err),
            },
        }
    }

    /// Add a member to `role` and every ancestor, root entry included.
    ///
    /// The climb stops at the first role that already lists the member.
    #[instrument(skip(self), fields(role = %role, member = %member))]
    pub fn add_to_role(&mut self, role: &RoleId, member: &MemberRef) -> AgentResult<MembershipChange> {
        self.require_bound("add_to_role")?;
        let member_dn = self.codec.member_dn(member)?;
        let role_dn = self.codec.role_dn(role);
        self.ensure_exists(&member_dn)?;
        self.ensure_exists(&role_dn)?;

        let mut change = MembershipChange::new(member.clone(), WalkOrder::TargetToRoot);
        let mut walk = role.lineage();
        walk.reverse();

        for level in walk {
            let dn = self.codec.role_dn(&level);
            match self.run_step(&level, &dn, &member_dn, PlaceholderStep::AddMember, &mut change) {
                Ok(StepOutcome::Applied) => change.roles.push(level.clone()),
                Ok(StepOutcome::Tolerated) => {
                    change.stopped_at = Some(level);
                    break;
                }
                Err(err) => {
                    return Err(AgentError::unexpected("add_to_role", &dn, err).after(&change.roles))
                }
            }

            if let Err(err) =
                self.run_step(&level, &dn, &member_dn, PlaceholderStep::DropPlaceholder, &mut change)
            {
                return Err(AgentError::unexpected("add_to_role", &dn, err).after(&change.roles));
            }
        }

        info!(
            modified = change.roles.len(),
            stopped_at = ?change.stopped_at.as_ref().map(ToString::to_string),
            "Member added"
        );
        Ok(change)
    }

    /// Remove a member from `role` and from every role below it that
    /// lists it, deepest first.
    #[instrument(skip(self), fields(role = %role, member = %member))]
    pub fn remove_from_role(
        &mut self,
        role: &RoleId,
        member: &MemberRef,
    ) -> AgentResult<MembershipChange> {
        self.require_bound("remove_from_role")?;
        let member_dn = self.codec.member_dn(member)?;
        let role_dn = self.codec.role_dn(role);
        self.ensure_exists(&member_dn)?;
        self.ensure_exists(&role_dn)?;

        let mut targets = self.roles_with_member(&role_dn, &member_dn)?;
        if targets.is_empty() {
            return Err(AgentError::NotAMember {
                member: member_dn,
                role: role_dn,
            });
        }
        sort_deepest_first(&mut targets);

        let mut change = MembershipChange::new(member.clone(), WalkOrder::DeepestFirst);
        for target in targets {
            let dn = self.codec.role_dn(&target);
            if let Err(err) = self.remove_from_single_role(&target, &dn, &member_dn, &mut change) {
                return Err(err.after(&change.roles));
            }
        }

        info!(modified = change.roles.len(), "Member removed");
        Ok(change)
    }

    /// Insert placeholder, delete member, trim placeholder. The trim runs
    /// even when the delete failed, so the role is not left holding a
    /// stray placeholder.
    fn remove_from_single_role(
        &mut self,
        role: &RoleId,
        dn: &str,
        member_dn: &str,
        change: &mut MembershipChange,
    ) -> AgentResult<()> {
        self.run_step(role, dn, member_dn, PlaceholderStep::InsertPlaceholder, change)
            .map_err(|err| AgentError::unexpected("remove_from_role", dn, err))?;

        let deleted = self.run_step(role, dn, member_dn, PlaceholderStep::DeleteMember, change);
        if matches!(deleted, Ok(StepOutcome::Applied)) {
            change.roles.push(role.clone());
        }

        let trimmed = self.run_step(role, dn, member_dn, PlaceholderStep::TrimPlaceholder, change);

        match (deleted, trimmed) {
            (Ok(_), Ok(_)) => Ok(()),
            (Err(err), trimmed) => {
                if let Err(trim_err) = trimmed {
                    error!(dn, error = %trim_err, "Placeholder cleanup failed after a failed removal");
                }
                Err(AgentError::unexpected("remove_from_role", dn, err))
            }
            (Ok(_), Err(err)) => {
                warn!(dn, "Member removed but placeholder cleanup failed");
                Err(AgentError::unexpected("remove_from_role", dn, err))
            }
        }
    }

    fn roles_with_member(&mut self, base_dn: &str, member_dn: &str) -> AgentResult<Vec<RoleId>> {
        let request = SearchRequest::subtree(base_dn)
            .with_filter(role_filter().and_with(Filter::eq(MEMBER_ATTRIBUTE, member_dn)))
            .dn_only();
        let entries = self
            .client
            .search(&request)
            .map_err(|err| AgentError::unexpected("roles_with_member", base_dn, err))?;
        entries
            .iter()
            .map(|entry| self.codec.role_id(&entry.dn))
            .collect()
    }

    /// Every role listing the member, root entry excluded, sorted by id.
    #[instrument(skip(self), fields(member = %member))]
    pub fn list_member_roles(&mut self, member: &MemberRef) -> AgentResult<Vec<RoleId>> {
        let member_dn = self.codec.member_dn(member)?;
        let roles_dn = self.codec.roles_dn().to_string();
        let mut roles: Vec<RoleId> = self
            .roles_with_member(&roles_dn, &member_dn)?
            .into_iter()
            .filter(|role| !role.is_root())
            .collect();
        roles.sort();
        Ok(roles)
    }
}
