//! Membership propagation against an in-memory directory.

mod common;

use common::*;
use ldapadmin_agent::{AgentError, MemberRef, PlaceholderStep, RoleId, Tolerated, WalkOrder};
use ldapadmin_directory::{Call, CallKind, DirectoryError, Entry, MemoryDirectory, Modification};

fn anne() -> MemberRef {
    MemberRef::user("anne")
}

fn add(member: &str) -> Modification {
    Modification::add("uniqueMember", member)
}

fn delete(member: &str) -> Modification {
    Modification::delete("uniqueMember", member)
}

/// anne sits on K-N and everything below it that lists her; bob shares
/// some of those roles.
fn removal_tree() -> MemoryDirectory {
    let anne = user_dn("anne");
    let bob = user_dn("bob");
    let mut dir = base_directory()
        .with_entry(role_entry("K", &[&anne, &bob]))
        .with_entry(role_entry("K-M", &[&bob]))
        .with_entry(role_entry("K-N", &[&anne, &bob]))
        .with_entry(role_entry("K-N-O", &[&anne]))
        .with_entry(role_entry("K-N-P", &[&anne, &bob]))
        .with_entry(role_entry("K-N-P-Q", &[&anne]));
    dir.insert(role_entry("", &[&anne, &bob]));
    dir
}

#[test]
fn test_add_climbs_to_root_dropping_placeholders() {
    let mut agent = bound_agent(fixture());
    let change = agent.add_to_role(&role("K-N-O"), &anne()).unwrap();

    assert_eq!(change.order, WalkOrder::TargetToRoot);
    assert_eq!(change.roles, roles(&["K-N-O", "K-N", "K", ""]));
    assert_eq!(change.stopped_at, None);
    assert!(change.tolerated.is_empty());

    let member = user_dn("anne");
    let mut expected = Vec::new();
    for id in ["K-N-O", "K-N", "K", ""] {
        expected.push((role_dn(id), vec![add(&member)]));
        expected.push((role_dn(id), vec![delete("")]));
    }
    assert_eq!(modifies(agent.client()), expected);

    for id in ["K-N-O", "K-N", "K", ""] {
        assert_eq!(members_of(agent.client(), id), [member.clone()], "{id}");
    }
    assert_eq!(members_of(agent.client(), "K-N-O-P"), [""]);
    assert_eq!(members_of(agent.client(), "K-M"), [""]);
}

#[test]
fn test_add_stops_at_first_role_already_listing_member() {
    let member = user_dn("anne");
    let mut dir = fixture().with_entry(role_entry("K", &[&member]));
    dir.insert(role_entry("", &[&member]));
    let mut agent = bound_agent(dir);

    let change = agent.add_to_role(&role("K-N-O"), &anne()).unwrap();
    assert_eq!(change.roles, roles(&["K-N-O", "K-N"]));
    assert_eq!(change.stopped_at, Some(role("K")));
    assert_eq!(change.tolerated.len(), 1);
    assert_eq!(change.tolerated[0].role, role("K"));
    assert_eq!(change.tolerated[0].step, PlaceholderStep::AddMember);
    assert_eq!(change.tolerated[0].outcome, Tolerated::AlreadyMember);

    let touched: Vec<String> = modifies(agent.client()).into_iter().map(|(dn, _)| dn).collect();
    assert_eq!(touched.len(), 5);
    assert!(!touched.contains(&role_dn("")));
}

#[test]
fn test_add_tolerates_missing_placeholder() {
    let bob = user_dn("bob");
    let mut dir = fixture()
        .with_entry(role_entry("K", &[&bob]))
        .with_entry(role_entry("K-N", &[&bob]));
    dir.insert(role_entry("", &[&bob]));
    let mut agent = bound_agent(dir);

    let change = agent.add_to_role(&role("K-N"), &anne()).unwrap();
    assert_eq!(change.roles, roles(&["K-N", "K", ""]));
    assert_eq!(change.tolerated.len(), 3);
    assert!(change
        .tolerated
        .iter()
        .all(|race| race.step == PlaceholderStep::DropPlaceholder
            && race.outcome == Tolerated::PlaceholderAbsent));
    assert_eq!(
        members_of(agent.client(), "K-N"),
        [user_dn("anne"), bob.clone()]
    );
}

#[test]
fn test_add_treats_object_class_violation_as_already_member() {
    let mut agent = bound_agent(fixture());
    let roles_dn = role_dn("");
    agent.client_mut().fail_next(
        CallKind::Modify,
        roles_dn.clone(),
        DirectoryError::ObjectClassViolation {
            dn: roles_dn,
            message: "not a group".into(),
        },
    );

    let change = agent.add_to_role(&role("K-N-O"), &anne()).unwrap();
    assert_eq!(change.roles, roles(&["K-N-O", "K-N", "K"]));
    assert_eq!(change.stopped_at, Some(RoleId::root()));
}

#[test]
fn test_add_stops_at_root_that_is_not_a_group() {
    let mut dir = fixture();
    dir.insert(Entry::new(role_dn("")));
    let mut agent = bound_agent(dir);

    let change = agent.add_to_role(&role("K"), &anne()).unwrap();
    assert_eq!(change.roles, roles(&["K"]));
    assert_eq!(change.stopped_at, Some(RoleId::root()));
    assert_eq!(change.tolerated.len(), 1);
    assert_eq!(change.tolerated[0].step, PlaceholderStep::AddMember);
    assert_eq!(change.tolerated[0].outcome, Tolerated::AlreadyMember);

    let root = agent.client().entry(&role_dn("")).unwrap();
    assert!(root.values("uniqueMember").is_empty());
    assert_eq!(members_of(agent.client(), "K"), [user_dn("anne")]);
}

#[test]
fn test_add_interrupted_reports_completed_roles() {
    let mut agent = bound_agent(fixture());
    agent.client_mut().fail_next(
        CallKind::Modify,
        role_dn("K"),
        DirectoryError::unavailable("connection reset"),
    );

    let err = agent.add_to_role(&role("K-N-O"), &anne()).unwrap_err();
    assert!(matches!(err, AgentError::Interrupted { .. }), "{err:?}");
    assert_eq!(err.completed_roles(), roles(&["K-N-O", "K-N"]).as_slice());
    assert!(err.is_transient());
    assert_eq!(members_of(agent.client(), "K"), [""]);
}

#[test]
fn test_add_failure_on_first_role_is_not_interrupted() {
    let mut agent = bound_agent(fixture());
    agent.client_mut().fail_next(
        CallKind::Modify,
        role_dn("K-N-O"),
        DirectoryError::unavailable("connection reset"),
    );

    let err = agent.add_to_role(&role("K-N-O"), &anne()).unwrap_err();
    assert!(matches!(err, AgentError::DirectoryUnavailable { .. }), "{err:?}");
    assert!(err.completed_roles().is_empty());
}

#[test]
fn test_add_rejects_missing_member_or_role() {
    let mut agent = bound_agent(fixture());

    let err = agent.add_to_role(&role("K-N"), &MemberRef::user("zed")).unwrap_err();
    assert!(matches!(err, AgentError::NotFound { dn } if dn == user_dn("zed")));

    let err = agent.add_to_role(&role("K-Q"), &anne()).unwrap_err();
    assert!(matches!(err, AgentError::NotFound { dn } if dn == role_dn("K-Q")));

    let err = agent.add_to_role(&role("K-N"), &MemberRef::user("a,b")).unwrap_err();
    assert!(matches!(err, AgentError::InvalidId { .. }));

    assert!(agent.client().calls_of(CallKind::Modify).is_empty());
}

#[test]
fn test_membership_changes_require_bind() {
    let mut agent = unbound_agent(removal_tree());

    let err = agent.add_to_role(&role("K-M"), &anne()).unwrap_err();
    assert!(err.is_authentication());
    let err = agent.remove_from_role(&role("K-N"), &anne()).unwrap_err();
    assert!(matches!(err, AgentError::NotAuthenticated { .. }));

    assert!(agent.client().calls().is_empty());
}

#[test]
fn test_remove_clears_subtree_deepest_first() {
    let mut agent = bound_agent(removal_tree());
    let change = agent.remove_from_role(&role("K-N"), &anne()).unwrap();

    assert_eq!(change.order, WalkOrder::DeepestFirst);
    assert_eq!(change.roles, roles(&["K-N-P-Q", "K-N-P", "K-N-O", "K-N"]));

    let member = user_dn("anne");
    let mut expected = Vec::new();
    for id in ["K-N-P-Q", "K-N-P", "K-N-O", "K-N"] {
        expected.push((role_dn(id), vec![add("")]));
        expected.push((role_dn(id), vec![delete(&member)]));
        expected.push((role_dn(id), vec![delete("")]));
    }
    assert_eq!(modifies(agent.client()), expected);

    let kept: Vec<(RoleId, Tolerated)> = change
        .tolerated
        .iter()
        .map(|race| (race.role.clone(), race.outcome))
        .collect();
    assert_eq!(
        kept,
        [
            (role("K-N-P-Q"), Tolerated::LastMemberKeepsPlaceholder),
            (role("K-N-O"), Tolerated::LastMemberKeepsPlaceholder),
        ]
    );

    let bob = user_dn("bob");
    assert_eq!(members_of(agent.client(), "K-N-P-Q"), [""]);
    assert_eq!(members_of(agent.client(), "K-N-P"), [bob.clone()]);
    assert_eq!(members_of(agent.client(), "K-N-O"), [""]);
    assert_eq!(members_of(agent.client(), "K-N"), [bob.clone()]);
    assert_eq!(members_of(agent.client(), "K"), [member, bob]);
}

#[test]
fn test_remove_requires_membership_at_or_below_target() {
    let mut agent = bound_agent(removal_tree());

    let err = agent
        .remove_from_role(&role("K-N"), &MemberRef::user("carol"))
        .unwrap_err();
    assert!(matches!(err, AgentError::NotAMember { .. }), "{err:?}");

    let err = agent.remove_from_role(&role("K-M"), &anne()).unwrap_err();
    assert!(matches!(err, AgentError::NotAMember { .. }), "{err:?}");

    assert!(agent.client().calls_of(CallKind::Modify).is_empty());
}

#[test]
fn test_remove_tolerates_concurrent_removal() {
    let mut agent = bound_agent(removal_tree());
    let target = role_dn("K-N-O");
    let member = user_dn("anne");
    let step = delete(&member);
    let injected_dn = target.clone();
    agent.client_mut().fail_next_matching(
        move |call| {
            matches!(call, Call::Modify { dn, modifications }
                if *dn == injected_dn && *modifications == [step.clone()])
        },
        DirectoryError::NoSuchAttribute {
            dn: target.clone(),
            message: "no such value".into(),
        },
    );

    let change = agent.remove_from_role(&role("K-N"), &anne()).unwrap();
    assert_eq!(change.roles, roles(&["K-N-P-Q", "K-N-P", "K-N"]));
    assert!(change.tolerated.iter().any(|race| race.role == role("K-N-O")
        && race.step == PlaceholderStep::DeleteMember
        && race.outcome == Tolerated::AlreadyRemoved));

    let on_target = modifies(agent.client())
        .into_iter()
        .filter(|(dn, _)| *dn == target)
        .count();
    assert_eq!(on_target, 3);
}

#[test]
fn test_remove_trims_placeholder_after_failed_delete() {
    let mut agent = bound_agent(removal_tree());
    let member = user_dn("anne");
    let target = role_dn("K-N-P-Q");
    let step = delete(&member);
    let injected_dn = target.clone();
    agent.client_mut().fail_next_matching(
        move |call| {
            matches!(call, Call::Modify { dn, modifications }
                if *dn == injected_dn && *modifications == [step.clone()])
        },
        DirectoryError::Other {
            code: 80,
            message: "other".into(),
        },
    );

    let err = agent.remove_from_role(&role("K-N"), &anne()).unwrap_err();
    assert!(matches!(
        err,
        AgentError::Directory(DirectoryError::Other { code: 80, .. })
    ));

    let calls = modifies(agent.client());
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[2], (target, vec![delete("")]));
    assert_eq!(members_of(agent.client(), "K-N-P-Q"), [member]);
}

#[test]
fn test_remove_interrupted_reports_completed_roles() {
    let mut agent = bound_agent(removal_tree());
    let target = role_dn("K-N-O");
    let step = delete(&user_dn("anne"));
    agent.client_mut().fail_next_matching(
        move |call| {
            matches!(call, Call::Modify { dn, modifications }
                if *dn == target && *modifications == [step.clone()])
        },
        DirectoryError::unavailable("connection reset"),
    );

    let err = agent.remove_from_role(&role("K-N"), &anne()).unwrap_err();
    assert_eq!(err.completed_roles(), roles(&["K-N-P-Q", "K-N-P"]).as_slice());
    assert!(err.is_transient());
    assert!(members_of(agent.client(), "K-N").contains(&user_dn("anne")));
}

#[test]
fn test_list_member_roles_excludes_root() {
    let mut agent = bound_agent(fixture());
    agent.add_to_role(&role("K-N-O"), &anne()).unwrap();
    agent
        .add_to_role(&role("A-B"), &MemberRef::org("air_agency"))
        .unwrap();

    assert_eq!(
        agent.list_member_roles(&anne()).unwrap(),
        roles(&["K", "K-N", "K-N-O"])
    );
    assert_eq!(
        agent.list_member_roles(&MemberRef::org("air_agency")).unwrap(),
        roles(&["A", "A-B"])
    );
    assert!(agent
        .list_member_roles(&MemberRef::user("bob"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_add_then_remove_leaves_no_empty_group() {
    let mut agent = bound_agent(fixture());
    agent.add_to_role(&role("K-N-O-P"), &anne()).unwrap();
    let change = agent.remove_from_role(&role("K"), &anne()).unwrap();
    assert_eq!(change.roles, roles(&["K-N-O-P", "K-N-O", "K-N", "K"]));

    for id in TREE {
        assert_eq!(members_of(agent.client(), id), [""], "{id}");
    }
    assert_eq!(members_of(agent.client(), ""), [user_dn("anne")]);
}
