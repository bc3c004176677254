//! Role tree operations against an in-memory directory.

mod common;

use std::collections::BTreeSet;

use common::*;
use ldapadmin_agent::{AgentError, MemberRef, RoleId};
use ldapadmin_directory::{Call, CallKind, DirectoryError, Entry};

fn ids(list: &[&str]) -> BTreeSet<RoleId> {
    list.iter().map(|id| role(id)).collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn test_filter_roles_matches_prefixes_and_wildcards() {
    let mut agent = bound_agent(fixture());

    let cases: &[(&str, &[&str])] = &[
        ("A", &["A", "A-B", "A-C"]),
        ("K-*-O", &["K-L-O", "K-M-O", "K-N-O", "K-N-O-P"]),
        ("*-B", &["A-B"]),
        ("K-N-*", &["K-N-O", "K-N-O-P", "K-N-T"]),
        ("k-n", &["K-N", "K-N-O", "K-N-O-P", "K-N-T"]),
        ("*", TREE),
        ("**", &[]),
        ("", &[]),
        ("asdf", &[]),
        ("K-", &[]),
        ("K*", &[]),
    ];

    for (pattern, expected) in cases {
        let found = agent.filter_roles(pattern).unwrap();
        assert_eq!(found, ids(expected), "pattern {pattern:?}");
    }
}

#[test]
fn test_filter_roles_with_unmatchable_pattern_does_not_search() {
    let mut agent = bound_agent(fixture());
    assert!(agent.filter_roles("K-**").unwrap().is_empty());
    assert!(agent.client().calls().is_empty());
}

#[test]
fn test_filter_roles_reports_malformed_entries() {
    let mut dir = fixture();
    dir.insert(
        Entry::new("cn=K-x,cn=A,ou=Roles,o=EIONET,l=Europe")
            .with("objectClass", strings(&["top", "groupOfUniqueNames"]))
            .with("uniqueMember", strings(&[""])),
    );
    let mut agent = bound_agent(dir);

    let err = agent.filter_roles("A").unwrap_err();
    assert!(matches!(err, AgentError::MalformedDn { .. }), "{err:?}");
}

#[test]
fn test_create_role_issues_exact_add() {
    let mut agent = bound_agent(fixture());
    agent.create_role(&role("A-B-X"), "Role X").unwrap();

    assert_eq!(
        agent.client().calls(),
        &[Call::Add {
            dn: "cn=A-B-X,cn=A-B,cn=A,ou=Roles,o=EIONET,l=Europe".to_string(),
            attributes: vec![
                ("objectClass".to_string(), strings(&["top", "groupOfUniqueNames"])),
                ("ou".to_string(), strings(&["X"])),
                ("uniqueMember".to_string(), strings(&[""])),
                ("description".to_string(), strings(&["Role X"])),
            ],
        }]
    );
    assert_eq!(members_of(agent.client(), "A-B-X"), [""]);
}

#[test]
fn test_create_role_omits_empty_description() {
    let mut agent = bound_agent(fixture());
    agent.create_role(&role("K-Z"), "").unwrap();

    let calls = agent.client().calls_of(CallKind::Add);
    let Call::Add { attributes, .. } = calls[0] else {
        panic!("expected an add call");
    };
    assert!(attributes.iter().all(|(name, _)| name != "description"));
    assert_eq!(attributes.len(), 3);
}

#[test]
fn test_create_role_conflicts() {
    let mut agent = bound_agent(fixture());

    let err = agent.create_role(&role("K-N"), "dup").unwrap_err();
    assert!(matches!(err, AgentError::RoleAlreadyExists { .. }), "{err:?}");
    assert!(err.is_creation_conflict());

    let err = agent.create_role(&role("A-X-Y"), "orphan").unwrap_err();
    assert!(matches!(err, AgentError::ParentMissing { .. }), "{err:?}");
    assert!(err.is_creation_conflict());
}

#[test]
fn test_create_role_maps_both_conflict_codes_from_the_server() {
    let mut agent = bound_agent(fixture());
    let dn = role_dn("A-D");

    agent.client_mut().fail_next(
        CallKind::Add,
        dn.clone(),
        DirectoryError::NoSuchObject { dn: dn.clone() },
    );
    let err = agent.create_role(&role("A-D"), "").unwrap_err();
    assert!(matches!(err, AgentError::ParentMissing { .. }), "{err:?}");

    agent.client_mut().fail_next(
        CallKind::Add,
        dn.clone(),
        DirectoryError::AlreadyExists { dn: dn.clone() },
    );
    let err = agent.create_role(&role("A-D"), "").unwrap_err();
    assert!(matches!(err, AgentError::RoleAlreadyExists { .. }), "{err:?}");

    assert!(!agent.client().contains(&dn));
}

#[test]
fn test_create_role_reraises_unknown_codes() {
    let mut agent = bound_agent(fixture());
    let dn = role_dn("A-D");
    agent.client_mut().fail_next(
        CallKind::Add,
        dn,
        DirectoryError::Other {
            code: 19,
            message: "constraint violation".into(),
        },
    );

    let err = agent.create_role(&role("A-D"), "").unwrap_err();
    assert!(!err.is_creation_conflict());
    assert!(matches!(
        err,
        AgentError::Directory(DirectoryError::Other { code: 19, .. })
    ));
}

#[test]
fn test_create_role_requires_bind() {
    let mut agent = unbound_agent(fixture());
    let err = agent.create_role(&role("A-D"), "").unwrap_err();
    assert!(matches!(err, AgentError::NotAuthenticated { .. }));
    assert!(agent.client().calls_of(CallKind::Add).is_empty());
}

#[test]
fn test_create_role_rejects_root() {
    let mut agent = bound_agent(fixture());
    let err = agent.create_role(&RoleId::root(), "").unwrap_err();
    assert!(matches!(err, AgentError::InvalidId { .. }));
}

#[test]
fn test_create_child_role_validates_segment() {
    let mut agent = bound_agent(fixture());

    let err = agent.create_child_role(&role("A"), "Nfp", "").unwrap_err();
    assert!(matches!(err, AgentError::InvalidId { .. }));
    let err = agent.create_child_role(&role("A"), "nfp-x", "").unwrap_err();
    assert!(matches!(err, AgentError::InvalidId { .. }));
    assert!(agent.client().calls().is_empty());

    let created = agent.create_child_role(&role("A"), "nfp", "NFPs").unwrap();
    assert_eq!(created, role("A-nfp"));
    assert_eq!(agent.role_info(&created).unwrap().description, "NFPs");
}

#[test]
fn test_list_sub_roles_is_deepest_first() {
    let mut agent = bound_agent(fixture());
    let dns = agent.list_sub_roles(&role("K")).unwrap();

    let expected: Vec<String> = [
        "K-N-O-P", "K-N-T", "K-N-O", "K-M-O", "K-L-O", "K-N", "K-M", "K-L", "K",
    ]
    .iter()
    .map(|id| role_dn(id))
    .collect();
    assert_eq!(dns, expected);
}

#[test]
fn test_list_sub_roles_of_missing_role() {
    let mut agent = bound_agent(fixture());
    let err = agent.list_sub_roles(&role("Q")).unwrap_err();
    assert!(matches!(err, AgentError::NotFound { .. }));
}

#[test]
fn test_delete_role_removes_subtree_leaves_first() {
    let mut agent = bound_agent(fixture());
    let deleted = agent.delete_role(&role("K-N")).unwrap();
    assert_eq!(deleted, roles(&["K-N-O-P", "K-N-T", "K-N-O", "K-N"]));

    let deletes: Vec<&str> = agent
        .client()
        .calls_of(CallKind::Delete)
        .into_iter()
        .map(Call::dn)
        .collect();
    let expected: Vec<String> = ["K-N-O-P", "K-N-T", "K-N-O", "K-N"]
        .iter()
        .map(|id| role_dn(id))
        .collect();
    assert_eq!(deletes, expected);

    assert!(!agent.client().contains(&role_dn("K-N")));
    assert!(agent.client().contains(&role_dn("K-M-O")));
    assert!(agent.client().contains(&role_dn("K")));
}

#[test]
fn test_delete_role_failure_reports_completed_roles() {
    let mut agent = bound_agent(fixture());
    agent.client_mut().fail_next(
        CallKind::Delete,
        role_dn("K-N-O"),
        DirectoryError::unavailable("connection reset"),
    );

    let err = agent.delete_role(&role("K-N")).unwrap_err();
    assert_eq!(err.completed_roles(), roles(&["K-N-O-P", "K-N-T"]).as_slice());
    assert!(err.is_transient());
    assert!(agent.client().contains(&role_dn("K-N-O")));
}

#[test]
fn test_delete_role_errors() {
    let mut agent = bound_agent(fixture());
    let err = agent.delete_role(&role("Q")).unwrap_err();
    assert!(matches!(err, AgentError::NotFound { .. }));

    let err = agent.delete_role(&RoleId::root()).unwrap_err();
    assert!(matches!(err, AgentError::InvalidId { .. }));

    let mut agent = unbound_agent(fixture());
    let err = agent.delete_role(&role("K")).unwrap_err();
    assert!(matches!(err, AgentError::NotAuthenticated { .. }));
}

#[test]
fn test_role_names_in_role() {
    let mut agent = bound_agent(fixture());

    let top = agent.role_names_in_role(&RoleId::root()).unwrap();
    let names: Vec<(String, String)> = top
        .iter()
        .map(|(id, desc)| (id.to_string(), desc.clone()))
        .collect();
    assert_eq!(
        names,
        [
            ("A".to_string(), "Role A".to_string()),
            ("K".to_string(), "Role K".to_string()),
        ]
    );

    let under_a = agent.role_names_in_role(&role("A")).unwrap();
    assert_eq!(under_a.keys().cloned().collect::<Vec<_>>(), roles(&["A-B", "A-C"]));

    assert!(agent.role_names_in_role(&role("A-B")).unwrap().is_empty());
}

#[test]
fn test_members_in_role_excludes_sub_role_members() {
    let dir = base_directory()
        .with_entry(role_entry("K", &[]))
        .with_entry(role_entry(
            "K-N",
            &[&user_dn("anne"), &user_dn("bob"), &org_dn("air_agency")],
        ))
        .with_entry(role_entry("K-N-O", &[&user_dn("anne")]))
        .with_entry(role_entry("K-N-O-P", &[&user_dn("carol")]))
        .with_entry(role_entry("K-N-T", &[]));
    let mut agent = bound_agent(dir);

    let members = agent.members_in_role(&role("K-N")).unwrap();
    assert_eq!(members.users, ["bob"]);
    assert_eq!(members.orgs, ["air_agency"]);

    let members = agent.members_in_role(&role("K-N-O")).unwrap();
    assert_eq!(members.users, ["anne"]);

    assert!(agent.members_in_role(&role("K-N-T")).unwrap().is_empty());
}

#[test]
fn test_members_in_role_of_missing_role() {
    let mut agent = bound_agent(fixture());
    let err = agent.members_in_role(&role("Q")).unwrap_err();
    assert!(matches!(err, AgentError::NotFound { .. }));
}

#[test]
fn test_members_in_root_container() {
    let mut dir = fixture();
    dir.insert(Entry::new(role_dn("")));
    let mut agent = unbound_agent(dir);
    assert!(agent.members_in_role(&RoleId::root()).unwrap().is_empty());
}

#[test]
fn test_role_info() {
    let mut agent = bound_agent(fixture());
    let info = agent.role_info(&role("K-N-O")).unwrap();
    assert_eq!(info.id, role("K-N-O"));
    assert_eq!(info.dn, "cn=K-N-O,cn=K-N,cn=K,ou=Roles,o=EIONET,l=Europe");
    assert_eq!(info.description, "Role K-N-O");

    let err = agent.role_info(&role("K-Q")).unwrap_err();
    assert!(matches!(err, AgentError::NotFound { .. }));
}

#[test]
fn test_reads_do_not_require_bind() {
    let mut agent = unbound_agent(fixture());
    assert_eq!(agent.filter_roles("A-B").unwrap(), ids(&["A-B"]));
    assert!(agent.members_in_role(&role("A")).unwrap().is_empty());
}

#[test]
fn test_codec_round_trips_every_fixture_role() {
    let codec = codec();
    for id in TREE {
        let role = role(id);
        assert_eq!(codec.role_id(&codec.role_dn(&role)).unwrap(), role);
    }
    assert_eq!(
        codec.member_ref(&user_dn("anne")),
        Some(MemberRef::user("anne"))
    );
}
