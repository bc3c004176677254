//! Integration test helpers for ldapadmin-agent.
//!
//! Builds an in-memory directory holding a small role tree, two users and
//! two organisations, and agents bound against it.

#![allow(dead_code)]

use std::sync::Once;

use ldapadmin_agent::{DnCodec, RoleAgent, RoleId};
use ldapadmin_directory::{
    Call, DirectoryConfig, Entry, MemoryDirectory, Modification,
};

static INIT: Once = Once::new();

pub const ADMIN_DN: &str = "uid=_admin,ou=Users,o=EIONET,l=Europe";
pub const ADMIN_PASSWORD: &str = "admin-pw";

/// Roles present in the fixture tree, root excluded.
pub const TREE: &[&str] = &[
    "A", "A-B", "A-C", "K", "K-L", "K-L-O", "K-M", "K-M-O", "K-N", "K-N-O", "K-N-O-P", "K-N-T",
];

/// Initialize logging for tests (once).
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

pub fn config() -> DirectoryConfig {
    DirectoryConfig::default().with_credentials(ADMIN_DN, ADMIN_PASSWORD)
}

pub fn codec() -> DnCodec {
    DnCodec::from_config(&config())
}

pub fn role(id: &str) -> RoleId {
    RoleId::parse(id).unwrap()
}

pub fn roles(ids: &[&str]) -> Vec<RoleId> {
    ids.iter().map(|id| role(id)).collect()
}

pub fn role_dn(id: &str) -> String {
    codec().role_dn(&role(id))
}

pub fn user_dn(id: &str) -> String {
    codec().user_dn(id).unwrap()
}

pub fn org_dn(id: &str) -> String {
    codec().org_dn(id).unwrap()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// A role entry listing `members`; the placeholder stands in when empty.
pub fn role_entry(id: &str, members: &[&str]) -> Entry {
    let members = if members.is_empty() {
        vec![String::new()]
    } else {
        strings(members)
    };
    let mut entry = Entry::new(role_dn(id))
        .with("objectClass", strings(&["top", "groupOfUniqueNames"]))
        .with("uniqueMember", members);
    if let Some(last) = role(id).last_segment() {
        entry = entry
            .with("ou", vec![last.to_string()])
            .with("description", vec![format!("Role {id}")]);
    }
    entry
}

pub fn user_entry(id: &str, name: &str) -> Entry {
    Entry::new(user_dn(id))
        .with(
            "objectClass",
            strings(&["top", "person", "organizationalPerson", "inetOrgPerson"]),
        )
        .with("uid", vec![id.to_string()])
        .with("cn", vec![name.to_string()])
        .with("mail", vec![format!("{id}@example.com")])
}

pub fn org_entry(id: &str, attrs: &[(&str, &str)]) -> Entry {
    let mut entry = Entry::new(org_dn(id))
        .with("objectClass", strings(&["top", "organization", "labeledURIObject"]))
        .with("cn", vec![id.to_string()]);
    for (attr, value) in attrs {
        entry = entry.with(*attr, vec![value.to_string()]);
    }
    entry
}

/// Containers, users and organisations, without any roles below the root.
pub fn base_directory() -> MemoryDirectory {
    MemoryDirectory::new()
        .with_credentials(ADMIN_DN, ADMIN_PASSWORD)
        .with_entry(Entry::new("o=EIONET,l=Europe"))
        .with_entry(Entry::new("ou=Users,o=EIONET,l=Europe"))
        .with_entry(Entry::new("ou=Organisations,o=EIONET,l=Europe"))
        .with_entry(role_entry("", &[]))
        .with_entry(user_entry("anne", "Anne Smith"))
        .with_entry(user_entry("bob", "Bob Jones"))
        .with_entry(user_entry("carol", "Carol Nagy"))
        .with_entry(org_entry(
            "bridge_club",
            &[
                ("o", "Ye olde bridge club"),
                ("telephoneNumber", "555"),
                ("l", "København"),
            ],
        ))
        .with_entry(org_entry("air_agency", &[("o", "Agency for Air Studies")]))
}

/// [`base_directory`] plus every role in [`TREE`], all empty.
pub fn fixture() -> MemoryDirectory {
    TREE.iter()
        .fold(base_directory(), |dir, id| dir.with_entry(role_entry(id, &[])))
}

/// A bound agent over `dir`, with the bind already drained from the call log.
pub fn bound_agent(dir: MemoryDirectory) -> RoleAgent<MemoryDirectory> {
    init_test_logging();
    let mut agent = RoleAgent::new(dir, &config()).unwrap();
    agent.perform_bind(ADMIN_DN, ADMIN_PASSWORD).unwrap();
    agent.client_mut().take_calls();
    agent
}

pub fn unbound_agent(dir: MemoryDirectory) -> RoleAgent<MemoryDirectory> {
    init_test_logging();
    RoleAgent::new(dir, &config()).unwrap()
}

/// Every modify call as `(dn, modifications)`, in order.
pub fn modifies(dir: &MemoryDirectory) -> Vec<(String, Vec<Modification>)> {
    dir.calls()
        .iter()
        .filter_map(|call| match call {
            Call::Modify { dn, modifications } => Some((dn.clone(), modifications.clone())),
            _ => None,
        })
        .collect()
}

/// Members listed on a role entry, placeholder included.
pub fn members_of(dir: &MemoryDirectory, id: &str) -> Vec<String> {
    let mut members = dir
        .entry(&role_dn(id))
        .map(|entry| entry.values("uniqueMember").to_vec())
        .unwrap_or_default();
    members.sort();
    members
}
