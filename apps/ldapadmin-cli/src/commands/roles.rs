//! Role tree CLI commands

use clap::{Args, Subcommand};
use ldapadmin_agent::RoleId;
use serde::Serialize;

use super::{parse_role, Session};
use crate::error::CliResult;
use crate::output::{print_json, print_key_value, print_success, role_label, truncate};

/// Role tree commands
#[derive(Args, Debug)]
pub struct RolesArgs {
    #[command(subcommand)]
    pub command: RolesCommands,
}

#[derive(Subcommand, Debug)]
pub enum RolesCommands {
    /// List the immediate sub-roles of a role with their descriptions
    List(RoleArg),

    /// Show a role and everything below it as a tree
    Tree(RoleArg),

    /// List roles matching a pattern such as `eionet-*-mc`
    Filter(FilterArgs),

    /// Show a role's description and DN
    Info(RoleArg),

    /// Show members listed on a role but on none of its sub-roles
    Members(RoleArg),

    /// Create a sub-role
    Create(CreateArgs),

    /// Delete a role and every role below it
    Delete(RoleArg),
}

#[derive(Args, Debug)]
pub struct RoleArg {
    /// Role id, segments joined by '-' (empty for the root)
    #[arg(value_parser = parse_role, default_value = "")]
    pub role: RoleId,
}

#[derive(Args, Debug)]
pub struct FilterArgs {
    /// Pattern; '*' stands for one segment, and a match on leading
    /// segments includes every role below
    pub pattern: String,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Parent role id (empty for a top-level role)
    #[arg(value_parser = parse_role)]
    pub parent: RoleId,

    /// Name of the new segment, lowercase letters only
    pub name: String,

    /// Description of the new role
    #[arg(long, short, default_value = "")]
    pub description: String,
}

#[derive(Serialize)]
struct TreeNode {
    id: RoleId,
    depth: usize,
}

/// Execute role commands
pub fn execute(session: &Session, args: RolesArgs) -> CliResult<()> {
    match args.command {
        RolesCommands::List(a) => execute_list(session, a),
        RolesCommands::Tree(a) => execute_tree(session, a),
        RolesCommands::Filter(a) => execute_filter(session, a),
        RolesCommands::Info(a) => execute_info(session, a),
        RolesCommands::Members(a) => execute_members(session, a),
        RolesCommands::Create(a) => execute_create(session, a),
        RolesCommands::Delete(a) => execute_delete(session, a),
    }
}

fn execute_list(session: &Session, args: RoleArg) -> CliResult<()> {
    let mut agent = session.connect()?;
    let roles = agent.role_names_in_role(&args.role)?;

    if session.json {
        return print_json(&roles);
    }
    if roles.is_empty() {
        println!("No sub-roles under {}.", role_label(&args.role.to_string()));
        return Ok(());
    }
    println!("{:<40} DESCRIPTION", "ROLE");
    println!("{}", "-".repeat(80));
    for (id, description) in &roles {
        println!("{:<40} {}", id.to_string(), truncate(description, 39));
    }
    Ok(())
}

fn execute_tree(session: &Session, args: RoleArg) -> CliResult<()> {
    let mut agent = session.connect()?;
    let mut ids = agent
        .list_sub_roles(&args.role)?
        .iter()
        .map(|dn| agent.codec().role_id(dn))
        .collect::<Result<Vec<_>, _>>()?;
    // Lexicographic segment order puts every role right after its parent.
    ids.sort();

    let base = args.role.depth();
    let nodes: Vec<TreeNode> = ids
        .into_iter()
        .map(|id| TreeNode {
            depth: id.depth() - base,
            id,
        })
        .collect();

    if session.json {
        return print_json(&nodes);
    }
    for node in &nodes {
        println!(
            "{}{}",
            "  ".repeat(node.depth),
            role_label(&node.id.to_string())
        );
    }
    Ok(())
}

fn execute_filter(session: &Session, args: FilterArgs) -> CliResult<()> {
    let mut agent = session.connect()?;
    let roles = agent.filter_roles(&args.pattern)?;

    if session.json {
        return print_json(&roles);
    }
    for role in &roles {
        println!("{role}");
    }
    Ok(())
}

fn execute_info(session: &Session, args: RoleArg) -> CliResult<()> {
    let mut agent = session.connect()?;
    let info = agent.role_info(&args.role)?;

    if session.json {
        return print_json(&info);
    }
    print_key_value("Role", role_label(&info.id.to_string()));
    print_key_value("DN", &info.dn);
    print_key_value("Description", &info.description);
    Ok(())
}

fn execute_members(session: &Session, args: RoleArg) -> CliResult<()> {
    let mut agent = session.connect()?;
    let members = agent.members_in_role(&args.role)?;

    if session.json {
        return print_json(&members);
    }
    if members.is_empty() {
        println!("No direct members.");
        return Ok(());
    }
    for user in &members.users {
        println!("user:{user}");
    }
    for org in &members.orgs {
        println!("org:{org}");
    }
    Ok(())
}

fn execute_create(session: &Session, args: CreateArgs) -> CliResult<()> {
    let mut agent = session.connect_bound()?;
    let role = agent.create_child_role(&args.parent, &args.name, &args.description)?;

    if session.json {
        return print_json(&agent.role_info(&role)?);
    }
    print_success(&format!("Created role {role}"));
    Ok(())
}

fn execute_delete(session: &Session, args: RoleArg) -> CliResult<()> {
    let mut agent = session.connect_bound()?;
    let deleted = agent.delete_role(&args.role)?;

    if session.json {
        return print_json(&deleted);
    }
    for role in &deleted {
        println!("deleted {role}");
    }
    print_success(&format!("Deleted {} role(s)", deleted.len()));
    Ok(())
}
