//! Role membership CLI commands

use clap::{Args, Subcommand};
use ldapadmin_agent::{MemberRef, MembershipChange, RoleId};

use super::{parse_member, parse_role, Session};
use crate::error::CliResult;
use crate::output::{print_json, print_success, print_warning, role_label};

/// Membership commands
#[derive(Args, Debug)]
pub struct MembersArgs {
    #[command(subcommand)]
    pub command: MembersCommands,
}

#[derive(Subcommand, Debug)]
pub enum MembersCommands {
    /// Add a member to a role and every ancestor role
    Add(ChangeArgs),

    /// Remove a member from a role and every role below it
    Remove(ChangeArgs),

    /// List the roles a member belongs to
    Roles(MemberArg),
}

#[derive(Args, Debug)]
pub struct ChangeArgs {
    /// Role id, segments joined by '-'
    #[arg(value_parser = parse_role)]
    pub role: RoleId,

    /// Member as user:<uid>, org:<id>, or a bare uid
    #[arg(value_parser = parse_member)]
    pub member: MemberRef,
}

#[derive(Args, Debug)]
pub struct MemberArg {
    /// Member as user:<uid>, org:<id>, or a bare uid
    #[arg(value_parser = parse_member)]
    pub member: MemberRef,
}

/// Execute membership commands
pub fn execute(session: &Session, args: MembersArgs) -> CliResult<()> {
    match args.command {
        MembersCommands::Add(a) => {
            let mut agent = session.connect_bound()?;
            let change = agent.add_to_role(&a.role, &a.member)?;
            report(session, &change, "Added")
        }
        MembersCommands::Remove(a) => {
            let mut agent = session.connect_bound()?;
            let change = agent.remove_from_role(&a.role, &a.member)?;
            report(session, &change, "Removed")
        }
        MembersCommands::Roles(a) => execute_roles(session, a),
    }
}

fn report(session: &Session, change: &MembershipChange, verb: &str) -> CliResult<()> {
    if session.json {
        return print_json(change);
    }
    for role in change.root_first() {
        println!("  {}", role_label(&role.to_string()));
    }
    if let Some(stopped) = &change.stopped_at {
        println!(
            "Already a member of {} and its ancestors.",
            role_label(&stopped.to_string())
        );
    }
    for race in change.tolerated.iter().filter(|r| r.outcome.is_concurrent_write()) {
        print_warning(&format!(
            "{} changed concurrently on {} ({:?})",
            change.member,
            role_label(&race.role.to_string()),
            race.outcome
        ));
    }
    print_success(&format!(
        "{verb} {} on {} role(s)",
        change.member,
        change.roles.len()
    ));
    Ok(())
}

fn execute_roles(session: &Session, args: MemberArg) -> CliResult<()> {
    let mut agent = session.connect()?;
    let roles = agent.list_member_roles(&args.member)?;

    if session.json {
        return print_json(&roles);
    }
    if roles.is_empty() {
        println!("{} is not a member of any role.", args.member);
    }
    for role in &roles {
        println!("{role}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use ldapadmin_agent::MemberKind;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        cmd: MembersCommands,
    }

    #[test]
    fn test_add_args_parsing() {
        let cli = TestCli::try_parse_from(["test", "add", "eionet-nfp", "org:bridge_club"]).unwrap();
        match cli.cmd {
            MembersCommands::Add(a) => {
                assert_eq!(a.role.to_string(), "eionet-nfp");
                assert_eq!(a.member.kind, MemberKind::Organisation);
                assert_eq!(a.member.id, "bridge_club");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_remove_requires_member() {
        assert!(TestCli::try_parse_from(["test", "remove", "eionet"]).is_err());
        assert!(TestCli::try_parse_from(["test", "remove", "eionet", "team:x"]).is_err());
    }

    #[test]
    fn test_roles_args_parsing() {
        let cli = TestCli::try_parse_from(["test", "roles", "anne"]).unwrap();
        assert!(matches!(cli.cmd, MembersCommands::Roles(a) if a.member == MemberRef::user("anne")));
    }
}
