//! Organisation CLI commands

use clap::{Args, Subcommand};
use ldapadmin_agent::{FieldMap, OrganisationRecord, ORG_FIELDS};

use super::{field_map, parse_field, Session};
use crate::error::CliResult;
use crate::output::{print_json, print_key_value, print_success, truncate};

/// Organisation commands
#[derive(Args, Debug)]
pub struct OrgsArgs {
    #[command(subcommand)]
    pub command: OrgsCommands,
}

#[derive(Subcommand, Debug)]
pub enum OrgsCommands {
    /// Show every field of an organisation
    Show(IdArg),

    /// Create an organisation
    Create(FieldsArgs),

    /// Change fields of an organisation
    Update(UpdateArgs),

    /// Delete an organisation
    Delete(IdArg),

    /// Find organisations whose id or name contains some text
    Search(SearchArgs),
}

#[derive(Args, Debug)]
pub struct IdArg {
    /// Organisation id
    pub id: String,
}

#[derive(Args, Debug)]
pub struct FieldsArgs {
    /// Organisation id, lowercase letters and '_'
    pub id: String,

    /// Field to set, as FIELD=VALUE (repeatable)
    #[arg(long = "field", short = 'f', value_parser = parse_field)]
    pub fields: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub target: FieldsArgs,

    /// Clear every field not given, instead of keeping its current value
    #[arg(long)]
    pub replace: bool,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    pub text: String,
}

/// Execute organisation commands
pub fn execute(session: &Session, args: OrgsArgs) -> CliResult<()> {
    match args.command {
        OrgsCommands::Show(a) => {
            let mut agent = session.connect()?;
            let org = agent.org_info(&a.id)?;
            print_org(session, &org)
        }
        OrgsCommands::Create(a) => {
            let mut agent = session.connect_bound()?;
            agent.create_org(&a.id, &field_map(a.fields))?;
            if session.json {
                return print_json(&agent.org_info(&a.id)?);
            }
            print_success(&format!("Created organisation {}", a.id));
            Ok(())
        }
        OrgsCommands::Update(a) => execute_update(session, a),
        OrgsCommands::Delete(a) => {
            let mut agent = session.connect_bound()?;
            agent.delete_org(&a.id)?;
            print_success(&format!("Deleted organisation {}", a.id));
            Ok(())
        }
        OrgsCommands::Search(a) => {
            let mut agent = session.connect()?;
            let orgs = agent.search_org(&a.text)?;
            if session.json {
                return print_json(&orgs);
            }
            println!("{:<30} NAME", "ID");
            println!("{}", "-".repeat(80));
            for org in &orgs {
                println!("{:<30} {}", org.id, truncate(org.field("name"), 49));
            }
            Ok(())
        }
    }
}

/// Fields to write: the given ones over the current record unless
/// `replace` is set.
fn merged_fields(current: &OrganisationRecord, given: FieldMap, replace: bool) -> FieldMap {
    if replace {
        return given;
    }
    let mut fields = current.fields.clone();
    fields.extend(given);
    fields
}

fn execute_update(session: &Session, args: UpdateArgs) -> CliResult<()> {
    let mut agent = session.connect_bound()?;
    let current = agent.org_info(&args.target.id)?;
    let fields = merged_fields(&current, field_map(args.target.fields), args.replace);
    let applied = agent.set_org_info(&args.target.id, &fields)?;

    if session.json {
        return print_json(&agent.org_info(&args.target.id)?);
    }
    if applied.is_empty() {
        println!("Organisation {} unchanged.", args.target.id);
    } else {
        print_success(&format!(
            "Updated {} attribute(s) of {}",
            applied.len(),
            args.target.id
        ));
    }
    Ok(())
}

fn print_org(session: &Session, org: &OrganisationRecord) -> CliResult<()> {
    if session.json {
        return print_json(org);
    }
    print_key_value("id", &org.id);
    print_key_value("dn", &org.dn);
    for (field, _) in ORG_FIELDS {
        print_key_value(field, org.field(field));
    }
    Ok(())
}
