//! User CLI commands

use clap::{Args, Subcommand};
use ldapadmin_agent::USER_FIELDS;

use super::Session;
use crate::error::CliResult;
use crate::output::{print_json, print_key_value, truncate};

/// User commands
#[derive(Args, Debug)]
pub struct UsersArgs {
    #[command(subcommand)]
    pub command: UsersCommands,
}

#[derive(Subcommand, Debug)]
pub enum UsersCommands {
    /// Show every field of a user
    Show {
        /// User id (uid)
        id: String,
    },

    /// Find users whose uid or name contains some text
    Search {
        text: String,
    },
}

/// Execute user commands
pub fn execute(session: &Session, args: UsersArgs) -> CliResult<()> {
    let mut agent = session.connect()?;
    match args.command {
        UsersCommands::Show { id } => {
            let user = agent.user_info(&id)?;
            if session.json {
                return print_json(&user);
            }
            print_key_value("id", &user.id);
            print_key_value("dn", &user.dn);
            for (field, _) in USER_FIELDS {
                print_key_value(field, user.field(field));
            }
            Ok(())
        }
        UsersCommands::Search { text } => {
            let users = agent.search_user(&text)?;
            if session.json {
                return print_json(&users);
            }
            if users.is_empty() {
                println!("No users found.");
                return Ok(());
            }
            println!("{:<20} {:<30} EMAIL", "ID", "NAME");
            println!("{}", "-".repeat(80));
            for user in &users {
                println!(
                    "{:<20} {:<30} {}",
                    user.id,
                    truncate(user.field("name"), 29),
                    user.field("email")
                );
            }
            Ok(())
        }
    }
}
