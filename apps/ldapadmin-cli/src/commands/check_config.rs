//! Configuration check command

use clap::Args;

use super::Session;
use crate::error::CliResult;
use crate::output::{print_json, print_key_value, print_success};

#[derive(Args, Debug)]
pub struct CheckConfigArgs {
    /// Also connect, and bind when a password is configured
    #[arg(long)]
    pub connect: bool,
}

/// Print the effective configuration with the password redacted.
pub fn execute(session: &Session, args: CheckConfigArgs) -> CliResult<()> {
    let config = session.config.redacted();
    if session.json {
        print_json(&config)?;
    } else {
        print!("{}", serde_yaml::to_string(&config)?);
    }

    if !args.connect {
        return Ok(());
    }

    if session.config.bind_password.is_some() {
        session.connect_bound()?;
        if !session.json {
            print_success(&format!("Bound to {} as {}", config.url(), config.bind_dn));
        }
    } else {
        session.connect()?;
        if !session.json {
            print_success(&format!("Connected to {}", config.url()));
            print_key_value("bind", "skipped, no password configured");
        }
    }
    Ok(())
}
