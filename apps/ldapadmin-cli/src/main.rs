//! ldapadmin - command-line administration of the delegated roles tree
//!
//! Reads the directory settings from a YAML file (see `check-config`),
//! connects, binds with the configured credentials for mutating commands,
//! and drives the roles agent.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

mod commands;
mod error;
mod logging;
mod output;

use commands::Session;
use error::CliResult;

/// ldapadmin - Roles, members and organisations in the directory
#[derive(Parser, Debug)]
#[command(name = "ldapadmin")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the YAML config file
    #[arg(
        long,
        global = true,
        env = "LDAPADMIN_CONFIG",
        default_value = commands::DEFAULT_CONFIG_PATH
    )]
    config: PathBuf,

    /// Log filter when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Print command output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Browse and edit the role tree
    Roles(commands::roles::RolesArgs),

    /// Add and remove role members
    Members(commands::members::MembersArgs),

    /// Manage organisations
    Orgs(commands::orgs::OrgsArgs),

    /// Look up users
    Users(commands::users::UsersArgs),

    /// Show the effective configuration
    CheckConfig(commands::check_config::CheckConfigArgs),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(&cli.log_level, cli.log_json) {
        e.print();
        std::process::exit(e.exit_code());
    }

    match run(cli) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let config = commands::load_config(&cli.config)?;
    debug!(config = ?config, "Configuration loaded");
    let session = Session::new(config, cli.json);

    match cli.command {
        Commands::Roles(args) => commands::roles::execute(&session, args),
        Commands::Members(args) => commands::members::execute(&session, args),
        Commands::Orgs(args) => commands::orgs::execute(&session, args),
        Commands::Users(args) => commands::users::execute(&session, args),
        Commands::CheckConfig(args) => commands::check_config::execute(&session, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ldapadmin",
            "roles",
            "filter",
            "eionet-*",
            "--json",
            "--config",
            "/etc/ldapadmin.yaml",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.config, PathBuf::from("/etc/ldapadmin.yaml"));
        assert!(matches!(cli.command, Commands::Roles(_)));
    }

    #[test]
    fn test_check_config_parsing() {
        let cli = Cli::try_parse_from(["ldapadmin", "check-config", "--connect"]).unwrap();
        assert!(matches!(cli.command, Commands::CheckConfig(a) if a.connect));
        assert_eq!(cli.log_level, "warn");
        assert!(!cli.log_json);
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["ldapadmin"]).is_err());
        assert!(Cli::try_parse_from(["ldapadmin", "groups"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
