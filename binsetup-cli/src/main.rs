//! binsetup CLI - Command-line interface
//!
//! Installs yt-dlp and ffmpeg with resumable downloads.

mod commands;
mod error;
mod logging;

use clap::{Parser, Subcommand};

use commands::install::InstallArgs;
use commands::status::StatusArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "binsetup", version, about)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download, verify and install binaries (resumes partial downloads)
    Install(InstallArgs),
    /// Show which binaries are installed, partial or missing
    Status(StatusArgs),
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Install(args) => commands::install::run(args),
        Commands::Status(args) => commands::status::run(args),
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        if let Some(hint) = e.hint() {
            eprintln!("{}", hint);
        }
        std::process::exit(e.exit_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use commands::Target;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_install() {
        let cli = Cli::parse_from([
            "binsetup",
            "install",
            "yt-dlp",
            "--force",
            "--install-dir",
            "/tmp/bins",
            "-v",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.target, Target::YtDlp);
                assert!(args.force);
                assert_eq!(
                    args.common.install_dir.as_deref(),
                    Some(std::path::Path::new("/tmp/bins"))
                );
            }
            other => panic!("expected install, got {:?}", other),
        }
    }

    #[test]
    fn test_install_defaults_to_all() {
        let cli = Cli::parse_from(["binsetup", "install"]);
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.target, Target::All);
                assert!(!args.force);
            }
            other => panic!("expected install, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_status() {
        let cli = Cli::parse_from(["binsetup", "status", "--platform", "windows"]);
        match cli.command {
            Commands::Status(args) => {
                assert_eq!(args.common.platform.as_deref(), Some("windows"));
            }
            other => panic!("expected status, got {:?}", other),
        }
    }
}
