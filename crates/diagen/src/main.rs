//! diagen CLI - `PlantUML` diagram generation.
//!
//! Provides commands for:
//! - `generate`: Render all diagrams and write the index
//! - `check-config`: Show the resolved configuration and validate it

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{CheckConfigArgs, GenerateArgs};
use output::Output;

/// diagen - `PlantUML` diagram generation.
#[derive(Parser)]
#[command(name = "diagen", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render diagrams from the source directory.
    Generate(GenerateArgs),
    /// Print the resolved configuration and check it.
    CheckConfig(CheckConfigArgs),
}

impl Commands {
    fn verbose(&self) -> bool {
        match self {
            Self::Generate(args) => args.verbose,
            Self::CheckConfig(args) => args.verbose,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.command.verbose() {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Generate(args) => args.execute(),
        Commands::CheckConfig(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate_with_verbose() {
        let cli = Cli::try_parse_from(["diagen", "generate", "--verbose", "-f", "svg"]).unwrap();
        assert!(cli.command.verbose());
        assert!(matches!(cli.command, Commands::Generate(_)));
    }

    #[test]
    fn test_parse_check_config() {
        let cli = Cli::try_parse_from(["diagen", "check-config"]).unwrap();
        assert!(!cli.command.verbose());
        assert!(matches!(cli.command, Commands::CheckConfig(_)));
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["diagen", "serve"]).is_err());
    }
}
