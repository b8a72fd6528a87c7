//! Library interface for the `pubship` CLI.
//!
//! Exposes the argument parser and the command implementation so they can
//! be tested and documented separately from `main.rs`.
//!
//! # Structure
//!
//! - [`Cli`] - The root argument parser (clap derive)
//! - [`commands`] - Command implementations

pub mod commands;

use clap::{CommandFactory, Parser};
use std::path::PathBuf;

/// Color output preference.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect terminal capabilities automatically.
    #[default]
    Auto,
    /// Always emit colors.
    Always,
    /// Never emit colors.
    Never,
}

impl ColorChoice {
    /// Configure global color output based on this choice.
    ///
    /// Call this once at startup to set the color mode.
    pub fn apply(self) {
        match self {
            Self::Auto => {} // owo-colors auto-detects by default
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }
}

const ENV_HELP: &str = "\
CONFIGURATION:
    .pubship.toml or pubship.toml in the project (yaml/json also accepted),
    ~/.config/pubship/config.toml for user defaults.

ENVIRONMENT VARIABLES:
    RUST_LOG             Log filter (e.g., debug, pubship_core=trace)
    PUBSHIP_LOG_PATH     Explicit log file path
    PUBSHIP_LOG_DIR      Log directory
";

/// Command-line interface definition for pubship.
#[derive(Parser)]
#[command(name = "pubship")]
#[command(
    about = "Bump a Flutter app's version, build the release APK and publish it to GitHub",
    long_about = None
)]
#[command(version)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// What to release and how.
    #[command(flatten)]
    pub ship: commands::ship::ShipArgs,

    /// Path to configuration file (overrides discovery)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run as if started in DIR
    #[arg(short = 'C', long, value_name = "DIR")]
    pub chdir: Option<PathBuf>,

    /// Only print errors (suppresses warnings/info)
    #[arg(short, long)]
    pub quiet: bool,

    /// More detail (repeatable; e.g. -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Colorize output
    #[arg(long, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Output the result as JSON (for scripting)
    #[arg(long)]
    pub json: bool,
}

/// Returns the clap command for documentation generation
pub fn command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        command().debug_assert();
    }

    #[test]
    fn parses_instruction_and_flags() {
        let cli = Cli::try_parse_from(["pubship", "--dry-run", "--no-draft", "-vv", "minor"]).unwrap();
        assert_eq!(cli.ship.instruction, "minor");
        assert!(cli.ship.dry_run);
        assert_eq!(cli.ship.draft_override(), Some(false));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn draft_flags_conflict() {
        assert!(Cli::try_parse_from(["pubship", "--draft", "--no-draft", "patch"]).is_err());
    }

    #[test]
    fn instruction_is_required() {
        assert!(Cli::try_parse_from(["pubship"]).is_err());
        assert!(Cli::try_parse_from(["pubship", "patch", "minor"]).is_err());
    }
}
