//! CLI module for the buildtest harness
//!
//! This module provides the command-line interface over the harness library, mostly for
//! inspecting fixtures and reproducing a test build by hand.
//!
//! ## Commands
//!
//! - `samples` - List discovered samples and their projects
//! - `packages` - List the local package catalog
//! - `cache clear|path` - Reset the scratch area or print where it lives
//! - `build <sample>` - Clone a sample project, restore and build it
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::path::PathBuf;
use std::process;

use buildtest_core::Severity;
use clap::{Parser, Subcommand};

use crate::error::HarnessError;
use crate::version::BUILDTEST_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Harness errors are rendered with their code, source chain and help text.
impl From<HarnessError> for CliError {
    fn from(error: HarnessError) -> Self {
        CliError::failure(format!("{:?}", miette::Report::new(error)))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Fixtures for testing build-tool projects
#[derive(Parser, Debug)]
#[command(name = "buildtest")]
#[command(version = BUILDTEST_VERSION)]
#[command(about = "Discover, clone and build sample projects in isolation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List samples, their default project and every project file
    Samples {
        /// Samples root (default: configuration, then ./samples)
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List package archives in the local feed
    Packages {
        /// Packages directory (default: configuration, then ./packages)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Manage the scratch area
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Clone a sample project, restore it and run targets against it
    Build {
        /// Sample name (its directory name)
        #[arg(value_name = "SAMPLE")]
        sample: String,
        /// Project name prefix (default: the sample's default project)
        #[arg(long, value_name = "NAME")]
        project: Option<String>,
        /// Target to run; repeatable (default: Build)
        #[arg(short = 't', long = "target", value_name = "TARGET")]
        targets: Vec<String>,
        /// Global property; repeatable
        #[arg(short = 'p', long = "property", value_name = "KEY=VALUE", value_parser = parse_property)]
        properties: Vec<(String, String)>,
        /// Build tool to run instead of `dotnet msbuild`
        #[arg(long, value_name = "PROGRAM")]
        engine: Option<String>,
        /// Argument placed before the generated ones; repeatable
        #[arg(long = "engine-arg", value_name = "ARG", requires = "engine", allow_hyphen_values = true)]
        engine_args: Vec<String>,
        /// Minimum severity echoed while building
        #[arg(long, value_name = "LEVEL")]
        verbosity: Option<Severity>,
        /// Samples root (default: configuration, then ./samples)
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,
        /// Print the build result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// Delete the scratch area and write fresh feed files
    Clear,
    /// Print the scratch area location
    Path,
}

/// `KEY=VALUE`, key non-empty.
fn parse_property(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Some(Command::Samples { root, json }) => commands::list_samples(root, json),
        Some(Command::Packages { dir, json }) => commands::list_packages(dir, json),
        Some(Command::Cache { action }) => commands::cache(action),
        Some(Command::Build {
            sample,
            project,
            targets,
            properties,
            engine,
            engine_args,
            verbosity,
            root,
            json,
        }) => commands::build_sample(commands::BuildArgs {
            sample,
            project,
            targets,
            properties,
            engine,
            engine_args,
            verbosity,
            root,
            json,
        }),
        // No command - show help
        None => Err(CliError::failure("no command given; run `buildtest --help`")),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_samples() {
        let cli = Cli::try_parse_from(["buildtest", "samples", "--root", "fixtures", "--json"]).unwrap();
        if let Some(Command::Samples { root, json }) = cli.command {
            assert_eq!(root, Some(PathBuf::from("fixtures")));
            assert!(json);
        } else {
            panic!("Expected Samples command");
        }
    }

    #[test]
    fn test_cli_parse_cache_actions() {
        let cli = Cli::try_parse_from(["buildtest", "cache", "clear"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Cache { action: CacheAction::Clear })));
        let cli = Cli::try_parse_from(["buildtest", "cache", "path"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Cache { action: CacheAction::Path })));
    }

    #[test]
    fn test_cli_parse_build() {
        let cli = Cli::try_parse_from([
            "buildtest",
            "build",
            "Library",
            "--project",
            "Library.Tests",
            "-t",
            "Build",
            "-t",
            "Pack",
            "-p",
            "Configuration=Release",
            "--verbosity",
            "warn",
        ])
        .unwrap();
        if let Some(Command::Build {
            sample,
            project,
            targets,
            properties,
            verbosity,
            ..
        }) = cli.command
        {
            assert_eq!(sample, "Library");
            assert_eq!(project.as_deref(), Some("Library.Tests"));
            assert_eq!(targets, vec!["Build", "Pack"]);
            assert_eq!(properties, vec![("Configuration".to_string(), "Release".to_string())]);
            assert_eq!(verbosity, Some(Severity::Warning));
        } else {
            panic!("Expected Build command");
        }
    }

    #[test]
    fn test_cli_engine_args_require_engine() {
        assert!(Cli::try_parse_from(["buildtest", "build", "Library", "--engine-arg", "-v:q"]).is_err());
        let cli =
            Cli::try_parse_from(["buildtest", "build", "Library", "--engine", "msbuild", "--engine-arg", "-v:q"])
                .unwrap();
        if let Some(Command::Build { engine_args, .. }) = cli.command {
            assert_eq!(engine_args, vec!["-v:q"]);
        } else {
            panic!("Expected Build command");
        }
    }

    #[test]
    fn test_cli_rejects_bad_property_and_verbosity() {
        assert!(Cli::try_parse_from(["buildtest", "build", "Library", "-p", "=x"]).is_err());
        assert!(Cli::try_parse_from(["buildtest", "build", "Library", "-p", "novalue"]).is_err());
        assert!(Cli::try_parse_from(["buildtest", "build", "Library", "--verbosity", "loud"]).is_err());
    }

    #[test]
    fn test_parse_property_keeps_equals_in_value() {
        assert_eq!(
            parse_property("DefineConstants=A=1").unwrap(),
            ("DefineConstants".to_string(), "A=1".to_string())
        );
    }

    #[test]
    fn test_harness_error_becomes_failure() {
        let err: CliError = HarnessError::SampleNotFound { name: "Nope".into() }.into();
        assert_eq!(err.exit_code, ExitCode::FAILURE);
        assert!(err.message.contains("Nope"));
    }
}
