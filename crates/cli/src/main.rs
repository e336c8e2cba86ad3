//! profilec - Vehicle Profile Compiler CLI
//!
//! Compiles the vehicle profile fragment tree into the canonical artifact,
//! regenerates the supported vehicles and parameters documents, and keeps the
//! fragment JSON schema in sync with the parameter library.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod error;
mod output;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "profilec")]
#[command(about = "Vehicle profile compiler - build the profile artifact, docs and schema")]
#[command(version)]
#[command(long_about = "
profilec compiles a tree of layered vehicle profile fragments into one
canonical JSON artifact, regenerates the supported vehicles and supported
parameters documents, and keeps the fragment JSON schema in sync with the
parameter library.

Use --json for machine-readable output suitable for CI.
")]
struct Cli {
    /// Output format (human-readable or JSON)
    #[arg(
        long,
        global = true,
        help = "Output in JSON format for machine parsing"
    )]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    paths: PathArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Where the build reads and writes
#[derive(Args, Debug, Clone, Default)]
struct PathArgs {
    /// Repository root; relative paths in the config file resolve against it
    #[arg(long, global = true, env = "PROFILEC_ROOT", default_value = ".")]
    root: PathBuf,

    /// YAML build configuration (defaults to <root>/profilec.yaml when present)
    #[arg(long, global = true, env = "PROFILEC_CONFIG")]
    config: Option<PathBuf>,

    /// Directory tree of profile fragments
    #[arg(long, global = true, env = "PROFILEC_PROFILES_DIR")]
    profiles_dir: Option<PathBuf>,

    /// Parameter library file
    #[arg(long, global = true, env = "PROFILEC_PARAMS")]
    params: Option<PathBuf>,

    /// JSON schema for raw fragments
    #[arg(long, global = true, env = "PROFILEC_SCHEMA")]
    schema: Option<PathBuf>,

    /// Compiled artifact path
    #[arg(long, global = true, env = "PROFILEC_OUTPUT")]
    output: Option<PathBuf>,

    /// Root searched for the generated documents
    #[arg(long, global = true, env = "PROFILEC_DOCS_ROOT")]
    docs_root: Option<PathBuf>,

    /// Write the artifact without indentation
    #[arg(long, global = true)]
    compact: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Compile, write outputs, sync the schema and validate every fragment
    Build,

    /// Compile and write the artifact and documents only
    Compile,

    /// Validate every raw fragment against the schema
    Validate,

    /// Update the schema's parameter enumeration from the library
    SyncSchema,

    /// Fail when any output is out of date; writes nothing
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("profilec={log_level},vehicle_profiles={log_level}").into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match commands::execute(cli.command, &cli.paths, cli.json).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }
            ExitCode::from(error::exit_code(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn parse_build_defaults() -> TestResult {
        let cli = Cli::try_parse_from(["profilec", "build"])?;
        assert!(!cli.json);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.paths.compact);
        assert!(cli.paths.config.is_none());
        assert_eq!(cli.command, Commands::Build);
        Ok(())
    }

    #[test]
    fn parse_global_flags_after_subcommand() -> TestResult {
        let cli = Cli::try_parse_from([
            "profilec",
            "check",
            "--json",
            "--compact",
            "--root",
            "/repo",
            "--docs-root",
            "/repo/site",
        ])?;
        assert!(cli.json);
        assert!(cli.paths.compact);
        assert_eq!(cli.paths.root, PathBuf::from("/repo"));
        assert_eq!(cli.paths.docs_root, Some(PathBuf::from("/repo/site")));
        assert_eq!(cli.command, Commands::Check);
        Ok(())
    }

    #[test]
    fn parse_verbose_levels() -> TestResult {
        let cli = Cli::try_parse_from(["profilec", "-vvv", "validate"])?;
        assert_eq!(cli.verbose, 3);
        Ok(())
    }

    #[test]
    fn parse_sync_schema_kebab_case() -> TestResult {
        let cli = Cli::try_parse_from(["profilec", "sync-schema"])?;
        assert_eq!(cli.command, Commands::SyncSchema);
        Ok(())
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["profilec", "publish"]).is_err());
    }
}
