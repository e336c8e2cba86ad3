//! Command implementations

use anyhow::{Context, Result};
use tracing::debug;
use vehicle_profiles::{BuildConfig, ProfileCompiler};

use crate::error::CliError;
use crate::output;
use crate::{Commands, PathArgs};

/// Config file looked up under the root when `--config` is not given
const DEFAULT_CONFIG_FILE: &str = "profilec.yaml";

/// Execute one subcommand
pub async fn execute(command: Commands, paths: &PathArgs, json: bool) -> Result<()> {
    let config = load_config(paths)?;
    debug!(?config, "Resolved build configuration");
    let compiler = ProfileCompiler::new(config)?;

    match command {
        Commands::Build => {
            let summary = compiler.build().await?;
            output::print_build_summary(&summary, json);
        }
        Commands::Compile => {
            let artifact = compiler.compile().await?;
            let rendered = compiler.render(&artifact).await?;
            let written = compiler.emit(&rendered).await?;
            output::print_compile_summary(artifact.cars.len(), &written, json);
        }
        Commands::Validate => {
            let count = compiler.validate().await?;
            output::print_validation_success(count, json);
        }
        Commands::SyncSchema => {
            let updated = compiler.sync_schema().await?;
            output::print_schema_sync(&compiler.config().schema_path, updated, json);
        }
        Commands::Check => {
            let report = compiler.check().await?;
            output::print_check_report(&report, json);
            if !report.is_current() {
                return Err(CliError::OutOfDate(report.stale).into());
            }
        }
    }
    Ok(())
}

/// Build the configuration from the config file and command-line overrides
///
/// Paths given on the command line are used as given; paths in the config
/// file resolve against the root.
fn load_config(paths: &PathArgs) -> Result<BuildConfig> {
    let default_file = paths.root.join(DEFAULT_CONFIG_FILE);
    let config_file = paths
        .config
        .clone()
        .or_else(|| default_file.is_file().then_some(default_file));

    let mut config = match config_file {
        Some(file) => BuildConfig::from_yaml_file(&file, &paths.root)
            .with_context(|| format!("Failed to load configuration from {}", file.display()))?,
        None => BuildConfig::for_root(&paths.root),
    };

    if let Some(dir) = &paths.profiles_dir {
        config.profiles_dir = dir.clone();
    }
    if let Some(path) = &paths.params {
        config.params_path = path.clone();
    }
    if let Some(path) = &paths.schema {
        config.schema_path = path.clone();
    }
    if let Some(path) = &paths.output {
        config.artifact_path = path.clone();
    }
    if let Some(root) = &paths.docs_root {
        config.docs.root = root.clone();
    }
    if paths.compact {
        config.pretty = false;
    }

    config.check()?;
    Ok(config)
}
