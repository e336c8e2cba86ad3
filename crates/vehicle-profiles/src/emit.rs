//! Artifact and documentation rendering
//!
//! Everything here works in memory; writing is left to the caller so that
//! a drift check can compare rendered bytes against the files on disk.

use crate::config::DocsConfig;
use crate::enrich::ResolvedProfile;
use crate::error::CompileError;
use crate::fragment::GENERIC_CAR_MODEL;
use crate::params::ParameterLibrary;
use crate::storage::read_optional;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Header placed above every generated document
pub const GENERATED_BANNER: &str = "<!--\n\n\
================================================================\n\
THIS FILE WAS GENERATED! DO NOT UPDATE OR YOUR CHANGES ARE LOST!\n\
================================================================\n\n\
-->\n";

/// Body of the vehicles document when no template file is configured
pub const VEHICLES_TEMPLATE: &str = "# Supported Vehicles\n\
WiCAN vehicle profiles are available for the vehicles listed below. These profiles contain \
vehicle-specific parameters, primarily for electric vehicles, but in some cases, standard \
vehicles may also have specific parameters such as odometer readings or fuel level.\n\n\
If your vehicle is a non-electric or hybrid model, you can try scanning standard PIDs using \
the Automate tab:\n\
https://meatpihq.github.io/wican-fw/config/automate/usage#standard-pids\n";

/// Body of the parameters document when no template file is configured
pub const PARAMETERS_TEMPLATE: &str = "# Supported Parameters\n\n\
| Parameter | Description | Settings |\n\
| --- | --- | --- |\n";

/// The compiled artifact: every resolved profile in display order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Artifact {
    /// Profiles sorted by [`sort_profiles`]
    pub cars: Vec<ResolvedProfile>,
}

impl Artifact {
    /// Create an artifact, sorting `cars` into display order
    pub fn new(mut cars: Vec<ResolvedProfile>) -> Self {
        sort_profiles(&mut cars);
        Self { cars }
    }

    /// Serialize as `{"cars": [...]}`
    pub fn to_json(&self, pretty: bool) -> Result<String, serde_json::Error> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }

    /// Profiles that appear in the vehicles document
    pub fn documented(&self) -> impl Iterator<Item = &ResolvedProfile> {
        self.cars
            .iter()
            .filter(|car| car.listed_in_docs && car.car_model != GENERIC_CAR_MODEL)
    }
}

/// Sort case-insensitively by display name
///
/// Names equal ignoring case are ordered by exact name, then by source key.
pub fn sort_profiles(cars: &mut [ResolvedProfile]) {
    cars.sort_by(|a, b| {
        a.car_model
            .to_lowercase()
            .cmp(&b.car_model.to_lowercase())
            .then_with(|| a.car_model.cmp(&b.car_model))
            .then_with(|| a.source.cmp(&b.source))
    });
}

/// Bullet rows of the vehicles document
pub fn vehicle_rows(artifact: &Artifact) -> String {
    artifact
        .documented()
        .map(|car| match &car.note {
            Some(note) => format!("- {} {}\n", car.car_model, note),
            None => format!("- {}\n", car.car_model),
        })
        .collect()
}

/// Table rows of the parameters document, in library order
pub fn parameter_rows(library: &ParameterLibrary) -> String {
    library
        .iter()
        .map(|definition| {
            let settings = definition
                .settings
                .iter()
                .map(|(key, value)| format!("{key}: {}", setting_text(value)))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "| `{}` | {} | {} |\n",
                definition.name,
                definition.description.as_deref().unwrap_or_default(),
                settings
            )
        })
        .collect()
}

fn setting_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Banner, then the static body, then the generated rows
pub fn render_document(template: &str, rows: &str) -> String {
    let mut document = String::with_capacity(
        GENERATED_BANNER.len() + template.len() + rows.len() + 1,
    );
    document.push_str(GENERATED_BANNER);
    document.push_str(template);
    if !template.is_empty() && !template.ends_with('\n') {
        document.push('\n');
    }
    document.push_str(rows);
    document
}

/// Read a template file, or fall back to the built-in body
pub async fn load_template(path: Option<&Path>, builtin: &str) -> Result<String, CompileError> {
    let Some(path) = path else {
        return Ok(builtin.to_string());
    };
    read_optional(path).await?.ok_or_else(|| {
        CompileError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "template not found"),
        )
    })
}

/// Files under `root` whose `/`-separated relative path matches `pattern`
pub fn find_candidates(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, CompileError> {
    let regex = Regex::new(pattern).map_err(|source| CompileError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
            CompileError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if regex.is_match(&relative) {
            candidates.push(entry.path().to_path_buf());
        }
    }
    candidates.sort();
    debug!(root = ?root, pattern = %pattern, count = candidates.len(), "Searched for document target");
    Ok(candidates)
}

/// The single file matching `pattern`; zero or several matches are an error
pub fn locate_document(root: &Path, pattern: &str) -> Result<PathBuf, CompileError> {
    let mut candidates = find_candidates(root, pattern)?;
    match candidates.len() {
        1 => candidates.pop().ok_or_else(|| target_error(root, pattern, 0)),
        found => Err(target_error(root, pattern, found)),
    }
}

/// Target of the parameters document
///
/// Without a match, the fallback file name beside the vehicles document is
/// used; several matches are an error.
pub fn locate_parameters_document(
    docs: &DocsConfig,
    vehicles_document: &Path,
) -> Result<PathBuf, CompileError> {
    let mut candidates = find_candidates(&docs.root, &docs.parameters_pattern)?;
    match candidates.len() {
        0 => Ok(vehicles_document.with_file_name(&docs.parameters_fallback)),
        1 => candidates
            .pop()
            .ok_or_else(|| target_error(&docs.root, &docs.parameters_pattern, 0)),
        found => Err(target_error(&docs.root, &docs.parameters_pattern, found)),
    }
}

fn target_error(root: &Path, pattern: &str, found: usize) -> CompileError {
    CompileError::DocumentTarget {
        pattern: pattern.to_string(),
        root: root.to_path_buf(),
        found,
    }
}

/// One output with its destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    /// Destination path
    pub path: PathBuf,
    /// Full file content
    pub content: String,
}

/// Every build output, rendered but not yet written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedOutputs {
    /// The JSON artifact
    pub artifact: RenderedFile,
    /// The supported vehicles document
    pub vehicles: RenderedFile,
    /// The supported parameters document
    pub parameters: RenderedFile,
}

impl RenderedOutputs {
    /// All outputs, artifact first
    pub fn files(&self) -> [&RenderedFile; 3] {
        [&self.artifact, &self.vehicles, &self.parameters]
    }
}
