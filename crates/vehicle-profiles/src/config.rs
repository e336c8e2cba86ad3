//! Build configuration

use crate::error::CompileError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Dotted path of the parameter-name enumeration inside the JSON schema
pub const DEFAULT_SCHEMA_ENUM_PATH: &str =
    "properties.pids.items.properties.parameters.propertyNames.enum";

/// Default bound on extends hops
pub const DEFAULT_MAX_INHERITANCE_DEPTH: usize = 16;

/// Default bound on in-flight fragment tasks
pub const DEFAULT_MAX_CONCURRENCY: usize = 32;

/// Location of the generated documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    /// Root searched for the generated documents
    pub root: PathBuf,
    /// Regex for the supported vehicles document, relative to `root`
    pub vehicles_pattern: String,
    /// Regex for the supported parameters document, relative to `root`
    pub parameters_pattern: String,
    /// File name used beside the vehicles document when no parameters document exists
    pub parameters_fallback: String,
    /// Static body of the vehicles document; built in when unset
    pub vehicles_template: Option<PathBuf>,
    /// Static body of the parameters document; built in when unset
    pub parameters_template: Option<PathBuf>,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("docs/content"),
            vehicles_pattern: r"^[^/]*\.Config/[^/]*\.Automate/[^/]*\.Supported_Vehicles\.md$"
                .to_string(),
            parameters_pattern: r"^[^/]*\.Config/[^/]*\.Automate/[^/]*\.Supported_Parameters\.md$"
                .to_string(),
            parameters_fallback: "3.Supported_Parameters.md".to_string(),
            vehicles_template: None,
            parameters_template: None,
        }
    }
}

/// Everything one build reads and writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Directory tree of profile fragments
    pub profiles_dir: PathBuf,
    /// Parameter library file
    pub params_path: PathBuf,
    /// JSON schema for raw fragments
    pub schema_path: PathBuf,
    /// Compiled artifact
    pub artifact_path: PathBuf,
    /// Dotted path of the parameter-name enumeration in the schema
    pub schema_enum_path: String,
    /// Note file looked up beside each leaf fragment
    pub note_file: String,
    /// Write the artifact with two-space indentation
    pub pretty: bool,
    /// Maximum number of ancestors a fragment may have
    pub max_inheritance_depth: usize,
    /// Maximum number of fragments processed at once
    pub max_concurrency: usize,
    /// Generated documents
    pub docs: DocsConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            profiles_dir: PathBuf::from("vehicle_profiles"),
            params_path: PathBuf::from(".vehicle_profiles/params.json"),
            schema_path: PathBuf::from(".vehicle_profiles/schema.json"),
            artifact_path: PathBuf::from("vehicle_profiles.json"),
            schema_enum_path: DEFAULT_SCHEMA_ENUM_PATH.to_string(),
            note_file: "note.md".to_string(),
            pretty: true,
            max_inheritance_depth: DEFAULT_MAX_INHERITANCE_DEPTH,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            docs: DocsConfig::default(),
        }
    }
}

impl BuildConfig {
    /// Conventional layout under a repository root
    pub fn for_root(root: impl AsRef<Path>) -> Self {
        let mut config = Self::default();
        config.resolve_relative_to(root.as_ref());
        config
    }

    /// Load overrides from a YAML file; relative paths resolve against `root`
    pub fn from_yaml_file(path: &Path, root: &Path) -> Result<Self, CompileError> {
        let text = std::fs::read_to_string(path).map_err(|e| CompileError::io(path, e))?;
        let mut config: Self = serde_yaml::from_str(&text)
            .map_err(|e| CompileError::Config(format!("{}: {}", path.display(), e)))?;
        config.resolve_relative_to(root);
        config.check()?;
        Ok(config)
    }

    /// Join every relative path onto `root`
    pub fn resolve_relative_to(&mut self, root: &Path) {
        for path in [
            &mut self.profiles_dir,
            &mut self.params_path,
            &mut self.schema_path,
            &mut self.artifact_path,
            &mut self.docs.root,
        ] {
            rebase(path, root);
        }
        for template in [&mut self.docs.vehicles_template, &mut self.docs.parameters_template]
            .into_iter()
            .flatten()
        {
            rebase(template, root);
        }
    }

    /// Reject values no build can run with
    pub fn check(&self) -> Result<(), CompileError> {
        if self.max_concurrency == 0 {
            return Err(CompileError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.schema_enum_path.split('.').any(str::is_empty) {
            return Err(CompileError::Config(format!(
                "schema_enum_path '{}' has an empty segment",
                self.schema_enum_path
            )));
        }
        if self.note_file.trim().is_empty() {
            return Err(CompileError::Config("note_file must not be empty".to_string()));
        }
        Ok(())
    }

    /// Set the profiles directory
    pub fn with_profiles_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.profiles_dir = path.into();
        self
    }

    /// Set the parameter library path
    pub fn with_params_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.params_path = path.into();
        self
    }

    /// Set the schema path
    pub fn with_schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = path.into();
        self
    }

    /// Set the artifact path
    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = path.into();
        self
    }

    /// Set the docs root
    pub fn with_docs_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.docs.root = path.into();
        self
    }

    /// Set pretty or compact artifact output
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Set the inheritance depth bound
    pub fn with_max_inheritance_depth(mut self, depth: usize) -> Self {
        self.max_inheritance_depth = depth;
        self
    }
}

fn rebase(path: &mut PathBuf, root: &Path) {
    if path.is_relative() {
        *path = root.join(&*path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn for_root_uses_conventional_layout() {
        let config = BuildConfig::for_root("/repo");
        assert_eq!(config.profiles_dir, PathBuf::from("/repo/vehicle_profiles"));
        assert_eq!(
            config.params_path,
            PathBuf::from("/repo/.vehicle_profiles/params.json")
        );
        assert_eq!(config.artifact_path, PathBuf::from("/repo/vehicle_profiles.json"));
        assert_eq!(config.docs.root, PathBuf::from("/repo/docs/content"));
        assert!(config.docs.vehicles_template.is_none());
    }

    #[test]
    fn yaml_overrides_are_rebased() -> TestResult {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("profilec.yaml");
        std::fs::write(
            &config_path,
            "profiles_dir: profiles\npretty: false\ndocs:\n  vehicles_template: md/vehicles.md\n",
        )?;

        let config = BuildConfig::from_yaml_file(&config_path, temp_dir.path())?;

        assert_eq!(config.profiles_dir, temp_dir.path().join("profiles"));
        assert!(!config.pretty);
        assert_eq!(
            config.docs.vehicles_template,
            Some(temp_dir.path().join("md/vehicles.md"))
        );
        assert_eq!(config.schema_enum_path, DEFAULT_SCHEMA_ENUM_PATH);
        Ok(())
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = BuildConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(config.check(), Err(CompileError::Config(_))));
    }

    #[test]
    fn empty_enum_segment_is_rejected() {
        let config = BuildConfig {
            schema_enum_path: "properties..enum".to_string(),
            ..Default::default()
        };
        assert!(config.check().is_err());
    }
}
