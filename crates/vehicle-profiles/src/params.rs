//! Parameter library
//!
//! The library maps every parameter name to its description and the settings
//! (unit, class, display hints) copied onto enriched parameters. It is loaded
//! once per build and shared read-only by every resolver task.

use crate::error::CompileError;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, warn};

/// Misspelled description keys found in older library files
pub const DESCRIPTION_ALIASES: &[&str] = &["descripton", "desciption"];

/// Keys owned by the enriched parameter record itself
pub const RESERVED_SETTING_KEYS: &[&str] = &["name", "expression"];

/// Metadata for one named parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDefinition {
    /// Unique parameter name
    pub name: String,
    /// Free-text description
    pub description: Option<String>,
    /// Extra keys copied verbatim onto enriched parameters
    pub settings: Map<String, Value>,
}

impl ParameterDefinition {
    /// Create a definition without description or settings
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            settings: Map::new(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a setting
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    fn from_entry(path: &Path, name: &str, entry: &Value) -> Result<Self, CompileError> {
        let object = entry.as_object().ok_or_else(|| {
            CompileError::parameter_library(path, format!("entry '{name}' is not an object"))
        })?;

        let description = std::iter::once("description")
            .chain(DESCRIPTION_ALIASES.iter().copied())
            .find_map(|key| object.get(key).and_then(Value::as_str))
            .map(str::to_string);

        let settings = match object.get("settings") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(settings)) => settings.clone(),
            Some(_) => {
                return Err(CompileError::parameter_library(
                    path,
                    format!("settings of '{name}' is not an object"),
                ));
            }
        };

        for key in RESERVED_SETTING_KEYS {
            if settings.contains_key(*key) {
                warn!(parameter = %name, key = %key, "Ignoring reserved key in parameter settings");
            }
        }

        Ok(Self {
            name: name.to_string(),
            description,
            settings,
        })
    }
}

/// Read-only table of parameter definitions, in library file order
#[derive(Debug, Clone, Default)]
pub struct ParameterLibrary {
    definitions: IndexMap<String, ParameterDefinition>,
}

impl ParameterLibrary {
    /// Build a library from definitions; later duplicates replace earlier ones
    /// and keep the first position
    pub fn from_definitions(definitions: impl IntoIterator<Item = ParameterDefinition>) -> Self {
        Self {
            definitions: definitions
                .into_iter()
                .map(|definition| (definition.name.clone(), definition))
                .collect(),
        }
    }

    /// Parse the library from JSON text (`name -> {description, settings}`)
    pub fn from_json(path: &Path, text: &str) -> Result<Self, CompileError> {
        let value: Value = serde_json::from_str(text).map_err(|e| CompileError::json(path, e))?;
        let entries = value
            .as_object()
            .ok_or_else(|| CompileError::parameter_library(path, "top-level value is not an object"))?;

        let definitions = entries
            .iter()
            .map(|(name, entry)| ParameterDefinition::from_entry(path, name, entry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_definitions(definitions))
    }

    /// Load the library file
    ///
    /// A missing or malformed file is fatal; there is no degraded mode.
    pub async fn load(path: &Path) -> Result<Self, CompileError> {
        debug!(path = ?path, "Loading parameter library");
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CompileError::io(path, e))?;
        Self::from_json(path, &text)
    }

    /// Look up a parameter by name
    pub fn get(&self, name: &str) -> Option<&ParameterDefinition> {
        self.definitions.get(name)
    }

    /// Check whether a parameter exists
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Parameter names in library order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// All definitions in library order
    pub fn iter(&self) -> impl Iterator<Item = &ParameterDefinition> {
        self.definitions.values()
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the library is empty
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    const LIBRARY: &str = r#"{
        "SOC": {"description": "State of charge", "settings": {"unit": "%", "class": "battery"}},
        "HV_V": {"descripton": "Battery voltage", "settings": {"unit": "V"}},
        "ODO": {}
    }"#;

    #[test]
    fn keeps_file_order() -> TestResult {
        let library = ParameterLibrary::from_json(Path::new("params.json"), LIBRARY)?;
        let names: Vec<&str> = library.names().collect();
        assert_eq!(names, vec!["SOC", "HV_V", "ODO"]);
        Ok(())
    }

    #[test]
    fn reads_misspelled_description() -> TestResult {
        let library = ParameterLibrary::from_json(Path::new("params.json"), LIBRARY)?;
        let hv = library.get("HV_V").ok_or("HV_V should exist")?;
        assert_eq!(hv.description.as_deref(), Some("Battery voltage"));
        Ok(())
    }

    #[test]
    fn missing_settings_default_to_empty() -> TestResult {
        let library = ParameterLibrary::from_json(Path::new("params.json"), LIBRARY)?;
        let odo = library.get("ODO").ok_or("ODO should exist")?;
        assert!(odo.settings.is_empty());
        assert!(odo.description.is_none());
        Ok(())
    }

    #[test]
    fn unknown_name_is_none() -> TestResult {
        let library = ParameterLibrary::from_json(Path::new("params.json"), LIBRARY)?;
        assert!(library.get("SOH").is_none());
        assert!(!library.contains("SOH"));
        Ok(())
    }

    #[test]
    fn non_object_entry_is_rejected() {
        let result = ParameterLibrary::from_json(Path::new("params.json"), r#"{"SOC": "%"}"#);
        assert!(matches!(result, Err(CompileError::ParameterLibrary { .. })));
    }

    #[tokio::test]
    async fn missing_file_is_fatal() -> TestResult {
        let temp_dir = TempDir::new()?;
        let result = ParameterLibrary::load(&temp_dir.path().join("params.json")).await;
        match result {
            Err(err) => assert!(!err.is_recoverable()),
            Ok(_) => return Err("missing library should fail".into()),
        }
        Ok(())
    }

    #[test]
    fn duplicate_definitions_replace_in_place() {
        let library = ParameterLibrary::from_definitions([
            ParameterDefinition::new("SOC").with_setting("unit", "%"),
            ParameterDefinition::new("ODO"),
            ParameterDefinition::new("SOC").with_setting("unit", "pct"),
        ]);
        let names: Vec<&str> = library.names().collect();
        assert_eq!(names, vec!["SOC", "ODO"]);
        assert_eq!(
            library.get("SOC").and_then(|d| d.settings.get("unit")),
            Some(&Value::from("pct"))
        );
    }
}
