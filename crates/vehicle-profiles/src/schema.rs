//! JSON schema maintenance and raw fragment validation

use crate::error::{CompileError, ValidationFailure};
use crate::params::ParameterLibrary;
use crate::storage::write_atomic;
use jsonschema::Validator;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Replace the array at `enum_path` with `names`
///
/// Missing intermediate objects are created. Returns whether the document
/// changed, or the segment that could not be entered.
pub fn set_enum(schema: &mut Value, enum_path: &str, names: Vec<Value>) -> Result<bool, String> {
    let segments: Vec<&str> = enum_path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return Err(enum_path.to_string());
    };

    let mut current = schema;
    for segment in parents {
        current = current
            .as_object_mut()
            .ok_or_else(|| (*segment).to_string())?
            .entry(*segment)
            .or_insert_with(|| Value::Object(Map::new()));
    }

    let object = current.as_object_mut().ok_or_else(|| (*last).to_string())?;
    let names = Value::Array(names);
    if object.get(*last) == Some(&names) {
        return Ok(false);
    }
    object.insert((*last).to_string(), names);
    Ok(true)
}

/// Bring the schema's parameter enumeration in line with the library
///
/// The file is rewritten only when the enumeration changed. Returns whether
/// it was rewritten.
pub async fn sync_schema(
    path: &Path,
    enum_path: &str,
    library: &ParameterLibrary,
) -> Result<bool, CompileError> {
    let (schema, changed) = schema_with_enum(path, enum_path, library).await?;
    if !changed {
        debug!(path = ?path, "Schema parameter enumeration already current");
        return Ok(false);
    }

    let mut output = serde_json::to_string_pretty(&schema).map_err(|e| CompileError::json(path, e))?;
    output.push('\n');
    write_atomic(path, &output).await?;
    info!(path = ?path, parameters = library.len(), "Updated schema parameter enumeration");
    Ok(true)
}

/// Whether the schema file already lists exactly the library's names
pub async fn schema_is_current(
    path: &Path,
    enum_path: &str,
    library: &ParameterLibrary,
) -> Result<bool, CompileError> {
    let (_, changed) = schema_with_enum(path, enum_path, library).await?;
    Ok(!changed)
}

async fn schema_with_enum(
    path: &Path,
    enum_path: &str,
    library: &ParameterLibrary,
) -> Result<(Value, bool), CompileError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CompileError::io(path, e))?;
    let mut schema: Value = serde_json::from_str(&text).map_err(|e| CompileError::json(path, e))?;

    let names = library.names().map(Value::from).collect();
    let changed = set_enum(&mut schema, enum_path, names).map_err(|segment| {
        CompileError::SchemaPath {
            path: path.to_path_buf(),
            enum_path: enum_path.to_string(),
            segment,
        }
    })?;
    Ok((schema, changed))
}

/// Compiled JSON schema for raw fragments
pub struct SchemaValidator {
    path: PathBuf,
    validator: Validator,
}

impl SchemaValidator {
    /// Compile an already parsed schema
    pub fn from_value(path: &Path, schema: &Value) -> Result<Self, CompileError> {
        let validator = Validator::new(schema).map_err(|e| CompileError::SchemaCompilation {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            validator,
        })
    }

    /// Read and compile the schema file
    pub async fn load(path: &Path) -> Result<Self, CompileError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CompileError::io(path, e))?;
        let schema: Value = serde_json::from_str(&text).map_err(|e| CompileError::json(path, e))?;
        Self::from_value(path, &schema)
    }

    /// Path of the schema file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every violation in `instance`, or `None` when it is valid
    pub fn check(&self, fragment: &Path, instance: &Value) -> Option<ValidationFailure> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(instance)
            .map(|error| error.to_string())
            .collect();
        (!errors.is_empty()).then(|| ValidationFailure {
            path: fragment.to_path_buf(),
            errors,
        })
    }

    /// Validate raw fragment text; unparsable JSON counts as a violation
    pub fn check_text(&self, fragment: &Path, text: &str) -> Option<ValidationFailure> {
        match serde_json::from_str::<Value>(text) {
            Ok(instance) => self.check(fragment, &instance),
            Err(e) => Some(ValidationFailure {
                path: fragment.to_path_buf(),
                errors: vec![format!("invalid JSON: {e}")],
            }),
        }
    }
}
