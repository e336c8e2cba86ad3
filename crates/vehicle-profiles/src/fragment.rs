//! Profile fragment data model
//!
//! A fragment is one JSON file under the profiles directory. Fragments are
//! parsed once and never mutated; the resolver works on copies.

use crate::error::CompileError;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Display name of the base profile that exists only to be extended
pub const GENERIC_CAR_MODEL: &str = "AAA: Generic";

/// Parameter expressions keyed by parameter name, in file order
pub type ParameterExpressions = IndexMap<String, String>;

/// One PID request and the raw expressions of the parameters it carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidEntry {
    /// PID code
    pub pid: String,
    /// Optional initialization string sent before the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid_init: Option<String>,
    /// Parameter name to expression
    pub parameters: ParameterExpressions,
    /// Unknown keys, passed through to the artifact
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PidEntry {
    /// Create a PID entry with the given expressions
    pub fn new<I, K, V>(pid: impl Into<String>, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pid: pid.into(),
            pid_init: None,
            parameters: parameters
                .into_iter()
                .map(|(name, expression)| (name.into(), expression.into()))
                .collect(),
            extra: Map::new(),
        }
    }
}

/// PID body when `pids` is written as a mapping keyed by PID code
#[derive(Debug, Deserialize)]
struct PidBody {
    #[serde(default)]
    pid_init: Option<String>,
    parameters: ParameterExpressions,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl PidBody {
    fn into_entry(self, pid: String) -> PidEntry {
        let mut extra = self.extra;
        extra.remove("pid");
        PidEntry {
            pid,
            pid_init: self.pid_init,
            parameters: self.parameters,
            extra,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PidsRepr {
    List(Vec<PidEntry>),
    Table(IndexMap<String, PidBody>),
}

fn deserialize_pids<'de, D>(deserializer: D) -> Result<Option<Vec<PidEntry>>, D::Error>
where
    D: Deserializer<'de>,
{
    let pids = match PidsRepr::deserialize(deserializer)? {
        PidsRepr::List(list) => list,
        PidsRepr::Table(table) => table
            .into_iter()
            .map(|(pid, body)| body.into_entry(pid))
            .collect(),
    };
    Ok(Some(pids))
}

/// One vehicle or base profile as written on disk
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ProfileFragment {
    /// Display name, conventionally `"<Category>: <Model>"`
    #[serde(default)]
    pub car_model: String,
    /// Opaque initialization string
    #[serde(default)]
    pub init: Option<String>,
    /// Path of the parent fragment, relative to the profiles directory
    #[serde(default)]
    pub extends: Option<String>,
    /// PID table; `None` when the file has no `pids` key at all
    #[serde(default, deserialize_with = "deserialize_pids")]
    pub pids: Option<Vec<PidEntry>>,
    /// Whether the profile is listed in the supported vehicles document
    #[serde(default)]
    pub add_to_docs: Option<bool>,
    /// Free-text annotation shown next to the vehicle in the docs
    #[serde(default)]
    pub note: Option<String>,
    /// Free-text comment for profile authors
    #[serde(default)]
    pub comment: Option<Value>,
    /// Unknown keys, passed through to the artifact
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProfileFragment {
    /// Parse a fragment from JSON text
    ///
    /// Broken JSON is fatal. A well-formed document with an unusable shape
    /// yields the recoverable [`CompileError::InvalidFragment`].
    pub fn from_json(path: &Path, text: &str) -> Result<Self, CompileError> {
        let value: Value = serde_json::from_str(text).map_err(|e| CompileError::json(path, e))?;
        Self::from_value(path, value)
    }

    /// Convert an already parsed JSON document into a fragment
    pub fn from_value(path: &Path, value: Value) -> Result<Self, CompileError> {
        if !value.is_object() {
            return Err(CompileError::invalid_fragment(
                path,
                "top-level value is not an object",
            ));
        }
        serde_json::from_value(value).map_err(|e| CompileError::invalid_fragment(path, e.to_string()))
    }

    /// Whether the profile belongs in the supported vehicles document
    pub fn listed_in_docs(&self) -> bool {
        self.add_to_docs.unwrap_or(true) && self.car_model != GENERIC_CAR_MODEL
    }
}
