//! Parameter enrichment and compiled profile types

use crate::error::CompileError;
use crate::fragment::{PidEntry, ProfileFragment};
use crate::params::{ParameterLibrary, RESERVED_SETTING_KEYS};
use crate::resolver::ParameterOrigins;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// A parameter joined with its library metadata
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedParameter {
    /// Parameter name, present in the library
    pub name: String,
    /// Expression after inheritance; never empty
    pub expression: String,
    /// Library settings, copied verbatim
    pub settings: Map<String, Value>,
}

impl Serialize for EnrichedParameter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let settings = self
            .settings
            .iter()
            .filter(|(key, _)| !RESERVED_SETTING_KEYS.contains(&key.as_str()));
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("expression", &self.expression)?;
        for (key, value) in settings {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// One PID of a compiled profile
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ResolvedPid {
    /// PID code
    pub pid: String,
    /// Optional initialization string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid_init: Option<String>,
    /// Parameters in merge order; never empty
    pub parameters: Vec<EnrichedParameter>,
    /// Unknown keys passed through from the fragment
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A fully resolved and enriched vehicle profile
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ResolvedProfile {
    /// Display name
    pub car_model: String,
    /// Opaque initialization string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init: Option<String>,
    /// PID table
    pub pids: Vec<ResolvedPid>,
    /// Unknown keys passed through from the leaf fragment
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Parenthesized note for the docs; not part of the artifact
    #[serde(skip)]
    pub note: Option<String>,
    /// Whether the profile is listed in the vehicles document
    #[serde(skip)]
    pub listed_in_docs: bool,
    /// Key of the leaf fragment
    #[serde(skip)]
    pub source: PathBuf,
}

/// Expand raw expressions into enriched parameters
///
/// Every name must exist in `library`; the first unknown name aborts with
/// [`CompileError::UnknownParameter`].
pub fn enrich_pid(
    fragment: &Path,
    pid: PidEntry,
    library: &ParameterLibrary,
) -> Result<ResolvedPid, CompileError> {
    let parameters = pid
        .parameters
        .into_iter()
        .map(|(name, expression)| {
            let definition =
                library
                    .get(&name)
                    .ok_or_else(|| CompileError::UnknownParameter {
                        fragment: fragment.to_path_buf(),
                        parameter: name.clone(),
                    })?;
            Ok(EnrichedParameter {
                settings: definition.settings.clone(),
                name,
                expression,
            })
        })
        .collect::<Result<Vec<_>, CompileError>>()?;

    Ok(ResolvedPid {
        pid: pid.pid,
        pid_init: pid.pid_init,
        parameters,
        extra: pid.extra,
    })
}

/// Enrich a merged fragment into a compiled profile
///
/// The fragment must carry a PID table; lone fragments without one are
/// rejected as [`CompileError::InvalidFragment`]. An unknown parameter is
/// reported against the fragment `origins` attributes it to, falling back to
/// `source`.
pub fn enrich_profile(
    source: &Path,
    fragment: ProfileFragment,
    library: &ParameterLibrary,
    origins: &ParameterOrigins,
) -> Result<ResolvedProfile, CompileError> {
    let listed_in_docs = fragment.listed_in_docs();
    let pids = fragment
        .pids
        .ok_or_else(|| CompileError::invalid_fragment(source, "no valid 'pids'"))?
        .into_iter()
        .map(|pid| {
            enrich_pid(source, pid, library).map_err(|error| match error {
                CompileError::UnknownParameter { parameter, .. } => {
                    CompileError::UnknownParameter {
                        fragment: origins.origin_of(&parameter).unwrap_or(source).to_path_buf(),
                        parameter,
                    }
                }
                other => other,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ResolvedProfile {
        car_model: fragment.car_model,
        init: fragment.init,
        pids,
        extra: fragment.extra,
        note: fragment.note,
        listed_in_docs,
        source: source.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterDefinition;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn library() -> ParameterLibrary {
        ParameterLibrary::from_definitions([ParameterDefinition::new("SOC")
            .with_description("State of charge")
            .with_setting("unit", "%")
            .with_setting("class", "battery")])
    }

    #[test]
    fn copies_library_settings() -> TestResult {
        let pid = enrich_pid(
            Path::new("tesla_model3.json"),
            PidEntry::new("22AB12", [("SOC", "A*0.4+1")]),
            &library(),
        )?;

        let json = serde_json::to_value(&pid)?;
        assert_eq!(
            json,
            serde_json::json!({
                "pid": "22AB12",
                "parameters": [
                    {"name": "SOC", "expression": "A*0.4+1", "unit": "%", "class": "battery"}
                ]
            })
        );
        Ok(())
    }

    #[test]
    fn unknown_parameter_is_named() {
        let result = enrich_pid(
            Path::new("ev/kona.json"),
            PidEntry::new("220101", [("SOC", "B4/2"), ("SOH", "B5")]),
            &library(),
        );
        match result {
            Err(CompileError::UnknownParameter { fragment, parameter }) => {
                assert_eq!(fragment, PathBuf::from("ev/kona.json"));
                assert_eq!(parameter, "SOH");
            }
            other => panic!("expected unknown parameter, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_inherited_parameter_names_its_origin() -> TestResult {
        use crate::resolver::InheritanceResolver;
        use crate::storage::MemorySource;

        let base = ProfileFragment {
            car_model: "AAA: Base".to_string(),
            pids: Some(vec![PidEntry::new("220101", [("SOH", "B5")])]),
            ..Default::default()
        };
        let leaf = ProfileFragment {
            car_model: "EV: Leaf".to_string(),
            extends: Some("base.json".to_string()),
            pids: Some(vec![PidEntry::new("22AB12", [("SOC", "A")])]),
            ..Default::default()
        };
        let source = MemorySource::new().with("base.json", base);
        let resolution = InheritanceResolver::new(&source, 16)
            .resolve(Path::new("leaf.json"), leaf)
            .await?;

        let result = enrich_profile(
            Path::new("leaf.json"),
            resolution.profile,
            &library(),
            &resolution.origins,
        );
        match result {
            Err(CompileError::UnknownParameter { fragment, parameter }) => {
                assert_eq!(fragment, PathBuf::from("base.json"));
                assert_eq!(parameter, "SOH");
                Ok(())
            }
            other => Err(format!("expected unknown parameter, got {other:?}").into()),
        }
    }

    #[test]
    fn reserved_settings_do_not_shadow_record_fields() -> TestResult {
        let parameter = EnrichedParameter {
            name: "SOC".to_string(),
            expression: "B4/2".to_string(),
            settings: Map::from_iter([
                ("name".to_string(), Value::from("shadow")),
                ("unit".to_string(), Value::from("%")),
            ]),
        };
        let json = serde_json::to_string(&parameter)?;
        assert_eq!(json, r#"{"name":"SOC","expression":"B4/2","unit":"%"}"#);
        Ok(())
    }

    #[test]
    fn artifact_entry_omits_docs_only_fields() -> TestResult {
        let fragment = ProfileFragment {
            car_model: "EV: Hidden".to_string(),
            init: Some("ATSP6;".to_string()),
            add_to_docs: Some(false),
            note: Some("beta".to_string()),
            comment: Some(Value::from("authors only")),
            extends: Some("generic.json".to_string()),
            pids: Some(vec![PidEntry::new("22AB12", [("SOC", "A")])]),
            ..Default::default()
        };

        let profile = enrich_profile(
            Path::new("hidden.json"),
            fragment,
            &library(),
            &ParameterOrigins::default(),
        )?;
        assert!(!profile.listed_in_docs);
        assert_eq!(profile.note.as_deref(), Some("beta"));

        let json = serde_json::to_value(&profile)?;
        let object = json.as_object().ok_or("profile should be an object")?;
        let keys: Vec<&str> = object.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["car_model", "init", "pids"]);
        Ok(())
    }

    #[test]
    fn missing_pids_is_recoverable() {
        let fragment = ProfileFragment {
            car_model: "EV: Empty".to_string(),
            ..Default::default()
        };
        let result = enrich_profile(
            Path::new("empty.json"),
            fragment,
            &library(),
            &ParameterOrigins::default(),
        );
        assert!(matches!(result, Err(ref e) if e.is_recoverable()));
    }
}
