//! Pipeline configuration.
//!
//! This configures the shape of the analysis itself -- which extensions
//! are admitted, how transforms are grouped into blocks, the criticality
//! set, and the severity mapping -- as opposed to the configuration of the
//! individual extensions, which travels in [`ExtensionConfiguration`]
//! entries and reaches each extension through its analysis context.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::difference::{Criticality, Severity};
use crate::error::{AnalysisError, ConfigurationError};

/// Include/exclude lists of extension ids (or names) for one extension
/// category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncludeExclude {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl IncludeExclude {
    /// Whether an extension with the given instance id and extension name
    /// is admitted. An empty include list admits everything not excluded.
    pub fn admits(&self, id: Option<&str>, name: &str) -> bool {
        let mentioned =
            |list: &[String]| list.iter().any(|e| Some(e.as_str()) == id || e == name);
        if !self.include.is_empty() && !mentioned(&self.include) {
            return false;
        }
        !mentioned(&self.exclude)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawPipelineConfiguration {
    analyzers: IncludeExclude,
    filters: IncludeExclude,
    transforms: IncludeExclude,
    reporters: IncludeExclude,
    matchers: IncludeExclude,
    transform_blocks: Vec<Vec<String>>,
    criticalities: Vec<Criticality>,
    severity_mapping: BTreeMap<Severity, String>,
    prune: Option<bool>,
}

/// The configuration of the analysis pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfiguration {
    pub analyzers: IncludeExclude,
    pub filters: IncludeExclude,
    pub transforms: IncludeExclude,
    pub reporters: IncludeExclude,
    pub matchers: IncludeExclude,
    /// Ordered blocks of transform ids/names; see the transform pipeline.
    pub transform_blocks: Vec<Vec<String>>,
    pub criticalities: BTreeSet<Criticality>,
    /// Total map from severity to one of the configured criticalities.
    pub severity_mapping: BTreeMap<Severity, Criticality>,
    /// Whether supplementary elements unreachable from the primary API
    /// are pruned from the forests after analysis.
    pub prune: bool,
}

impl Default for PipelineConfiguration {
    fn default() -> Self {
        PipelineConfiguration {
            analyzers: IncludeExclude::default(),
            filters: IncludeExclude::default(),
            transforms: IncludeExclude::default(),
            reporters: IncludeExclude::default(),
            matchers: IncludeExclude::default(),
            transform_blocks: Vec::new(),
            criticalities: Criticality::default_set().into_iter().collect(),
            severity_mapping: Criticality::default_severity_mapping(),
            prune: true,
        }
    }
}

impl PipelineConfiguration {
    /// Parse from the JSON shape. Missing criticalities and severity
    /// mapping fall back to the built-in defaults; a severity mapping
    /// that is present must be total and reference configured
    /// criticalities.
    pub fn from_json(node: &Value) -> Result<Self, AnalysisError> {
        let raw: RawPipelineConfiguration = serde_json::from_value(node.clone())
            .map_err(|e| AnalysisError::InvalidConfiguration(e.to_string()))?;

        let criticalities: BTreeSet<Criticality> = if raw.criticalities.is_empty() {
            Criticality::default_set().into_iter().collect()
        } else {
            raw.criticalities.into_iter().collect()
        };

        let mut names = BTreeSet::new();
        for criticality in &criticalities {
            if !names.insert(criticality.name.as_str()) {
                return Err(AnalysisError::InvalidConfiguration(format!(
                    "criticality '{}' is defined more than once",
                    criticality.name
                )));
            }
        }

        let severity_mapping = if raw.severity_mapping.is_empty() {
            Criticality::default_severity_mapping()
        } else {
            let mut mapping = BTreeMap::new();
            for (severity, name) in &raw.severity_mapping {
                let criticality = criticalities
                    .iter()
                    .find(|c| c.name == *name)
                    .cloned()
                    .ok_or_else(|| {
                        AnalysisError::InvalidConfiguration(format!(
                            "severity mapping references unknown criticality '{name}'"
                        ))
                    })?;
                mapping.insert(*severity, criticality);
            }
            mapping
        };

        let config = PipelineConfiguration {
            analyzers: raw.analyzers,
            filters: raw.filters,
            transforms: raw.transforms,
            reporters: raw.reporters,
            matchers: raw.matchers,
            transform_blocks: raw.transform_blocks,
            criticalities,
            severity_mapping,
            prune: raw.prune.unwrap_or(true),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants that must hold before a run may start.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        for severity in Severity::ALL {
            match self.severity_mapping.get(&severity) {
                None => {
                    return Err(AnalysisError::InvalidConfiguration(format!(
                        "severity mapping is missing an entry for '{severity}'"
                    )));
                }
                Some(criticality) if !self.criticalities.contains(criticality) => {
                    return Err(AnalysisError::InvalidConfiguration(format!(
                        "severity '{severity}' maps to criticality '{criticality}' which is not configured"
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Value {
        let raw = RawPipelineConfiguration {
            analyzers: self.analyzers.clone(),
            filters: self.filters.clone(),
            transforms: self.transforms.clone(),
            reporters: self.reporters.clone(),
            matchers: self.matchers.clone(),
            transform_blocks: self.transform_blocks.clone(),
            criticalities: self.criticalities.iter().cloned().collect(),
            severity_mapping: self
                .severity_mapping
                .iter()
                .map(|(s, c)| (*s, c.name.clone()))
                .collect(),
            prune: Some(self.prune),
        };
        serde_json::to_value(raw).unwrap_or(Value::Null)
    }

    pub fn criticality(&self, name: &str) -> Option<&Criticality> {
        self.criticalities.iter().find(|c| c.name == name)
    }
}

/// Configuration of one extension instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionConfiguration {
    /// The extension's type name.
    pub extension: String,
    /// Optional instance id, required only when the same extension is
    /// configured more than once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub configuration: Value,
}

/// Parse extension configurations from either accepted shape: an array of
/// explicit entries, or the legacy single object keyed by extension name.
pub fn parse_extension_configurations(
    node: &Value,
) -> Result<Vec<ExtensionConfiguration>, AnalysisError> {
    match node {
        Value::Null => Ok(Vec::new()),
        Value::Array(entries) => entries
            .iter()
            .map(|entry| {
                serde_json::from_value(entry.clone())
                    .map_err(|e| AnalysisError::InvalidConfiguration(e.to_string()))
            })
            .collect(),
        Value::Object(map) => Ok(map
            .iter()
            .map(|(extension, configuration)| ExtensionConfiguration {
                extension: extension.clone(),
                id: None,
                configuration: configuration.clone(),
            })
            .collect()),
        other => Err(AnalysisError::InvalidConfiguration(format!(
            "extension configuration must be an array or an object, got {other}"
        ))),
    }
}

/// Serialize extension configurations into the canonical array shape.
pub fn extension_configurations_to_json(entries: &[ExtensionConfiguration]) -> Value {
    serde_json::to_value(entries).unwrap_or(Value::Null)
}

/// Validate an extension's configuration subtree against the JSON schema
/// the extension declares.
pub fn validate_against_schema(
    extension: &str,
    schema: &Value,
    configuration: &Value,
) -> Result<(), ConfigurationError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| {
        ConfigurationError::new(format!("extension '{extension}' declares a broken schema: {e}"))
    })?;
    if let Some(error) = validator.iter_errors(configuration).next() {
        return Err(ConfigurationError::new(format!(
            "configuration of '{extension}' does not match its schema: {error}"
        )));
    }
    Ok(())
}
