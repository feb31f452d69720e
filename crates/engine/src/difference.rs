//! Differences, their classification, and reports.
//!
//! A difference is an immutable finding identified by a stable code. It is
//! classified per compatibility dimension with a severity, carries a
//! criticality label assigned from the configured severity mapping (or
//! overridden by a transform), and free-form string attachments consumed
//! by downstream reporters.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use drift_model::ElementSnapshot;

/// The compatibility dimension a severity applies to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CompatibilityDimension {
    Source,
    Binary,
    Semantic,
    Other,
}

impl CompatibilityDimension {
    pub const ALL: [CompatibilityDimension; 4] = [
        CompatibilityDimension::Source,
        CompatibilityDimension::Binary,
        CompatibilityDimension::Semantic,
        CompatibilityDimension::Other,
    ];
}

impl fmt::Display for CompatibilityDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CompatibilityDimension::Source => "source",
            CompatibilityDimension::Binary => "binary",
            CompatibilityDimension::Semantic => "semantic",
            CompatibilityDimension::Other => "other",
        };
        f.write_str(label)
    }
}

/// Severity of a change within one compatibility dimension. The variant
/// order is the severity order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Equivalent,
    NonBreaking,
    PotentiallyBreaking,
    Breaking,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Equivalent,
        Severity::NonBreaking,
        Severity::PotentiallyBreaking,
        Severity::Breaking,
    ];
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Equivalent => "equivalent",
            Severity::NonBreaking => "nonBreaking",
            Severity::PotentiallyBreaking => "potentiallyBreaking",
            Severity::Breaking => "breaking",
        };
        f.write_str(label)
    }
}

/// A user-defined label layered on top of severities. Orders by level,
/// then name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criticality {
    pub name: String,
    pub level: u64,
}

impl Criticality {
    pub fn new(name: impl Into<String>, level: u64) -> Self {
        Criticality {
            name: name.into(),
            level,
        }
    }

    pub fn allowed() -> Self {
        Criticality::new("allowed", 1000)
    }

    pub fn documented() -> Self {
        Criticality::new("documented", 2000)
    }

    pub fn highlight() -> Self {
        Criticality::new("highlight", 2500)
    }

    pub fn error() -> Self {
        Criticality::new("error", 3000)
    }

    /// The built-in criticality set used when the pipeline configuration
    /// does not define its own.
    pub fn default_set() -> Vec<Criticality> {
        vec![
            Criticality::allowed(),
            Criticality::documented(),
            Criticality::highlight(),
            Criticality::error(),
        ]
    }

    /// The built-in severity mapping: equivalent changes are allowed,
    /// non-breaking ones documented, anything worse is an error.
    pub fn default_severity_mapping() -> BTreeMap<Severity, Criticality> {
        let mut mapping = BTreeMap::new();
        mapping.insert(Severity::Equivalent, Criticality::allowed());
        mapping.insert(Severity::NonBreaking, Criticality::documented());
        mapping.insert(Severity::PotentiallyBreaking, Criticality::error());
        mapping.insert(Severity::Breaking, Criticality::error());
        mapping
    }
}

impl PartialOrd for Criticality {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Criticality {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.level
            .cmp(&other.level)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A single classified finding about an element pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Difference {
    pub code: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub classification: BTreeMap<CompatibilityDimension, Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criticality: Option<Criticality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attachments: BTreeMap<String, String>,
}

impl Difference {
    pub fn builder(code: impl Into<String>) -> DifferenceBuilder {
        DifferenceBuilder {
            difference: Difference {
                code: code.into(),
                name: String::new(),
                description: None,
                classification: BTreeMap::new(),
                criticality: None,
                justification: None,
                attachments: BTreeMap::new(),
            },
        }
    }

    /// The maximum severity across all classified dimensions. `None` for
    /// an unclassified difference.
    pub fn max_severity(&self) -> Option<Severity> {
        self.classification.values().max().copied()
    }
}

/// Builder for [`Difference`].
#[derive(Debug, Clone)]
pub struct DifferenceBuilder {
    difference: Difference,
}

impl DifferenceBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.difference.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.difference.description = Some(description.into());
        self
    }

    pub fn classify(mut self, dimension: CompatibilityDimension, severity: Severity) -> Self {
        self.difference.classification.insert(dimension, severity);
        self
    }

    pub fn criticality(mut self, criticality: Criticality) -> Self {
        self.difference.criticality = Some(criticality);
        self
    }

    pub fn justification(mut self, justification: impl Into<String>) -> Self {
        self.difference.justification = Some(justification.into());
        self
    }

    pub fn attach(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.difference.attachments.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Difference {
        self.difference
    }
}

/// Everything found about one matched element pair, in the order produced
/// by the last transform block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<ElementSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<ElementSnapshot>,
    pub differences: Vec<Difference>,
}

impl Report {
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Human-readable rendering, one line per difference.
    pub fn to_text(&self) -> String {
        let subject = self
            .new
            .as_ref()
            .or(self.old.as_ref())
            .map(|e| format!("{} {}", e.kind, e.display))
            .unwrap_or_else(|| "<unknown>".to_string());

        let mut lines = Vec::new();
        for difference in &self.differences {
            let marker = match (&self.old, &self.new) {
                (None, Some(_)) => '+',
                (Some(_), None) => '-',
                _ => '~',
            };
            let mut line = format!("{} {}: {}", marker, subject, difference.code);
            if let Some(description) = &difference.description {
                line.push_str(" - ");
                line.push_str(description);
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}
