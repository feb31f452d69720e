//! Config-driven editing of differences.
//!
//! Each configured rule matches differences by code (exactly or as a
//! regular expression) and optionally requires the old and/or new element
//! of the pair to match a compiled recipe. A matching rule can drop the
//! difference, attach a justification, override its criticality, rewrite
//! its per-dimension classification, or merge attachments.
//!
//! Element matching is ancestor-aware: the transform follows the walk
//! through the traversal events and keeps a per-side match state stack, so
//! a recipe is evaluated in traversal order, exactly like a tree filter.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use drift_model::Forest;

use drift_engine::filter::TreeFilter;
use drift_engine::{
    AnalysisContext, CompatibilityDimension, CompiledRecipe, Configurable, ConfigurationError,
    Criticality, Difference, ElementMatcher, ElementPair, Severity, Ternary, Transform,
    TransformError, TransformOutcome,
};

use crate::matcher::ExactElementMatcher;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum MatchSpec {
    Plain(String),
    WithMatcher {
        matcher: String,
        #[serde(rename = "match")]
        expression: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    code: String,
    #[serde(default)]
    regex: bool,
    #[serde(default)]
    ignore: bool,
    #[serde(default)]
    justification: Option<String>,
    #[serde(default)]
    criticality: Option<String>,
    #[serde(default)]
    classify: BTreeMap<CompatibilityDimension, Severity>,
    #[serde(default)]
    attachments: BTreeMap<String, String>,
    #[serde(default)]
    old: Option<MatchSpec>,
    #[serde(default)]
    new: Option<MatchSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    differences: Vec<RawRule>,
}

enum CodeMatch {
    Exact(String),
    Pattern(regex::Regex),
}

impl CodeMatch {
    fn matches(&self, code: &str) -> bool {
        match self {
            CodeMatch::Exact(expected) => expected == code,
            CodeMatch::Pattern(regex) => regex.is_match(code),
        }
    }
}

/// The per-side element predicate of one rule, fed by traversal events.
struct SideMatch {
    recipe: Box<dyn CompiledRecipe>,
    filter: Option<Box<dyn TreeFilter>>,
    stack: Vec<Ternary>,
}

impl SideMatch {
    fn new(recipe: Box<dyn CompiledRecipe>) -> Self {
        SideMatch {
            recipe,
            filter: None,
            stack: Vec::new(),
        }
    }

    fn rebind(&mut self, analyzer: &str) {
        self.filter = self.recipe.filter_for(analyzer);
        self.stack.clear();
    }

    fn push(&mut self, forest: &Forest, element: Option<drift_model::ElementId>) {
        let matched = match (&mut self.filter, element) {
            (Some(filter), Some(id)) => filter.start(forest, id).matched,
            // no element on this side, or a recipe foreign to this
            // back-end: the side cannot match
            _ => Ternary::No,
        };
        self.stack.push(matched);
    }

    fn pop(&mut self, forest: &Forest, element: Option<drift_model::ElementId>) {
        if let (Some(filter), Some(id)) = (&mut self.filter, element) {
            filter.finish(forest, id);
        }
        self.stack.pop();
    }

    /// Whether the current element matches; undecided counts as a match
    /// pending resolution.
    fn currently_matches(&self) -> bool {
        self.stack
            .last()
            .copied()
            .unwrap_or(Ternary::No)
            .to_bool(true)
    }
}

struct Rule {
    code: CodeMatch,
    ignore: bool,
    justification: Option<String>,
    criticality: Option<Criticality>,
    classify: BTreeMap<CompatibilityDimension, Severity>,
    attachments: BTreeMap<String, String>,
    old: Option<SideMatch>,
    new: Option<SideMatch>,
}

impl Rule {
    fn matches(&self, difference: &Difference) -> bool {
        if !self.code.matches(&difference.code) {
            return false;
        }
        if let Some(old) = &self.old {
            if !old.currently_matches() {
                return false;
            }
        }
        if let Some(new) = &self.new {
            if !new.currently_matches() {
                return false;
            }
        }
        true
    }

    fn apply(&self, difference: &mut Difference) -> bool {
        if self.ignore {
            return true;
        }
        if let Some(justification) = &self.justification {
            difference.justification = Some(justification.clone());
        }
        if let Some(criticality) = &self.criticality {
            difference.criticality = Some(criticality.clone());
        }
        for (dimension, severity) in &self.classify {
            difference.classification.insert(*dimension, *severity);
        }
        for (key, value) in &self.attachments {
            difference.attachments.insert(key.clone(), value.clone());
        }
        false
    }
}

/// The `difference.alter` transform.
#[derive(Default)]
pub struct DifferencesTransform {
    rules: Vec<Rule>,
}

impl DifferencesTransform {
    pub fn new() -> Self {
        DifferencesTransform::default()
    }
}

fn compile(
    spec: &MatchSpec,
    ctx: &AnalysisContext<'_>,
) -> Result<Box<dyn CompiledRecipe>, ConfigurationError> {
    match spec {
        MatchSpec::Plain(expression) => {
            ExactElementMatcher.compile(expression).ok_or_else(|| {
                ConfigurationError::new(format!("cannot compile recipe '{expression}'"))
            })
        }
        MatchSpec::WithMatcher {
            matcher,
            expression,
        } => {
            let matcher_impl = ctx.matcher(matcher).ok_or_else(|| {
                ConfigurationError::new(format!("unknown element matcher '{matcher}'"))
            })?;
            matcher_impl.compile(expression).ok_or_else(|| {
                ConfigurationError::new(format!(
                    "matcher '{matcher}' does not understand recipe '{expression}'"
                ))
            })
        }
    }
}

impl Configurable for DifferencesTransform {
    fn extension_name(&self) -> &'static str {
        "difference.alter"
    }

    fn schema(&self) -> Option<Value> {
        let match_spec = json!({
            "oneOf": [
                {"type": "string"},
                {
                    "type": "object",
                    "properties": {
                        "matcher": {"type": "string"},
                        "match": {"type": "string"}
                    },
                    "required": ["matcher", "match"],
                    "additionalProperties": false
                }
            ]
        });
        let severity = json!({
            "enum": ["equivalent", "nonBreaking", "potentiallyBreaking", "breaking"]
        });
        Some(json!({
            "type": "object",
            "properties": {
                "differences": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "code": {"type": "string"},
                            "regex": {"type": "boolean"},
                            "ignore": {"type": "boolean"},
                            "justification": {"type": "string"},
                            "criticality": {"type": "string"},
                            "classify": {
                                "type": "object",
                                "properties": {
                                    "source": severity.clone(),
                                    "binary": severity.clone(),
                                    "semantic": severity.clone(),
                                    "other": severity
                                },
                                "additionalProperties": false
                            },
                            "attachments": {
                                "type": "object",
                                "additionalProperties": {"type": "string"}
                            },
                            "old": match_spec.clone(),
                            "new": match_spec
                        },
                        "required": ["code"],
                        "additionalProperties": false
                    }
                }
            },
            "additionalProperties": false
        }))
    }

    fn initialize(&mut self, ctx: &AnalysisContext<'_>) -> Result<(), ConfigurationError> {
        if ctx.configuration().is_null() {
            return Ok(());
        }
        let config: RawConfig = serde_json::from_value(ctx.configuration().clone())
            .map_err(|e| ConfigurationError::new(e.to_string()))?;

        self.rules = Vec::with_capacity(config.differences.len());
        for raw in config.differences {
            let code = if raw.regex {
                let regex = regex::Regex::new(&raw.code).map_err(|e| {
                    ConfigurationError::new(format!("invalid code pattern '{}': {e}", raw.code))
                })?;
                CodeMatch::Pattern(regex)
            } else {
                CodeMatch::Exact(raw.code)
            };

            let criticality = match raw.criticality {
                Some(name) => Some(ctx.require_criticality(&name)?),
                None => None,
            };

            self.rules.push(Rule {
                code,
                ignore: raw.ignore,
                justification: raw.justification,
                criticality,
                classify: raw.classify,
                attachments: raw.attachments,
                old: raw
                    .old
                    .as_ref()
                    .map(|spec| compile(spec, ctx).map(SideMatch::new))
                    .transpose()?,
                new: raw
                    .new
                    .as_ref()
                    .map(|spec| compile(spec, ctx).map(SideMatch::new))
                    .transpose()?,
            });
        }
        Ok(())
    }
}

impl Transform for DifferencesTransform {
    fn start_traversal(&mut self, analyzer: &str, _old: &Forest, _new: &Forest) {
        for rule in &mut self.rules {
            if let Some(side) = &mut rule.old {
                side.rebind(analyzer);
            }
            if let Some(side) = &mut rule.new {
                side.rebind(analyzer);
            }
        }
    }

    fn start_elements(&mut self, pair: &ElementPair<'_>) {
        for rule in &mut self.rules {
            if let Some(side) = &mut rule.old {
                side.push(pair.old_forest, pair.old);
            }
            if let Some(side) = &mut rule.new {
                side.push(pair.new_forest, pair.new);
            }
        }
    }

    fn end_elements(&mut self, pair: &ElementPair<'_>) {
        for rule in &mut self.rules {
            if let Some(side) = &mut rule.old {
                side.pop(pair.old_forest, pair.old);
            }
            if let Some(side) = &mut rule.new {
                side.pop(pair.new_forest, pair.new);
            }
        }
    }

    fn transform(
        &mut self,
        _pair: &ElementPair<'_>,
        difference: &Difference,
    ) -> Result<TransformOutcome, TransformError> {
        let mut edited = difference.clone();
        let mut any_matched = false;

        for rule in &self.rules {
            if !rule.matches(difference) {
                continue;
            }
            any_matched = true;
            if rule.apply(&mut edited) {
                return Ok(TransformOutcome::discard());
            }
        }

        if !any_matched {
            return Ok(TransformOutcome::Undecided);
        }
        if edited == *difference {
            Ok(TransformOutcome::Keep)
        } else {
            Ok(TransformOutcome::Replace(vec![edited]))
        }
    }
}
