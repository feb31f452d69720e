//! Include/exclude element filtering driven by matcher recipes.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use drift_model::{ElementId, Forest};

use drift_engine::filter::{
    self, FilterFinishResult, FilterStartResult, TreeFilter, TreeFilterProvider,
};
use drift_engine::{
    AnalysisContext, CompiledRecipe, Configurable, ConfigurationError, Ternary,
};

use crate::matcher::ExactElementMatcher;
use drift_engine::ElementMatcher;

/// One entry of an include/exclude list: either a plain string, matched
/// with the exact matcher, or an explicit matcher reference.
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

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ElementsConfig {
    include: Vec<MatchSpec>,
    exclude: Vec<MatchSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FilterConfig {
    elements: ElementsConfig,
}

/// Tree filter provider admitting elements matched by any `include` recipe
/// (everything, when the list is empty) and not matched by any `exclude`
/// recipe. Exclusion does not stop the descent, so children of an excluded
/// element can still be re-included.
#[derive(Default)]
pub struct ElementFilterProvider {
    include: Vec<Box<dyn CompiledRecipe>>,
    exclude: Vec<Box<dyn CompiledRecipe>>,
}

impl ElementFilterProvider {
    pub fn new() -> Self {
        ElementFilterProvider::default()
    }
}

/// Compile one spec, falling back to the built-in exact matcher for plain
/// strings.
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

impl Configurable for ElementFilterProvider {
    fn extension_name(&self) -> &'static str {
        "filter.elements"
    }

    fn schema(&self) -> Option<Value> {
        let entry = json!({
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
        Some(json!({
            "type": "object",
            "properties": {
                "elements": {
                    "type": "object",
                    "properties": {
                        "include": {"type": "array", "items": entry.clone()},
                        "exclude": {"type": "array", "items": entry}
                    },
                    "additionalProperties": false
                }
            },
            "additionalProperties": false
        }))
    }

    fn initialize(&mut self, ctx: &AnalysisContext<'_>) -> Result<(), ConfigurationError> {
        if ctx.configuration().is_null() {
            return Ok(());
        }
        let config: FilterConfig = serde_json::from_value(ctx.configuration().clone())
            .map_err(|e| ConfigurationError::new(e.to_string()))?;

        self.include = config
            .elements
            .include
            .iter()
            .map(|spec| compile(spec, ctx))
            .collect::<Result<_, _>>()?;
        self.exclude = config
            .elements
            .exclude
            .iter()
            .map(|spec| compile(spec, ctx))
            .collect::<Result<_, _>>()?;
        Ok(())
    }
}

impl TreeFilterProvider for ElementFilterProvider {
    fn filter_for(&self, analyzer: &str) -> Option<Box<dyn TreeFilter>> {
        if self.include.is_empty() && self.exclude.is_empty() {
            return None;
        }
        let bind = |recipes: &[Box<dyn CompiledRecipe>]| -> Option<Box<dyn TreeFilter>> {
            let bound: Vec<Box<dyn TreeFilter>> = recipes
                .iter()
                .filter_map(|r| r.filter_for(analyzer))
                .collect();
            if bound.is_empty() {
                None
            } else {
                Some(filter::union(bound))
            }
        };
        Some(Box::new(IncludeExcludeFilter {
            include: bind(&self.include),
            exclude: bind(&self.exclude),
        }))
    }
}

/// `include ∧ ¬exclude` over the three-valued match lattice.
struct IncludeExcludeFilter {
    include: Option<Box<dyn TreeFilter>>,
    exclude: Option<Box<dyn TreeFilter>>,
}

impl TreeFilter for IncludeExcludeFilter {
    fn start(&mut self, forest: &Forest, element: ElementId) -> FilterStartResult {
        let included = match &mut self.include {
            Some(f) => f.start(forest, element),
            None => FilterStartResult::matched_and_descend(),
        };
        let excluded = match &mut self.exclude {
            Some(f) => f.start(forest, element).matched,
            None => Ternary::No,
        };
        FilterStartResult {
            matched: included.matched.and(excluded.negate()),
            descend: included.descend,
        }
    }

    fn finish(&mut self, forest: &Forest, element: ElementId) -> FilterFinishResult {
        let included = match &mut self.include {
            Some(f) => f.finish(forest, element).matched,
            None => Ternary::Yes,
        };
        let excluded = match &mut self.exclude {
            Some(f) => f.finish(forest, element).matched,
            None => Ternary::No,
        };
        FilterFinishResult {
            matched: included.and(excluded.negate()),
        }
    }

    fn finalize(&mut self) -> BTreeMap<ElementId, FilterFinishResult> {
        let included = self
            .include
            .as_mut()
            .map(|f| f.finalize())
            .unwrap_or_default();
        let excluded = self
            .exclude
            .as_mut()
            .map(|f| f.finalize())
            .unwrap_or_default();

        let mut resolutions = BTreeMap::new();
        for element in included.keys().chain(excluded.keys()) {
            let inc = included
                .get(element)
                .map(|r| r.matched)
                .unwrap_or(Ternary::Undecided);
            let exc = excluded
                .get(element)
                .map(|r| r.matched)
                .unwrap_or(Ternary::Undecided);
            resolutions.insert(
                *element,
                FilterFinishResult {
                    matched: inc.and(exc.negate()),
                },
            );
        }
        resolutions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_engine::{Criticality, Registered, Severity};
    use drift_model::{Element, ElementKind};
    use std::collections::{BTreeMap as Map, BTreeSet};

    fn context_fixture() -> (BTreeSet<Criticality>, Map<Severity, Criticality>) {
        (
            Criticality::default_set().into_iter().collect(),
            Criticality::default_severity_mapping(),
        )
    }

    fn sample_forest() -> Forest {
        let mut forest = Forest::new("fixture", Vec::new());
        let a = forest.add_root(Element::new(ElementKind::Type, "A", "A"));
        forest.add_child(a, Element::new(ElementKind::Method, "m", "A::m"));
        forest.add_child(a, Element::new(ElementKind::Method, "n", "A::n"));
        forest.add_root(Element::new(ElementKind::Type, "B", "B"));
        forest
    }

    fn start_matches(filter: &mut dyn TreeFilter, forest: &Forest) -> Vec<(String, Ternary)> {
        forest
            .stream(None, None, true)
            .map(|id| {
                (
                    forest.element(id).display().to_string(),
                    filter.start(forest, id).matched,
                )
            })
            .collect()
    }

    #[test]
    fn no_configuration_means_no_filter() {
        let provider = ElementFilterProvider::new();
        assert!(provider.filter_for("fixture").is_none());
    }

    #[test]
    fn include_list_restricts_matching() {
        let (criticalities, mapping) = context_fixture();
        let ctx = AnalysisContext::new(
            json!({"elements": {"include": ["A", "A::m"]}}),
            &criticalities,
            &mapping,
            &[],
        );
        let mut provider = ElementFilterProvider::new();
        provider.initialize(&ctx).unwrap();
        let mut filter = provider.filter_for("fixture").unwrap();

        let forest = sample_forest();
        let matches = start_matches(filter.as_mut(), &forest);
        assert_eq!(
            matches,
            vec![
                ("A".to_string(), Ternary::Yes),
                ("A::m".to_string(), Ternary::Yes),
                ("A::n".to_string(), Ternary::No),
                ("B".to_string(), Ternary::No),
            ]
        );
    }

    #[test]
    fn exclusion_wins_over_inclusion() {
        let (criticalities, mapping) = context_fixture();
        let matchers: Vec<Registered<dyn ElementMatcher>> = vec![Registered::new(Box::new(
            crate::matcher::RegexElementMatcher,
        ))];
        let ctx = AnalysisContext::new(
            json!({"elements": {
                "include": [{"matcher": "matcher.regex", "match": "^A.*"}],
                "exclude": ["A::n"]
            }}),
            &criticalities,
            &mapping,
            &matchers,
        );
        let mut provider = ElementFilterProvider::new();
        provider.initialize(&ctx).unwrap();
        let mut filter = provider.filter_for("fixture").unwrap();

        let forest = sample_forest();
        let matches = start_matches(filter.as_mut(), &forest);
        assert_eq!(
            matches,
            vec![
                ("A".to_string(), Ternary::Yes),
                ("A::m".to_string(), Ternary::Yes),
                ("A::n".to_string(), Ternary::No),
                ("B".to_string(), Ternary::No),
            ]
        );
    }

    #[test]
    fn unknown_matcher_is_a_configuration_error() {
        let (criticalities, mapping) = context_fixture();
        let ctx = AnalysisContext::new(
            json!({"elements": {"include": [{"matcher": "matcher.nonsense", "match": "x"}]}}),
            &criticalities,
            &mapping,
            &[],
        );
        let mut provider = ElementFilterProvider::new();
        assert!(provider.initialize(&ctx).is_err());
    }

    #[test]
    fn schema_accepts_the_documented_shape() {
        let provider = ElementFilterProvider::new();
        let schema = provider.schema().unwrap();
        drift_engine::config::validate_against_schema(
            "filter.elements",
            &schema,
            &json!({"elements": {"include": ["A"], "exclude": [{"matcher": "m", "match": "x"}]}}),
        )
        .unwrap();
        assert!(drift_engine::config::validate_against_schema(
            "filter.elements",
            &schema,
            &json!({"elements": {"include": [42]}}),
        )
        .is_err());
    }
}
