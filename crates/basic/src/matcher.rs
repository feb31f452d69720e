//! Element matchers over the human-readable string.

use drift_model::{ElementId, Forest};

use drift_engine::filter::{FilterFinishResult, FilterStartResult, TreeFilter};
use drift_engine::{
    AnalysisContext, CompiledRecipe, Configurable, ConfigurationError, ElementMatcher, Ternary,
};

/// Matches an element whose human-readable string equals the recipe.
#[derive(Debug, Default)]
pub struct ExactElementMatcher;

impl Configurable for ExactElementMatcher {
    fn extension_name(&self) -> &'static str {
        "matcher.exact"
    }

    fn initialize(&mut self, _ctx: &AnalysisContext<'_>) -> Result<(), ConfigurationError> {
        Ok(())
    }
}

impl ElementMatcher for ExactElementMatcher {
    fn compile(&self, recipe: &str) -> Option<Box<dyn CompiledRecipe>> {
        Some(Box::new(ExactRecipe {
            expected: recipe.to_string(),
        }))
    }
}

struct ExactRecipe {
    expected: String,
}

impl CompiledRecipe for ExactRecipe {
    fn filter_for(&self, _analyzer: &str) -> Option<Box<dyn TreeFilter>> {
        let expected = self.expected.clone();
        Some(Box::new(DisplayFilter {
            predicate: Box::new(move |display| display == expected),
        }))
    }
}

/// Matches an element whose human-readable string matches the recipe,
/// interpreted as a regular expression.
#[derive(Debug, Default)]
pub struct RegexElementMatcher;

impl Configurable for RegexElementMatcher {
    fn extension_name(&self) -> &'static str {
        "matcher.regex"
    }

    fn initialize(&mut self, _ctx: &AnalysisContext<'_>) -> Result<(), ConfigurationError> {
        Ok(())
    }
}

impl ElementMatcher for RegexElementMatcher {
    fn compile(&self, recipe: &str) -> Option<Box<dyn CompiledRecipe>> {
        let regex = regex::Regex::new(recipe).ok()?;
        Some(Box::new(RegexRecipe { regex }))
    }
}

struct RegexRecipe {
    regex: regex::Regex,
}

impl CompiledRecipe for RegexRecipe {
    fn filter_for(&self, _analyzer: &str) -> Option<Box<dyn TreeFilter>> {
        let regex = self.regex.clone();
        Some(Box::new(DisplayFilter {
            predicate: Box::new(move |display| regex.is_match(display)),
        }))
    }
}

/// Stateless filter deciding on the element's display string alone. It
/// always descends so that nested matches are found.
struct DisplayFilter {
    predicate: Box<dyn Fn(&str) -> bool>,
}

impl DisplayFilter {
    fn matches(&self, forest: &Forest, element: ElementId) -> Ternary {
        Ternary::from((self.predicate)(forest.element(element).display()))
    }
}

impl TreeFilter for DisplayFilter {
    fn start(&mut self, forest: &Forest, element: ElementId) -> FilterStartResult {
        FilterStartResult {
            matched: self.matches(forest, element),
            descend: Ternary::Yes,
        }
    }

    fn finish(&mut self, forest: &Forest, element: ElementId) -> FilterFinishResult {
        FilterFinishResult {
            matched: self.matches(forest, element),
        }
    }
}
