//! Element matchers and compiled recipes.
//!
//! A matcher understands some expression language over elements. Compiling
//! an expression yields a recipe; asking the recipe for a filter binds it
//! to the forests of one archive analyzer. Transforms use recipes to
//! select the elements their rules apply to, and may bind separate
//! recipes to the old and the new element of a pair.

use crate::context::Configurable;
use crate::filter::TreeFilter;

/// Parses user expressions into [`CompiledRecipe`]s.
pub trait ElementMatcher: Configurable {
    /// Compile `recipe` into an executable form. `None` means this matcher
    /// does not understand the expression.
    fn compile(&self, recipe: &str) -> Option<Box<dyn CompiledRecipe>>;
}

/// A compiled matcher expression, ready to be bound to an analyzer's
/// forests.
pub trait CompiledRecipe {
    /// A tree filter evaluating this recipe over the forests produced by
    /// the named archive analyzer, or `None` when the recipe does not
    /// apply to that analyzer's element model.
    fn filter_for(&self, analyzer: &str) -> Option<Box<dyn TreeFilter>>;
}
