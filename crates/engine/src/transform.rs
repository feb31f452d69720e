//! The transform contract: pluggable post-processors of differences.

use drift_model::Forest;

use crate::check::ElementPair;
use crate::context::Configurable;
use crate::difference::Difference;
use crate::error::TransformError;

/// What a transform decided about one difference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    /// Not this transform's concern.
    Undecided,
    /// Keep the difference unchanged.
    Keep,
    /// Replace the difference with the given set. An empty set drops it.
    Replace(Vec<Difference>),
}

impl TransformOutcome {
    /// Shorthand for replacing with nothing.
    pub fn discard() -> Self {
        TransformOutcome::Replace(Vec::new())
    }
}

/// A difference post-processor.
///
/// Besides transforming differences, a transform receives the traversal
/// events of the paired walk, so it can evaluate matcher recipes against
/// ancestors of the current pair rather than just the pair itself. The
/// event default implementations do nothing.
pub trait Transform: Configurable {
    /// The walk over the forests of `analyzer` is about to begin.
    fn start_traversal(&mut self, _analyzer: &str, _old: &Forest, _new: &Forest) {}

    /// A pair was entered. Called for every visited pair, in walk order,
    /// nested LIFO with [`Transform::end_elements`].
    fn start_elements(&mut self, _pair: &ElementPair<'_>) {}

    fn end_elements(&mut self, _pair: &ElementPair<'_>) {}

    fn end_traversal(&mut self) {}

    /// Decide about `difference` produced for `pair`.
    fn transform(
        &mut self,
        pair: &ElementPair<'_>,
        difference: &Difference,
    ) -> Result<TransformOutcome, TransformError>;
}
