//! The archive analyzer contract: per-format back-ends producing forests.

use std::rc::Rc;

use drift_model::{ApiSurface, Forest};

use crate::check::Check;
use crate::context::{AnalysisContext, Configurable};
use crate::error::AnalysisError;
use crate::filter::TreeFilter;

/// A back-end instance bound to the archives of one side of a comparison.
pub trait ArchiveAnalyzer {
    /// Produce the element forest. The filter is consulted for descend
    /// hints; where it says not to descend the analyzer must not expand
    /// the subtree. The analyzer drives the filter's full lifecycle
    /// (`start`/`finish` per element, `finalize` at the end).
    fn analyze(&mut self, filter: &mut dyn TreeFilter) -> Result<Forest, AnalysisError>;

    /// Remove supplementary elements that no primary element reaches
    /// through a moving-to-api use site. The default defers to the
    /// forest's generic pruning.
    fn prune(&mut self, forest: &mut Forest) {
        forest.prune_supplementary();
    }

    /// Release parse/compilation resources. Must be idempotent and safe
    /// to call after failures.
    fn release(&mut self) {}
}

/// Constructs analyzers and the checks that interpret their forests.
pub trait ArchiveAnalyzerFactory: Configurable {
    /// Build an analyzer over `api` for one side of the comparison.
    fn create(
        &mut self,
        api: Rc<ApiSurface>,
        ctx: &AnalysisContext<'_>,
    ) -> Result<Box<dyn ArchiveAnalyzer>, AnalysisError>;

    /// The checks to run over this back-end's forests. Fresh instances
    /// per call; checks are stateful and confined to one walk.
    fn checks(&mut self, ctx: &AnalysisContext<'_>) -> Vec<Box<dyn Check>>;
}
