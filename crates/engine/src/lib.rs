//! drift-engine: the analysis pipeline kernel of drift.
//!
//! drift compares two versions of an API surface, each modelled as an
//! element forest by a format-specific back-end, and emits classified
//! difference reports. This crate is the format-agnostic core: it walks
//! two forests in lock step, runs the interested checks at every paired
//! element, routes the produced differences through ordered transform
//! blocks to a fixpoint, applies three-valued tree filters with deferred
//! resolution, maps severities to criticalities, and hands the final
//! reports to the reporters.
//!
//! Back-ends, filters, transforms, reporters and matchers are all plain
//! trait objects supplied by the caller; the kernel performs no discovery
//! of its own.
//!
//! # Entry point
//!
//! Build a [`PipelineConfiguration`] and an [`Extensions`] set, hand both
//! to [`AnalysisDriver::new`] together with the two [`ApiSurface`]s, then
//! `open()`, `run()`, `close()`.

pub mod analyzer;
pub mod check;
pub mod config;
pub mod context;
pub mod difference;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod filter;
pub mod matcher;
pub mod pipeline;
pub mod reporter;
pub mod retry;
pub mod ternary;
pub mod transform;
pub mod walker;

pub use drift_model::ApiSurface;

pub use analyzer::{ArchiveAnalyzer, ArchiveAnalyzerFactory};
pub use check::{Check, ElementPair};
pub use config::{
    parse_extension_configurations, ExtensionConfiguration, IncludeExclude,
    PipelineConfiguration,
};
pub use context::{AnalysisContext, Configurable, Registered};
pub use difference::{
    CompatibilityDimension, Criticality, Difference, DifferenceBuilder, Report, Severity,
};
pub use dispatch::CheckDispatcher;
pub use driver::{AnalysisDriver, Extensions, RunSummary};
pub use error::{
    AnalysisError, CheckError, ConfigurationError, ReporterError, TransformError,
};
pub use filter::{FilterFinishResult, FilterStartResult, TreeFilter, TreeFilterProvider};
pub use matcher::{CompiledRecipe, ElementMatcher};
pub use pipeline::{TransformPipeline, ITERATION_CAP};
pub use reporter::{CollectingReporter, Reporter};
pub use ternary::Ternary;
pub use transform::{Transform, TransformOutcome};
pub use walker::{walk_paired, CancellationToken, PairVisitor};
