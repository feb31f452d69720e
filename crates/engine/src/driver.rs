//! The analysis driver: open/run/close lifecycle around the paired walk.
//!
//! The driver is handed the pipeline configuration, the per-extension
//! configuration entries, the extension instances themselves, and the two
//! API surfaces. It pairs configurations with instances, applies the
//! include/exclude admission lists, validates everything up front, and
//! then drives: analyze both sides, prune, walk the forest pair through
//! filters, checks and transforms, and hand the resulting reports to the
//! reporters in walk order.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, warn};

use drift_model::{ApiSurface, ElementId, Forest};

use crate::analyzer::{ArchiveAnalyzer, ArchiveAnalyzerFactory};
use crate::check::ElementPair;
use crate::config::{
    validate_against_schema, ExtensionConfiguration, IncludeExclude, PipelineConfiguration,
};
use crate::context::{AnalysisContext, Configurable, Registered};
use crate::difference::{
    CompatibilityDimension, Criticality, Difference, Report, Severity,
};
use crate::dispatch::CheckDispatcher;
use crate::error::AnalysisError;
use crate::filter::{self, FilterFinishResult, TreeFilter, TreeFilterProvider};
use crate::matcher::ElementMatcher;
use crate::pipeline::{validate_blocks, TransformPipeline};
use crate::reporter::Reporter;
use crate::ternary::Ternary;
use crate::transform::Transform;
use crate::walker::{walk_paired, CancellationToken, PairVisitor};

/// Difference code attached to a pair when one of its checks failed.
pub const CHECK_FAILURE_CODE: &str = "check.failure";
/// Difference code attached to a pair when one of its transforms failed.
pub const TRANSFORM_FAILURE_CODE: &str = "transform.failure";

/// The extension instances taking part in a run. The caller constructs
/// them; the kernel never discovers extensions on its own.
#[derive(Default)]
pub struct Extensions {
    pub analyzers: Vec<Box<dyn ArchiveAnalyzerFactory>>,
    pub filters: Vec<Box<dyn TreeFilterProvider>>,
    pub transforms: Vec<Box<dyn Transform>>,
    pub reporters: Vec<Box<dyn Reporter>>,
    pub matchers: Vec<Box<dyn ElementMatcher>>,
}

impl Extensions {
    pub fn new() -> Self {
        Extensions::default()
    }

    pub fn with_analyzer(mut self, analyzer: impl ArchiveAnalyzerFactory + 'static) -> Self {
        self.analyzers.push(Box::new(analyzer));
        self
    }

    pub fn with_filter(mut self, filter: impl TreeFilterProvider + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn with_transform(mut self, transform: impl Transform + 'static) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }

    pub fn with_matcher(mut self, matcher: impl ElementMatcher + 'static) -> Self {
        self.matchers.push(Box::new(matcher));
        self
    }
}

/// What a finished run exposes to the caller. Mapping this to exit codes
/// or renderings is a front-end concern.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// The highest criticality among all reported differences.
    pub max_criticality: Option<Criticality>,
    /// Captured per-element check/transform failures.
    pub fatal_errors: Vec<String>,
    /// Failures of individual reporters; the walk is never affected.
    pub reporter_failures: Vec<String>,
    /// Number of reports handed to the reporters.
    pub reports: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    Created,
    Open,
    Ran,
    Closed,
}

struct OpenAnalyzer {
    factory_index: usize,
    name: &'static str,
    old: Box<dyn ArchiveAnalyzer>,
    new: Box<dyn ArchiveAnalyzer>,
    released: bool,
}

/// Orchestrates one comparison run.
pub struct AnalysisDriver {
    config: PipelineConfiguration,
    analyzers: Vec<Registered<dyn ArchiveAnalyzerFactory>>,
    filters: Vec<Registered<dyn TreeFilterProvider>>,
    transforms: Vec<Registered<dyn Transform>>,
    reporters: Vec<Registered<dyn Reporter>>,
    matchers: Vec<Registered<dyn ElementMatcher>>,
    old_api: Rc<ApiSurface>,
    new_api: Rc<ApiSurface>,
    open_analyzers: Vec<OpenAnalyzer>,
    cancel: CancellationToken,
    state: DriverState,
}

impl AnalysisDriver {
    /// Pair extension instances with their configuration entries, apply
    /// the admission lists, and validate everything that can be validated
    /// before any analysis starts.
    pub fn new(
        config: PipelineConfiguration,
        extension_configs: Vec<ExtensionConfiguration>,
        extensions: Extensions,
        old_api: ApiSurface,
        new_api: ApiSurface,
    ) -> Result<Self, AnalysisError> {
        config.validate()?;

        let mut used = vec![false; extension_configs.len()];
        let analyzers = register(
            extensions.analyzers,
            &extension_configs,
            &mut used,
            &config.analyzers,
        )?;
        let filters = register(
            extensions.filters,
            &extension_configs,
            &mut used,
            &config.filters,
        )?;
        let transforms = register(
            extensions.transforms,
            &extension_configs,
            &mut used,
            &config.transforms,
        )?;
        let reporters = register(
            extensions.reporters,
            &extension_configs,
            &mut used,
            &config.reporters,
        )?;
        let matchers = register(
            extensions.matchers,
            &extension_configs,
            &mut used,
            &config.matchers,
        )?;

        for (index, entry) in extension_configs.iter().enumerate() {
            if !used[index] {
                debug!(
                    extension = entry.extension,
                    "configuration entry matches no registered extension"
                );
            }
        }

        validate_blocks(&transforms, &config.transform_blocks)?;

        Ok(AnalysisDriver {
            config,
            analyzers,
            filters,
            transforms,
            reporters,
            matchers,
            old_api: Rc::new(old_api),
            new_api: Rc::new(new_api),
            open_analyzers: Vec::new(),
            cancel: CancellationToken::new(),
            state: DriverState::Created,
        })
    }

    /// Inject a cancellation token checked at element boundaries.
    pub fn set_cancellation_token(&mut self, token: CancellationToken) {
        self.cancel = token;
    }

    /// Initialize all admitted extensions and acquire the archive
    /// analyzers for both sides.
    pub fn open(&mut self) -> Result<(), AnalysisError> {
        if self.state != DriverState::Created {
            return Err(AnalysisError::InvalidConfiguration(
                "the driver can only be opened once".to_string(),
            ));
        }

        let criticalities = &self.config.criticalities;
        let mapping = &self.config.severity_mapping;

        // matchers first: everything else may compile recipes against them
        let no_matchers: &[Registered<dyn ElementMatcher>] = &[];
        for matcher in &mut self.matchers {
            let configuration = matcher.configuration.clone();
            let ctx = AnalysisContext::new(configuration, criticalities, mapping, no_matchers);
            matcher.inner.initialize(&ctx)?;
        }

        let matchers = &self.matchers;
        for f in &mut self.filters {
            let ctx = AnalysisContext::new(f.configuration.clone(), criticalities, mapping, matchers);
            f.inner.initialize(&ctx)?;
        }
        for t in &mut self.transforms {
            let ctx = AnalysisContext::new(t.configuration.clone(), criticalities, mapping, matchers);
            t.inner.initialize(&ctx)?;
        }
        for r in &mut self.reporters {
            let ctx = AnalysisContext::new(r.configuration.clone(), criticalities, mapping, matchers);
            r.inner.initialize(&ctx)?;
        }

        for (index, factory) in self.analyzers.iter_mut().enumerate() {
            let ctx = AnalysisContext::new(
                factory.configuration.clone(),
                criticalities,
                mapping,
                matchers,
            );
            factory.inner.initialize(&ctx)?;
            let name = factory.inner.extension_name();
            let old = factory.inner.create(Rc::clone(&self.old_api), &ctx)?;
            let new = factory.inner.create(Rc::clone(&self.new_api), &ctx)?;
            self.open_analyzers.push(OpenAnalyzer {
                factory_index: index,
                name,
                old,
                new,
                released: false,
            });
        }

        self.state = DriverState::Open;
        Ok(())
    }

    /// Analyze both sides with every admitted back-end, walk the forest
    /// pairs, and feed the reports to the reporters. Analyzer resources
    /// are released on every exit path.
    pub fn run(&mut self) -> Result<RunSummary, AnalysisError> {
        if self.state != DriverState::Open {
            return Err(AnalysisError::InvalidConfiguration(
                "run requires an open driver that has not run yet".to_string(),
            ));
        }
        self.state = DriverState::Ran;

        let result = self.run_inner();
        if result.is_err() {
            self.release_analyzers();
        }
        result
    }

    fn run_inner(&mut self) -> Result<RunSummary, AnalysisError> {
        let mut summary = RunSummary::default();

        for analyzer in &mut self.open_analyzers {
            let factory = &mut self.analyzers[analyzer.factory_index];
            let ctx = AnalysisContext::new(
                factory.configuration.clone(),
                &self.config.criticalities,
                &self.config.severity_mapping,
                &self.matchers,
            );
            let checks = factory.inner.checks(&ctx);

            debug!(analyzer = analyzer.name, "starting paired analysis");

            let mut old_build_filter = composed_filter(&self.filters, analyzer.name);
            let mut new_build_filter = composed_filter(&self.filters, analyzer.name);
            let mut old_forest = analyzer.old.analyze(old_build_filter.as_mut())?;
            let mut new_forest = analyzer.new.analyze(new_build_filter.as_mut())?;

            if self.config.prune {
                analyzer.old.prune(&mut old_forest);
                analyzer.new.prune(&mut new_forest);
            }
            debug!(
                analyzer = analyzer.name,
                old_elements = old_forest.len(),
                new_elements = new_forest.len(),
                "forests ready"
            );

            let mut pipeline =
                TransformPipeline::new(&mut self.transforms, &self.config.transform_blocks)?;
            pipeline.start_traversal(analyzer.name, &old_forest, &new_forest);

            let mut state = WalkState {
                old: &old_forest,
                new: &new_forest,
                dispatcher: CheckDispatcher::new(checks),
                pipeline: &mut pipeline,
                old_filter: composed_filter(&self.filters, analyzer.name),
                new_filter: composed_filter(&self.filters, analyzer.name),
                severity_mapping: &self.config.severity_mapping,
                annotation_sink: Vec::new(),
                buffered: Vec::new(),
                reporters: &mut self.reporters,
                summary: &mut summary,
            };

            walk_paired(&old_forest, &new_forest, &mut state, &self.cancel)?;

            // resolve pairs the filters left undecided
            let old_resolutions = state.old_filter.finalize();
            let new_resolutions = state.new_filter.finalize();
            let buffered = std::mem::take(&mut state.buffered);
            for entry in buffered {
                let resolved = combine_resolutions(
                    entry.old,
                    entry.new,
                    &old_resolutions,
                    &new_resolutions,
                );
                if resolved != Ternary::No {
                    deliver(state.reporters, &entry.report, state.summary);
                }
            }

            pipeline.end_traversal();
            analyzer.old.release();
            analyzer.new.release();
            analyzer.released = true;
        }

        debug!(
            reports = summary.reports,
            fatal_errors = summary.fatal_errors.len(),
            "analysis finished"
        );
        Ok(summary)
    }

    /// Release analyzer resources and close every extension. Idempotent
    /// and safe to call after failures.
    pub fn close(&mut self) {
        if self.state == DriverState::Closed {
            return;
        }
        self.release_analyzers();
        for a in &mut self.analyzers {
            a.inner.close();
        }
        for f in &mut self.filters {
            f.inner.close();
        }
        for t in &mut self.transforms {
            t.inner.close();
        }
        for r in &mut self.reporters {
            r.inner.close();
        }
        for m in &mut self.matchers {
            m.inner.close();
        }
        self.state = DriverState::Closed;
    }

    fn release_analyzers(&mut self) {
        for analyzer in &mut self.open_analyzers {
            if !analyzer.released {
                analyzer.old.release();
                analyzer.new.release();
                analyzer.released = true;
            }
        }
    }
}

impl Drop for AnalysisDriver {
    fn drop(&mut self) {
        self.close();
    }
}

/// Pair instances of one category with their configuration entries (nth
/// entry of a name to the nth instance of that name), validate declared
/// schemas, and drop instances the admission lists reject.
fn register<T: Configurable + ?Sized>(
    instances: Vec<Box<T>>,
    configs: &[ExtensionConfiguration],
    used: &mut [bool],
    admission: &IncludeExclude,
) -> Result<Vec<Registered<T>>, AnalysisError> {
    let mut registered = Vec::with_capacity(instances.len());
    for instance in instances {
        let name = instance.extension_name();
        let entry = configs
            .iter()
            .enumerate()
            .find(|(i, c)| !used[*i] && c.extension == name);
        let (id, configuration) = match entry {
            Some((i, c)) => {
                used[i] = true;
                (c.id.clone(), c.configuration.clone())
            }
            None => (None, Value::Null),
        };

        if !configuration.is_null() {
            if let Some(schema) = instance.schema() {
                validate_against_schema(name, &schema, &configuration)?;
            }
        }

        if admission.admits(id.as_deref(), name) {
            registered.push(Registered {
                id,
                configuration,
                inner: instance,
            });
        }
    }
    Ok(registered)
}

/// Intersection of every provider's filter for `analyzer`; matches
/// everything when no provider has an opinion.
fn composed_filter(
    providers: &[Registered<dyn TreeFilterProvider>],
    analyzer: &str,
) -> Box<dyn TreeFilter> {
    let filters: Vec<Box<dyn TreeFilter>> = providers
        .iter()
        .filter_map(|p| p.inner.filter_for(analyzer))
        .collect();
    if filters.is_empty() {
        filter::match_and_descend()
    } else {
        filter::intersection(filters)
    }
}

struct BufferedReport {
    old: Option<ElementId>,
    new: Option<ElementId>,
    report: Report,
}

struct WalkState<'a, 'p> {
    old: &'a Forest,
    new: &'a Forest,
    dispatcher: CheckDispatcher,
    pipeline: &'a mut TransformPipeline<'p>,
    old_filter: Box<dyn TreeFilter>,
    new_filter: Box<dyn TreeFilter>,
    severity_mapping: &'a BTreeMap<Severity, Criticality>,
    /// One difference buffer per open non-annotation pair; annotation
    /// differences land in the buffer of their containing element.
    annotation_sink: Vec<Vec<Difference>>,
    buffered: Vec<BufferedReport>,
    reporters: &'a mut [Registered<dyn Reporter>],
    summary: &'a mut RunSummary,
}

impl WalkState<'_, '_> {
    fn is_annotation(&self, pair: &ElementPair<'_>) -> bool {
        *pair.kind() == drift_model::ElementKind::Annotation
    }

    fn assign_criticalities(&self, differences: &mut [Difference]) {
        for difference in differences {
            if difference.criticality.is_none() {
                let severity = difference.max_severity().unwrap_or(Severity::Equivalent);
                difference.criticality = self.severity_mapping.get(&severity).cloned();
            }
        }
    }

    fn synthetic_failure(&self, code: &str, message: &str) -> Difference {
        let mut difference = Difference::builder(code)
            .name("analysis failure")
            .description(message)
            .classify(CompatibilityDimension::Other, Severity::Breaking)
            .attach("error", message)
            .build();
        difference.criticality = self
            .severity_mapping
            .get(&Severity::Breaking)
            .cloned();
        difference
    }
}

impl PairVisitor for WalkState<'_, '_> {
    fn enter(&mut self, pair: &ElementPair<'_>) -> Result<bool, AnalysisError> {
        self.pipeline.start_elements(pair);

        let mut start = None;
        if let Some(old) = pair.old {
            start = Some(self.old_filter.start(self.old, old));
        }
        if let Some(new) = pair.new {
            let result = self.new_filter.start(self.new, new);
            start = Some(match start {
                Some(acc) => acc.or(result),
                None => result,
            });
        }
        let descend = start
            .map(|s| s.descend.to_bool(true))
            .unwrap_or(true);

        self.dispatcher.enter(pair);
        if !self.is_annotation(pair) {
            self.annotation_sink.push(Vec::new());
        }

        if pair.has_missing_side() && !self.dispatcher.has_descending_checks() {
            return Ok(false);
        }
        Ok(descend)
    }

    fn leave(&mut self, pair: &ElementPair<'_>) -> Result<(), AnalysisError> {
        let mut differences = Vec::new();
        for result in self.dispatcher.leave(pair) {
            match result {
                Ok(mut produced) => differences.append(&mut produced),
                Err(e) => {
                    warn!(element = pair.display(), error = %e, "check failed");
                    self.summary.fatal_errors.push(e.to_string());
                    differences.push(self.synthetic_failure(CHECK_FAILURE_CODE, e.message()));
                }
            }
        }

        // the filter lifecycle stays balanced no matter what happens below
        let mut matched = None;
        if let Some(old) = pair.old {
            matched = Some(self.old_filter.finish(self.old, old));
        }
        if let Some(new) = pair.new {
            let result = self.new_filter.finish(self.new, new);
            matched = Some(match matched {
                Some(acc) => acc.or(result),
                None => result,
            });
        }
        let matched = matched.map(|m| m.matched).unwrap_or(Ternary::Yes);

        if self.is_annotation(pair) {
            // annotation differences belong to the containing element and
            // are transformed together with it
            if let Some(sink) = self.annotation_sink.last_mut() {
                sink.extend(differences);
                self.pipeline.end_elements(pair);
                return Ok(());
            }
        } else if let Some(mut sink) = self.annotation_sink.pop() {
            differences.append(&mut sink);
        }

        self.assign_criticalities(&mut differences);

        let outcome = self.pipeline.apply(pair, differences)?;
        let mut differences = outcome.differences;
        for failure in outcome.failures {
            let message = format!("{}: {}", failure.extension, failure.message);
            warn!(element = pair.display(), error = %message, "transform failed");
            self.summary.fatal_errors.push(message.clone());
            differences.push(self.synthetic_failure(TRANSFORM_FAILURE_CODE, &message));
        }
        self.assign_criticalities(&mut differences);

        if !differences.is_empty() {
            let report = Report {
                old: pair.old.map(|id| self.old.snapshot(id)),
                new: pair.new.map(|id| self.new.snapshot(id)),
                differences,
            };
            match matched {
                Ternary::Yes => deliver(self.reporters, &report, self.summary),
                Ternary::No => {}
                Ternary::Undecided => self.buffered.push(BufferedReport {
                    old: pair.old,
                    new: pair.new,
                    report,
                }),
            }
        }

        self.pipeline.end_elements(pair);
        Ok(())
    }
}

/// Route a report to every reporter, isolating their failures, and track
/// the highest criticality seen in delivered reports.
fn deliver(
    reporters: &mut [Registered<dyn Reporter>],
    report: &Report,
    summary: &mut RunSummary,
) {
    summary.reports += 1;
    for difference in &report.differences {
        if let Some(criticality) = &difference.criticality {
            let is_new_max = summary
                .max_criticality
                .as_ref()
                .map(|max| criticality > max)
                .unwrap_or(true);
            if is_new_max {
                summary.max_criticality = Some(criticality.clone());
            }
        }
    }
    for reporter in reporters.iter_mut() {
        if let Err(e) = reporter.inner.report(report) {
            warn!(reporter = reporter.inner.extension_name(), error = %e, "reporter failed");
            summary
                .reporter_failures
                .push(format!("{}: {}", reporter.address(), e.message()));
        }
    }
}

/// Combine the terminal filter resolutions of both sides for a buffered
/// pair. Sides absent from the resolution map stay undecided and are
/// treated as matching.
fn combine_resolutions(
    old: Option<ElementId>,
    new: Option<ElementId>,
    old_resolutions: &BTreeMap<ElementId, FilterFinishResult>,
    new_resolutions: &BTreeMap<ElementId, FilterFinishResult>,
) -> Ternary {
    let mut combined = None;
    if let Some(id) = old {
        let matched = old_resolutions
            .get(&id)
            .map(|r| r.matched)
            .unwrap_or(Ternary::Undecided);
        combined = Some(matched);
    }
    if let Some(id) = new {
        let matched = new_resolutions
            .get(&id)
            .map(|r| r.matched)
            .unwrap_or(Ternary::Undecided);
        combined = Some(match combined {
            Some(acc) => acc.or(matched),
            None => matched,
        });
    }
    combined.unwrap_or(Ternary::Undecided)
}
