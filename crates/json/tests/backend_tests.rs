//! End-to-end runs of the kernel over the JSON back-end.

use serde_json::json;

use drift_basic::{DifferencesTransform, ElementFilterProvider, RegexElementMatcher};
use drift_engine::{
    parse_extension_configurations, AnalysisDriver, ApiSurface, CollectingReporter, Criticality,
    Extensions, PipelineConfiguration, Report,
};
use drift_json::JsonAnalyzerFactory;
use drift_model::MemoryArchive;

fn surface(name: &str, document: serde_json::Value) -> ApiSurface {
    ApiSurface::new().with_archive(MemoryArchive::new(name, document.to_string().into_bytes()))
}

fn run(
    config: PipelineConfiguration,
    extension_configs: serde_json::Value,
    extensions_extra: impl FnOnce(Extensions) -> Extensions,
    old: ApiSurface,
    new: ApiSurface,
) -> (drift_engine::RunSummary, Vec<Report>) {
    let (reporter, collected) = CollectingReporter::new();
    let extensions = extensions_extra(
        Extensions::new()
            .with_analyzer(JsonAnalyzerFactory::new())
            .with_reporter(reporter),
    );
    let mut driver = AnalysisDriver::new(
        config,
        parse_extension_configurations(&extension_configs).unwrap(),
        extensions,
        old,
        new,
    )
    .unwrap();
    driver.open().unwrap();
    let summary = driver.run().unwrap();
    driver.close();
    let reports = collected.borrow().clone();
    (summary, reports)
}

fn run_plain(old: ApiSurface, new: ApiSurface) -> (drift_engine::RunSummary, Vec<Report>) {
    run(
        PipelineConfiguration::default(),
        json!(null),
        |e| e,
        old,
        new,
    )
}

#[test]
fn changed_value_is_reported_with_old_and_new() {
    let (summary, reports) = run_plain(
        surface("api.json", json!({"version": 1, "stable": true})),
        surface("api.json", json!({"version": 2, "stable": true})),
    );

    assert_eq!(summary.reports, 1);
    let report = &reports[0];
    assert_eq!(report.differences.len(), 1);
    let difference = &report.differences[0];
    assert_eq!(difference.code, "json.changed");
    assert_eq!(
        difference.attachments.get("oldValue").map(String::as_str),
        Some("1")
    );
    assert_eq!(
        difference.attachments.get("newValue").map(String::as_str),
        Some("2")
    );
    assert_eq!(
        report.new.as_ref().unwrap().display,
        "api.json/version"
    );
}

#[test]
fn comparing_a_surface_with_itself_reports_nothing() {
    let document = json!({"a": {"b": [1, 2, 3]}, "c": null});
    let (summary, reports) = run_plain(
        surface("api.json", document.clone()),
        surface("api.json", document),
    );
    assert_eq!(summary.reports, 0);
    assert!(reports.is_empty());
    assert_eq!(summary.max_criticality, None);
}

#[test]
fn added_and_removed_swap_when_sides_swap() {
    let older = || surface("api.json", json!({"kept": 1, "dropped": 2}));
    let newer = || surface("api.json", json!({"kept": 1, "introduced": 3}));

    let (_, forward) = run_plain(older(), newer());
    let (_, backward) = run_plain(newer(), older());

    let codes = |reports: &[Report]| -> Vec<(String, String)> {
        reports
            .iter()
            .flat_map(|r| {
                let subject = r
                    .new
                    .as_ref()
                    .or(r.old.as_ref())
                    .unwrap()
                    .signature
                    .clone();
                r.differences
                    .iter()
                    .map(move |d| (subject.clone(), d.code.clone()))
            })
            .collect()
    };

    let mut forward_codes = codes(&forward);
    let mut expected: Vec<(String, String)> = forward_codes
        .iter()
        .map(|(subject, code)| {
            let swapped = match code.as_str() {
                "json.added" => "json.removed",
                "json.removed" => "json.added",
                other => other,
            };
            (subject.clone(), swapped.to_string())
        })
        .collect();
    let mut backward_codes = codes(&backward);
    forward_codes.sort();
    backward_codes.sort();
    expected.sort();
    assert_eq!(backward_codes, expected);
    assert_ne!(forward_codes, backward_codes);
}

#[test]
fn removals_dominate_the_run_criticality() {
    let (summary, _) = run_plain(
        surface("api.json", json!({"kept": 1, "dropped": 2})),
        surface("api.json", json!({"kept": 1})),
    );
    // breaking maps to "error" by default
    assert_eq!(summary.max_criticality, Some(Criticality::error()));
}

#[test]
fn supplementary_archives_are_pruned_away() {
    let with_dep = |dep: serde_json::Value| {
        ApiSurface::new()
            .with_archive(MemoryArchive::new(
                "api.json",
                json!({"a": 1}).to_string().into_bytes(),
            ))
            .with_supplementary(MemoryArchive::new(
                "dep.json",
                dep.to_string().into_bytes(),
            ))
    };

    // the supplementary document differs, but nothing references it
    let (summary, _) = run_plain(with_dep(json!({"d": 1})), with_dep(json!({"d": 2})));
    assert_eq!(summary.reports, 0);
}

#[test]
fn pruning_can_be_turned_off() {
    let config = PipelineConfiguration::from_json(&json!({"prune": false})).unwrap();
    let with_dep = |dep: serde_json::Value| {
        ApiSurface::new()
            .with_archive(MemoryArchive::new(
                "api.json",
                json!({"a": 1}).to_string().into_bytes(),
            ))
            .with_supplementary(MemoryArchive::new(
                "dep.json",
                dep.to_string().into_bytes(),
            ))
    };

    let (summary, reports) = run(
        config,
        json!(null),
        |e| e,
        with_dep(json!({"d": 1})),
        with_dep(json!({"d": 2})),
    );
    assert_eq!(summary.reports, 1);
    assert_eq!(reports[0].differences[0].code, "json.changed");
}

#[test]
fn differences_transform_can_silence_and_justify() {
    let extension_configs = json!([{
        "extension": "difference.alter",
        "configuration": {
            "differences": [
                {"code": "json.added", "ignore": true},
                {
                    "code": "json.removed",
                    "justification": "scheduled removal",
                    "criticality": "documented"
                }
            ]
        }
    }]);

    let (summary, reports) = run(
        PipelineConfiguration::default(),
        extension_configs,
        |e| e.with_transform(DifferencesTransform::new()),
        surface("api.json", json!({"kept": 1, "dropped": 2})),
        surface("api.json", json!({"kept": 1, "introduced": 3})),
    );

    assert_eq!(summary.reports, 1);
    let difference = &reports[0].differences[0];
    assert_eq!(difference.code, "json.removed");
    assert_eq!(difference.justification.as_deref(), Some("scheduled removal"));
    assert_eq!(difference.criticality, Some(Criticality::documented()));
    assert_eq!(summary.max_criticality, Some(Criticality::documented()));
}

#[test]
fn element_filter_excludes_subtrees_by_recipe() {
    let extension_configs = json!([{
        "extension": "filter.elements",
        "configuration": {
            "elements": {
                "exclude": [
                    {"matcher": "matcher.regex", "match": "^api\\.json/internal.*"}
                ]
            }
        }
    }]);

    let (summary, reports) = run(
        PipelineConfiguration::default(),
        extension_configs,
        |e| {
            e.with_filter(ElementFilterProvider::new())
                .with_matcher(RegexElementMatcher)
        },
        surface(
            "api.json",
            json!({"public": 1, "internal": {"detail": 1}}),
        ),
        surface(
            "api.json",
            json!({"public": 2, "internal": {"detail": 2}}),
        ),
    );

    assert_eq!(summary.reports, 1);
    assert_eq!(reports[0].new.as_ref().unwrap().display, "api.json/public");
}

#[test]
fn runs_are_byte_identical() {
    let run_once = || {
        let (_, reports) = run_plain(
            surface("api.json", json!({"a": {"x": 1}, "b": [1, 2], "c": "s"})),
            surface("api.json", json!({"a": {"x": 2}, "b": [1], "d": "t"})),
        );
        reports
            .iter()
            .map(|r| r.to_json().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    };
    assert_eq!(run_once(), run_once());
}
