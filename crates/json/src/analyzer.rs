//! The JSON archive analyzer.

use std::io::Read;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use drift_model::{ApiSurface, Archive, ArchiveId, Element, ElementId, Forest};

use drift_engine::filter::TreeFilter;
use drift_engine::retry::{with_retries, DEFAULT_COMPLETION_ATTEMPTS};
use drift_engine::{
    AnalysisContext, AnalysisError, ArchiveAnalyzer, ArchiveAnalyzerFactory, Check, Configurable,
    ConfigurationError, Ternary,
};

use crate::check::{document_kind, value_kind, JsonValueCheck};

/// The extension name of this back-end; tree filters and matcher recipes
/// are bound against it.
pub const ANALYZER_NAME: &str = "analyzer.json";

/// Constructs [`JsonArchiveAnalyzer`]s and the value-diff check.
#[derive(Debug, Default)]
pub struct JsonAnalyzerFactory;

impl JsonAnalyzerFactory {
    pub fn new() -> Self {
        JsonAnalyzerFactory
    }
}

impl Configurable for JsonAnalyzerFactory {
    fn extension_name(&self) -> &'static str {
        ANALYZER_NAME
    }

    fn initialize(&mut self, _ctx: &AnalysisContext<'_>) -> Result<(), ConfigurationError> {
        Ok(())
    }
}

impl ArchiveAnalyzerFactory for JsonAnalyzerFactory {
    fn create(
        &mut self,
        api: Rc<ApiSurface>,
        _ctx: &AnalysisContext<'_>,
    ) -> Result<Box<dyn ArchiveAnalyzer>, AnalysisError> {
        Ok(Box::new(JsonArchiveAnalyzer { api }))
    }

    fn checks(&mut self, _ctx: &AnalysisContext<'_>) -> Vec<Box<dyn Check>> {
        vec![Box::new(JsonValueCheck::new())]
    }
}

/// Analyzer over one side's archives.
pub struct JsonArchiveAnalyzer {
    api: Rc<ApiSurface>,
}

impl JsonArchiveAnalyzer {
    fn read_document(archive: &dyn Archive) -> Result<Value, AnalysisError> {
        let text = with_retries(DEFAULT_COMPLETION_ATTEMPTS, || {
            let mut contents = String::new();
            archive.open()?.read_to_string(&mut contents)?;
            Ok::<String, std::io::Error>(contents)
        })
        .map_err(|e| AnalysisError::UnresolvedArtifact {
            name: archive.name().to_string(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&text).map_err(|e| AnalysisError::UnresolvedArtifact {
            name: archive.name().to_string(),
            reason: format!("not valid JSON: {e}"),
        })
    }

    fn add_document(
        forest: &mut Forest,
        filter: &mut dyn TreeFilter,
        archive: ArchiveId,
        name: &str,
        document: &Value,
        in_api: bool,
    ) {
        let root = forest.add_root(
            Element::new(document_kind(), name, name).with_archive(archive),
        );
        forest.set_in_api(root, in_api);

        let result = filter.start(forest, root);
        if result.descend != Ternary::No {
            add_children(forest, filter, archive, root, name, document, in_api);
        }
        filter.finish(forest, root);
    }
}

/// Recurse into a container value, adding one element per member/item.
fn add_children(
    forest: &mut Forest,
    filter: &mut dyn TreeFilter,
    archive: ArchiveId,
    parent: ElementId,
    parent_display: &str,
    value: &Value,
    in_api: bool,
) {
    let entries: Vec<(String, &Value)> = match value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("{i:09}"), v))
            .collect(),
        _ => return,
    };

    for (key, child_value) in entries {
        let display = format!("{parent_display}/{key}");
        let mut element = Element::new(value_kind(), key, display.clone()).with_archive(archive);
        if !child_value.is_object() && !child_value.is_array() {
            element = element.with_value(child_value.to_string());
        }
        let child = forest.add_child(parent, element);
        forest.set_in_api(child, in_api);

        let result = filter.start(forest, child);
        if result.descend != Ternary::No {
            add_children(forest, filter, archive, child, &display, child_value, in_api);
        }
        filter.finish(forest, child);
    }
}

impl ArchiveAnalyzer for JsonArchiveAnalyzer {
    fn analyze(&mut self, filter: &mut dyn TreeFilter) -> Result<Forest, AnalysisError> {
        let mut forest = Forest::new(ANALYZER_NAME, self.api.records());

        let sides: [(&[Box<dyn Archive>], bool); 2] = [
            (self.api.archives(), true),
            (self.api.supplementary(), false),
        ];
        for (archives, in_api) in sides {
            for archive in archives {
                let document = Self::read_document(archive.as_ref())?;
                let Some(archive_id) = forest.find_archive(archive.name()) else {
                    continue;
                };
                Self::add_document(
                    &mut forest,
                    filter,
                    archive_id,
                    archive.name(),
                    &document,
                    in_api,
                );
            }
        }

        filter.finalize();
        debug!(elements = forest.len(), "json forest built");
        Ok(forest)
    }
}
