//! The JSON value-diff check.

use std::collections::BTreeSet;

use drift_model::ElementKind;

use drift_engine::{
    Check, CheckError, CompatibilityDimension, Difference, ElementPair, Severity,
};

/// Kind of a JSON document root element.
pub fn document_kind() -> ElementKind {
    ElementKind::Custom("json-document".to_string())
}

/// Kind of every node inside a document.
pub fn value_kind() -> ElementKind {
    ElementKind::Custom("json-value".to_string())
}

/// Reports added, removed, and changed JSON nodes.
///
/// Additions and removals only ever show up as half-pairs, so this check
/// descends on non-existing elements.
#[derive(Debug, Default)]
pub struct JsonValueCheck;

impl JsonValueCheck {
    pub fn new() -> Self {
        JsonValueCheck
    }
}

fn base(code: &str, name: &str, severity: Severity) -> drift_engine::DifferenceBuilder {
    Difference::builder(code)
        .name(name)
        .classify(CompatibilityDimension::Semantic, severity)
}

impl Check for JsonValueCheck {
    fn interest(&self) -> BTreeSet<ElementKind> {
        [value_kind()].into_iter().collect()
    }

    fn descends_on_non_existing(&self) -> bool {
        true
    }

    fn enter(&mut self, _pair: &ElementPair<'_>) {}

    fn leave(&mut self, pair: &ElementPair<'_>) -> Result<Vec<Difference>, CheckError> {
        let difference = match (pair.old, pair.new) {
            (None, Some(new)) => {
                let element = pair.new_forest.element(new);
                Some(
                    base("json.added", "node added", Severity::PotentiallyBreaking)
                        .description("The node was added.")
                        .attach("path", element.display())
                        .build(),
                )
            }
            (Some(old), None) => {
                let element = pair.old_forest.element(old);
                Some(
                    base("json.removed", "node removed", Severity::Breaking)
                        .description("The node was removed.")
                        .attach("path", element.display())
                        .build(),
                )
            }
            (Some(old), Some(new)) => {
                let old_element = pair.old_forest.element(old);
                let new_element = pair.new_forest.element(new);
                if old_element.value() == new_element.value() {
                    None
                } else {
                    let old_value = old_element.value().unwrap_or("<structure>");
                    let new_value = new_element.value().unwrap_or("<structure>");
                    Some(
                        base("json.changed", "value changed", Severity::PotentiallyBreaking)
                            .description(format!(
                                "The value changed from `{old_value}` to `{new_value}`."
                            ))
                            .attach("path", new_element.display())
                            .attach("oldValue", old_value)
                            .attach("newValue", new_value)
                            .build(),
                    )
                }
            }
            (None, None) => None,
        };

        Ok(difference.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_model::{Element, Forest};

    fn forest_with_value(value: Option<&str>) -> Forest {
        let mut forest = Forest::new("analyzer.json", Vec::new());
        let root = forest.add_root(Element::new(document_kind(), "api.json", "api.json"));
        let mut element = Element::new(value_kind(), "field", "api.json/field");
        if let Some(v) = value {
            element = element.with_value(v);
        }
        forest.add_child(root, element);
        forest
    }

    fn value_id(forest: &Forest) -> drift_model::ElementId {
        forest.children(forest.roots()[0])[0]
    }

    #[test]
    fn reports_additions_as_potentially_breaking() {
        let old = forest_with_value(None);
        let new = forest_with_value(Some("1"));
        let mut check = JsonValueCheck::new();
        let diffs = check
            .leave(&ElementPair {
                old_forest: &old,
                new_forest: &new,
                old: None,
                new: Some(value_id(&new)),
            })
            .unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].code, "json.added");
        assert_eq!(
            diffs[0].classification.get(&CompatibilityDimension::Semantic),
            Some(&Severity::PotentiallyBreaking)
        );
    }

    #[test]
    fn reports_removals_as_breaking() {
        let old = forest_with_value(Some("1"));
        let mut check = JsonValueCheck::new();
        let diffs = check
            .leave(&ElementPair {
                old_forest: &old,
                new_forest: &old,
                old: Some(value_id(&old)),
                new: None,
            })
            .unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].code, "json.removed");
        assert_eq!(
            diffs[0].classification.get(&CompatibilityDimension::Semantic),
            Some(&Severity::Breaking)
        );
    }

    #[test]
    fn reports_value_changes_with_attachments() {
        let old = forest_with_value(Some("1"));
        let new = forest_with_value(Some("2"));
        let mut check = JsonValueCheck::new();
        let diffs = check
            .leave(&ElementPair {
                old_forest: &old,
                new_forest: &new,
                old: Some(value_id(&old)),
                new: Some(value_id(&new)),
            })
            .unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].code, "json.changed");
        assert_eq!(diffs[0].attachments.get("oldValue").map(String::as_str), Some("1"));
        assert_eq!(diffs[0].attachments.get("newValue").map(String::as_str), Some("2"));
    }

    #[test]
    fn equal_values_produce_nothing() {
        let old = forest_with_value(Some("1"));
        let new = forest_with_value(Some("1"));
        let mut check = JsonValueCheck::new();
        let diffs = check
            .leave(&ElementPair {
                old_forest: &old,
                new_forest: &new,
                old: Some(value_id(&old)),
                new: Some(value_id(&new)),
            })
            .unwrap();
        assert!(diffs.is_empty());
    }

    #[test]
    fn container_to_scalar_is_a_change() {
        let old = forest_with_value(None);
        let new = forest_with_value(Some("3"));
        let mut check = JsonValueCheck::new();
        let diffs = check
            .leave(&ElementPair {
                old_forest: &old,
                new_forest: &new,
                old: Some(value_id(&old)),
                new: Some(value_id(&new)),
            })
            .unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].code, "json.changed");
        assert_eq!(
            diffs[0].attachments.get("oldValue").map(String::as_str),
            Some("<structure>")
        );
    }
}
