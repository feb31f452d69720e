//! Element kind tags.
//!
//! Kinds participate in the sibling ordering: siblings sort by kind first,
//! then by signature. The derived order over the variants below is
//! load-bearing -- `Annotation` is declared last so that annotation
//! elements always sort after every other sibling, which lets the check
//! dispatcher fold their differences into the containing element's report.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// The kind tag of an element.
///
/// The closed variants cover the kinds every back-end shares; back-ends
/// introduce their own node types through [`ElementKind::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementKind {
    Type,
    Method,
    Field,
    Parameter,
    /// A back-end specific kind, ordered by its label among `Custom` kinds.
    Custom(String),
    /// Always sorts last among siblings.
    Annotation,
}

impl ElementKind {
    /// Stable textual label, used in reports and configuration.
    pub fn label(&self) -> &str {
        match self {
            ElementKind::Type => "type",
            ElementKind::Method => "method",
            ElementKind::Field => "field",
            ElementKind::Parameter => "parameter",
            ElementKind::Custom(name) => name,
            ElementKind::Annotation => "annotation",
        }
    }

    /// Parse a label back into a kind. Unrecognized labels become
    /// [`ElementKind::Custom`].
    pub fn from_label(label: &str) -> ElementKind {
        match label {
            "type" => ElementKind::Type,
            "method" => ElementKind::Method,
            "field" => ElementKind::Field,
            "parameter" => ElementKind::Parameter,
            "annotation" => ElementKind::Annotation,
            other => ElementKind::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for ElementKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for ElementKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LabelVisitor;

        impl Visitor<'_> for LabelVisitor {
            type Value = ElementKind;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an element kind label")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ElementKind, E> {
                Ok(ElementKind::from_label(v))
            }
        }

        deserializer.deserialize_str(LabelVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotations_sort_last() {
        let mut kinds = vec![
            ElementKind::Annotation,
            ElementKind::Custom("zzz".to_string()),
            ElementKind::Field,
            ElementKind::Type,
            ElementKind::Method,
        ];
        kinds.sort();
        assert_eq!(kinds.last(), Some(&ElementKind::Annotation));
        assert_eq!(kinds.first(), Some(&ElementKind::Type));
    }

    #[test]
    fn custom_kinds_order_by_label() {
        assert!(ElementKind::Custom("a".into()) < ElementKind::Custom("b".into()));
        assert!(ElementKind::Parameter < ElementKind::Custom("a".into()));
        assert!(ElementKind::Custom("zzz".into()) < ElementKind::Annotation);
    }

    #[test]
    fn label_round_trip() {
        for kind in [
            ElementKind::Type,
            ElementKind::Method,
            ElementKind::Field,
            ElementKind::Parameter,
            ElementKind::Annotation,
            ElementKind::Custom("json-value".into()),
        ] {
            assert_eq!(ElementKind::from_label(kind.label()), kind);
        }
    }

    #[test]
    fn serde_uses_labels() {
        let json = serde_json::to_string(&ElementKind::Custom("json-value".into())).unwrap();
        assert_eq!(json, "\"json-value\"");
        let back: ElementKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ElementKind::Custom("json-value".into()));
    }
}
