//! Element nodes and their arena handles.

use serde::{Deserialize, Serialize};

use crate::archive::ArchiveId;
use crate::kind::ElementKind;

/// Handle to an element in its forest's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(pub(crate) u32);

impl ElementId {
    pub(crate) fn from_index(index: usize) -> ElementId {
        ElementId(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node in an element forest.
///
/// Elements are created through [`crate::Forest::add_root`] and
/// [`crate::Forest::add_child`]; the forest keeps children sorted by
/// `(kind, signature)` no matter the insertion order.
#[derive(Debug, Clone)]
pub struct Element {
    pub(crate) kind: ElementKind,
    pub(crate) signature: String,
    pub(crate) display: String,
    pub(crate) archive: Option<ArchiveId>,
    pub(crate) parent: Option<ElementId>,
    pub(crate) children: Vec<ElementId>,
    pub(crate) value: Option<String>,
    pub(crate) in_api: bool,
    pub(crate) in_api_through_use: bool,
}

impl Element {
    /// A new detached element. `signature` is the per-kind comparable key
    /// that orders and matches siblings; `display` is the stable
    /// human-readable identity used by matchers and reporters.
    pub fn new(
        kind: ElementKind,
        signature: impl Into<String>,
        display: impl Into<String>,
    ) -> Self {
        Element {
            kind,
            signature: signature.into(),
            display: display.into(),
            archive: None,
            parent: None,
            children: Vec::new(),
            value: None,
            in_api: false,
            in_api_through_use: false,
        }
    }

    pub fn with_archive(mut self, archive: ArchiveId) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Attach a scalar payload. Back-ends use this for leaf values their
    /// checks compare (e.g. the rendered value of a JSON scalar).
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn archive(&self) -> Option<ArchiveId> {
        self.archive
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Whether this element is part of the API proper.
    pub fn is_in_api(&self) -> bool {
        self.in_api
    }

    /// Whether this element entered the API only because a primary element
    /// uses it.
    pub fn is_in_api_through_use(&self) -> bool {
        self.in_api_through_use
    }

    /// The sibling sort key. Siblings order by kind first, then signature;
    /// two elements with equal keys are "the same" element across forests.
    pub fn sort_key(&self) -> (&ElementKind, &str) {
        (&self.kind, &self.signature)
    }
}

/// A detached copy of an element's identity, carried by reports so they
/// outlive the forest they were produced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub kind: ElementKind,
    pub signature: String,
    pub display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_key_orders_kind_first() {
        let a = Element::new(ElementKind::Type, "zzz", "zzz");
        let b = Element::new(ElementKind::Method, "aaa", "aaa");
        assert!(a.sort_key() < b.sort_key());
    }

    #[test]
    fn value_payload_is_optional() {
        let plain = Element::new(ElementKind::Field, "f", "f");
        assert_eq!(plain.value(), None);
        let scalar = Element::new(ElementKind::Field, "f", "f").with_value("42");
        assert_eq!(scalar.value(), Some("42"));
    }
}
