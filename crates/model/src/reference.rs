//! Typed cross-reference edges between elements.
//!
//! References form a separate graph from the parent tree: they never own
//! their targets and may be cyclic. Every edge `E --kind--> T` recorded on
//! a forest has a mirror entry in `T`'s referencing set.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::element::ElementId;

/// The kind of a use site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceKind {
    Contains,
    Annotates,
    HasType,
    ReturnType,
    ParameterType,
    IsImplemented,
    IsInherited,
    IsThrown,
    TypeParameterOrBound,
}

impl ReferenceKind {
    /// Whether a use site of this kind pulls its target into the API.
    /// Supplementary elements reachable from primary elements only through
    /// such edges survive pruning.
    pub fn moves_to_api(self) -> bool {
        matches!(
            self,
            ReferenceKind::Contains
                | ReferenceKind::HasType
                | ReferenceKind::ReturnType
                | ReferenceKind::ParameterType
                | ReferenceKind::IsImplemented
                | ReferenceKind::IsInherited
                | ReferenceKind::TypeParameterOrBound
        )
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReferenceKind::Contains => "contains",
            ReferenceKind::Annotates => "annotates",
            ReferenceKind::HasType => "has-type",
            ReferenceKind::ReturnType => "return-type",
            ReferenceKind::ParameterType => "parameter-type",
            ReferenceKind::IsImplemented => "is-implemented",
            ReferenceKind::IsInherited => "is-inherited",
            ReferenceKind::IsThrown => "is-thrown",
            ReferenceKind::TypeParameterOrBound => "type-parameter-or-bound",
        };
        f.write_str(label)
    }
}

/// One endpoint of a reference edge as seen from the other endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub element: ElementId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moving_to_api_kinds() {
        assert!(ReferenceKind::Contains.moves_to_api());
        assert!(ReferenceKind::IsInherited.moves_to_api());
        assert!(ReferenceKind::TypeParameterOrBound.moves_to_api());
        assert!(!ReferenceKind::Annotates.moves_to_api());
        assert!(!ReferenceKind::IsThrown.moves_to_api());
    }
}
