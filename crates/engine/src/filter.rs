//! Tree filters: three-valued, deferred-resolution predicates consulted
//! during a depth-first walk.
//!
//! A filter is called with `start(element)` before an element's children
//! are processed and `finish(element)` after, LIFO-nested. Elements whose
//! match is still undecided after their `finish` are resolved by the
//! terminal `finalize()`; the caller must keep such elements around until
//! then.

use std::collections::BTreeMap;

use drift_model::{ElementId, Forest};

use crate::context::Configurable;
use crate::ternary::Ternary;

/// Outcome of [`TreeFilter::start`]: whether the element matches and
/// whether the walk should descend into its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterStartResult {
    pub matched: Ternary,
    pub descend: Ternary,
}

impl FilterStartResult {
    pub fn matched_and_descend() -> Self {
        FilterStartResult {
            matched: Ternary::Yes,
            descend: Ternary::Yes,
        }
    }

    pub fn not_matched() -> Self {
        FilterStartResult {
            matched: Ternary::No,
            descend: Ternary::Yes,
        }
    }

    pub fn undecided() -> Self {
        FilterStartResult {
            matched: Ternary::Undecided,
            descend: Ternary::Yes,
        }
    }

    pub fn and(self, other: FilterStartResult) -> FilterStartResult {
        FilterStartResult {
            matched: self.matched.and(other.matched),
            descend: self.descend.and(other.descend),
        }
    }

    pub fn or(self, other: FilterStartResult) -> FilterStartResult {
        FilterStartResult {
            matched: self.matched.or(other.matched),
            descend: self.descend.or(other.descend),
        }
    }
}

/// Outcome of [`TreeFilter::finish`] for a single element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterFinishResult {
    pub matched: Ternary,
}

impl FilterFinishResult {
    pub fn matches() -> Self {
        FilterFinishResult {
            matched: Ternary::Yes,
        }
    }

    pub fn does_not_match() -> Self {
        FilterFinishResult { matched: Ternary::No }
    }

    pub fn undecided() -> Self {
        FilterFinishResult {
            matched: Ternary::Undecided,
        }
    }

    pub fn from_start(start: FilterStartResult) -> Self {
        FilterFinishResult {
            matched: start.matched,
        }
    }

    pub fn and(self, other: FilterFinishResult) -> FilterFinishResult {
        FilterFinishResult {
            matched: self.matched.and(other.matched),
        }
    }

    pub fn or(self, other: FilterFinishResult) -> FilterFinishResult {
        FilterFinishResult {
            matched: self.matched.or(other.matched),
        }
    }
}

/// A stateful filter over one forest's elements.
///
/// The caller guarantees that `finish(element)` is called exactly once for
/// every `start(element)`, nested LIFO, and that `finalize()` is called
/// once after the walk. Implementations may defer decisions until
/// `finalize()` (e.g. "include a container iff any child is included").
pub trait TreeFilter {
    fn start(&mut self, forest: &Forest, element: ElementId) -> FilterStartResult;

    fn finish(&mut self, forest: &Forest, element: ElementId) -> FilterFinishResult;

    /// Final resolutions for elements whose `finish` stayed undecided.
    /// Elements absent from the returned map remain undecided; the caller
    /// decides their fate.
    fn finalize(&mut self) -> BTreeMap<ElementId, FilterFinishResult> {
        BTreeMap::new()
    }
}

/// Produces tree filters for the forests of a given archive analyzer.
/// Returning `None` means the provider has no opinion for that analyzer.
pub trait TreeFilterProvider: Configurable {
    fn filter_for(&self, analyzer: &str) -> Option<Box<dyn TreeFilter>>;
}

/// The neutral filter: everything matches, always descend.
pub fn match_and_descend() -> Box<dyn TreeFilter> {
    Box::new(MatchAndDescend)
}

struct MatchAndDescend;

impl TreeFilter for MatchAndDescend {
    fn start(&mut self, _forest: &Forest, _element: ElementId) -> FilterStartResult {
        FilterStartResult::matched_and_descend()
    }

    fn finish(&mut self, _forest: &Forest, _element: ElementId) -> FilterFinishResult {
        FilterFinishResult::matches()
    }
}

#[derive(Clone, Copy)]
enum MergeOp {
    Intersection,
    Union,
}

/// A filter matching iff all of `filters` match. An empty list matches
/// everything.
pub fn intersection(filters: Vec<Box<dyn TreeFilter>>) -> Box<dyn TreeFilter> {
    Box::new(Merged {
        filters,
        op: MergeOp::Intersection,
    })
}

/// A filter matching iff at least one of `filters` matches. An empty list
/// matches everything.
pub fn union(filters: Vec<Box<dyn TreeFilter>>) -> Box<dyn TreeFilter> {
    Box::new(Merged {
        filters,
        op: MergeOp::Union,
    })
}

struct Merged {
    filters: Vec<Box<dyn TreeFilter>>,
    op: MergeOp,
}

impl TreeFilter for Merged {
    fn start(&mut self, forest: &Forest, element: ElementId) -> FilterStartResult {
        let mut combined: Option<FilterStartResult> = None;
        for filter in &mut self.filters {
            let result = filter.start(forest, element);
            combined = Some(match (combined, self.op) {
                (None, _) => result,
                (Some(acc), MergeOp::Intersection) => acc.and(result),
                (Some(acc), MergeOp::Union) => acc.or(result),
            });
        }
        combined.unwrap_or_else(FilterStartResult::matched_and_descend)
    }

    fn finish(&mut self, forest: &Forest, element: ElementId) -> FilterFinishResult {
        let mut combined: Option<FilterFinishResult> = None;
        for filter in &mut self.filters {
            let result = filter.finish(forest, element);
            combined = Some(match (combined, self.op) {
                (None, _) => result,
                (Some(acc), MergeOp::Intersection) => acc.and(result),
                (Some(acc), MergeOp::Union) => acc.or(result),
            });
        }
        combined.unwrap_or_else(FilterFinishResult::matches)
    }

    fn finalize(&mut self) -> BTreeMap<ElementId, FilterFinishResult> {
        let op = self.op;
        let mut merged: BTreeMap<ElementId, FilterFinishResult> = BTreeMap::new();
        for filter in &mut self.filters {
            for (element, result) in filter.finalize() {
                merged
                    .entry(element)
                    .and_modify(|acc| {
                        *acc = match op {
                            MergeOp::Intersection => acc.and(result),
                            MergeOp::Union => acc.or(result),
                        }
                    })
                    .or_insert(result);
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_model::{Element, ElementKind};

    struct Fixed(Ternary);

    impl TreeFilter for Fixed {
        fn start(&mut self, _forest: &Forest, _element: ElementId) -> FilterStartResult {
            FilterStartResult {
                matched: self.0,
                descend: Ternary::Yes,
            }
        }

        fn finish(&mut self, _forest: &Forest, _element: ElementId) -> FilterFinishResult {
            FilterFinishResult { matched: self.0 }
        }
    }

    fn one_element_forest() -> (Forest, ElementId) {
        let mut forest = Forest::new("test", Vec::new());
        let id = forest.add_root(Element::new(ElementKind::Type, "A", "A"));
        (forest, id)
    }

    #[test]
    fn intersection_follows_the_lattice() {
        let (forest, id) = one_element_forest();
        let cases = [
            (Ternary::Undecided, Ternary::No, Ternary::No),
            (Ternary::Undecided, Ternary::Yes, Ternary::Undecided),
            (Ternary::Yes, Ternary::Yes, Ternary::Yes),
        ];
        for (a, b, expected) in cases {
            let mut merged = intersection(vec![Box::new(Fixed(a)), Box::new(Fixed(b))]);
            assert_eq!(merged.start(&forest, id).matched, expected, "{a} & {b}");
        }
    }

    #[test]
    fn union_follows_the_lattice() {
        let (forest, id) = one_element_forest();
        let cases = [
            (Ternary::Undecided, Ternary::Yes, Ternary::Yes),
            (Ternary::Undecided, Ternary::No, Ternary::Undecided),
            (Ternary::No, Ternary::No, Ternary::No),
        ];
        for (a, b, expected) in cases {
            let mut merged = union(vec![Box::new(Fixed(a)), Box::new(Fixed(b))]);
            assert_eq!(merged.start(&forest, id).matched, expected, "{a} | {b}");
        }
    }

    #[test]
    fn empty_merge_matches_everything() {
        let (forest, id) = one_element_forest();
        let mut merged = intersection(Vec::new());
        assert_eq!(
            merged.start(&forest, id),
            FilterStartResult::matched_and_descend()
        );
    }

    #[test]
    fn finalize_merges_per_element() {
        struct Resolving(ElementId, Ternary);

        impl TreeFilter for Resolving {
            fn start(&mut self, _f: &Forest, _e: ElementId) -> FilterStartResult {
                FilterStartResult::undecided()
            }

            fn finish(&mut self, _f: &Forest, _e: ElementId) -> FilterFinishResult {
                FilterFinishResult::undecided()
            }

            fn finalize(&mut self) -> BTreeMap<ElementId, FilterFinishResult> {
                let mut map = BTreeMap::new();
                map.insert(self.0, FilterFinishResult { matched: self.1 });
                map
            }
        }

        let (_, id) = one_element_forest();
        let mut merged = intersection(vec![
            Box::new(Resolving(id, Ternary::Yes)),
            Box::new(Resolving(id, Ternary::Undecided)),
        ]);
        let resolved = merged.finalize();
        assert_eq!(resolved.get(&id).map(|r| r.matched), Some(Ternary::Undecided));
    }
}
