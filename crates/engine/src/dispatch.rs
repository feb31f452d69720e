//! Check dispatching during the paired walk.

use std::collections::BTreeMap;

use drift_model::ElementKind;

use crate::check::{Check, ElementPair};
use crate::difference::Difference;
use crate::error::CheckError;

/// Routes element pairs to the checks interested in their kind and keeps
/// the enter/leave bookkeeping balanced.
///
/// Once a pair with a missing side is entered, the dispatcher switches to
/// *non-existence mode*: until that pair is left again, only checks that
/// descend on non-existing elements fire, even for nested pairs that have
/// both sides present.
pub struct CheckDispatcher {
    checks: Vec<Box<dyn Check>>,
    by_kind: BTreeMap<ElementKind, Vec<usize>>,
    descending_by_kind: BTreeMap<ElementKind, Vec<usize>>,
    visit_stack: Vec<Vec<usize>>,
    non_existing_depth: usize,
}

impl CheckDispatcher {
    pub fn new(checks: Vec<Box<dyn Check>>) -> Self {
        let mut by_kind: BTreeMap<ElementKind, Vec<usize>> = BTreeMap::new();
        let mut descending_by_kind: BTreeMap<ElementKind, Vec<usize>> = BTreeMap::new();
        for (index, check) in checks.iter().enumerate() {
            for kind in check.interest() {
                by_kind.entry(kind.clone()).or_default().push(index);
                if check.descends_on_non_existing() {
                    descending_by_kind.entry(kind).or_default().push(index);
                }
            }
        }
        CheckDispatcher {
            checks,
            by_kind,
            descending_by_kind,
            visit_stack: Vec::new(),
            non_existing_depth: 0,
        }
    }

    /// Whether any check wants to keep visiting below a pair with a
    /// missing side. When false, such subtrees can be skipped entirely.
    pub fn has_descending_checks(&self) -> bool {
        !self.descending_by_kind.is_empty()
    }

    /// Activate the interested checks for `pair` and call their `enter`.
    pub fn enter(&mut self, pair: &ElementPair<'_>) {
        let non_existing = self.non_existing_depth > 0 || pair.has_missing_side();
        let table = if non_existing {
            &self.descending_by_kind
        } else {
            &self.by_kind
        };
        let active = table.get(pair.kind()).cloned().unwrap_or_default();
        for &index in &active {
            self.checks[index].enter(pair);
        }
        self.visit_stack.push(active);
        if pair.has_missing_side() {
            self.non_existing_depth += 1;
        }
    }

    /// Call `leave` on exactly the checks entered for `pair`, collecting
    /// their differences. Failures are returned alongside, never raised.
    pub fn leave(&mut self, pair: &ElementPair<'_>) -> Vec<Result<Vec<Difference>, CheckError>> {
        let Some(active) = self.visit_stack.pop() else {
            return Vec::new();
        };
        if pair.has_missing_side() {
            self.non_existing_depth = self.non_existing_depth.saturating_sub(1);
        }
        active
            .into_iter()
            .map(|index| self.checks[index].leave(pair))
            .collect()
    }
}
