//! The check contract: pluggable producers of raw differences.

use std::collections::BTreeSet;

use drift_model::{ElementId, ElementKind, Forest};

use crate::difference::Difference;
use crate::error::CheckError;

/// A matched (or half-matched) element pair handed to checks, transforms,
/// and filters during the paired walk.
#[derive(Clone, Copy)]
pub struct ElementPair<'a> {
    pub old_forest: &'a Forest,
    pub new_forest: &'a Forest,
    pub old: Option<ElementId>,
    pub new: Option<ElementId>,
}

impl<'a> ElementPair<'a> {
    /// The kind shared by both sides (equal by construction of the walk).
    pub fn kind(&self) -> &'a ElementKind {
        match (self.old, self.new) {
            (Some(old), _) => self.old_forest.element(old).kind(),
            (None, Some(new)) => self.new_forest.element(new).kind(),
            (None, None) => unreachable!("a pair always has at least one side"),
        }
    }

    pub fn has_missing_side(&self) -> bool {
        self.old.is_none() || self.new.is_none()
    }

    /// Human-readable identity of the pair, preferring the new side.
    pub fn display(&self) -> &'a str {
        match (self.new, self.old) {
            (Some(new), _) => self.new_forest.element(new).display(),
            (None, Some(old)) => self.old_forest.element(old).display(),
            (None, None) => "",
        }
    }
}

/// A stateful visitor producing raw differences for element pairs.
///
/// Checks declare the element kinds they care about; the dispatcher calls
/// `enter` before a pair's children are visited and `leave` afterwards,
/// strictly balanced and LIFO-nested. Differences are collected at
/// `leave`.
pub trait Check {
    /// The element kinds this check wants to visit.
    fn interest(&self) -> BTreeSet<ElementKind>;

    /// Whether this check still fires when one side of the pair is
    /// missing. Checks reporting additions and removals need this.
    fn descends_on_non_existing(&self) -> bool {
        false
    }

    fn enter(&mut self, pair: &ElementPair<'_>);

    fn leave(&mut self, pair: &ElementPair<'_>) -> Result<Vec<Difference>, CheckError>;
}
