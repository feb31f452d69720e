//! The forest walker: lock-step depth-first traversal of two forests.
//!
//! At each level the walker zips the two sorted child sequences by
//! `(kind, signature)`. Equal keys yield a matched pair; a key present on
//! one side only yields a half-pair with the other side missing. The
//! traversal keeps its own frame stack, so arbitrarily deep forests cannot
//! exhaust the call stack.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use drift_model::{ElementId, Forest};

use crate::check::ElementPair;
use crate::error::AnalysisError;

/// Cooperative cancellation flag checked between child visits.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Receives the paired traversal. `enter` returns whether to descend into
/// the pair's children; `leave` is called after the subtree (or right
/// away when not descending), strictly balanced with `enter`.
pub trait PairVisitor {
    fn enter(&mut self, pair: &ElementPair<'_>) -> Result<bool, AnalysisError>;

    fn leave(&mut self, pair: &ElementPair<'_>) -> Result<(), AnalysisError>;
}

/// Walk the two forests in lock step, visiting sibling pairs in
/// `(kind, signature)` order.
pub fn walk_paired(
    old: &Forest,
    new: &Forest,
    visitor: &mut dyn PairVisitor,
    cancel: &CancellationToken,
) -> Result<(), AnalysisError> {
    struct Frame {
        old: Option<ElementId>,
        new: Option<ElementId>,
        pairs: Vec<(Option<ElementId>, Option<ElementId>)>,
        next: usize,
    }

    enum Action {
        Visit(Option<ElementId>, Option<ElementId>),
        Pop,
    }

    let mut stack = vec![Frame {
        old: None,
        new: None,
        pairs: zip_sorted(old, old.roots(), new, new.roots()),
        next: 0,
    }];

    loop {
        let action = {
            let Some(frame) = stack.last_mut() else { break };
            if frame.next < frame.pairs.len() {
                let (o, n) = frame.pairs[frame.next];
                frame.next += 1;
                Action::Visit(o, n)
            } else {
                Action::Pop
            }
        };

        match action {
            Action::Visit(o, n) => {
                if cancel.is_cancelled() {
                    return Err(AnalysisError::Cancelled);
                }
                let pair = ElementPair {
                    old_forest: old,
                    new_forest: new,
                    old: o,
                    new: n,
                };
                if visitor.enter(&pair)? {
                    let old_children = o.map(|id| old.children(id)).unwrap_or(&[]);
                    let new_children = n.map(|id| new.children(id)).unwrap_or(&[]);
                    stack.push(Frame {
                        old: o,
                        new: n,
                        pairs: zip_sorted(old, old_children, new, new_children),
                        next: 0,
                    });
                } else {
                    visitor.leave(&pair)?;
                }
            }
            Action::Pop => {
                if let Some(frame) = stack.pop() {
                    if frame.old.is_some() || frame.new.is_some() {
                        visitor.leave(&ElementPair {
                            old_forest: old,
                            new_forest: new,
                            old: frame.old,
                            new: frame.new,
                        })?;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Merge two sibling lists sorted by `(kind, signature)` into the pair
/// sequence the walk visits.
fn zip_sorted(
    old: &Forest,
    old_list: &[ElementId],
    new: &Forest,
    new_list: &[ElementId],
) -> Vec<(Option<ElementId>, Option<ElementId>)> {
    let mut pairs = Vec::with_capacity(old_list.len().max(new_list.len()));
    let mut i = 0;
    let mut j = 0;
    while i < old_list.len() && j < new_list.len() {
        let old_key = old.element(old_list[i]).sort_key();
        let new_key = new.element(new_list[j]).sort_key();
        match old_key.cmp(&new_key) {
            std::cmp::Ordering::Equal => {
                pairs.push((Some(old_list[i]), Some(new_list[j])));
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => {
                pairs.push((Some(old_list[i]), None));
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                pairs.push((None, Some(new_list[j])));
                j += 1;
            }
        }
    }
    pairs.extend(old_list[i..].iter().map(|&id| (Some(id), None)));
    pairs.extend(new_list[j..].iter().map(|&id| (None, Some(id))));
    pairs
}
