//! The transform pipeline: ordered blocks of transforms applied to a
//! fixpoint.
//!
//! Transforms are grouped into ordered *blocks*. Within a block the
//! transforms run in their configured order over the whole difference set,
//! and the block repeats until an iteration alters nothing (a replacement
//! identical to its input does not count as an alteration). Only then is
//! the block's output exposed to the next block. Two transforms that keep
//! undoing each other's work would loop forever, so each block carries an
//! iteration cap; hitting it fails the run and names the oscillating
//! difference codes, marking the configuration invalid.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use drift_model::Forest;

use crate::check::ElementPair;
use crate::context::Registered;
use crate::difference::Difference;
use crate::error::AnalysisError;
use crate::transform::{Transform, TransformOutcome};

/// How many times a block may re-run over a pair's differences before the
/// run is declared non-convergent.
pub const ITERATION_CAP: usize = 10;

/// A failure of a single transform, captured so the walk can continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformFailure {
    pub extension: String,
    pub message: String,
}

/// The final differences for one pair plus any captured transform
/// failures.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub differences: Vec<Difference>,
    pub failures: Vec<TransformFailure>,
}

/// Ordered transform blocks over borrowed transform instances, plus the
/// per-run caches. One pipeline value exists per run and dies with it.
pub struct TransformPipeline<'a> {
    transforms: &'a mut [Registered<dyn Transform>],
    blocks: Vec<Vec<usize>>,
    caches: BTreeMap<String, Box<dyn Any>>,
}

/// Check that every block entry names a known transform and no transform
/// sits in two blocks. Shared between up-front configuration validation
/// and pipeline construction.
pub fn validate_blocks(
    transforms: &[Registered<dyn Transform>],
    block_specs: &[Vec<String>],
) -> Result<Vec<Vec<usize>>, AnalysisError> {
    let mut blocks: Vec<Vec<usize>> = Vec::new();
    let mut used: BTreeSet<usize> = BTreeSet::new();

    for spec in block_specs {
        let mut block = Vec::with_capacity(spec.len());
        for name in spec {
            let index = resolve_transform(transforms, name).ok_or_else(|| {
                AnalysisError::InvalidConfiguration(format!(
                    "transform block references unknown transform '{name}'"
                ))
            })?;
            if !used.insert(index) {
                return Err(AnalysisError::InvalidConfiguration(format!(
                    "transform '{name}' appears in more than one block"
                )));
            }
            block.push(index);
        }
        blocks.push(block);
    }

    for index in 0..transforms.len() {
        if !used.contains(&index) {
            blocks.push(vec![index]);
        }
    }

    Ok(blocks)
}

impl<'a> TransformPipeline<'a> {
    /// Group `transforms` into blocks according to `block_specs`, each a
    /// list of extension ids or extension names. Transforms not mentioned
    /// in any block become singleton blocks after the explicit ones, in
    /// registration order.
    pub fn new(
        transforms: &'a mut [Registered<dyn Transform>],
        block_specs: &[Vec<String>],
    ) -> Result<Self, AnalysisError> {
        let blocks = validate_blocks(transforms, block_specs)?;
        Ok(TransformPipeline {
            transforms,
            blocks,
            caches: BTreeMap::new(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Per-run scratch storage for an extension, created on first access.
    /// The map is append-only and owned by this pipeline, so nothing leaks
    /// between runs.
    pub fn cache_entry<T: Any>(
        &mut self,
        extension: &str,
        init: impl FnOnce() -> T,
    ) -> &mut T {
        let needs_init = match self.caches.get(extension) {
            Some(slot) => !slot.is::<T>(),
            None => true,
        };
        if needs_init {
            self.caches.insert(extension.to_string(), Box::new(init()));
        }
        match self.caches.get_mut(extension).unwrap().downcast_mut::<T>() {
            Some(value) => value,
            None => unreachable!("cache slot was just replaced with the requested type"),
        }
    }

    pub fn start_traversal(&mut self, analyzer: &str, old: &Forest, new: &Forest) {
        for transform in self.transforms.iter_mut() {
            transform.inner.start_traversal(analyzer, old, new);
        }
    }

    pub fn start_elements(&mut self, pair: &ElementPair<'_>) {
        for transform in self.transforms.iter_mut() {
            transform.inner.start_elements(pair);
        }
    }

    pub fn end_elements(&mut self, pair: &ElementPair<'_>) {
        for transform in self.transforms.iter_mut() {
            transform.inner.end_elements(pair);
        }
    }

    pub fn end_traversal(&mut self) {
        for transform in self.transforms.iter_mut() {
            transform.inner.end_traversal();
        }
    }

    /// Run every block over `differences` for `pair` and return the final
    /// set, in the order produced by the last block.
    pub fn apply(
        &mut self,
        pair: &ElementPair<'_>,
        differences: Vec<Difference>,
    ) -> Result<PipelineOutcome, AnalysisError> {
        let mut current = differences;
        let mut failures = Vec::new();

        for (block_index, block) in self.blocks.iter().enumerate() {
            if block.is_empty() || current.is_empty() {
                continue;
            }

            let mut iterations = 0;
            loop {
                let mut altered_codes: BTreeSet<String> = BTreeSet::new();

                for &transform_index in block {
                    let registered = &mut self.transforms[transform_index];
                    let mut next = Vec::with_capacity(current.len());
                    for difference in current {
                        match registered.inner.transform(pair, &difference) {
                            Ok(TransformOutcome::Undecided) | Ok(TransformOutcome::Keep) => {
                                next.push(difference);
                            }
                            Ok(TransformOutcome::Replace(replacements)) => {
                                if replacements.len() == 1 && replacements[0] == difference {
                                    next.push(difference);
                                } else {
                                    altered_codes.insert(difference.code.clone());
                                    for replacement in replacements {
                                        altered_codes.insert(replacement.code.clone());
                                        next.push(replacement);
                                    }
                                }
                            }
                            Err(e) => {
                                failures.push(TransformFailure {
                                    extension: registered.address(),
                                    message: e.message().to_string(),
                                });
                                next.push(difference);
                            }
                        }
                    }
                    current = next;
                }

                iterations += 1;
                if altered_codes.is_empty() {
                    trace!(block = block_index, iterations, "transform block converged");
                    break;
                }
                if iterations >= ITERATION_CAP {
                    debug!(
                        block = block_index,
                        ?altered_codes,
                        "transform block failed to converge"
                    );
                    return Err(AnalysisError::NonConvergence {
                        block: block_index,
                        iterations,
                        codes: altered_codes.into_iter().collect(),
                    });
                }
            }
        }

        Ok(PipelineOutcome {
            differences: current,
            failures,
        })
    }
}

fn resolve_transform(transforms: &[Registered<dyn Transform>], name: &str) -> Option<usize> {
    transforms
        .iter()
        .position(|t| t.id.as_deref() == Some(name))
        .or_else(|| {
            transforms
                .iter()
                .position(|t| t.inner.extension_name() == name)
        })
}
