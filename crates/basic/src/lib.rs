//! drift-basic: generic, format-independent extensions for drift.
//!
//! These extensions work purely on the uniform element contract (kind and
//! human-readable string), so they apply to any back-end:
//!
//! - [`ExactElementMatcher`] / [`RegexElementMatcher`] -- match elements
//!   by their human-readable string
//! - [`ElementFilterProvider`] -- include/exclude tree filters built from
//!   matcher recipes
//! - [`DifferencesTransform`] -- config-driven editing of differences:
//!   ignore, justify, reclassify, re-criticalize, attach

pub mod differences;
pub mod filter;
pub mod matcher;

pub use differences::DifferencesTransform;
pub use filter::ElementFilterProvider;
pub use matcher::{ExactElementMatcher, RegexElementMatcher};
