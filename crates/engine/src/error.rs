//! Engine error types.

use std::fmt;

/// All errors that can abort an analysis run or its setup.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The pipeline or an extension configuration is invalid. Surfaced
    /// before any analysis begins.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An archive could not be obtained or parsed.
    #[error("artifact '{name}' could not be resolved: {reason}")]
    UnresolvedArtifact { name: String, reason: String },

    /// An analyzer's lazy resolution kept failing past the retry budget.
    #[error("completing '{element}' failed after {attempts} attempts: {reason}")]
    CompletionFailure {
        element: String,
        attempts: usize,
        reason: String,
    },

    /// A transform block did not reach a fixpoint within the iteration
    /// cap. The offending configuration is considered invalid.
    #[error("transform block {block} did not converge after {iterations} iterations; oscillating codes: {codes:?}")]
    NonConvergence {
        block: usize,
        iterations: usize,
        codes: Vec<String>,
    },

    /// The injected cancellation token was set at an element boundary.
    #[error("analysis run cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ConfigurationError> for AnalysisError {
    fn from(e: ConfigurationError) -> Self {
        AnalysisError::InvalidConfiguration(e.message)
    }
}

/// Error raised by an extension while being configured.
#[derive(Debug, Clone)]
pub struct ConfigurationError {
    message: String,
}

impl ConfigurationError {
    pub fn new(message: impl Into<String>) -> Self {
        ConfigurationError {
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid configuration: {}", self.message)
    }
}

impl std::error::Error for ConfigurationError {}

/// Failure of a single check on a single element pair. Captured by the
/// driver and converted into a synthetic difference; never aborts the walk.
#[derive(Debug, Clone)]
pub struct CheckError {
    message: String,
}

impl CheckError {
    pub fn new(message: impl Into<String>) -> Self {
        CheckError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "check failed: {}", self.message)
    }
}

impl std::error::Error for CheckError {}

/// Failure of a single transform on a single difference. Captured like
/// [`CheckError`].
#[derive(Debug, Clone)]
pub struct TransformError {
    message: String,
}

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        TransformError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transform failed: {}", self.message)
    }
}

impl std::error::Error for TransformError {}

/// Failure of a reporter. Reporters are isolated from each other and from
/// the walk; their failures are collected, not propagated.
#[derive(Debug, Clone)]
pub struct ReporterError {
    message: String,
}

impl ReporterError {
    pub fn new(message: impl Into<String>) -> Self {
        ReporterError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ReporterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reporter failed: {}", self.message)
    }
}

impl std::error::Error for ReporterError {}
