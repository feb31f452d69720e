//! Extension configuration context.
//!
//! Every extension (archive analyzer factory, tree filter provider,
//! transform, reporter, element matcher) is *configurable*: it is handed an
//! [`AnalysisContext`] carrying its own configuration subtree plus the
//! run-wide criticality set, severity mapping, and recognized matchers.
//! There is no process-wide registry; everything an extension may consult
//! arrives through this context.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::difference::{Criticality, Severity};
use crate::error::ConfigurationError;
use crate::matcher::ElementMatcher;

/// An extension instance together with the optional instance id and the
/// configuration subtree assigned from the configuration entry it was
/// paired with.
pub struct Registered<T: ?Sized> {
    pub id: Option<String>,
    pub configuration: Value,
    pub inner: Box<T>,
}

impl<T: ?Sized> Registered<T> {
    pub fn new(inner: Box<T>) -> Self {
        Registered {
            id: None,
            configuration: Value::Null,
            inner,
        }
    }

    pub fn with_id(id: Option<String>, inner: Box<T>) -> Self {
        Registered {
            id,
            configuration: Value::Null,
            inner,
        }
    }

    /// The name this instance is addressed by: its instance id when it has
    /// one, its extension name otherwise.
    pub fn address(&self) -> String
    where
        T: Configurable,
    {
        self.id
            .clone()
            .unwrap_or_else(|| self.inner.extension_name().to_string())
    }
}

/// Common contract of every extension.
pub trait Configurable {
    /// The extension's type name, used to address it from configuration
    /// (e.g. `"difference.alter"`). Instance ids from configuration come
    /// on top of this.
    fn extension_name(&self) -> &'static str;

    /// JSON schema for this extension's configuration subtree, if it
    /// declares one. Configurations are validated against it before the
    /// run starts.
    fn schema(&self) -> Option<Value> {
        None
    }

    fn initialize(&mut self, ctx: &AnalysisContext<'_>) -> Result<(), ConfigurationError>;

    /// Called once when the driver shuts down. Idempotent.
    fn close(&mut self) {}
}

/// The per-extension view of the run configuration.
pub struct AnalysisContext<'a> {
    configuration: Value,
    criticalities: &'a BTreeSet<Criticality>,
    severity_mapping: &'a BTreeMap<Severity, Criticality>,
    matchers: &'a [Registered<dyn ElementMatcher>],
}

impl<'a> AnalysisContext<'a> {
    pub fn new(
        configuration: Value,
        criticalities: &'a BTreeSet<Criticality>,
        severity_mapping: &'a BTreeMap<Severity, Criticality>,
        matchers: &'a [Registered<dyn ElementMatcher>],
    ) -> Self {
        AnalysisContext {
            configuration,
            criticalities,
            severity_mapping,
            matchers,
        }
    }

    /// This extension's configuration subtree. `Value::Null` when the
    /// extension was not configured.
    pub fn configuration(&self) -> &Value {
        &self.configuration
    }

    pub fn criticalities(&self) -> &BTreeSet<Criticality> {
        self.criticalities
    }

    /// Look up a configured criticality by name.
    pub fn criticality(&self, name: &str) -> Option<&Criticality> {
        self.criticalities.iter().find(|c| c.name == name)
    }

    /// Like [`AnalysisContext::criticality`] but failing with a
    /// configuration error naming the unknown label.
    pub fn require_criticality(&self, name: &str) -> Result<Criticality, ConfigurationError> {
        self.criticality(name).cloned().ok_or_else(|| {
            ConfigurationError::new(format!("unknown criticality '{name}'"))
        })
    }

    pub fn severity_mapping(&self) -> &BTreeMap<Severity, Criticality> {
        self.severity_mapping
    }

    /// Look up a recognized element matcher by extension name or instance
    /// id.
    pub fn matcher(&self, name: &str) -> Option<&dyn ElementMatcher> {
        self.matchers
            .iter()
            .find(|m| m.id.as_deref() == Some(name) || m.inner.extension_name() == name)
            .map(|m| m.inner.as_ref())
    }
}
