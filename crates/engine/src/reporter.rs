//! Reporters: consumers of the final difference reports.

use std::cell::RefCell;
use std::rc::Rc;

use crate::context::{AnalysisContext, Configurable};
use crate::difference::Report;
use crate::error::{ConfigurationError, ReporterError};

/// Receives reports in walk order. A failing reporter is isolated: the
/// driver records the failure and keeps feeding the other reporters.
pub trait Reporter: Configurable {
    fn report(&mut self, report: &Report) -> Result<(), ReporterError>;
}

/// Shared handle to the reports gathered by a [`CollectingReporter`].
pub type CollectedReports = Rc<RefCell<Vec<Report>>>;

/// A reporter that simply buffers every report it receives, in order.
pub struct CollectingReporter {
    reports: CollectedReports,
}

impl CollectingReporter {
    /// The reporter and a handle that stays readable after the driver has
    /// consumed the reporter.
    pub fn new() -> (Self, CollectedReports) {
        let reports: CollectedReports = Rc::new(RefCell::new(Vec::new()));
        (
            CollectingReporter {
                reports: Rc::clone(&reports),
            },
            reports,
        )
    }
}

impl Configurable for CollectingReporter {
    fn extension_name(&self) -> &'static str {
        "reporter.collect"
    }

    fn initialize(&mut self, _ctx: &AnalysisContext<'_>) -> Result<(), ConfigurationError> {
        Ok(())
    }
}

impl Reporter for CollectingReporter {
    fn report(&mut self, report: &Report) -> Result<(), ReporterError> {
        self.reports.borrow_mut().push(report.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difference::Difference;

    #[test]
    fn collects_reports_in_order() {
        let (mut reporter, collected) = CollectingReporter::new();
        for code in ["first", "second"] {
            reporter
                .report(&Report {
                    old: None,
                    new: None,
                    differences: vec![Difference::builder(code).build()],
                })
                .unwrap();
        }
        let collected = collected.borrow();
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].differences[0].code, "first");
        assert_eq!(collected[1].differences[0].code, "second");
    }
}
