//! Launcher-side listener interface

use std::panic::{catch_unwind, AssertUnwindSafe};

use super::plan::{TestIdentifier, TestPlan};
use crate::execution::{FailureCause, ReportEntry, TestExecutionResult};

/// Receives validated execution events. Every method defaults to a no-op.
///
/// Implementations must not panic; a panicking listener is logged and
/// skipped, and the run continues.
pub trait TestExecutionListener: Send + Sync {
    fn test_plan_execution_started(&self, _test_plan: &TestPlan) {}

    fn test_plan_execution_finished(&self, _test_plan: &TestPlan) {}

    fn dynamic_test_registered(&self, _test_identifier: &TestIdentifier) {}

    fn execution_started(&self, _test_identifier: &TestIdentifier) {}

    fn execution_skipped(&self, _test_identifier: &TestIdentifier, _reason: &str) {}

    fn execution_finished(
        &self,
        _test_identifier: &TestIdentifier,
        _result: &TestExecutionResult,
    ) {
    }

    fn reporting_entry_published(&self, _test_identifier: &TestIdentifier, _entry: &ReportEntry) {}
}

/// Ordered fan-out to a set of listeners, isolating each from the others
pub(crate) struct ListenerDispatch<'a> {
    listeners: Vec<&'a dyn TestExecutionListener>,
}

impl<'a> ListenerDispatch<'a> {
    pub(crate) fn new(listeners: impl IntoIterator<Item = &'a dyn TestExecutionListener>) -> Self {
        Self {
            listeners: listeners.into_iter().collect(),
        }
    }

    pub(crate) fn notify<F>(&self, callback: &str, f: F)
    where
        F: Fn(&dyn TestExecutionListener),
    {
        for listener in &self.listeners {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| f(*listener))) {
                tracing::warn!(
                    "Listener panicked in {}: {}",
                    callback,
                    FailureCause::from_panic(payload.as_ref())
                );
            }
        }
    }
}
