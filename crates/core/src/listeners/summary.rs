//! Aggregated counts of one test plan execution

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use crate::execution::{FailureCause, TestExecutionResult};
use crate::launcher::{TestExecutionListener, TestIdentifier, TestPlan};

/// A test or container that did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub identifier: TestIdentifier,
    pub cause: FailureCause,
}

/// Counts for tests and containers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub found: usize,
    pub started: usize,
    pub skipped: usize,
    pub aborted: usize,
    pub failed: usize,
    pub succeeded: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestExecutionSummary {
    pub tests: Counts,
    pub containers: Counts,
    /// Descriptors registered while executing
    pub dynamically_registered: usize,
    pub started_at: Option<SystemTime>,
    pub finished_at: Option<SystemTime>,
    /// Failed and aborted descriptors, in completion order
    pub failures: Vec<Failure>,
}

impl TestExecutionSummary {
    pub fn duration(&self) -> Option<Duration> {
        let (start, end) = (self.started_at?, self.finished_at?);
        end.duration_since(start).ok()
    }

    /// Number of tests that failed or were aborted
    pub fn total_failure_count(&self) -> usize {
        self.tests.failed + self.tests.aborted
    }

    pub fn all_tests_succeeded(&self) -> bool {
        self.total_failure_count() == 0
    }
}

impl fmt::Display for TestExecutionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.duration().map_or(0, |d| d.as_millis());
        writeln!(f, "Test run finished after {millis} ms")?;
        for (label, value) in [
            ("containers found", self.containers.found),
            ("containers skipped", self.containers.skipped),
            ("containers started", self.containers.started),
            ("containers aborted", self.containers.aborted),
            ("containers successful", self.containers.succeeded),
            ("containers failed", self.containers.failed),
            ("tests found", self.tests.found),
            ("tests skipped", self.tests.skipped),
            ("tests started", self.tests.started),
            ("tests aborted", self.tests.aborted),
            ("tests successful", self.tests.succeeded),
            ("tests failed", self.tests.failed),
        ] {
            writeln!(f, "[{value:>10} {label:<21}]")?;
        }
        Ok(())
    }
}

/// Listener building a [`TestExecutionSummary`]
#[derive(Debug, Default)]
pub struct SummaryGeneratingListener {
    summary: Mutex<TestExecutionSummary>,
}

impl SummaryGeneratingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the summary so far
    pub fn summary(&self) -> TestExecutionSummary {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, TestExecutionSummary> {
        self.summary.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn counts<'a>(
        summary: &'a mut TestExecutionSummary,
        identifier: &TestIdentifier,
    ) -> &'a mut Counts {
        if identifier.is_test() {
            &mut summary.tests
        } else {
            &mut summary.containers
        }
    }
}

impl TestExecutionListener for SummaryGeneratingListener {
    fn test_plan_execution_started(&self, test_plan: &TestPlan) {
        let mut summary = self.lock();
        *summary = TestExecutionSummary {
            started_at: Some(SystemTime::now()),
            ..TestExecutionSummary::default()
        };
        summary.tests.found = test_plan.test_count();
        summary.containers.found = test_plan.len() - test_plan.test_count();
    }

    fn test_plan_execution_finished(&self, _test_plan: &TestPlan) {
        self.lock().finished_at = Some(SystemTime::now());
    }

    fn dynamic_test_registered(&self, test_identifier: &TestIdentifier) {
        let mut summary = self.lock();
        summary.dynamically_registered += 1;
        Self::counts(&mut summary, test_identifier).found += 1;
    }

    fn execution_started(&self, test_identifier: &TestIdentifier) {
        Self::counts(&mut self.lock(), test_identifier).started += 1;
    }

    fn execution_skipped(&self, test_identifier: &TestIdentifier, _reason: &str) {
        Self::counts(&mut self.lock(), test_identifier).skipped += 1;
    }

    fn execution_finished(&self, test_identifier: &TestIdentifier, result: &TestExecutionResult) {
        let mut summary = self.lock();
        let counts = Self::counts(&mut summary, test_identifier);
        match result {
            TestExecutionResult::Successful => counts.succeeded += 1,
            TestExecutionResult::Aborted(_) => counts.aborted += 1,
            TestExecutionResult::Failed(_) => counts.failed += 1,
        }
        if let Some(cause) = result.cause() {
            summary.failures.push(Failure {
                identifier: test_identifier.clone(),
                cause: cause.clone(),
            });
        }
    }
}
