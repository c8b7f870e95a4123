//! Listener writing every lifecycle callback through `tracing`

use tracing::Level;

use crate::execution::{ReportEntry, TestExecutionResult};
use crate::launcher::{TestExecutionListener, TestIdentifier, TestPlan};

// `tracing` needs the level at compile time
macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            Level::TRACE => tracing::trace!($($arg)+),
            Level::DEBUG => tracing::debug!($($arg)+),
            Level::INFO => tracing::info!($($arg)+),
            Level::WARN => tracing::warn!($($arg)+),
            _ => tracing::error!($($arg)+),
        }
    };
}

/// Logs execution progress at a fixed level (DEBUG by default)
#[derive(Debug, Clone, Copy)]
pub struct LoggingListener {
    level: Level,
}

impl LoggingListener {
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    pub fn level(&self) -> Level {
        self.level
    }
}

impl Default for LoggingListener {
    fn default() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl TestExecutionListener for LoggingListener {
    fn test_plan_execution_started(&self, test_plan: &TestPlan) {
        log_at!(
            self.level,
            "Test plan execution started: {} root(s), {} test(s)",
            test_plan.engine_roots().len(),
            test_plan.test_count()
        );
    }

    fn test_plan_execution_finished(&self, test_plan: &TestPlan) {
        log_at!(
            self.level,
            "Test plan execution finished: {} root(s), {} test(s)",
            test_plan.engine_roots().len(),
            test_plan.test_count()
        );
    }

    fn dynamic_test_registered(&self, test_identifier: &TestIdentifier) {
        log_at!(
            self.level,
            "Dynamic test registered: {} - {}",
            test_identifier.display_name,
            test_identifier.unique_id
        );
    }

    fn execution_started(&self, test_identifier: &TestIdentifier) {
        log_at!(
            self.level,
            "Execution started: {} - {}",
            test_identifier.display_name,
            test_identifier.unique_id
        );
    }

    fn execution_skipped(&self, test_identifier: &TestIdentifier, reason: &str) {
        log_at!(
            self.level,
            "Execution skipped: {} - {} - {}",
            test_identifier.display_name,
            test_identifier.unique_id,
            reason
        );
    }

    fn execution_finished(&self, test_identifier: &TestIdentifier, result: &TestExecutionResult) {
        log_at!(
            self.level,
            "Execution finished: {} - {} - {}",
            test_identifier.display_name,
            test_identifier.unique_id,
            result
        );
    }

    fn reporting_entry_published(&self, test_identifier: &TestIdentifier, entry: &ReportEntry) {
        log_at!(
            self.level,
            "Reporting entry published: {} - {} - {:?}",
            test_identifier.display_name,
            test_identifier.unique_id,
            entry.values()
        );
    }
}
