//! Ready-made execution listeners

pub mod logging;
pub mod summary;

pub use logging::LoggingListener;
pub use summary::{Counts, Failure, SummaryGeneratingListener, TestExecutionSummary};
