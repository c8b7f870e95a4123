//! Execution event protocol and its validation state machine

pub mod event;
pub mod tracker;

pub use event::{
    EventKind, ExecutionEvent, FailureCause, ReportEntry, Status, TestExecutionResult,
};
pub use tracker::{ExecutionState, ExecutionTracker, Transition, ViolationKind};
