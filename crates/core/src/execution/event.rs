//! Execution events emitted by engines, and their results

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use crate::types::{TestDescriptor, UniqueId};

/// Language-neutral error payload: a message, an optional error kind and
/// the chain of underlying causes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCause {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<FailureCause>>,
}

impl FailureCause {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
            cause: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn caused_by(mut self, cause: FailureCause) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Build a chain from an error and its `source()`s
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let messages: Vec<String> = std::iter::successors(Some(error), |e| e.source())
            .map(ToString::to_string)
            .collect();
        Self::from_messages(messages).unwrap_or_else(|| Self::new(error.to_string()))
    }

    /// Build a chain from an [`anyhow::Error`] and its context layers
    pub fn from_anyhow(error: &anyhow::Error) -> Self {
        let messages: Vec<String> = error.chain().map(ToString::to_string).collect();
        Self::from_messages(messages).unwrap_or_else(|| Self::new(error.to_string()))
    }

    /// Build a cause from a panic payload
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with a non-string payload".to_string()
        };
        Self::new(message).with_kind("panic")
    }

    fn from_messages(messages: Vec<String>) -> Option<Self> {
        messages
            .into_iter()
            .rev()
            .fold(None, |inner: Option<FailureCause>, message| {
                let mut outer = FailureCause::new(message);
                outer.cause = inner.map(Box::new);
                Some(outer)
            })
    }

    /// The cause chain, starting with `self`
    pub fn chain(&self) -> impl Iterator<Item = &FailureCause> {
        std::iter::successors(Some(self), |cause| cause.cause.as_deref())
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(kind) = &self.kind {
            write!(f, "{kind}: ")?;
        }
        f.write_str(&self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " (caused by: {cause})")?;
        }
        Ok(())
    }
}

impl From<anyhow::Error> for FailureCause {
    fn from(error: anyhow::Error) -> Self {
        Self::from_anyhow(&error)
    }
}

/// Outcome status without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Successful,
    Aborted,
    Failed,
}

/// Result carried by a finished event. Test failures are data, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "cause")]
pub enum TestExecutionResult {
    Successful,
    Aborted(FailureCause),
    Failed(FailureCause),
}

impl TestExecutionResult {
    pub fn successful() -> Self {
        TestExecutionResult::Successful
    }

    pub fn aborted(cause: FailureCause) -> Self {
        TestExecutionResult::Aborted(cause)
    }

    pub fn failed(cause: FailureCause) -> Self {
        TestExecutionResult::Failed(cause)
    }

    pub fn status(&self) -> Status {
        match self {
            TestExecutionResult::Successful => Status::Successful,
            TestExecutionResult::Aborted(_) => Status::Aborted,
            TestExecutionResult::Failed(_) => Status::Failed,
        }
    }

    pub fn cause(&self) -> Option<&FailureCause> {
        match self {
            TestExecutionResult::Successful => None,
            TestExecutionResult::Aborted(cause) | TestExecutionResult::Failed(cause) => Some(cause),
        }
    }
}

impl fmt::Display for TestExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestExecutionResult::Successful => f.write_str("SUCCESSFUL"),
            TestExecutionResult::Aborted(cause) => write!(f, "ABORTED [{cause}]"),
            TestExecutionResult::Failed(cause) => write!(f, "FAILED [{cause}]"),
        }
    }
}

/// Key/value data published by an engine while a descriptor runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    timestamp: SystemTime,
    values: BTreeMap<String, String>,
}

impl ReportEntry {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            values,
        }
    }

    pub fn from_pair(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(BTreeMap::from([(key.into(), value.into())]))
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }
}

/// Discriminant of [`ExecutionEvent`], used in violation reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    DynamicTestRegistered,
    Started,
    Skipped,
    Finished,
    ReportingEntryPublished,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::DynamicTestRegistered => "dynamic-test-registered",
            EventKind::Started => "started",
            EventKind::Skipped => "skipped",
            EventKind::Finished => "finished",
            EventKind::ReportingEntryPublished => "reporting-entry-published",
        };
        f.write_str(name)
    }
}

/// Lifecycle notification emitted by an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionEvent {
    /// A descriptor (and its subtree) discovered only during execution
    DynamicTestRegistered(TestDescriptor),
    Started(UniqueId),
    Skipped { id: UniqueId, reason: String },
    Finished { id: UniqueId, result: TestExecutionResult },
    ReportingEntryPublished { id: UniqueId, entry: ReportEntry },
}

impl ExecutionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ExecutionEvent::DynamicTestRegistered(_) => EventKind::DynamicTestRegistered,
            ExecutionEvent::Started(_) => EventKind::Started,
            ExecutionEvent::Skipped { .. } => EventKind::Skipped,
            ExecutionEvent::Finished { .. } => EventKind::Finished,
            ExecutionEvent::ReportingEntryPublished { .. } => EventKind::ReportingEntryPublished,
        }
    }

    /// The descriptor the event is about
    pub fn unique_id(&self) -> &UniqueId {
        match self {
            ExecutionEvent::DynamicTestRegistered(descriptor) => descriptor.unique_id(),
            ExecutionEvent::Started(id)
            | ExecutionEvent::Skipped { id, .. }
            | ExecutionEvent::Finished { id, .. }
            | ExecutionEvent::ReportingEntryPublished { id, .. } => id,
        }
    }
}
