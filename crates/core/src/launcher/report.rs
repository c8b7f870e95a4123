//! Framework-level errors, reported apart from test results

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::execution::{EventKind, FailureCause, ViolationKind};
use crate::types::UniqueId;

/// An engine failed to discover; no root was added for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("engine '{engine_id}' failed to discover tests: {cause}")]
pub struct DiscoveryError {
    pub engine_id: String,
    pub cause: FailureCause,
}

/// An engine failed outside the normal per-test failure path
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("engine '{engine_id}' aborted execution: {cause}")]
pub struct ExecutionAbort {
    pub engine_id: String,
    pub cause: FailureCause,
}

/// An engine emitted an event the state machine does not allow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolViolation {
    pub engine_id: String,
    pub unique_id: UniqueId,
    /// `None` when the violation was detected after the engine returned
    pub event: Option<EventKind>,
    pub kind: ViolationKind,
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine '{}' violated the event protocol", self.engine_id)?;
        if let Some(event) = self.event {
            write!(f, " with '{event}'")?;
        }
        write!(f, " for {}: {}", self.unique_id, self.kind)
    }
}

impl std::error::Error for ProtocolViolation {}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameworkError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    ExecutionAbort(#[from] ExecutionAbort),

    #[error(transparent)]
    ProtocolViolation(#[from] ProtocolViolation),
}

impl FrameworkError {
    pub fn engine_id(&self) -> &str {
        match self {
            FrameworkError::Discovery(e) => &e.engine_id,
            FrameworkError::ExecutionAbort(e) => &e.engine_id,
            FrameworkError::ProtocolViolation(e) => &e.engine_id,
        }
    }
}

/// Framework errors of one discovery plus execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    errors: Vec<FrameworkError>,
    executed_engines: Vec<String>,
}

impl ExecutionReport {
    pub(crate) fn new(discovery_errors: &[DiscoveryError]) -> Self {
        Self {
            errors: discovery_errors
                .iter()
                .cloned()
                .map(FrameworkError::from)
                .collect(),
            executed_engines: Vec::new(),
        }
    }

    pub(crate) fn record_engine(&mut self, engine_id: &str, errors: Vec<FrameworkError>) {
        self.executed_engines.push(engine_id.to_string());
        self.errors.extend(errors);
    }

    /// No discovery error, abort or protocol violation occurred
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FrameworkError] {
        &self.errors
    }

    /// Engines whose roots were executed, in order
    pub fn executed_engines(&self) -> &[String] {
        &self.executed_engines
    }

    pub fn discovery_errors(&self) -> Vec<&DiscoveryError> {
        self.errors
            .iter()
            .filter_map(|error| match error {
                FrameworkError::Discovery(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    pub fn execution_aborts(&self) -> Vec<&ExecutionAbort> {
        self.errors
            .iter()
            .filter_map(|error| match error {
                FrameworkError::ExecutionAbort(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    pub fn protocol_violations(&self) -> Vec<&ProtocolViolation> {
        self.errors
            .iter()
            .filter_map(|error| match error {
                FrameworkError::ProtocolViolation(e) => Some(e),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionState;

    #[test]
    fn test_error_messages() {
        let violation = ProtocolViolation {
            engine_id: "alpha".to_string(),
            unique_id: UniqueId::for_engine("alpha").unwrap(),
            event: Some(EventKind::Finished),
            kind: ViolationKind::IllegalTransition {
                from: ExecutionState::NotStarted,
                event: EventKind::Finished,
            },
        };
        insta::assert_snapshot!(
            FrameworkError::from(violation).to_string(),
            @"engine 'alpha' violated the event protocol with 'finished' for [engine:alpha]: 'finished' is illegal in state NOT_STARTED"
        );

        let abort = ExecutionAbort {
            engine_id: "beta".to_string(),
            cause: FailureCause::new("connection lost"),
        };
        assert_eq!(
            FrameworkError::from(abort).to_string(),
            "engine 'beta' aborted execution: connection lost"
        );
    }

    #[test]
    fn test_report_partitions_errors() {
        let mut report = ExecutionReport::new(&[DiscoveryError {
            engine_id: "broken".to_string(),
            cause: FailureCause::new("boom"),
        }]);
        report.record_engine(
            "alpha",
            vec![FrameworkError::from(ExecutionAbort {
                engine_id: "alpha".to_string(),
                cause: FailureCause::new("gone"),
            })],
        );

        assert!(!report.is_clean());
        assert_eq!(report.discovery_errors().len(), 1);
        assert_eq!(report.execution_aborts().len(), 1);
        assert!(report.protocol_violations().is_empty());
        assert_eq!(report.executed_engines(), ["alpha".to_string()]);
        assert_eq!(report.errors()[1].engine_id(), "alpha");
    }
}
