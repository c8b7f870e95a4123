//! Event-validating proxy between one engine and the listeners
//!
//! The engine sees the proxy as its [`EngineExecutionListener`]. Each event
//! is checked against the [`ExecutionTracker`]; only accepted transitions
//! reach the listeners. The first rejected event turns every later event
//! of that engine into a no-op. When the engine returns, anything it left
//! unfinished is aborted so that listeners always observe total coverage.

use super::listener::ListenerDispatch;
use super::plan::{EngineRoot, TestPlan};
use super::report::{ExecutionAbort, FrameworkError, ProtocolViolation};
use crate::engine::EngineExecutionListener;
use crate::execution::{ExecutionEvent, ExecutionTracker, FailureCause, Transition, ViolationKind};
use crate::types::UniqueId;

pub(crate) struct EventValidatingProxy<'a> {
    engine_id: &'a str,
    root_id: &'a UniqueId,
    plan: &'a TestPlan,
    dispatch: &'a ListenerDispatch<'a>,
    tracker: ExecutionTracker,
    violation: Option<ProtocolViolation>,
    dropped: usize,
}

impl<'a> EventValidatingProxy<'a> {
    pub(crate) fn new(
        root: &'a EngineRoot,
        plan: &'a TestPlan,
        dispatch: &'a ListenerDispatch<'a>,
    ) -> Self {
        let mut tracker = ExecutionTracker::new();
        tracker.track_tree(&root.descriptor);
        Self {
            engine_id: &root.engine_id,
            root_id: root.descriptor.unique_id(),
            plan,
            dispatch,
            tracker,
            violation: None,
            dropped: 0,
        }
    }

    /// Close the engine's run. `outcome` is what `execute` produced.
    ///
    /// Returns the framework errors attributed to the engine.
    pub(crate) fn finish(mut self, outcome: Result<(), FailureCause>) -> Vec<FrameworkError> {
        let mut errors = Vec::new();

        if self.dropped > 0 {
            tracing::warn!(
                "Dropped {} event(s) from engine '{}' after a protocol violation",
                self.dropped,
                self.engine_id
            );
        }

        if self.violation.is_none() && outcome.is_ok() {
            let pending = self.tracker.unfinished(self.root_id).len();
            if pending > 0 {
                self.violation = Some(ProtocolViolation {
                    engine_id: self.engine_id.to_string(),
                    unique_id: self.root_id.clone(),
                    event: None,
                    kind: ViolationKind::IncompleteExecution { pending },
                });
            }
        }

        let abort_cause = match (&self.violation, &outcome) {
            (Some(violation), _) => {
                Some(FailureCause::new(violation.to_string()).with_kind("protocol violation"))
            }
            (None, Err(cause)) => Some(cause.clone()),
            (None, Ok(())) => None,
        };

        if let Some(violation) = self.violation.take() {
            errors.push(FrameworkError::from(violation));
        }
        if let Err(cause) = outcome {
            tracing::error!("Engine '{}' aborted execution: {}", self.engine_id, cause);
            errors.push(FrameworkError::from(ExecutionAbort {
                engine_id: self.engine_id.to_string(),
                cause,
            }));
        }

        if let Some(cause) = abort_cause {
            let transitions = self.tracker.abort_remaining(self.root_id, &cause);
            if !transitions.is_empty() {
                tracing::debug!(
                    "Synthesized {} event(s) to abort the remaining descriptors of engine '{}'",
                    transitions.len(),
                    self.engine_id
                );
            }
            for transition in transitions {
                self.forward(transition);
            }
        }

        errors
    }

    fn reject(&mut self, event: &ExecutionEvent, kind: ViolationKind) {
        let violation = ProtocolViolation {
            engine_id: self.engine_id.to_string(),
            unique_id: event.unique_id().clone(),
            event: Some(event.kind()),
            kind,
        };
        tracing::error!("{}", violation);
        self.violation = Some(violation);
    }

    fn forward(&self, transition: Transition) {
        let Some(identifier) = self.plan.get(transition.unique_id()) else {
            tracing::warn!("No identifier for {}", transition.unique_id());
            return;
        };
        let identifier = identifier.as_ref();

        match &transition {
            Transition::Registered(_) => self
                .dispatch
                .notify("dynamic_test_registered", |l| l.dynamic_test_registered(identifier)),
            Transition::Started(_) => self
                .dispatch
                .notify("execution_started", |l| l.execution_started(identifier)),
            Transition::Skipped(_, reason) => self
                .dispatch
                .notify("execution_skipped", |l| l.execution_skipped(identifier, reason)),
            Transition::Finished(_, result) => self
                .dispatch
                .notify("execution_finished", |l| l.execution_finished(identifier, result)),
            Transition::Reported(_, entry) => self
                .dispatch
                .notify("reporting_entry_published", |l| {
                    l.reporting_entry_published(identifier, entry)
                }),
        }
    }
}

impl EngineExecutionListener for EventValidatingProxy<'_> {
    fn on_event(&mut self, event: ExecutionEvent) {
        if self.violation.is_some() {
            self.dropped += 1;
            tracing::debug!(
                "Dropping '{}' for {} from engine '{}'",
                event.kind(),
                event.unique_id(),
                self.engine_id
            );
            return;
        }

        if !event.unique_id().has_prefix(self.root_id) {
            self.reject(
                &event,
                ViolationKind::ForeignDescriptor {
                    engine_root: self.root_id.clone(),
                },
            );
            return;
        }

        match self.tracker.apply(&event) {
            Ok(transitions) => {
                if let ExecutionEvent::DynamicTestRegistered(descriptor) = &event {
                    self.plan.add_dynamic(descriptor);
                }
                for transition in transitions {
                    self.forward(transition);
                }
            }
            Err(kind) => self.reject(&event, kind),
        }
    }
}
