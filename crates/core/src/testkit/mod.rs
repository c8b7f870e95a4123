//! Helpers for testing engines and listeners
//!
//! [`EngineTestKit`] runs a single engine through a private [`Launcher`] and
//! hands back everything the listeners saw, recorded by an
//! [`EventRecorder`], together with the framework [`ExecutionReport`].

use std::sync::{Arc, Mutex, PoisonError};

use crate::discovery::EngineDiscoveryRequest;
use crate::engine::TestEngine;
use crate::error::Result;
use crate::execution::{EventKind, ReportEntry, Status, TestExecutionResult};
use crate::launcher::{ExecutionReport, Launcher, TestExecutionListener, TestIdentifier, TestPlan};
use crate::types::UniqueId;

/// Payload of a recorded event beyond its kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDetail {
    None,
    Reason(String),
    Result(TestExecutionResult),
    Entry(ReportEntry),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub kind: EventKind,
    pub identifier: TestIdentifier,
    pub detail: EventDetail,
}

impl RecordedEvent {
    pub fn unique_id(&self) -> &UniqueId {
        &self.identifier.unique_id
    }

    pub fn result(&self) -> Option<&TestExecutionResult> {
        match &self.detail {
            EventDetail::Result(result) => Some(result),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match &self.detail {
            EventDetail::Reason(reason) => Some(reason),
            _ => None,
        }
    }

    fn has_status(&self, status: Status) -> bool {
        self.result().is_some_and(|result| result.status() == status)
    }
}

/// Ordered selection of recorded events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Events {
    events: Vec<RecordedEvent>,
}

impl Events {
    pub fn all(&self) -> &[RecordedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn filter<P>(&self, predicate: P) -> Events
    where
        P: Fn(&RecordedEvent) -> bool,
    {
        Events {
            events: self.events.iter().filter(|e| predicate(e)).cloned().collect(),
        }
    }

    pub fn of_kind(&self, kind: EventKind) -> Events {
        self.filter(|e| e.kind == kind)
    }

    pub fn started(&self) -> Events {
        self.of_kind(EventKind::Started)
    }

    pub fn finished(&self) -> Events {
        self.of_kind(EventKind::Finished)
    }

    pub fn skipped(&self) -> Events {
        self.of_kind(EventKind::Skipped)
    }

    pub fn dynamically_registered(&self) -> Events {
        self.of_kind(EventKind::DynamicTestRegistered)
    }

    pub fn reporting_entries(&self) -> Events {
        self.of_kind(EventKind::ReportingEntryPublished)
    }

    pub fn succeeded(&self) -> Events {
        self.filter(|e| e.has_status(Status::Successful))
    }

    pub fn failed(&self) -> Events {
        self.filter(|e| e.has_status(Status::Failed))
    }

    pub fn aborted(&self) -> Events {
        self.filter(|e| e.has_status(Status::Aborted))
    }

    /// Events about test-bearing descriptors
    pub fn tests(&self) -> Events {
        self.filter(|e| e.identifier.is_test())
    }

    /// Events about pure containers
    pub fn containers(&self) -> Events {
        self.filter(|e| !e.identifier.is_test())
    }

    pub fn for_id(&self, unique_id: &UniqueId) -> Events {
        self.filter(|e| e.unique_id() == unique_id)
    }

    pub fn unique_ids(&self) -> Vec<&UniqueId> {
        self.events.iter().map(RecordedEvent::unique_id).collect()
    }

    /// Compact `kind display_name` rendering, handy for ordering assertions
    pub fn describe(&self) -> Vec<String> {
        self.events
            .iter()
            .map(|e| format!("{} {}", e.kind, e.identifier.display_name))
            .collect()
    }
}

impl IntoIterator for Events {
    type Item = RecordedEvent;
    type IntoIter = std::vec::IntoIter<RecordedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

/// Listener recording every forwarded event in order
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Mutex<Vec<RecordedEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Events {
        Events {
            events: self
                .events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    fn record(&self, kind: EventKind, identifier: &TestIdentifier, detail: EventDetail) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedEvent {
                kind,
                identifier: identifier.clone(),
                detail,
            });
    }
}

impl TestExecutionListener for EventRecorder {
    fn dynamic_test_registered(&self, test_identifier: &TestIdentifier) {
        self.record(EventKind::DynamicTestRegistered, test_identifier, EventDetail::None);
    }

    fn execution_started(&self, test_identifier: &TestIdentifier) {
        self.record(EventKind::Started, test_identifier, EventDetail::None);
    }

    fn execution_skipped(&self, test_identifier: &TestIdentifier, reason: &str) {
        self.record(
            EventKind::Skipped,
            test_identifier,
            EventDetail::Reason(reason.to_string()),
        );
    }

    fn execution_finished(&self, test_identifier: &TestIdentifier, result: &TestExecutionResult) {
        self.record(
            EventKind::Finished,
            test_identifier,
            EventDetail::Result(result.clone()),
        );
    }

    fn reporting_entry_published(&self, test_identifier: &TestIdentifier, entry: &ReportEntry) {
        self.record(
            EventKind::ReportingEntryPublished,
            test_identifier,
            EventDetail::Entry(entry.clone()),
        );
    }
}

/// Everything observed while running one engine
#[derive(Debug)]
pub struct EngineExecutionResults {
    pub plan: TestPlan,
    pub events: Events,
    pub report: ExecutionReport,
}

pub struct EngineTestKit;

impl EngineTestKit {
    /// Discover and execute `request` with `engine` as the only engine
    pub fn execute(
        engine: Box<dyn TestEngine>,
        request: &EngineDiscoveryRequest,
    ) -> Result<EngineExecutionResults> {
        let launcher = Launcher::with_engines([engine])?;
        let plan = launcher.discover(request);

        let recorder = Arc::new(EventRecorder::new());
        let report = launcher.execute(&plan, &[recorder.clone() as Arc<dyn TestExecutionListener>]);

        Ok(EngineExecutionResults {
            plan,
            events: recorder.events(),
            report,
        })
    }
}
