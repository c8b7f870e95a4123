//! Test engine contract
//!
//! An engine discovers a tree of [`TestDescriptor`]s for a request and later
//! executes that tree, reporting progress through an
//! [`EngineExecutionListener`]. Engines are registered with a
//! [`Launcher`](crate::launcher::Launcher), which owns them for its lifetime.

pub mod noop;

use crate::config::ConfigurationParameters;
use crate::discovery::EngineDiscoveryRequest;
use crate::execution::{ExecutionEvent, ReportEntry, TestExecutionResult};
use crate::types::{TestDescriptor, UniqueId};

pub use noop::NoOpEngine;

/// Main engine interface
pub trait TestEngine: Send + Sync {
    /// Stable id, unique among the engines of one launcher
    fn id(&self) -> &str;

    /// Discover tests for `request`.
    ///
    /// The returned root must be a container with id
    /// `parent_id.append("engine", self.id())`. Selector kinds the engine does
    /// not understand must be ignored, not reported as errors. A root without
    /// children means nothing was found.
    fn discover(
        &self,
        request: &EngineDiscoveryRequest,
        parent_id: &UniqueId,
    ) -> anyhow::Result<TestDescriptor>;

    /// Execute the (filtered) tree rooted at `request.root()`.
    ///
    /// Every descriptor of the tree must end up finished or skipped. An
    /// `Err` means the engine gave up on the remaining descriptors.
    fn execute(&self, request: ExecutionRequest<'_>) -> anyhow::Result<()>;
}

/// Sink receiving an engine's events, in order
pub trait EngineExecutionListener {
    fn on_event(&mut self, event: ExecutionEvent);

    /// Register a descriptor (and its subtree) under a STARTED parent.
    ///
    /// A pure container may be registered empty and filled by later
    /// registrations, but it must have at least one child by the time it
    /// finishes.
    fn dynamic_test_registered(&mut self, descriptor: TestDescriptor) {
        self.on_event(ExecutionEvent::DynamicTestRegistered(descriptor));
    }

    fn execution_started(&mut self, unique_id: &UniqueId) {
        self.on_event(ExecutionEvent::Started(unique_id.clone()));
    }

    fn execution_skipped(&mut self, unique_id: &UniqueId, reason: &str) {
        self.on_event(ExecutionEvent::Skipped {
            id: unique_id.clone(),
            reason: reason.to_string(),
        });
    }

    fn execution_finished(&mut self, unique_id: &UniqueId, result: TestExecutionResult) {
        self.on_event(ExecutionEvent::Finished {
            id: unique_id.clone(),
            result,
        });
    }

    fn reporting_entry_published(&mut self, unique_id: &UniqueId, entry: ReportEntry) {
        self.on_event(ExecutionEvent::ReportingEntryPublished {
            id: unique_id.clone(),
            entry,
        });
    }
}

impl EngineExecutionListener for Vec<ExecutionEvent> {
    fn on_event(&mut self, event: ExecutionEvent) {
        self.push(event);
    }
}

/// Everything an engine needs to execute one root
pub struct ExecutionRequest<'a> {
    root: &'a TestDescriptor,
    listener: &'a mut dyn EngineExecutionListener,
    configuration: &'a ConfigurationParameters,
}

impl<'a> ExecutionRequest<'a> {
    pub fn new(
        root: &'a TestDescriptor,
        listener: &'a mut dyn EngineExecutionListener,
        configuration: &'a ConfigurationParameters,
    ) -> Self {
        Self {
            root,
            listener,
            configuration,
        }
    }

    pub fn root(&self) -> &'a TestDescriptor {
        self.root
    }

    pub fn listener(&mut self) -> &mut dyn EngineExecutionListener {
        &mut *self.listener
    }

    pub fn configuration(&self) -> &'a ConfigurationParameters {
        self.configuration
    }
}
