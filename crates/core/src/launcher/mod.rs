//! Multi-engine orchestration
//!
//! The [`Launcher`] owns an ordered list of engines and a set of listeners.
//! Discovery asks every accepted engine for its tree, validates and filters
//! it, and merges the results into a [`TestPlan`]. Execution runs the plan
//! one engine at a time, in registration order, through an event-validating
//! proxy.

pub mod listener;
pub mod plan;
mod proxy;
mod pruning;
pub mod report;

pub use listener::TestExecutionListener;
pub use plan::{EngineRoot, TestIdentifier, TestPlan};
pub use report::{
    DiscoveryError, ExecutionAbort, ExecutionReport, FrameworkError, ProtocolViolation,
};

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::discovery::{EngineDiscoveryRequest, EngineFilter};
use crate::engine::{ExecutionRequest, TestEngine};
use crate::error::{Error, Result};
use crate::execution::FailureCause;
use crate::types::{DescriptorType, TestDescriptor, UniqueId};
use listener::ListenerDispatch;
use proxy::EventValidatingProxy;

/// Entry point for discovering and executing tests across engines
#[derive(Default)]
pub struct Launcher {
    engines: Vec<Box<dyn TestEngine>>,
    listeners: Vec<Arc<dyn TestExecutionListener>>,
}

impl Launcher {
    /// Create a launcher without engines
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a launcher and register `engines` in order
    pub fn with_engines(engines: impl IntoIterator<Item = Box<dyn TestEngine>>) -> Result<Self> {
        let mut launcher = Self::new();
        launcher.register_engines(engines)?;
        Ok(launcher)
    }

    /// Register one engine after the existing ones
    pub fn register_engine(&mut self, engine: Box<dyn TestEngine>) -> Result<()> {
        self.register_engines([engine])
    }

    /// Register engines in order.
    ///
    /// Blank or malformed ids and ids already in use are rejected; in that
    /// case none of the given engines is registered.
    pub fn register_engines(
        &mut self,
        engines: impl IntoIterator<Item = Box<dyn TestEngine>>,
    ) -> Result<()> {
        let engines: Vec<_> = engines.into_iter().collect();
        let mut seen: HashSet<&str> = self.engines.iter().map(|engine| engine.id()).collect();

        for engine in &engines {
            let id = engine.id();
            if id.trim().is_empty() {
                return Err(Error::InvalidEngineId("engine id must not be blank".to_string()));
            }
            UniqueId::for_engine(id).map_err(|e| Error::InvalidEngineId(format!("'{id}': {e}")))?;
            if !seen.insert(id) {
                return Err(Error::DuplicateEngine(id.to_string()));
            }
        }

        for engine in engines {
            tracing::debug!("Registered test engine '{}'", engine.id());
            self.engines.push(engine);
        }
        Ok(())
    }

    /// Ids of the registered engines, in registration order
    pub fn engine_ids(&self) -> Vec<&str> {
        self.engines.iter().map(|engine| engine.id()).collect()
    }

    pub fn register_listener(&mut self, listener: Arc<dyn TestExecutionListener>) {
        self.listeners.push(listener);
    }

    /// Remove a previously registered listener (matched by identity).
    /// Returns whether it was registered.
    pub fn unregister_listener(&mut self, listener: &Arc<dyn TestExecutionListener>) -> bool {
        let before = self.listeners.len();
        self.listeners
            .retain(|registered| !Arc::ptr_eq(registered, listener));
        before != self.listeners.len()
    }

    /// Ask every accepted engine to discover, and merge the results
    pub fn discover(&self, request: &EngineDiscoveryRequest) -> TestPlan {
        self.warn_about_unknown_engines(request);

        let parent_id = UniqueId::root();
        let mut roots = Vec::new();
        let mut errors = Vec::new();

        for engine in &self.engines {
            let engine_id = engine.id();
            if !request.accepts_engine(engine_id) {
                tracing::debug!(
                    "Skipping discovery for engine '{}' due to engine filters",
                    engine_id
                );
                continue;
            }

            tracing::debug!("Discovering tests with engine '{}'", engine_id);
            let outcome = catch_unwind(AssertUnwindSafe(|| engine.discover(request, &parent_id)));
            let discovered = match outcome {
                Ok(Ok(root)) => self.finalize_root(engine_id, &parent_id, root, request),
                Ok(Err(e)) => Err(FailureCause::from_anyhow(&e)),
                Err(payload) => Err(FailureCause::from_panic(payload.as_ref())),
            };

            match discovered {
                Ok(descriptor) => {
                    tracing::debug!(
                        "Engine '{}' discovered {} test(s)",
                        engine_id,
                        descriptor.count_tests()
                    );
                    roots.push(EngineRoot {
                        engine_id: engine_id.to_string(),
                        descriptor,
                    });
                }
                Err(cause) => {
                    let error = DiscoveryError {
                        engine_id: engine_id.to_string(),
                        cause,
                    };
                    tracing::error!("{}", error);
                    errors.push(error);
                }
            }
        }

        TestPlan::new(roots, errors, request.configuration().clone())
    }

    /// Execute `plan`, engine by engine in plan order.
    ///
    /// `listeners` are notified after the registered listeners, for this run
    /// only.
    pub fn execute(
        &self,
        plan: &TestPlan,
        listeners: &[Arc<dyn TestExecutionListener>],
    ) -> ExecutionReport {
        let dispatch = ListenerDispatch::new(
            self.listeners
                .iter()
                .chain(listeners)
                .map(|listener| &**listener),
        );
        let mut report = ExecutionReport::new(plan.discovery_errors());

        dispatch.notify("test_plan_execution_started", |l| l.test_plan_execution_started(plan));

        for root in plan.engine_roots() {
            let mut proxy = EventValidatingProxy::new(root, plan, &dispatch);
            let outcome = match self.engine(&root.engine_id) {
                Some(engine) => {
                    tracing::debug!("Executing tests of engine '{}'", root.engine_id);
                    let request =
                        ExecutionRequest::new(&root.descriptor, &mut proxy, plan.configuration());
                    match catch_unwind(AssertUnwindSafe(|| engine.execute(request))) {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => Err(FailureCause::from_anyhow(&e)),
                        Err(payload) => Err(FailureCause::from_panic(payload.as_ref())),
                    }
                }
                None => Err(FailureCause::new(format!(
                    "engine '{}' is not registered with this launcher",
                    root.engine_id
                ))),
            };
            report.record_engine(&root.engine_id, proxy.finish(outcome));
        }

        dispatch.notify("test_plan_execution_finished", |l| l.test_plan_execution_finished(plan));
        report
    }

    /// [`discover`](Self::discover) followed by [`execute`](Self::execute)
    pub fn discover_and_execute(
        &self,
        request: &EngineDiscoveryRequest,
        listeners: &[Arc<dyn TestExecutionListener>],
    ) -> ExecutionReport {
        let plan = self.discover(request);
        self.execute(&plan, listeners)
    }

    fn engine(&self, engine_id: &str) -> Option<&dyn TestEngine> {
        self.engines
            .iter()
            .find(|engine| engine.id() == engine_id)
            .map(|engine| engine.as_ref())
    }

    fn warn_about_unknown_engines(&self, request: &EngineDiscoveryRequest) {
        for filter in request.engine_filters() {
            if let EngineFilter::Include(ids) = filter {
                for id in ids {
                    if self.engine(id).is_none() {
                        tracing::warn!("Engine filter includes unregistered engine '{}'", id);
                    }
                }
            }
        }
    }

    /// Check the shape of a returned root, then filter it
    fn finalize_root(
        &self,
        engine_id: &str,
        parent_id: &UniqueId,
        mut root: TestDescriptor,
        request: &EngineDiscoveryRequest,
    ) -> std::result::Result<TestDescriptor, FailureCause> {
        let expected = parent_id
            .append(crate::types::ENGINE_SEGMENT_TYPE, engine_id)
            .map_err(|e| FailureCause::from_error(&e))?;
        if root.unique_id() != &expected {
            return Err(FailureCause::new(format!(
                "root id {} does not match expected {}",
                root.unique_id(),
                expected
            )));
        }
        if root.descriptor_type() != DescriptorType::Container {
            return Err(FailureCause::new(format!(
                "root {} must be a container, found {:?}",
                expected,
                root.descriptor_type()
            )));
        }
        if let Some(outside) = root
            .descendants()
            .into_iter()
            .find(|node| !node.unique_id().has_prefix(&expected))
        {
            return Err(FailureCause::new(format!(
                "descriptor {} lies outside engine root {}",
                outside.unique_id(),
                expected
            )));
        }

        let removed = pruning::prune(&mut root, request.filters());
        if removed > 0 {
            tracing::debug!("Filters removed {} test(s) from engine '{}'", removed, engine_id);
        }

        root.validate().map_err(|e| FailureCause::from_error(&e))?;
        Ok(root)
    }
}
