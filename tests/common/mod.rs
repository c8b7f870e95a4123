//! Scripted engines and tree builders shared by the integration tests
#![allow(dead_code)]

use std::sync::Arc;

use trellis::discovery::EngineDiscoveryRequest;
use trellis::engine::{EngineExecutionListener, ExecutionRequest, TestEngine};
use trellis::execution::{FailureCause, TestExecutionResult};
use trellis::launcher::TestExecutionListener;
use trellis::testkit::EventRecorder;
use trellis::types::{DescriptorType, TestDescriptor, UniqueId};

type DiscoverFn = Box<
    dyn Fn(&EngineDiscoveryRequest, &UniqueId) -> anyhow::Result<TestDescriptor> + Send + Sync,
>;
type ExecuteFn = Box<dyn Fn(ExecutionRequest<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Engine whose discovery and execution are closures
pub struct ScriptedEngine {
    id: String,
    discover: DiscoverFn,
    execute: ExecuteFn,
}

impl ScriptedEngine {
    /// `discover` receives the request and the expected engine root id
    pub fn new<D>(id: &str, discover: D) -> Self
    where
        D: Fn(&EngineDiscoveryRequest, &UniqueId) -> anyhow::Result<TestDescriptor>
            + Send
            + Sync
            + 'static,
    {
        Self {
            id: id.to_string(),
            discover: Box::new(discover),
            execute: Box::new(execute_all),
        }
    }

    /// Engine discovering a fixed tree built from its root id
    pub fn with_tree<T>(id: &str, tree: T) -> Self
    where
        T: Fn(&UniqueId) -> TestDescriptor + Send + Sync + 'static,
    {
        Self::new(id, move |_, root_id| Ok(tree(root_id)))
    }

    pub fn executing<E>(mut self, execute: E) -> Self
    where
        E: Fn(ExecutionRequest<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.execute = Box::new(execute);
        self
    }

    pub fn boxed(self) -> Box<dyn TestEngine> {
        Box::new(self)
    }
}

impl TestEngine for ScriptedEngine {
    fn id(&self) -> &str {
        &self.id
    }

    fn discover(
        &self,
        request: &EngineDiscoveryRequest,
        parent_id: &UniqueId,
    ) -> anyhow::Result<TestDescriptor> {
        let root_id = parent_id.append("engine", &self.id)?;
        (self.discover)(request, &root_id)
    }

    fn execute(&self, request: ExecutionRequest<'_>) -> anyhow::Result<()> {
        (self.execute)(request)
    }
}

pub fn engine_root(root_id: &UniqueId, children: Vec<TestDescriptor>) -> TestDescriptor {
    let name = root_id
        .engine_id()
        .unwrap_or_default()
        .to_string();
    add_children(TestDescriptor::engine_root(root_id.clone(), name), children)
}

pub fn container(
    parent: &UniqueId,
    name: &str,
    children: impl FnOnce(&UniqueId) -> Vec<TestDescriptor>,
) -> TestDescriptor {
    let id = parent.append("container", name).unwrap();
    let built = children(&id);
    add_children(TestDescriptor::new(id, name, DescriptorType::Container), built)
}

pub fn test(parent: &UniqueId, name: &str) -> TestDescriptor {
    TestDescriptor::new(parent.append("test", name).unwrap(), name, DescriptorType::Test)
}

fn add_children(mut parent: TestDescriptor, children: Vec<TestDescriptor>) -> TestDescriptor {
    for child in children {
        parent.add_child(child).unwrap();
    }
    parent
}

/// Run the whole tree. Names starting with `skip` are skipped, names
/// starting with `fail` fail, everything else succeeds.
pub fn execute_all(mut request: ExecutionRequest<'_>) -> anyhow::Result<()> {
    let root = request.root();
    execute_node(request.listener(), root);
    Ok(())
}

pub fn execute_node(listener: &mut dyn EngineExecutionListener, node: &TestDescriptor) {
    let name = node.display_name();
    if name.starts_with("skip") {
        listener.execution_skipped(node.unique_id(), "skipped by name");
        return;
    }

    listener.execution_started(node.unique_id());
    for child in node.children() {
        execute_node(listener, child);
    }
    let result = if name.starts_with("fail") {
        TestExecutionResult::failed(FailureCause::new(format!("{name} failed")))
    } else {
        TestExecutionResult::successful()
    };
    listener.execution_finished(node.unique_id(), result);
}

/// Two engines A and B: A has a1 → {a1.1, a1.2}, B has b1
pub fn engines_a_and_b() -> Vec<Box<dyn TestEngine>> {
    vec![
        ScriptedEngine::with_tree("A", |root| {
            let a1 = container(root, "a1", |id| vec![test(id, "a1.1"), test(id, "a1.2")]);
            engine_root(root, vec![a1])
        })
        .boxed(),
        ScriptedEngine::with_tree("B", |root| engine_root(root, vec![test(root, "b1")])).boxed(),
    ]
}

pub fn recorder() -> (Arc<EventRecorder>, Vec<Arc<dyn TestExecutionListener>>) {
    let recorder = Arc::new(EventRecorder::new());
    let listeners: Vec<Arc<dyn TestExecutionListener>> = vec![recorder.clone()];
    (recorder, listeners)
}

/// Route `tracing` output to the test harness, filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
