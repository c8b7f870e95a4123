//! Engine that never finds anything

use super::{ExecutionRequest, TestEngine};
use crate::discovery::EngineDiscoveryRequest;
use crate::execution::TestExecutionResult;
use crate::types::{TestDescriptor, UniqueId};

/// Id used by [`NoOpEngine::default`]
pub const NOOP_ENGINE_ID: &str = "noop";

/// Discovers an empty root and reports it as successful.
///
/// Useful as a placeholder registration and for exercising the launcher
/// without any real tests.
#[derive(Debug, Clone)]
pub struct NoOpEngine {
    id: String,
}

impl NoOpEngine {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Default for NoOpEngine {
    fn default() -> Self {
        Self::new(NOOP_ENGINE_ID)
    }
}

impl TestEngine for NoOpEngine {
    fn id(&self) -> &str {
        &self.id
    }

    fn discover(
        &self,
        _request: &EngineDiscoveryRequest,
        parent_id: &UniqueId,
    ) -> anyhow::Result<TestDescriptor> {
        let root_id = parent_id.append(crate::types::ENGINE_SEGMENT_TYPE, &self.id)?;
        Ok(TestDescriptor::engine_root(root_id, &self.id))
    }

    fn execute(&self, mut request: ExecutionRequest<'_>) -> anyhow::Result<()> {
        let root = request.root().unique_id().clone();
        let listener = request.listener();
        listener.execution_started(&root);
        listener.execution_finished(&root, TestExecutionResult::successful());
        Ok(())
    }
}
