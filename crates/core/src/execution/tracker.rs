//! Per-descriptor execution state machine
//!
//! ```text
//! NOT_STARTED --Started--> STARTED --Finished--> FINISHED | ABORTED
//! NOT_STARTED --Skipped--> SKIPPED
//! ```
//!
//! Additional rules:
//! - a descriptor can only be started or skipped while its parent is
//!   STARTED (engine roots have no parent);
//! - a descriptor can only finish once all of its known children are in a
//!   terminal state;
//! - skipping a container skips its whole subtree, deepest first;
//! - dynamic registration requires a STARTED parent and fresh ids;
//! - a dynamically registered pure container may arrive empty, but it
//!   needs at least one child by the time it finishes.
//!
//! [`ExecutionTracker::apply`] either rejects an event with a
//! [`ViolationKind`] without changing any state, or accepts it and returns
//! the [`Transition`]s that should be forwarded to listeners, in order.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::event::{
    EventKind, ExecutionEvent, FailureCause, ReportEntry, Status, TestExecutionResult,
};
use crate::types::{DescriptorType, TestDescriptor, UniqueId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    NotStarted,
    Started,
    Finished,
    Aborted,
    Skipped,
}

impl ExecutionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionState::Finished | ExecutionState::Aborted | ExecutionState::Skipped
        )
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionState::NotStarted => "NOT_STARTED",
            ExecutionState::Started => "STARTED",
            ExecutionState::Finished => "FINISHED",
            ExecutionState::Aborted => "ABORTED",
            ExecutionState::Skipped => "SKIPPED",
        };
        f.write_str(name)
    }
}

/// Why an event was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViolationKind {
    #[error("descriptor is not part of the test plan")]
    UnknownDescriptor,

    #[error("descriptor lies outside the subtree of engine root {engine_root}")]
    ForeignDescriptor { engine_root: UniqueId },

    #[error("'{event}' is illegal in state {from}")]
    IllegalTransition { from: ExecutionState, event: EventKind },

    #[error("parent {parent} is {state}, expected STARTED")]
    ParentNotStarted { parent: UniqueId, state: ExecutionState },

    #[error("{} child descriptor(s) have not reached a terminal state", pending.len())]
    ChildrenNotFinished { pending: Vec<UniqueId> },

    #[error("unique id {0} is already registered")]
    DuplicateDescriptor(UniqueId),

    #[error("parent of dynamically registered descriptor is unknown")]
    OrphanDescriptor,

    #[error("invalid dynamic descriptor: {0}")]
    InvalidDynamicDescriptor(String),

    #[error("engine returned with {pending} descriptor(s) not in a terminal state")]
    IncompleteExecution { pending: usize },
}

/// An accepted state change, in forwarding order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Registered(UniqueId),
    Started(UniqueId),
    Skipped(UniqueId, String),
    Finished(UniqueId, TestExecutionResult),
    Reported(UniqueId, ReportEntry),
}

impl Transition {
    pub fn unique_id(&self) -> &UniqueId {
        match self {
            Transition::Registered(id)
            | Transition::Started(id)
            | Transition::Skipped(id, _)
            | Transition::Finished(id, _)
            | Transition::Reported(id, _) => id,
        }
    }
}

#[derive(Debug, Clone)]
struct TrackedNode {
    state: ExecutionState,
    parent: Option<UniqueId>,
    children: Vec<UniqueId>,
    // dynamic pure container, populated by later registrations
    awaits_children: bool,
}

/// Live execution state of every known descriptor
#[derive(Debug, Default)]
pub struct ExecutionTracker {
    nodes: HashMap<UniqueId, TrackedNode>,
}

impl ExecutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a statically discovered tree; every node starts NOT_STARTED.
    /// Ids already tracked are ignored.
    pub fn track_tree(&mut self, root: &TestDescriptor) {
        self.insert_subtree(root, false);
    }

    pub fn state(&self, unique_id: &UniqueId) -> Option<ExecutionState> {
        self.nodes.get(unique_id).map(|node| node.state)
    }

    pub fn contains(&self, unique_id: &UniqueId) -> bool {
        self.nodes.contains_key(unique_id)
    }

    pub fn children(&self, unique_id: &UniqueId) -> &[UniqueId] {
        self.nodes
            .get(unique_id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Validate and apply one event
    pub fn apply(&mut self, event: &ExecutionEvent) -> Result<Vec<Transition>, ViolationKind> {
        match event {
            ExecutionEvent::DynamicTestRegistered(descriptor) => self.register_dynamic(descriptor),
            ExecutionEvent::Started(id) => {
                self.expect_state(id, ExecutionState::NotStarted, EventKind::Started)?;
                self.expect_parent_started(id)?;
                self.set_state(id, ExecutionState::Started);
                Ok(vec![Transition::Started(id.clone())])
            }
            ExecutionEvent::Skipped { id, reason } => {
                self.expect_state(id, ExecutionState::NotStarted, EventKind::Skipped)?;
                self.expect_parent_started(id)?;

                let mut subtree = Vec::new();
                self.collect_post_order(id, &mut subtree);
                let transitions = subtree
                    .into_iter()
                    .map(|skipped| {
                        self.set_state(&skipped, ExecutionState::Skipped);
                        Transition::Skipped(skipped, reason.clone())
                    })
                    .collect();
                Ok(transitions)
            }
            ExecutionEvent::Finished { id, result } => {
                self.expect_state(id, ExecutionState::Started, EventKind::Finished)?;
                let pending = self.pending_children(id);
                if !pending.is_empty() {
                    return Err(ViolationKind::ChildrenNotFinished { pending });
                }
                if self
                    .nodes
                    .get(id)
                    .is_some_and(|node| node.awaits_children && node.children.is_empty())
                {
                    return Err(ViolationKind::InvalidDynamicDescriptor(format!(
                        "pure container {id} finished without children"
                    )));
                }
                let state = match result.status() {
                    Status::Aborted => ExecutionState::Aborted,
                    Status::Successful | Status::Failed => ExecutionState::Finished,
                };
                self.set_state(id, state);
                Ok(vec![Transition::Finished(id.clone(), result.clone())])
            }
            ExecutionEvent::ReportingEntryPublished { id, entry } => {
                self.expect_state(id, ExecutionState::Started, EventKind::ReportingEntryPublished)?;
                Ok(vec![Transition::Reported(id.clone(), entry.clone())])
            }
        }
    }

    /// Descriptors under (and including) `root` that are not terminal
    pub fn unfinished(&self, root: &UniqueId) -> Vec<UniqueId> {
        let mut subtree = Vec::new();
        self.collect_post_order(root, &mut subtree);
        subtree
            .into_iter()
            .filter(|id| self.state(id).is_some_and(|state| !state.is_terminal()))
            .collect()
    }

    /// Drive every non-terminal descriptor under `root` to ABORTED.
    ///
    /// NOT_STARTED descriptors get a synthesized start first, so started
    /// and finished counts stay balanced. Children finish before parents.
    pub fn abort_remaining(&mut self, root: &UniqueId, cause: &FailureCause) -> Vec<Transition> {
        let mut transitions = Vec::new();
        self.abort_node(root, cause, &mut transitions);
        transitions
    }

    fn abort_node(&mut self, id: &UniqueId, cause: &FailureCause, out: &mut Vec<Transition>) {
        match self.state(id) {
            None => return,
            Some(state) if state.is_terminal() => return,
            Some(ExecutionState::NotStarted) => {
                self.set_state(id, ExecutionState::Started);
                out.push(Transition::Started(id.clone()));
            }
            Some(_) => {}
        }

        for child in self.children(id).to_vec() {
            self.abort_node(&child, cause, out);
        }

        self.set_state(id, ExecutionState::Aborted);
        out.push(Transition::Finished(
            id.clone(),
            TestExecutionResult::aborted(cause.clone()),
        ));
    }

    fn register_dynamic(
        &mut self,
        descriptor: &TestDescriptor,
    ) -> Result<Vec<Transition>, ViolationKind> {
        let id = descriptor.unique_id();
        if self.nodes.contains_key(id) {
            return Err(ViolationKind::DuplicateDescriptor(id.clone()));
        }
        let parent = descriptor.parent_id().ok_or(ViolationKind::OrphanDescriptor)?;
        let parent_state = self.state(&parent).ok_or(ViolationKind::OrphanDescriptor)?;
        if parent_state != ExecutionState::Started {
            return Err(ViolationKind::ParentNotStarted {
                parent,
                state: parent_state,
            });
        }
        let mut seen = HashSet::from([id]);
        for node in descriptor.descendants() {
            if !seen.insert(node.unique_id()) {
                return Err(ViolationKind::InvalidDynamicDescriptor(format!(
                    "duplicate unique id {}",
                    node.unique_id()
                )));
            }
        }
        if let Some(existing) = descriptor
            .descendants()
            .into_iter()
            .find(|node| self.nodes.contains_key(node.unique_id()))
        {
            return Err(ViolationKind::DuplicateDescriptor(existing.unique_id().clone()));
        }

        let registered = self.insert_subtree(descriptor, true);
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.push(id.clone());
        }
        Ok(registered.into_iter().map(Transition::Registered).collect())
    }

    // Returns the inserted ids in pre-order
    fn insert_subtree(&mut self, root: &TestDescriptor, dynamic: bool) -> Vec<UniqueId> {
        let mut inserted = Vec::new();
        for node in std::iter::once(root).chain(root.descendants()) {
            if self.nodes.contains_key(node.unique_id()) {
                continue;
            }
            self.nodes.insert(
                node.unique_id().clone(),
                TrackedNode {
                    state: ExecutionState::NotStarted,
                    parent: node.parent_id(),
                    children: node
                        .children()
                        .iter()
                        .map(|child| child.unique_id().clone())
                        .collect(),
                    awaits_children: dynamic && node.descriptor_type() == DescriptorType::Container,
                },
            );
            inserted.push(node.unique_id().clone());
        }
        inserted
    }

    fn expect_state(
        &self,
        id: &UniqueId,
        expected: ExecutionState,
        event: EventKind,
    ) -> Result<(), ViolationKind> {
        let state = self.state(id).ok_or(ViolationKind::UnknownDescriptor)?;
        if state != expected {
            return Err(ViolationKind::IllegalTransition { from: state, event });
        }
        Ok(())
    }

    fn expect_parent_started(&self, id: &UniqueId) -> Result<(), ViolationKind> {
        let Some(parent) = self.nodes.get(id).and_then(|node| node.parent.clone()) else {
            return Ok(());
        };
        match self.state(&parent) {
            Some(ExecutionState::Started) => Ok(()),
            Some(state) => Err(ViolationKind::ParentNotStarted { parent, state }),
            // Parent outside the tracked trees: treat the node as a root
            None => Ok(()),
        }
    }

    fn pending_children(&self, id: &UniqueId) -> Vec<UniqueId> {
        self.children(id)
            .iter()
            .filter(|child| self.state(child).is_some_and(|state| !state.is_terminal()))
            .cloned()
            .collect()
    }

    fn collect_post_order(&self, id: &UniqueId, out: &mut Vec<UniqueId>) {
        if !self.nodes.contains_key(id) {
            return;
        }
        for child in self.children(id) {
            self.collect_post_order(child, out);
        }
        out.push(id.clone());
    }

    fn set_state(&mut self, id: &UniqueId, state: ExecutionState) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.state = state;
        }
    }
}
