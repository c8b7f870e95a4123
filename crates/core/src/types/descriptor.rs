//! Engine-agnostic discovery tree
//!
//! Engines build a [`TestDescriptor`] tree during discovery and hand it to
//! the launcher by value. The tree owns its children; the parent link is
//! derived from the child's [`UniqueId`], so there is no back pointer to
//! keep consistent.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use super::{TestSource, TestTag, UniqueId};
use crate::error::{Error, Result};

/// What a descriptor represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorType {
    Container,
    Test,
    ContainerAndTest,
}

impl DescriptorType {
    pub fn is_test(self) -> bool {
        matches!(self, DescriptorType::Test | DescriptorType::ContainerAndTest)
    }

    pub fn is_container(self) -> bool {
        matches!(
            self,
            DescriptorType::Container | DescriptorType::ContainerAndTest
        )
    }
}

/// A node of the discovery tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDescriptor {
    unique_id: UniqueId,
    display_name: String,
    descriptor_type: DescriptorType,
    tags: BTreeSet<TestTag>,
    source: Option<TestSource>,
    children: Vec<TestDescriptor>,
}

impl TestDescriptor {
    pub fn new(
        unique_id: UniqueId,
        display_name: impl Into<String>,
        descriptor_type: DescriptorType,
    ) -> Self {
        Self {
            unique_id,
            display_name: display_name.into(),
            descriptor_type,
            tags: BTreeSet::new(),
            source: None,
            children: Vec::new(),
        }
    }

    /// Engine root container with id `[engine:<engine_id>]`
    pub fn engine_root(unique_id: UniqueId, display_name: impl Into<String>) -> Self {
        Self::new(unique_id, display_name, DescriptorType::Container)
    }

    pub fn with_tag(mut self, tag: TestTag) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = TestTag>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn with_source(mut self, source: TestSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Builder-style [`add_child`](Self::add_child)
    pub fn with_child(mut self, child: TestDescriptor) -> Result<Self> {
        self.add_child(child)?;
        Ok(self)
    }

    /// Append a child, keeping insertion order.
    ///
    /// The child's id must be this descriptor's id plus exactly one
    /// segment, and must not collide with an existing child.
    pub fn add_child(&mut self, child: TestDescriptor) -> Result<()> {
        if !child.unique_id.is_direct_child_of(&self.unique_id) {
            return Err(Error::InvalidDescriptor(format!(
                "{} is not a direct child id of {}",
                child.unique_id, self.unique_id
            )));
        }
        if self
            .children
            .iter()
            .any(|existing| existing.unique_id == child.unique_id)
        {
            return Err(Error::InvalidDescriptor(format!(
                "duplicate child id {} under {}",
                child.unique_id, self.unique_id
            )));
        }
        self.children.push(child);
        Ok(())
    }

    pub fn unique_id(&self) -> &UniqueId {
        &self.unique_id
    }

    /// Parent id, derived from the unique id
    pub fn parent_id(&self) -> Option<UniqueId> {
        self.unique_id.parent()
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn descriptor_type(&self) -> DescriptorType {
        self.descriptor_type
    }

    pub fn tags(&self) -> &BTreeSet<TestTag> {
        &self.tags
    }

    pub fn source(&self) -> Option<&TestSource> {
        self.source.as_ref()
    }

    pub fn children(&self) -> &[TestDescriptor] {
        &self.children
    }

    pub fn is_test(&self) -> bool {
        self.descriptor_type.is_test()
    }

    pub fn is_container(&self) -> bool {
        self.descriptor_type.is_container()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether this descriptor or any descendant is test-bearing
    pub fn contains_tests(&self) -> bool {
        self.is_test() || self.children.iter().any(TestDescriptor::contains_tests)
    }

    /// All descendants in pre-order, not including `self`
    pub fn descendants(&self) -> Vec<&TestDescriptor> {
        let mut out = Vec::new();
        let mut stack: Vec<&TestDescriptor> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Find a descriptor in this subtree (including `self`)
    pub fn find(&self, unique_id: &UniqueId) -> Option<&TestDescriptor> {
        if &self.unique_id == unique_id {
            return Some(self);
        }
        if !unique_id.has_prefix(&self.unique_id) {
            return None;
        }
        self.children.iter().find_map(|child| child.find(unique_id))
    }

    /// Number of test-bearing descriptors in this subtree
    pub fn count_tests(&self) -> usize {
        usize::from(self.is_test())
            + self
                .children
                .iter()
                .map(TestDescriptor::count_tests)
                .sum::<usize>()
    }

    /// Check the structural invariants of the whole subtree: ids are
    /// unique and every non-root leaf is test-bearing.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        seen.insert(&self.unique_id);
        for node in self.descendants() {
            if !seen.insert(&node.unique_id) {
                return Err(Error::InvalidDescriptor(format!(
                    "duplicate unique id {}",
                    node.unique_id
                )));
            }
            if node.is_leaf() && node.descriptor_type == DescriptorType::Container {
                return Err(Error::InvalidDescriptor(format!(
                    "leaf {} is a pure container",
                    node.unique_id
                )));
            }
        }
        Ok(())
    }

    /// Keep only the children for which `keep` returns a replacement.
    /// Used by pruning; returns the number of removed children.
    pub(crate) fn retain_children<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(TestDescriptor) -> Option<TestDescriptor>,
    {
        let before = self.children.len();
        let children = std::mem::take(&mut self.children);
        self.children = children.into_iter().filter_map(&mut keep).collect();
        before - self.children.len()
    }
}
