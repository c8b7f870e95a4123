//! Result of a discovery run, extended by dynamic registrations

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::report::DiscoveryError;
use crate::config::ConfigurationParameters;
use crate::types::{DescriptorType, TestDescriptor, TestSource, TestTag, UniqueId};

/// Serializable snapshot of one descriptor, as seen by listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestIdentifier {
    pub unique_id: UniqueId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<UniqueId>,
    pub display_name: String,
    pub descriptor_type: DescriptorType,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<TestTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<TestSource>,
}

impl TestIdentifier {
    pub fn from_descriptor(descriptor: &TestDescriptor) -> Self {
        Self {
            unique_id: descriptor.unique_id().clone(),
            parent_id: descriptor.parent_id(),
            display_name: descriptor.display_name().to_string(),
            descriptor_type: descriptor.descriptor_type(),
            tags: descriptor.tags().clone(),
            source: descriptor.source().cloned(),
        }
    }

    pub fn is_test(&self) -> bool {
        self.descriptor_type.is_test()
    }

    pub fn is_container(&self) -> bool {
        self.descriptor_type.is_container()
    }
}

/// Discovered root of one engine
#[derive(Debug, Clone)]
pub struct EngineRoot {
    pub engine_id: String,
    pub descriptor: TestDescriptor,
}

/// Descriptors registered while executing, appended to by the launcher
#[derive(Debug, Clone, Default)]
struct DynamicIndex {
    identifiers: HashMap<UniqueId, Arc<TestIdentifier>>,
    children: HashMap<UniqueId, Vec<UniqueId>>,
    test_count: usize,
}

/// Merged, filtered forest of all engine roots in registration order
///
/// The statically discovered part never changes. Descriptors that engines
/// register during execution are appended to a separate dynamic index and
/// show up in every lookup from then on.
#[derive(Debug, Default)]
pub struct TestPlan {
    roots: Vec<EngineRoot>,
    identifiers: HashMap<UniqueId, Arc<TestIdentifier>>,
    children: HashMap<UniqueId, Vec<UniqueId>>,
    test_count: usize,
    dynamic: Mutex<DynamicIndex>,
    discovery_errors: Vec<DiscoveryError>,
    configuration: ConfigurationParameters,
}

impl TestPlan {
    pub(crate) fn new(
        roots: Vec<EngineRoot>,
        discovery_errors: Vec<DiscoveryError>,
        configuration: ConfigurationParameters,
    ) -> Self {
        let mut identifiers = HashMap::new();
        let mut children = HashMap::new();
        let mut test_count = 0;

        for root in &roots {
            for node in std::iter::once(&root.descriptor).chain(root.descriptor.descendants()) {
                if node.is_test() {
                    test_count += 1;
                }
                children.insert(
                    node.unique_id().clone(),
                    node.children()
                        .iter()
                        .map(|child| child.unique_id().clone())
                        .collect::<Vec<_>>(),
                );
                identifiers.insert(
                    node.unique_id().clone(),
                    Arc::new(TestIdentifier::from_descriptor(node)),
                );
            }
        }

        Self {
            roots,
            identifiers,
            children,
            test_count,
            dynamic: Mutex::new(DynamicIndex::default()),
            discovery_errors,
            configuration,
        }
    }

    /// Add a dynamically registered descriptor and its subtree. Ids that
    /// are already known are left as they are.
    pub(crate) fn add_dynamic(&self, descriptor: &TestDescriptor) {
        let mut dynamic = self.lock_dynamic();
        for node in std::iter::once(descriptor).chain(descriptor.descendants()) {
            let id = node.unique_id();
            if self.identifiers.contains_key(id) || dynamic.identifiers.contains_key(id) {
                continue;
            }
            if let Some(parent) = node.parent_id() {
                dynamic.children.entry(parent).or_default().push(id.clone());
            }
            if node.is_test() {
                dynamic.test_count += 1;
            }
            dynamic
                .identifiers
                .insert(id.clone(), Arc::new(TestIdentifier::from_descriptor(node)));
        }
    }

    fn lock_dynamic(&self) -> MutexGuard<'_, DynamicIndex> {
        self.dynamic.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Engine roots in registration order, as discovered
    pub fn engine_roots(&self) -> &[EngineRoot] {
        &self.roots
    }

    /// Root identifiers in registration order
    pub fn roots(&self) -> Vec<Arc<TestIdentifier>> {
        self.roots
            .iter()
            .filter_map(|root| self.identifiers.get(root.descriptor.unique_id()).cloned())
            .collect()
    }

    pub fn get(&self, unique_id: &UniqueId) -> Option<Arc<TestIdentifier>> {
        self.identifiers
            .get(unique_id)
            .cloned()
            .or_else(|| self.lock_dynamic().identifiers.get(unique_id).cloned())
    }

    pub fn contains(&self, unique_id: &UniqueId) -> bool {
        self.identifiers.contains_key(unique_id)
            || self.lock_dynamic().identifiers.contains_key(unique_id)
    }

    /// Whether `unique_id` was registered during execution
    pub fn is_dynamic(&self, unique_id: &UniqueId) -> bool {
        self.lock_dynamic().identifiers.contains_key(unique_id)
    }

    /// The statically discovered descriptor for `unique_id`
    pub fn descriptor(&self, unique_id: &UniqueId) -> Option<&TestDescriptor> {
        let engine_id = unique_id.engine_id()?;
        self.roots
            .iter()
            .find(|root| root.engine_id == engine_id)
            .and_then(|root| root.descriptor.find(unique_id))
    }

    /// Children in discovery order, followed by dynamically registered ones
    pub fn children(&self, unique_id: &UniqueId) -> Vec<Arc<TestIdentifier>> {
        self.child_ids(unique_id)
            .iter()
            .filter_map(|child| self.get(child))
            .collect()
    }

    fn child_ids(&self, unique_id: &UniqueId) -> Vec<UniqueId> {
        let mut ids = self.children.get(unique_id).cloned().unwrap_or_default();
        if let Some(dynamic) = self.lock_dynamic().children.get(unique_id) {
            ids.extend(dynamic.iter().cloned());
        }
        ids
    }

    pub fn parent(&self, identifier: &TestIdentifier) -> Option<Arc<TestIdentifier>> {
        identifier
            .parent_id
            .as_ref()
            .and_then(|parent| self.get(parent))
    }

    /// All descendants of `unique_id` in pre-order, not including itself
    pub fn descendants(&self, unique_id: &UniqueId) -> Vec<Arc<TestIdentifier>> {
        let mut out = Vec::new();
        let mut stack: Vec<UniqueId> = self.child_ids(unique_id).into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            if let Some(identifier) = self.get(&id) {
                out.push(identifier);
            }
            stack.extend(self.child_ids(&id).into_iter().rev());
        }
        out
    }

    /// Every unique id of the plan in pre-order, roots in registration order
    pub fn unique_ids(&self) -> Vec<UniqueId> {
        let mut ids = Vec::new();
        for root in &self.roots {
            let root_id = root.descriptor.unique_id();
            ids.push(root_id.clone());
            ids.extend(
                self.descendants(root_id)
                    .into_iter()
                    .map(|identifier| identifier.unique_id.clone()),
            );
        }
        ids
    }

    /// Number of test-bearing descriptors, dynamic ones included
    pub fn test_count(&self) -> usize {
        self.test_count + self.lock_dynamic().test_count
    }

    pub fn contains_tests(&self) -> bool {
        self.test_count() > 0
    }

    /// Number of descriptors, containers and dynamic ones included
    pub fn len(&self) -> usize {
        self.identifiers.len() + self.lock_dynamic().identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn discovery_errors(&self) -> &[DiscoveryError] {
        &self.discovery_errors
    }

    pub fn configuration(&self) -> &ConfigurationParameters {
        &self.configuration
    }
}

impl Clone for TestPlan {
    fn clone(&self) -> Self {
        Self {
            roots: self.roots.clone(),
            identifiers: self.identifiers.clone(),
            children: self.children.clone(),
            test_count: self.test_count,
            dynamic: Mutex::new(self.lock_dynamic().clone()),
            discovery_errors: self.discovery_errors.clone(),
            configuration: self.configuration.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> TestPlan {
        let alpha = UniqueId::for_engine("alpha").unwrap();
        let class = alpha.append("class", "Foo").unwrap();
        let alpha_root = TestDescriptor::engine_root(alpha.clone(), "alpha")
            .with_child(
                TestDescriptor::new(class.clone(), "Foo", DescriptorType::Container)
                    .with_child(TestDescriptor::new(
                        class.append("method", "a").unwrap(),
                        "a",
                        DescriptorType::Test,
                    ))
                    .unwrap()
                    .with_child(TestDescriptor::new(
                        class.append("method", "b").unwrap(),
                        "b",
                        DescriptorType::Test,
                    ))
                    .unwrap(),
            )
            .unwrap();

        let beta = UniqueId::for_engine("beta").unwrap();
        let beta_root = TestDescriptor::engine_root(beta.clone(), "beta")
            .with_child(TestDescriptor::new(
                beta.append("test", "b1").unwrap(),
                "b1",
                DescriptorType::Test,
            ))
            .unwrap();

        TestPlan::new(
            vec![
                EngineRoot {
                    engine_id: "alpha".to_string(),
                    descriptor: alpha_root,
                },
                EngineRoot {
                    engine_id: "beta".to_string(),
                    descriptor: beta_root,
                },
            ],
            Vec::new(),
            ConfigurationParameters::new(),
        )
    }

    #[test]
    fn test_counts_and_roots() {
        let plan = plan();
        assert_eq!(plan.test_count(), 3);
        assert_eq!(plan.len(), 6);
        let roots: Vec<_> = plan.roots().iter().map(|r| r.display_name.clone()).collect();
        assert_eq!(roots, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_navigation() {
        let plan = plan();
        let class = UniqueId::for_engine("alpha").unwrap().append("class", "Foo").unwrap();

        let children: Vec<_> = plan
            .children(&class)
            .iter()
            .map(|c| c.display_name.clone())
            .collect();
        assert_eq!(children, vec!["a", "b"]);

        let a = plan.children(&class)[0].clone();
        assert_eq!(plan.parent(&a).unwrap().unique_id, class);
        assert_eq!(
            plan.descendants(&UniqueId::for_engine("alpha").unwrap()).len(),
            3
        );
        assert_eq!(plan.descriptor(&class).unwrap().display_name(), "Foo");
    }

    #[test]
    fn test_unique_ids_are_in_pre_order() {
        let plan = plan();
        let rendered: Vec<String> = plan.unique_ids().iter().map(|id| id.to_string()).collect();
        insta::assert_debug_snapshot!(rendered, @r#"
        [
            "[engine:alpha]",
            "[engine:alpha]/[class:Foo]",
            "[engine:alpha]/[class:Foo]/[method:a]",
            "[engine:alpha]/[class:Foo]/[method:b]",
            "[engine:beta]",
            "[engine:beta]/[test:b1]",
        ]
        "#);
    }

    #[test]
    fn test_identifier_serialization() {
        let plan = plan();
        let root = plan.roots()[1].clone();
        let json = serde_json::to_value(&*root).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "unique_id": "[engine:beta]",
                "display_name": "beta",
                "descriptor_type": "container"
            })
        );
    }

    #[test]
    fn test_dynamic_descriptors_join_the_index() {
        let plan = plan();
        let class = UniqueId::for_engine("alpha").unwrap().append("class", "Foo").unwrap();
        let factory = class.append("factory", "cases").unwrap();
        let case = factory.append("dynamic-test", "#1").unwrap();

        plan.add_dynamic(&TestDescriptor::new(factory.clone(), "cases", DescriptorType::Container));
        plan.add_dynamic(&TestDescriptor::new(case.clone(), "[1]", DescriptorType::Test));

        assert!(plan.contains(&case));
        assert!(plan.is_dynamic(&factory));
        assert!(!plan.is_dynamic(&class));
        assert_eq!(plan.get(&case).unwrap().display_name, "[1]");
        assert_eq!(plan.parent(&plan.get(&case).unwrap()).unwrap().unique_id, factory);
        assert_eq!(plan.test_count(), 4);
        assert_eq!(plan.len(), 8);

        let children: Vec<_> = plan
            .children(&class)
            .iter()
            .map(|c| c.display_name.clone())
            .collect();
        assert_eq!(children, vec!["a", "b", "cases"]);
        assert_eq!(plan.descendants(&class).len(), 4);
        assert_eq!(plan.unique_ids()[5], case);

        // re-registration is ignored and clones keep what was added
        plan.add_dynamic(&TestDescriptor::new(case.clone(), "[1]", DescriptorType::Test));
        assert_eq!(plan.clone().len(), 8);
        assert!(plan.descriptor(&case).is_none());
    }
}
