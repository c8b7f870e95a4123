//! Post-discovery filtering
//!
//! A test-bearing descriptor survives if the filters accept it. A container
//! survives if at least one descendant survives. The engine root always
//! survives, possibly empty.

use std::collections::BTreeSet;

use crate::discovery::{evaluate_filters, DiscoveryFilter, FilterCandidate};
use crate::types::{TestDescriptor, TestTag};

/// Apply `filters` to the tree below `root` and drop everything that did not
/// survive. Returns the number of test-bearing descriptors removed.
pub(crate) fn prune(root: &mut TestDescriptor, filters: &[DiscoveryFilter]) -> usize {
    let before = root.count_tests();

    let tags = root.tags().clone();
    let class_name = root
        .source()
        .and_then(|source| source.class_name())
        .map(str::to_string);
    root.retain_children(|child| prune_node(child, &tags, class_name.as_deref(), filters));

    before - root.count_tests()
}

fn prune_node(
    mut node: TestDescriptor,
    inherited_tags: &BTreeSet<TestTag>,
    inherited_class: Option<&str>,
    filters: &[DiscoveryFilter],
) -> Option<TestDescriptor> {
    let mut tags = inherited_tags.clone();
    tags.extend(node.tags().iter().cloned());
    let class_name = node
        .source()
        .and_then(|source| source.class_name())
        .or(inherited_class)
        .map(str::to_string);

    let accepted = node.is_test() && {
        let candidate = FilterCandidate {
            descriptor: &node,
            effective_tags: &tags,
            class_name: class_name.as_deref(),
        };
        let result = evaluate_filters(filters, &candidate);
        if result.excluded() {
            tracing::trace!("Filtered out {}: {}", node.unique_id(), result.reason());
        }
        result.included()
    };

    node.retain_children(|child| prune_node(child, &tags, class_name.as_deref(), filters));

    if accepted || !node.children().is_empty() {
        Some(node)
    } else {
        None
    }
}
