//! Integration tests for launcher-side filtering and pruning

mod common;

use common::{container, engine_root, recorder, test, ScriptedEngine};
use trellis::discovery::{
    exclude_display_name_pattern, exclude_tags, include_class_name_patterns, include_tag_expression,
    include_unique_id_prefix, EngineDiscoveryRequest,
};
use trellis::launcher::{Launcher, TestPlan};
use trellis::types::{DescriptorType, TestDescriptor, TestSource, TestTag, UniqueId};

fn tagged(parent: &UniqueId, name: &str, tags: &[&str]) -> TestDescriptor {
    test(parent, name).with_tags(tags.iter().map(|t| TestTag::new(t).unwrap()))
}

fn launcher() -> Launcher {
    Launcher::with_engines([
        ScriptedEngine::with_tree("tagged", |root| {
            engine_root(
                root,
                vec![
                    container(root, "Speed", |id| {
                        vec![
                            tagged(id, "slow-one", &["slow"]),
                            tagged(id, "fast-one", &["fast"]),
                            tagged(id, "fast-two", &["fast", "db"]),
                        ]
                    }),
                    container(root, "Slow", |id| vec![tagged(id, "glacial", &["slow"])]),
                ],
            )
        })
        .boxed(),
        ScriptedEngine::with_tree("classes", |root| {
            let class = |name: &str, methods: &[&str]| {
                let id = root.append("class", name).unwrap();
                let mut class = TestDescriptor::new(id.clone(), name, DescriptorType::Container)
                    .with_source(TestSource::class(format!("com.example.{name}")));
                for method in methods {
                    class.add_child(test(&id, method)).unwrap();
                }
                class
            };
            engine_root(
                root,
                vec![
                    class("ParserTests", &["parses", "rejects"]),
                    class("ParserBench", &["throughput"]),
                ],
            )
        })
        .boxed(),
    ])
    .unwrap()
}

fn names(plan: &TestPlan) -> Vec<String> {
    plan.unique_ids()
        .iter()
        .filter_map(|id| plan.get(id))
        .map(|identifier| identifier.display_name.clone())
        .collect()
}

#[test]
fn test_exclude_slow_keeps_container_with_fast_children() {
    let launcher = launcher();
    let request = EngineDiscoveryRequest::builder()
        .filter(exclude_tags(["slow"]).unwrap())
        .build();
    let plan = launcher.discover(&request);

    let speed = UniqueId::for_engine("tagged").unwrap().append("container", "Speed").unwrap();
    let children: Vec<_> = plan
        .children(&speed)
        .iter()
        .map(|c| c.display_name.clone())
        .collect();
    assert_eq!(children, vec!["fast-one", "fast-two"]);

    // the all-slow container disappears, the engine roots stay
    let slow = UniqueId::for_engine("tagged").unwrap().append("container", "Slow").unwrap();
    assert!(!plan.contains(&slow));
    assert_eq!(plan.engine_roots().len(), 2);
    assert_eq!(plan.test_count(), 5);
}

#[test]
fn test_tag_expression_filter() {
    let request = EngineDiscoveryRequest::builder()
        .filter(include_tag_expression("fast & !db").unwrap())
        .build();
    let plan = launcher().discover(&request);

    assert_eq!(names(&plan), vec!["tagged", "Speed", "fast-one", "classes"]);
}

#[test]
fn test_class_name_and_display_name_filters() {
    let request = EngineDiscoveryRequest::builder()
        .filter(include_class_name_patterns([r"com\.example\..*Tests"]).unwrap())
        .filter(exclude_display_name_pattern("rej.*").unwrap())
        .build();
    let plan = launcher().discover(&request);

    assert_eq!(names(&plan), vec!["tagged", "classes", "ParserTests", "parses"]);
}

#[test]
fn test_unique_id_prefix_filter() {
    let prefix = UniqueId::for_engine("classes").unwrap().append("class", "ParserBench").unwrap();
    let request = EngineDiscoveryRequest::builder()
        .filter(include_unique_id_prefix(prefix))
        .build();
    let plan = launcher().discover(&request);

    assert_eq!(plan.test_count(), 1);
    assert_eq!(names(&plan), vec!["tagged", "classes", "ParserBench", "throughput"]);
}

#[test]
fn test_only_surviving_descriptors_are_executed() {
    let launcher = launcher();
    let request = EngineDiscoveryRequest::builder()
        .filter(exclude_tags(["slow"]).unwrap())
        .build();
    let (recorder, listeners) = recorder();
    let report = launcher.discover_and_execute(&request, &listeners);

    assert!(report.is_clean());
    let events = recorder.events();
    assert_eq!(events.tests().started().len(), 5);
    assert!(events.all().iter().all(|e| !e.identifier.display_name.contains("slow")));
}
