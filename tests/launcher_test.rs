//! Integration tests for discovery fan-out, merge order and execution order

mod common;

use std::sync::{Arc, Mutex};

use common::{container, engine_root, engines_a_and_b, init_tracing, recorder, test, ScriptedEngine};
use trellis::discovery::{
    select_class, select_package, DiscoverySelector, EngineDiscoveryRequest, EngineFilter,
};
use trellis::engine::{NoOpEngine, TestEngine};
use trellis::execution::ReportEntry;
use trellis::launcher::{Launcher, TestExecutionListener, TestIdentifier};
use trellis::testkit::EngineTestKit;
use trellis::types::{TestDescriptor, UniqueId};
use trellis::Error;

#[test]
fn test_two_engines_discovered_and_executed_in_registration_order() {
    init_tracing();
    let launcher = Launcher::with_engines(engines_a_and_b()).unwrap();
    let request = EngineDiscoveryRequest::builder().build();

    let plan = launcher.discover(&request);
    let roots: Vec<_> = plan.roots().iter().map(|r| r.display_name.clone()).collect();
    assert_eq!(roots, vec!["A", "B"]);
    assert_eq!(plan.test_count(), 3);

    let (recorder, listeners) = recorder();
    let report = launcher.execute(&plan, &listeners);
    assert!(report.is_clean());
    assert_eq!(report.executed_engines(), ["A".to_string(), "B".to_string()]);

    assert_eq!(
        recorder.events().describe(),
        vec![
            "started A",
            "started a1",
            "started a1.1",
            "finished a1.1",
            "started a1.2",
            "finished a1.2",
            "finished a1",
            "finished A",
            "started B",
            "started b1",
            "finished b1",
            "finished B",
        ]
    );
}

#[test]
fn test_identity_is_stable_across_discoveries() {
    let launcher = Launcher::with_engines(engines_a_and_b()).unwrap();
    let request = EngineDiscoveryRequest::builder().build();

    let first: Vec<String> = launcher
        .discover(&request)
        .unique_ids()
        .iter()
        .map(|id| id.to_string())
        .collect();
    let second: Vec<String> = launcher
        .discover(&request)
        .unique_ids()
        .iter()
        .map(|id| id.to_string())
        .collect();

    assert_eq!(first, second);
    assert_eq!(first[2], "[engine:A]/[container:a1]/[test:a1.1]");
    assert_eq!(
        UniqueId::parse(&first[2]).unwrap(),
        UniqueId::for_engine("A")
            .unwrap()
            .append("container", "a1")
            .unwrap()
            .append("test", "a1.1")
            .unwrap()
    );
}

#[test]
fn test_total_coverage_with_skips_and_failures() {
    let launcher = Launcher::with_engines([ScriptedEngine::with_tree("mixed", |root| {
        engine_root(
            root,
            vec![
                container(root, "suite", |id| {
                    vec![test(id, "ok"), test(id, "fail-assertion"), test(id, "skip-me")]
                }),
                container(root, "skip-suite", |id| vec![test(id, "inner-1"), test(id, "inner-2")]),
            ],
        )
    })
    .boxed()])
    .unwrap();

    let plan = launcher.discover(&EngineDiscoveryRequest::builder().build());
    let (recorder, listeners) = recorder();
    let report = launcher.execute(&plan, &listeners);
    assert!(report.is_clean());

    let events = recorder.events();
    assert_eq!(events.started().len(), events.finished().len());

    // every test of the plan gets exactly one terminal event
    let root = plan.roots()[0].unique_id.clone();
    for identifier in plan.descendants(&root).into_iter().filter(|i| i.is_test()) {
        let terminal = events.for_id(&identifier.unique_id);
        assert_eq!(
            terminal.finished().len() + terminal.skipped().len(),
            1,
            "{}",
            identifier.unique_id
        );
    }

    assert_eq!(events.tests().failed().len(), 1);
    assert_eq!(events.tests().skipped().len(), 3);
    assert_eq!(events.tests().succeeded().len(), 1);
}

#[test]
fn test_failing_discovery_is_isolated() {
    let launcher = Launcher::with_engines([
        engines_a_and_b().remove(0),
        ScriptedEngine::new("broken", |_, _| Err(anyhow::anyhow!("classpath scan failed"))).boxed(),
        ScriptedEngine::new("panicky", |_, _| panic!("discovery bug")).boxed(),
        engines_a_and_b().remove(1),
    ])
    .unwrap();

    let plan = launcher.discover(&EngineDiscoveryRequest::builder().build());
    let roots: Vec<_> = plan.engine_roots().iter().map(|r| r.engine_id.as_str()).collect();
    assert_eq!(roots, vec!["A", "B"]);
    assert_eq!(plan.test_count(), 3);

    let errors: Vec<_> = plan
        .discovery_errors()
        .iter()
        .map(|e| (e.engine_id.as_str(), e.cause.message.as_str()))
        .collect();
    assert_eq!(
        errors,
        vec![("broken", "classpath scan failed"), ("panicky", "discovery bug")]
    );
    assert_eq!(plan.discovery_errors()[1].cause.kind.as_deref(), Some("panic"));

    // discovery errors are carried into the execution report
    let (recorder, listeners) = recorder();
    let report = launcher.execute(&plan, &listeners);
    assert_eq!(report.discovery_errors().len(), 2);
    assert!(report.execution_aborts().is_empty());
    assert_eq!(recorder.events().tests().succeeded().len(), 3);
}

#[test]
fn test_root_with_wrong_id_is_a_discovery_error() {
    let launcher = Launcher::with_engines([ScriptedEngine::new("liar", |_, _| {
        Ok(TestDescriptor::engine_root(UniqueId::for_engine("someone-else")?, "liar"))
    })
    .boxed()])
    .unwrap();

    let plan = launcher.discover(&EngineDiscoveryRequest::builder().build());
    assert!(plan.engine_roots().is_empty());
    assert!(plan.discovery_errors()[0]
        .cause
        .message
        .contains("does not match expected [engine:liar]"));
}

#[test]
fn test_engines_ignore_selectors_they_do_not_understand() {
    let engine = ScriptedEngine::new("classes", |request, root_id| {
        let mut root = TestDescriptor::engine_root(root_id.clone(), "classes");
        let classes = request.selectors_matching(|s| matches!(s, DiscoverySelector::Class { .. }));
        for selector in classes {
            if let DiscoverySelector::Class { class_name } = selector {
                root.add_child(test(root_id, class_name))?;
            }
        }
        Ok(root)
    });

    let request = EngineDiscoveryRequest::builder()
        .select(select_class("com.example.FooTests").unwrap())
        .select(select_package("com.example").unwrap())
        .select(select_class("com.example.BarTests").unwrap())
        .build();
    let results = EngineTestKit::execute(engine.boxed(), &request).unwrap();

    assert!(results.report.is_clean());
    assert_eq!(results.plan.test_count(), 2);
    assert_eq!(results.events.tests().succeeded().len(), 2);
}

#[test]
fn test_engine_filters() {
    let launcher = Launcher::with_engines(engines_a_and_b()).unwrap();

    let only_b = EngineDiscoveryRequest::builder()
        .engine_filter(EngineFilter::include(["B"]))
        .build();
    let plan = launcher.discover(&only_b);
    assert_eq!(plan.engine_roots().len(), 1);
    assert_eq!(plan.engine_roots()[0].engine_id, "B");

    let without_b = EngineDiscoveryRequest::builder()
        .engine_filter(EngineFilter::exclude(["B"]))
        .build();
    let plan = launcher.discover(&without_b);
    assert_eq!(plan.engine_roots().len(), 1);
    assert_eq!(plan.engine_roots()[0].engine_id, "A");

    let unknown = EngineDiscoveryRequest::builder()
        .engine_filter(EngineFilter::include(["C"]))
        .build();
    assert!(launcher.discover(&unknown).is_empty());
}

#[test]
fn test_duplicate_engine_registration_fails() {
    let result = Launcher::with_engines([
        Box::new(NoOpEngine::new("same")) as Box<dyn TestEngine>,
        Box::new(NoOpEngine::new("same")),
    ]);
    assert!(matches!(result, Err(Error::DuplicateEngine(id)) if id == "same"));
}

#[test]
fn test_configuration_reaches_engines() {
    let engine = ScriptedEngine::with_tree("configured", |root| {
        engine_root(root, vec![test(root, "t")])
    })
    .executing(|mut request| {
        let greeting = request
            .configuration()
            .get("trellis.greeting")
            .unwrap_or("none")
            .to_string();
        let root = request.root();
        let listener = request.listener();
        listener.execution_started(root.unique_id());
        listener.reporting_entry_published(
            root.unique_id(),
            ReportEntry::from_pair("greeting", greeting),
        );
        common::execute_node(listener, &root.children()[0]);
        listener.execution_finished(
            root.unique_id(),
            trellis::TestExecutionResult::successful(),
        );
        Ok(())
    });

    let request = EngineDiscoveryRequest::builder()
        .configuration_parameter("trellis.greeting", "hello")
        .build();
    let results = EngineTestKit::execute(engine.boxed(), &request).unwrap();

    assert!(results.report.is_clean());
    assert_eq!(results.plan.configuration().get("trellis.greeting"), Some("hello"));
    let entries: Vec<_> = results
        .events
        .reporting_entries()
        .into_iter()
        .filter_map(|e| match e.detail {
            trellis::testkit::EventDetail::Entry(entry) => entry.values().get("greeting").cloned(),
            _ => None,
        })
        .collect();
    assert_eq!(entries, vec!["hello".to_string()]);
}

struct Tagged {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl TestExecutionListener for Tagged {
    fn execution_started(&self, test_identifier: &TestIdentifier) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{} {}", self.name, test_identifier.display_name));
    }
}

struct Panicking;

impl TestExecutionListener for Panicking {
    fn execution_finished(
        &self,
        _test_identifier: &TestIdentifier,
        _result: &trellis::TestExecutionResult,
    ) {
        panic!("listener bug");
    }
}

#[test]
fn test_registered_listeners_run_before_per_run_listeners() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut launcher =
        Launcher::with_engines([Box::new(NoOpEngine::default()) as Box<dyn TestEngine>]).unwrap();
    launcher.register_listener(Arc::new(Tagged {
        name: "registered",
        log: log.clone(),
    }));

    let per_run: Vec<Arc<dyn TestExecutionListener>> = vec![Arc::new(Tagged {
        name: "per-run",
        log: log.clone(),
    })];
    launcher.discover_and_execute(&EngineDiscoveryRequest::builder().build(), &per_run);

    assert_eq!(*log.lock().unwrap(), vec!["registered noop", "per-run noop"]);
}

#[test]
fn test_panicking_listener_is_isolated() {
    let mut launcher = Launcher::with_engines(engines_a_and_b()).unwrap();
    launcher.register_listener(Arc::new(Panicking));

    let (recorder, listeners) = recorder();
    let request = EngineDiscoveryRequest::builder().build();
    let report = launcher.discover_and_execute(&request, &listeners);

    assert!(report.is_clean());
    assert_eq!(recorder.events().finished().len(), 6);
}
