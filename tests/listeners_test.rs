//! Integration tests for the bundled listeners and configuration loading

mod common;

use std::fs;
use std::sync::Arc;

use common::{container, engine_root, init_tracing, test, ScriptedEngine};
use tempfile::TempDir;
use trellis::config::ConfigurationParametersBuilder;
use trellis::discovery::EngineDiscoveryRequest;
use trellis::launcher::{Launcher, TestExecutionListener};
use trellis::listeners::{LoggingListener, SummaryGeneratingListener};

fn launcher() -> Launcher {
    Launcher::with_engines([ScriptedEngine::with_tree("mixed", |root| {
        engine_root(
            root,
            vec![
                container(root, "suite", |id| {
                    vec![test(id, "ok"), test(id, "fail-compare"), test(id, "skip-todo")]
                }),
                test(root, "standalone"),
            ],
        )
    })
    .boxed()])
    .unwrap()
}

#[test]
fn test_summary_listener_counts_run() {
    init_tracing();
    let summary_listener = Arc::new(SummaryGeneratingListener::new());
    let listeners: Vec<Arc<dyn TestExecutionListener>> = vec![
        Arc::new(LoggingListener::new(tracing::Level::INFO)),
        summary_listener.clone(),
    ];

    let request = EngineDiscoveryRequest::builder().build();
    let report = launcher().discover_and_execute(&request, &listeners);
    assert!(report.is_clean());

    let summary = summary_listener.summary();
    assert_eq!(summary.tests.found, 4);
    assert_eq!(summary.tests.started, 3);
    assert_eq!(summary.tests.skipped, 1);
    assert_eq!(summary.tests.succeeded, 2);
    assert_eq!(summary.tests.failed, 1);
    assert_eq!(summary.containers.found, 2);
    assert_eq!(summary.containers.succeeded, 2);
    assert!(!summary.all_tests_succeeded());
    assert!(summary.duration().is_some());

    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].identifier.display_name, "fail-compare");
    assert_eq!(summary.failures[0].cause.message, "fail-compare failed");

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["tests"]["failed"], 1);
    assert!(summary.to_string().contains("tests found"));
}

#[test]
fn test_configuration_file_feeds_request() {
    let temp_dir = TempDir::new().unwrap();
    let nested = temp_dir.path().join("project").join("module");
    fs::create_dir_all(&nested).unwrap();
    fs::write(
        temp_dir.path().join("trellis.json"),
        serde_json::to_string_pretty(&serde_json::json!({
            "trellis": { "mode": "file", "retries": 2 }
        }))
        .unwrap(),
    )
    .unwrap();

    let configuration = ConfigurationParametersBuilder::new()
        .with_discovered_file(&nested)
        .unwrap()
        .with_env_vars([("TRELLIS_MODE".to_string(), "env".to_string())])
        .build();

    let request = EngineDiscoveryRequest::builder()
        .configuration(configuration)
        .configuration_parameter("trellis.extra", "explicit")
        .build();
    let plan = launcher().discover(&request);

    let configuration = plan.configuration();
    assert_eq!(configuration.get("trellis.mode"), Some("env"));
    assert_eq!(configuration.get_as::<u32>("trellis.retries"), Some(2));
    assert_eq!(configuration.get("trellis.extra"), Some("explicit"));
}
