//! Cross-module integration tests: probe -> checker -> history -> alert,
//! and recorder -> topology.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::tempdir;

use mcpany_core::health::alerts::AlertDispatcher;
use mcpany_core::health::checker::{Checker, StatusListener};
use mcpany_core::health::history::HealthHistory;
use mcpany_core::health::types::FilesystemParams;
use mcpany_core::health::{CheckResult, HealthCheckKind, HealthCheckSpec, Status};
use mcpany_core::health::probes::ProbeContext;
use mcpany_core::metrics::PrometheusMetrics;
use mcpany_core::skills::SkillManager;
use mcpany_core::topology::{get_graph, ToolDescriptor};
use mcpany_core::traffic::TrafficRecorder;

/// Records every transition the Checker reports, so the test can assert the
/// sequence independently of the history/alert side effects.
struct SpyListener {
    history: Arc<HealthHistory>,
    alerts: Arc<AlertDispatcher>,
    transitions: Arc<Mutex<Vec<(Status, Status)>>>,
}

#[async_trait]
impl StatusListener for SpyListener {
    async fn on_check(&self, service: &str, prev: Status, curr: Status, result: &CheckResult) {
        self.transitions.lock().unwrap().push((prev, curr));
        self.history.append(mcpany_core::health::HealthRecord {
            service_name: service.to_string(),
            timestamp: chrono::Utc::now(),
            status: curr,
            latency_ms: result.latency_ms,
            error: result.error.clone(),
        });
        self.alerts.dispatch(service, curr).await;
    }
}

#[tokio::test]
async fn probe_to_checker_to_history_on_transition() {
    let dir = tempdir().unwrap();
    let params = FilesystemParams {
        root_paths: vec![dir.path().to_path_buf()],
        is_local: true,
    };
    let spec = HealthCheckSpec::new(HealthCheckKind::Filesystem(params));

    let metrics = Arc::new(PrometheusMetrics::new());
    let ctx = Arc::new(ProbeContext::new());
    let history = Arc::new(HealthHistory::new(100));
    let alerts = Arc::new(AlertDispatcher::disabled());
    let transitions = Arc::new(Mutex::new(Vec::new()));

    let listener = Arc::new(SpyListener {
        history: Arc::clone(&history),
        alerts: Arc::clone(&alerts),
        transitions: Arc::clone(&transitions),
    });

    let checker = Checker::new("fs-service", spec, ctx, metrics).with_listener(listener);

    // First check: Unknown -> Up, fires once.
    let result = checker.check().await;
    assert_eq!(result.status, Status::Up);
    assert_eq!(transitions.lock().unwrap().len(), 1);
    assert_eq!(transitions.lock().unwrap()[0], (Status::Unknown, Status::Up));

    // Remove the root so the next probe fails; wait out the cache window.
    std::fs::remove_dir_all(dir.path()).unwrap();
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let result = checker.check().await;
    assert_eq!(result.status, Status::Down);
    let seen = transitions.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1], (Status::Up, Status::Down));

    let records = history.service_history("fs-service");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, Status::Up);
    assert_eq!(records[1].status, Status::Down);
    assert!(records[1].error.is_some());
}

#[tokio::test]
async fn recorder_feeds_topology_tool_grouping_and_client_list() {
    let recorder = TrafficRecorder::new();

    let mut metadata = HashMap::new();
    metadata.insert("route".to_string(), serde_json::json!("/v1/echo"));
    recorder
        .record_activity(
            "session-a",
            metadata,
            Duration::from_millis(50),
            false,
            Some("svc-a".to_string()),
        )
        .await
        .unwrap();
    recorder.close().await;

    let registry = mcpany_core::health::SupervisorRegistry::new(
        Arc::new(PrometheusMetrics::new()),
        Arc::new(HealthHistory::new(100)),
        Arc::new(AlertDispatcher::disabled()),
    );

    let services = vec![mcpany_core::health::UpstreamService {
        name: "svc-a".to_string(),
        id: Some("svc-a".to_string()),
        disabled: false,
        protocol: mcpany_core::health::ServiceProtocol::Mcp,
        health_check: None,
    }];

    let tools = vec![ToolDescriptor {
        id: "tool-1".to_string(),
        name: "echo".to_string(),
        service_id: "svc-a".to_string(),
    }];

    let graph = get_graph(&registry, &services, &tools, &recorder).await;

    assert_eq!(graph.core.services.len(), 1);
    let service_node = &graph.core.services[0];
    assert_eq!(service_node.id, "svc-svc-a");
    assert_eq!(service_node.tools.len(), 1);
    assert_eq!(service_node.tools[0].name, "echo");

    assert!(graph.clients.iter().any(|c| c.session_id == "session-a"));

    let stats = recorder.get_stats(Some("svc-a"));
    assert_eq!(stats.total_requests, 1);
}

#[test]
fn skill_manager_survives_concurrent_create_and_list() {
    let dir = tempdir().unwrap();
    let manager = Arc::new(SkillManager::new(dir.path()));

    let mut handles = Vec::new();
    for i in 0..5 {
        let manager = Arc::clone(&manager);
        handles.push(std::thread::spawn(move || {
            manager
                .create(
                    &format!("skill-{i}"),
                    serde_yaml::Mapping::new(),
                    "body",
                )
                .unwrap();
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(manager.list().unwrap().len(), 5);
}
