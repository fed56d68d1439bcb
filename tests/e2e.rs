//! End-to-end tests combining multiple subsystems through their public
//! surface, closer to production usage than the per-pair flows in
//! `integration.rs`.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::net::TcpStream;

use mcpany_core::health::alerts::AlertDispatcher;
use mcpany_core::health::history::HealthHistory;
use mcpany_core::health::registry::SupervisorRegistry;
use mcpany_core::health::types::{FilesystemParams, HealthCheckKind, HealthCheckSpec};
use mcpany_core::health::{ServiceProtocol, UpstreamService};
use mcpany_core::metrics::{self, PrometheusMetrics};
use mcpany_core::server::{start_server, ServerState};
use mcpany_core::skills::SkillManager;
use mcpany_core::store::{ConfigStore, InMemoryConfigStore, LogEntry, ServiceRecord, UserRecord};

async fn http_get(addr: std::net::SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(format!("GET {path} HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n").as_bytes())
        .await
        .unwrap();
    let mut resp = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        match tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf)).await {
            Ok(Ok(0)) | Err(_) => break,
            Ok(Ok(n)) => resp.extend_from_slice(&buf[..n]),
            Ok(Err(_)) => break,
        }
    }
    String::from_utf8_lossy(&resp).to_string()
}

/// A healthy filesystem-backed service and a broken one run through the
/// real HTTP surface: registry reload -> scheduler tick -> /healthz,
/// /readyz, /doctor, /metrics all served over a live TCP accept loop.
#[tokio::test]
async fn supervision_http_surface_reflects_registry_state() {
    let metrics = metrics::initialize();
    let history = Arc::new(HealthHistory::with_default_cap());
    let alerts = Arc::new(AlertDispatcher::disabled());
    let registry = Arc::new(SupervisorRegistry::new(
        Arc::clone(&metrics),
        Arc::clone(&history),
        Arc::clone(&alerts),
    ));

    let good_dir = tempfile::tempdir().unwrap();
    let services = vec![
        UpstreamService {
            name: "fs-good".to_string(),
            id: None,
            disabled: false,
            protocol: ServiceProtocol::Filesystem,
            health_check: Some(
                HealthCheckSpec::new(HealthCheckKind::Filesystem(FilesystemParams {
                    root_paths: vec![good_dir.path().to_path_buf()],
                    is_local: true,
                }))
                .with_interval(Duration::from_millis(20)),
            ),
        },
        UpstreamService {
            name: "fs-broken".to_string(),
            id: None,
            disabled: false,
            protocol: ServiceProtocol::Filesystem,
            health_check: Some(
                HealthCheckSpec::new(HealthCheckKind::Filesystem(FilesystemParams {
                    root_paths: vec![std::path::PathBuf::from("/definitely/not/there")],
                    is_local: true,
                }))
                .with_interval(Duration::from_millis(20)),
            ),
        },
    ];
    registry.reload(&services);

    // Let the periodic schedulers run their first tick.
    tokio::time::sleep(Duration::from_millis(150)).await;

    let state = Arc::new(ServerState {
        registry: Arc::clone(&registry),
        metrics: Arc::clone(&metrics),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let handle = start_server("127.0.0.1", addr.port(), state).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let healthz = http_get(addr, "/healthz").await;
    assert!(healthz.starts_with("HTTP/1.1 200"));
    assert!(healthz.contains("\"down\""));
    assert!(healthz.contains("fs-good"));
    assert!(healthz.contains("fs-broken"));

    let readyz = http_get(addr, "/readyz").await;
    assert!(readyz.starts_with("HTTP/1.1 503"));

    let doctor = http_get(addr, "/doctor").await;
    assert!(doctor.starts_with("HTTP/1.1 200"));
    assert!(doctor.contains("\"status\""));

    let metrics_resp = http_get(addr, "/metrics").await;
    assert!(metrics_resp.starts_with("HTTP/1.1 200"));
    assert!(metrics_resp.contains("mcpany_"));

    handle.abort();
}

/// A config store round trip touching every entity kind, grounded in the
/// ConfigStore trait's documented upsert-by-key contract.
#[tokio::test]
async fn config_store_round_trip_across_entities() {
    let store = InMemoryConfigStore::new();

    store
        .upsert_service(ServiceRecord {
            id: "svc-1".to_string(),
            name: "svc-one".to_string(),
            config: serde_json::json!({"url": "http://localhost:9000"}),
        })
        .await
        .unwrap();
    store
        .upsert_user(UserRecord {
            id: "user-1".to_string(),
            name: "alice".to_string(),
            config: serde_json::json!({"role": "admin"}),
        })
        .await
        .unwrap();
    store
        .upsert_global_settings(serde_json::json!({"theme": "dark"}))
        .await
        .unwrap();

    let fetched = store.get_service("svc-one").await.unwrap();
    assert!(fetched.is_some());
    assert_eq!(fetched.unwrap().id, "svc-1");

    let loaded = store.load().await.unwrap();
    assert_eq!(loaded.services.len(), 1);
    assert_eq!(loaded.users.len(), 1);
    assert_eq!(loaded.global_settings.config["theme"], "dark");

    store.delete_service("svc-one").await.unwrap();
    assert!(store.get_service("svc-one").await.unwrap().is_none());
    assert_eq!(store.list_services().await.unwrap().len(), 0);

    store
        .append_log(LogEntry {
            timestamp: chrono::Utc::now(),
            level: "info".to_string(),
            source: "e2e-test".to_string(),
            message: "round trip complete".to_string(),
            metadata: Default::default(),
        })
        .await
        .unwrap();
    let logs = store.recent_logs(10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].source, "e2e-test");
}

/// Create, read, rename, and delete a skill bundle through the public
/// SkillManager surface, including an asset write.
#[tokio::test]
async fn skill_lifecycle_create_rename_asset_delete() {
    let dir = tempfile::tempdir().unwrap();
    let manager = SkillManager::new(dir.path());

    let mut frontmatter = serde_yaml::Mapping::new();
    frontmatter.insert("name".into(), "pdf-filler".into());
    frontmatter.insert("description".into(), "fills PDF forms".into());
    manager
        .create("pdf-filler", frontmatter.clone(), "# PDF Filler\n")
        .unwrap();

    manager
        .save_asset("pdf-filler", "scripts/fill.py", b"print('fill')")
        .unwrap();

    let bundle = manager.get("pdf-filler").unwrap();
    assert_eq!(bundle.description(), "fills PDF forms");
    assert!(bundle.assets.iter().any(|a| a == "scripts/fill.py"));

    manager
        .update("pdf-filler", "pdf-filler-v2", frontmatter, "# PDF Filler v2\n")
        .unwrap();
    assert!(manager.get("pdf-filler").is_err());
    let renamed = manager.get("pdf-filler-v2").unwrap();
    assert!(renamed.body.contains("v2"));

    manager.delete("pdf-filler-v2").unwrap();
    assert!(manager.list().unwrap().is_empty());
}
