//! Topology builder: renders the core → services → tools → API-calls tree,
//! plus middleware and webhooks, from registry + recorder data. A plain tree
//! of owned `Vec<Node>` children, never parent-backlinked.

use std::collections::HashMap;

use crate::health::{ServiceProtocol, Status, SupervisorRegistry, UpstreamService};
use crate::traffic::TrafficRecorder;

/// 1-minute error rate above which an otherwise-active service is reported
/// as `ERROR` rather than `ACTIVE`.
const ERROR_RATE_THRESHOLD: f64 = 0.05;

/// A tool exposed by an upstream service. Tool execution itself lives
/// outside this crate; only the listing is rendered here.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub id: String,
    pub name: String,
    pub service_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Active,
    Inactive,
    Error,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Active => "ACTIVE",
            ServiceStatus::Inactive => "INACTIVE",
            ServiceStatus::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceMetrics {
    pub qps: f64,
    pub error_rate: f64,
    pub latency_ms: f64,
}

#[derive(Debug, Clone)]
pub struct ApiCallNode {
    pub id: String,
    pub route: String,
}

#[derive(Debug, Clone)]
pub struct ToolNode {
    pub id: String,
    pub name: String,
    pub api_calls: Vec<ApiCallNode>,
}

#[derive(Debug, Clone)]
pub struct ServiceNode {
    pub id: String,
    pub name: String,
    pub status: ServiceStatus,
    pub health: Status,
    pub metrics: ServiceMetrics,
    pub tools: Vec<ToolNode>,
}

#[derive(Debug, Clone)]
pub struct MiddlewarePipeline {
    pub steps: Vec<String>,
}

impl Default for MiddlewarePipeline {
    fn default() -> Self {
        Self {
            steps: vec!["mw-auth".to_string(), "mw-log".to_string()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebhookNode {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct CoreNode {
    pub id: String,
    pub kind: &'static str,
    pub status: &'static str,
    pub services: Vec<ServiceNode>,
    pub middleware: MiddlewarePipeline,
    pub webhooks: Vec<WebhookNode>,
}

#[derive(Debug, Clone)]
pub struct ClientNode {
    pub label: String,
    pub session_id: String,
}

#[derive(Debug, Clone)]
pub struct Graph {
    pub core: CoreNode,
    pub clients: Vec<ClientNode>,
}

/// Render the full topology. Reads `registry`/`services`/`tools` (external
/// data) before touching `recorder`, so a slow probe scan never stalls the
/// recorder's readers.
pub async fn get_graph(
    registry: &SupervisorRegistry,
    services: &[UpstreamService],
    tools: &[ToolDescriptor],
    recorder: &TrafficRecorder,
) -> Graph {
    // Group tools by service_id in one O(T) pass so the per-service
    // assignment below is O(S), never nested O(S*T).
    let mut tools_by_service: HashMap<&str, Vec<&ToolDescriptor>> = HashMap::new();
    for tool in tools {
        tools_by_service
            .entry(tool.service_id.as_str())
            .or_default()
            .push(tool);
    }

    let mut service_nodes = Vec::with_capacity(services.len());
    for svc in services {
        service_nodes.push(build_service_node(svc, registry, &tools_by_service, recorder).await);
    }

    let core = CoreNode {
        id: "mcp-core".to_string(),
        kind: "CORE",
        status: "ACTIVE",
        services: service_nodes,
        middleware: MiddlewarePipeline::default(),
        webhooks: build_webhooks(registry),
    };

    let clients = build_clients(recorder);

    Graph { core, clients }
}

async fn build_service_node(
    svc: &UpstreamService,
    registry: &SupervisorRegistry,
    tools_by_service: &HashMap<&str, Vec<&ToolDescriptor>>,
    recorder: &TrafficRecorder,
) -> ServiceNode {
    let health = match registry.checker(&svc.name) {
        Some(checker) => checker.current_status().await,
        None => Status::Unknown,
    };

    let (requests, error_rate, latency_ms) = recorder.current_minute_service_metrics(&svc.name);

    let status = if svc.disabled {
        ServiceStatus::Inactive
    } else if error_rate > ERROR_RATE_THRESHOLD {
        ServiceStatus::Error
    } else {
        ServiceStatus::Active
    };

    let metrics = ServiceMetrics {
        qps: requests as f64,
        error_rate,
        latency_ms,
    };

    let tool_nodes = tools_by_service
        .get(svc.name.as_str())
        .into_iter()
        .flatten()
        .map(|tool| ToolNode {
            id: format!("tool-{}", tool.name),
            name: tool.name.clone(),
            api_calls: vec![ApiCallNode {
                id: format!("api-{}", tool.name),
                route: format!("POST /{}", tool.name),
            }],
        })
        .collect();

    ServiceNode {
        id: format!("svc-{}", svc.name),
        name: svc.name.clone(),
        status,
        health,
        metrics,
        tools: tool_nodes,
    }
}

/// One `wh-*` node per webhook currently configured on the registry's alert
/// dispatcher. Empty when alerting is disabled or unconfigured.
fn build_webhooks(registry: &SupervisorRegistry) -> Vec<WebhookNode> {
    registry
        .alerts()
        .configured_webhooks()
        .into_iter()
        .enumerate()
        .map(|(i, webhook)| WebhookNode {
            id: format!("wh-{i}"),
            url: webhook.url,
        })
        .collect()
}

fn build_clients(recorder: &TrafficRecorder) -> Vec<ClientNode> {
    recorder
        .sessions_snapshot()
        .into_iter()
        .map(|session| {
            let label = session
                .metadata
                .get("userAgent")
                .cloned()
                .unwrap_or_else(|| session.id.clone());
            ClientNode {
                label,
                session_id: session.id,
            }
        })
        .collect()
}

/// `true` when a protocol variant has a routable `/<name>` API surface. Kept
/// for completeness; every current protocol is routable.
pub fn is_routable(protocol: ServiceProtocol) -> bool {
    !matches!(protocol, ServiceProtocol::Mcp)
}
