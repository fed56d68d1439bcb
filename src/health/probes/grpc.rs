//! gRPC health probe: dials insecurely and issues the standard
//! `grpc.health.v1.Health/Check` RPC, requiring a `SERVING` status.

use std::time::{Duration, Instant};

use tonic::transport::Endpoint;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

use crate::health::ssrf;
use crate::health::types::{GrpcParams, ProbeOutcome};

pub async fn probe(params: &GrpcParams, timeout: Duration) -> ProbeOutcome {
    let start = Instant::now();

    let parsed = match url::Url::parse(&params.endpoint) {
        Ok(u) => u,
        Err(_) => match format!("http://{}", params.endpoint).parse::<url::Url>() {
            Ok(u) => u,
            Err(e) => return ProbeOutcome::failure(elapsed_ms(start), format!("invalid endpoint: {e}")),
        },
    };
    if let Some(host) = parsed.host_str() {
        if let Err(e) = ssrf::check_host(host) {
            return ProbeOutcome::failure(elapsed_ms(start), e.to_string());
        }
    }

    let endpoint = match Endpoint::from_shared(params.endpoint.clone()) {
        Ok(e) => e.timeout(timeout).connect_timeout(timeout),
        Err(e) => return ProbeOutcome::failure(elapsed_ms(start), format!("invalid endpoint: {e}")),
    };

    let channel = match endpoint.connect().await {
        Ok(c) => c,
        Err(e) => return ProbeOutcome::failure(elapsed_ms(start), format!("connect failed: {e}")),
    };

    let mut client = HealthClient::new(channel);
    let request = HealthCheckRequest {
        service: params.service_name.clone(),
    };

    let response = match client.check(request).await {
        Ok(r) => r.into_inner(),
        Err(e) => return ProbeOutcome::failure(elapsed_ms(start), format!("health rpc failed: {e}")),
    };

    if response.status() != ServingStatus::Serving {
        return ProbeOutcome::failure(
            elapsed_ms(start),
            format!("service not serving: {:?}", response.status()),
        );
    }

    ProbeOutcome::success(elapsed_ms(start))
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
