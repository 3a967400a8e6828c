use std::collections::BTreeMap;

use axum::Json;
use serde::Serialize;

pub const SERVICE_NAME: &str = "chat-relay";

// ── Response bodies ───────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ServiceDescriptor {
    pub service: &'static str,
    pub version: &'static str,
    pub endpoints: BTreeMap<&'static str, &'static str>,
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET `/`: static service descriptor
pub async fn index_handler() -> Json<ServiceDescriptor> {
    let endpoints = BTreeMap::from([
        ("/health", "GET - Health check"),
        ("/chat", "POST - Chat with the model (SSE streaming)"),
    ]);
    Json(ServiceDescriptor {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        endpoints,
    })
}

/// GET `/health`
pub async fn health_handler() -> Json<HealthStatus> {
    Json(HealthStatus { status: "ok", service: SERVICE_NAME })
}
