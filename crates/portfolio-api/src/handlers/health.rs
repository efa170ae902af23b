use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::config::Settings;

#[derive(Serialize)]
pub struct RootResponse {
    message: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

/// GET {prefix}/ - service identity
pub async fn root(State(settings): State<Arc<Settings>>) -> Json<RootResponse> {
    Json(RootResponse {
        message: settings.server.service_name.clone(),
    })
}

pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
