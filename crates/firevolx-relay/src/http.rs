//! HTTP endpoints.

use axum::{Json, extract::State, http::StatusCode};
use firevolx_core::ConnectTarget;
use serde::{Deserialize, Serialize};

use crate::service::RelayService;

/// `GET /health` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub active_connection_count: usize,
}

/// `POST /test-connection` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestConnectionResponse {
    Success {
        success: bool,
        message: String,
        result: String,
    },
    Failure {
        success: bool,
        error: String,
    },
}

/// `GET /health`
pub async fn health(State(service): State<RelayService>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        active_connection_count: service.active_connections().await,
    })
}

/// `POST /test-connection`: log in, run `whoami`, disconnect.
pub async fn test_connection(
    State(service): State<RelayService>,
    Json(target): Json<ConnectTarget>,
) -> (StatusCode, Json<TestConnectionResponse>) {
    match service.test_connection(&target).await {
        Ok(result) => (
            StatusCode::OK,
            Json(TestConnectionResponse::Success {
                success: true,
                message: "Connection successful".to_string(),
                result,
            }),
        ),
        Err(e) => {
            tracing::info!(host = %target.host, "Connection test failed: {e}");
            (
                StatusCode::BAD_REQUEST,
                Json(TestConnectionResponse::Failure {
                    success: false,
                    error: e.to_string(),
                }),
            )
        }
    }
}
