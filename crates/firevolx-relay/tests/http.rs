//! HTTP endpoints through the router.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use firevolx_device::SimulatedConnector;
use firevolx_relay::{
    RelayConfig, RelayService,
    http::{HealthResponse, TestConnectionResponse},
    router,
};
use serde::de::DeserializeOwned;
use tower::ServiceExt;

fn app(connector: SimulatedConnector) -> axum::Router {
    router(RelayService::new(Arc::new(connector), RelayConfig::default()))
}

/// Send a request and return (status, parsed JSON body).
async fn send<T: DeserializeOwned>(app: axum::Router, request: Request<Body>) -> (StatusCode, T) {
    let resp = app.oneshot(request).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_no_connections() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, health): (_, HealthResponse) = send(app(SimulatedConnector::new()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        health,
        HealthResponse {
            status: "ok".into(),
            active_connection_count: 0,
        }
    );
}

#[tokio::test]
async fn health_uses_camel_case() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (_, json): (_, serde_json::Value) = send(app(SimulatedConnector::new()), request).await;
    assert_eq!(json, serde_json::json!({"status": "ok", "activeConnectionCount": 0}));
}

#[tokio::test]
async fn test_connection_runs_whoami() {
    let request = post_json(
        "/test-connection",
        r#"{"host":"10.0.0.5","port":23,"username":"pi","password":"raspberry"}"#,
    );
    let (status, response): (_, TestConnectionResponse) =
        send(app(SimulatedConnector::new()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response,
        TestConnectionResponse::Success {
            success: true,
            message: "Connection successful".into(),
            result: "pi".into(),
        }
    );
}

#[tokio::test]
async fn test_connection_failure_is_bad_request() {
    let request = post_json("/test-connection", r#"{"host":"10.0.0.9","username":"pi"}"#);
    let (status, json): (_, serde_json::Value) =
        send(app(SimulatedConnector::failing("no route to host")), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Connection failed: no route to host");
}

#[tokio::test]
async fn test_connection_requires_host() {
    let request = post_json("/test-connection", r#"{"host":"","username":"pi"}"#);
    let (status, json): (_, serde_json::Value) = send(app(SimulatedConnector::new()), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Target host is required");
}
