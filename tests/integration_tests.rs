// Integration tests: HTTP and WebSocket endpoints

mod common;

use axum_test::{TestServer, TestWebSocket};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use common::{TEST_CONFIG, TEST_ORIGIN, default_dispatcher, dispatcher_with};
use pcmedic::channel::{CAPABILITIES, CoreEvent};
use pcmedic::config::AppConfig;
use pcmedic::executor::SimulatedExecutor;
use pcmedic::models::ThreatRecord;
use pcmedic::routes;
use serde_json::json;
use std::sync::Arc;

fn test_app() -> axum::Router {
    let config = AppConfig::load_from_str(TEST_CONFIG).unwrap();
    routes::app(default_dispatcher(), config.channel)
}

/// Build TestServer with http_transport (required for WebSocket tests).
fn test_server_with_http(app: axum::Router) -> TestServer {
    TestServer::builder().http_transport().build(app)
}

fn origin(value: &'static str) -> (HeaderName, HeaderValue) {
    (HeaderName::from_static("origin"), HeaderValue::from_static(value))
}

async fn open_channel(server: &TestServer) -> TestWebSocket {
    let (name, value) = origin(TEST_ORIGIN);
    server
        .get_websocket("/ws/channel")
        .add_header(name, value)
        .await
        .into_websocket()
        .await
}

// Receive until we get a JSON event (server may send Ping first).
async fn receive_event(ws: &mut TestWebSocket) -> CoreEvent {
    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(3);
    loop {
        let text = ws.receive_text().await;
        if let Ok(ev) = serde_json::from_str::<CoreEvent>(&text) {
            return ev;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for an event"
        );
    }
}

#[tokio::test]
async fn test_root_endpoint() {
    let server = TestServer::new(test_app());
    let response = server.get("/").await;
    response.assert_status_ok();
    response.assert_text("pcmedic: repair assistant is running");
}

#[tokio::test]
async fn test_version_endpoint() {
    let server = TestServer::new(test_app());
    let response = server.get("/version").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json.get("name").and_then(|v| v.as_str()), Some("pcmedic"));
    assert!(json.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_capabilities_endpoint_lists_allow_list() {
    let server = TestServer::new(test_app());
    let response = server.get("/api/capabilities").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    let listed: Vec<&str> = json["capabilities"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(listed, CAPABILITIES);
}

#[tokio::test]
async fn test_ws_foreign_origin_is_refused() {
    let server = test_server_with_http(test_app());
    let (name, value) = origin("https://evil.example");
    let response = server
        .get_websocket("/ws/channel")
        .add_header(name, value)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_ws_missing_origin_is_refused() {
    let server = test_server_with_http(test_app());
    let response = server.get_websocket("/ws/channel").await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cors_only_echoes_allowed_origin() {
    let server = TestServer::new(test_app());
    let (name, value) = origin(TEST_ORIGIN);
    let response = server.get("/version").add_header(name, value).await;
    assert_eq!(
        response.maybe_header("access-control-allow-origin"),
        Some(HeaderValue::from_static(TEST_ORIGIN))
    );

    let (name, value) = origin("https://evil.example");
    let response = server.get("/version").add_header(name, value).await;
    assert!(response.maybe_header("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_ws_request_vitals() {
    let server = test_server_with_http(test_app());
    let mut ws = open_channel(&server).await;
    ws.send_text(json!({"command": "request-vitals"}).to_string())
        .await;
    match receive_event(&mut ws).await {
        CoreEvent::VitalsUpdate(snap) => {
            assert!(snap.cpu_percent <= 100);
            assert_eq!(snap.ram.total_gb, 16.0);
        }
        other => panic!("expected vitals-update, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ws_unknown_command_is_rejected() {
    let server = test_server_with_http(test_app());
    let mut ws = open_channel(&server).await;
    ws.send_text(json!({"command": "exec", "payload": "rm -rf /"}).to_string())
        .await;
    match receive_event(&mut ws).await {
        CoreEvent::CommandRejected { command, reason } => {
            assert_eq!(command, "exec");
            assert!(reason.contains("not exposed"));
        }
        other => panic!("expected command-rejected, got {:?}", other),
    }

    // The session survives a rejected frame.
    ws.send_text(json!({"command": "get-api-key"}).to_string())
        .await;
    assert_eq!(
        receive_event(&mut ws).await,
        CoreEvent::ApiKey {
            key: "test-key".into()
        }
    );
}

#[tokio::test]
async fn test_ws_malformed_frame_is_rejected() {
    let server = test_server_with_http(test_app());
    let mut ws = open_channel(&server).await;
    ws.send_text("{not json").await;
    match receive_event(&mut ws).await {
        CoreEvent::CommandRejected { command, .. } => assert_eq!(command, "unknown"),
        other => panic!("expected command-rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ws_stage_one_flow() {
    let server = test_server_with_http(test_app());
    let mut ws = open_channel(&server).await;
    ws.send_text(json!({"command": "start-stage-1"}).to_string())
        .await;
    let mut progress = Vec::new();
    for _ in 0..3 {
        match receive_event(&mut ws).await {
            CoreEvent::Stage1Progress(text) => progress.push(text),
            other => panic!("expected stage-1-progress, got {:?}", other),
        }
    }
    assert_eq!(progress.len(), 3);
    assert_eq!(receive_event(&mut ws).await, CoreEvent::Stage1Complete);
}

#[tokio::test]
async fn test_ws_full_repair_run() {
    let exec = SimulatedExecutor::new().with_threat(ThreatRecord {
        name: "PUA:Win32/Presenoker".into(),
        location: "C:\\Users\\Public\\toolbar.exe".into(),
    });
    let config = AppConfig::load_from_str(TEST_CONFIG).unwrap();
    let app = routes::app(dispatcher_with(Arc::new(exec), true), config.channel);
    let server = test_server_with_http(app);
    let mut ws = open_channel(&server).await;

    ws.send_text(json!({"command": "start-stage-1"}).to_string())
        .await;
    for _ in 0..3 {
        receive_event(&mut ws).await;
    }
    assert_eq!(receive_event(&mut ws).await, CoreEvent::Stage1Complete);

    ws.send_text(json!({"command": "start-stage-2-scan"}).to_string())
        .await;
    match receive_event(&mut ws).await {
        CoreEvent::ThreatDetected { threat_name, .. } => {
            assert_eq!(threat_name, "PUA:Win32/Presenoker")
        }
        other => panic!("expected threat-detected, got {:?}", other),
    }

    // Updates are blocked until the threat is resolved.
    ws.send_text(json!({"command": "start-stage-3-scan"}).to_string())
        .await;
    assert!(matches!(
        receive_event(&mut ws).await,
        CoreEvent::CommandRejected { .. }
    ));

    ws.send_text(json!({"command": "resolve-threat"}).to_string())
        .await;
    assert_eq!(receive_event(&mut ws).await, CoreEvent::ThreatResolved);

    ws.send_text(json!({"command": "start-stage-3-scan"}).to_string())
        .await;
    let found = match receive_event(&mut ws).await {
        CoreEvent::UpdatesFound(list) => list,
        other => panic!("expected updates-found, got {:?}", other),
    };
    assert_eq!(found.len(), 3);

    ws.send_text(
        json!({"command": "resolve-updates", "payload": ["KB5031455"]}).to_string(),
    )
    .await;
    assert_eq!(receive_event(&mut ws).await, CoreEvent::UpdatesResolved);
}

#[tokio::test]
async fn test_ws_event_json_shape() {
    let server = test_server_with_http(test_app());
    let mut ws = open_channel(&server).await;
    ws.send_text(json!({"command": "get-api-key"}).to_string())
        .await;
    let text = ws.receive_text().await;
    let v: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(v["event"], "api-key");
    assert_eq!(v["payload"]["key"], "test-key");
}
