//! Test helper utilities: the API served on an ephemeral port, plus a fake
//! detection server.

#![allow(dead_code)]

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use std::sync::{Arc, Mutex};

use batch_job_api::app_state::AppState;
use batch_job_api::config::AppConfig;
use batch_job_api::db::MemoryJobStore;
use batch_job_api::routes;

/// A running API instance.
pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Serve the API with an in-memory store, dispatching to `ai_server_endpoint`.
pub async fn spawn_app(ai_server_endpoint: &str) -> TestApp {
    spawn_app_with(AppConfig::for_development(ai_server_endpoint)).await
}

pub async fn spawn_app_with(config: AppConfig) -> TestApp {
    let state = AppState::with_detection_server(&config, Arc::new(MemoryJobStore::new()))
        .expect("Failed to build state");
    let app = routes::router(state, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("No local address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server error");
    });

    TestApp {
        base_url: format!("http://{addr}"),
        client: reqwest::Client::new(),
    }
}

/// Detection server stand-in that answers every request the same way and
/// remembers the bodies it received.
pub struct FakeDetectionServer {
    pub endpoint: String,
    pub received: Arc<Mutex<Vec<Value>>>,
}

#[derive(Clone)]
struct FakeState {
    status: StatusCode,
    body: Value,
    received: Arc<Mutex<Vec<Value>>>,
}

async fn request_detections(
    State(state): State<FakeState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.received.lock().unwrap().push(body);
    (state.status, Json(state.body.clone()))
}

pub async fn spawn_detection_server(status: StatusCode, body: Value) -> FakeDetectionServer {
    let received = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/request_detections", post(request_detections))
        .with_state(FakeState {
            status,
            body,
            received: received.clone(),
        });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake detection server");
    let addr = listener.local_addr().expect("No local address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Fake server error");
    });

    FakeDetectionServer {
        endpoint: format!("http://{addr}/request_detections"),
        received,
    }
}

/// An endpoint nothing listens on.
pub async fn unreachable_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind probe listener");
    let addr = listener.local_addr().expect("No local address");
    drop(listener);
    format!("http://{addr}/request_detections")
}

/// Create a job and return its ID.
pub async fn create_job(app: &TestApp, body: Value) -> String {
    let response = app
        .client
        .post(app.url("/api/create-job"))
        .json(&body)
        .send()
        .await
        .expect("create-job request failed");
    assert_eq!(response.status(), 200, "create-job failed");

    let body: Value = response.json().await.expect("create-job body");
    body["jobId"].as_str().expect("jobId missing").to_string()
}

/// Fetch the stored job record.
pub async fn job_status(app: &TestApp, job_id: &str) -> Value {
    let response = app
        .client
        .get(app.url(&format!("/api/job-status/{job_id}")))
        .send()
        .await
        .expect("job-status request failed");
    assert_eq!(response.status(), 200, "job-status failed");
    response.json().await.expect("job-status body")
}
