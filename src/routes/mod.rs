use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

pub mod health;
pub mod identity;
pub mod jobs;
pub mod metrics;
pub mod upload;

/// HTTP routes for the job API, with middleware applied.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    let api = Router::new()
        .route("/create-job", post(jobs::create_job))
        .route(
            "/create-job-update-params/{job_id}",
            put(jobs::update_job_params).post(jobs::update_job_params),
        )
        .route("/complete-upload", post(jobs::complete_upload))
        .route("/job-status/{job_id}", get(jobs::get_job_status))
        .route("/cancel-job/{job_id}", post(jobs::cancel_job))
        .route("/get-jobs-by-user", get(jobs::get_jobs_by_user))
        .route("/upload-file", post(upload::upload_file))
        .route("/get-user", get(identity::get_user));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
}
