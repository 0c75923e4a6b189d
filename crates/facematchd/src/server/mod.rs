mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(api::compare_handler, api::status_handler),
    components(schemas(
        types::CompareForm,
        types::CompareResponse,
        types::ErrorBody,
        types::StatusResponse,
    ))
)]
pub struct ApiDoc;

async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the HTTP router
pub fn create_app(state: Arc<AppState>) -> Router {
    let max_upload_bytes = state.max_upload_bytes;
    Router::new()
        .route("/compare", post(api::compare_handler))
        .route("/status", get(api::status_handler))
        .route("/api-docs/openapi.json", get(openapi_handler))
        // enforced while the multipart stream is read, so oversize bodies reach AppError
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
