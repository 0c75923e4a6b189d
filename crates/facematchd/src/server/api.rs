use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::Json;
use axum_typed_multipart::{TypedMultipart, TypedMultipartError};
use facematch_core::{decode_rgb, Comparison, ComparisonBody, ImagePassing, ImageSource};
use tokio::task::spawn_blocking;

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;

/// Compare the faces in two uploaded images
#[utoipa::path(
    post,
    path = "/compare",
    request_body(content = CompareForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = CompareResponse, description = "Field names follow FACEMATCH_RESPONSE_FIELDS"),
        (status = 400, body = ErrorBody, description = "image1 or image2 missing or not a file part, or the body is not valid multipart"),
        (status = 413, body = ErrorBody, description = "Body larger than FACEMATCH_MAX_UPLOAD_BYTES"),
        (status = 500, body = ErrorBody, description = "Decode, temp-file or verification failure, including no face detected"),
    )
)]
pub async fn compare_handler(
    State(state): State<Arc<AppState>>,
    form: std::result::Result<TypedMultipart<CompareRequest>, TypedMultipartError>,
) -> Result<Json<ComparisonBody>> {
    let TypedMultipart(form) = form?;
    let (image1, image2) = form.into_files().ok_or(AppError::MissingImages)?;

    tracing::info!(
        image1 = ?image1.metadata.file_name,
        image2 = ?image2.metadata.file_name,
        bytes1 = image1.contents.len(),
        bytes2 = image2.contents.len(),
        "comparing uploaded images"
    );
    let start = Instant::now();

    let passing = state.image_passing;
    let temp_dir = state.temp_dir.clone();
    let (first, second) = spawn_blocking(move || -> Result<_> {
        let first = prepare("image1", &image1.contents, passing, temp_dir.as_deref())?;
        let second = prepare("image2", &image2.contents, passing, temp_dir.as_deref())?;
        Ok((first, second))
    })
    .await??;

    let verification = state.engine.verify(first, second).await?;
    let comparison = Comparison::from_distance(verification.distance, state.threshold);

    tracing::info!(
        distance = verification.distance,
        similarity = comparison.similarity,
        matched = comparison.matched,
        threshold = state.threshold,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "comparison done"
    );
    tracing::debug!(facial_areas = ?verification.facial_areas, "detection metadata");

    Ok(Json(state.response_fields.render(&comparison)))
}

fn prepare(
    field: &'static str,
    bytes: &[u8],
    passing: ImagePassing,
    temp_dir: Option<&Path>,
) -> Result<ImageSource> {
    let image = decode_rgb(bytes).map_err(|source| AppError::Decode { field, source })?;
    Ok(passing.prepare(image, temp_dir)?)
}

/// Report model and decision settings
#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, body = StatusResponse),
    )
)]
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.model.clone(),
        detector: state.detector.clone(),
        metric: state.metric.to_string(),
        threshold: state.threshold,
        image_passing: state.image_passing.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use facematch_core::ResponseFields;
    use crate::engine::spawn_engine;
    use crate::server::create_app;
    use crate::testing::{compare_request, multipart_request, png_bytes, Part, StubVerifier};

    struct Harness {
        app: Router,
        calls: Arc<std::sync::atomic::AtomicUsize>,
        seen: Arc<std::sync::Mutex<Vec<(std::path::PathBuf, bool)>>>,
    }

    fn harness(stub: StubVerifier, tune: impl FnOnce(&mut Config)) -> Harness {
        let mut config = Config::from_env();
        config.threshold = 0.6;
        config.image_passing = ImagePassing::Memory;
        config.temp_dir = None;
        config.response_fields = ResponseFields::Similarity;
        tune(&mut config);

        let calls = stub.calls.clone();
        let seen = stub.seen.clone();
        let engine = spawn_engine(stub, 4).unwrap();
        let app = create_app(AppState::new(engine, &config));
        Harness { app, calls, seen }
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_match_above_threshold() {
        let h = harness(StubVerifier::returning(0.25), |c| c.threshold = 0.7);
        let png: &[u8] = &png_bytes();

        let (status, body) =
            send(h.app, compare_request(&[("image1", png), ("image2", png)])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"similarity": 0.75, "match": true}));
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_match_below_threshold() {
        let h = harness(StubVerifier::returning(0.55), |c| c.threshold = 0.6);
        let png: &[u8] = &png_bytes();

        let (status, body) =
            send(h.app, compare_request(&[("image1", png), ("image2", png)])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"similarity": 0.45, "match": false}));
    }

    #[tokio::test]
    async fn test_cosine_field_naming() {
        let h = harness(StubVerifier::returning(0.25), |c| {
            c.threshold = 0.7;
            c.response_fields = ResponseFields::Cosine;
        });
        let png: &[u8] = &png_bytes();

        let (status, body) =
            send(h.app, compare_request(&[("image1", png), ("image2", png)])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"cosine_similarity": 0.75, "result": true}));
    }

    #[tokio::test]
    async fn test_missing_fields_rejected_without_verifying() {
        let png: &[u8] = &png_bytes();
        let cases: [&[(&str, &[u8])]; 3] = [
            &[("image1", png)],
            &[("image2", png)],
            &[("note", b"hello".as_slice())],
        ];

        for parts in cases {
            let h = harness(StubVerifier::returning(0.1), |_| {});
            let (status, body) = send(h.app, compare_request(parts)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], json!("Both image1 and image2 are required"));
            assert_eq!(body["kind"], json!("invalid_input"));
            assert_eq!(h.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_non_multipart_body_counts_as_missing() {
        let h = harness(StubVerifier::returning(0.1), |_| {});
        let request = Request::builder()
            .method("POST")
            .uri("/compare")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"image1": "a.png"}"#))
            .unwrap();

        let (status, body) = send(h.app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("Both image1 and image2 are required"));
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_text_field_is_not_an_upload() {
        let h = harness(StubVerifier::returning(0.1), |_| {});
        let png: &[u8] = &png_bytes();
        let request = multipart_request(&[
            Part::text("image1", "hello"),
            Part::file("image2", png),
        ]);

        let (status, body) = send(h.app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("Both image1 and image2 are required"));
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_body_is_json_413() {
        let h = harness(StubVerifier::returning(0.1), |c| c.max_upload_bytes = 1024);
        let big = vec![0u8; 8 * 1024];
        let request = compare_request(&[("image1", big.as_slice()), ("image2", big.as_slice())]);
        assert!(request.headers().contains_key(header::CONTENT_LENGTH));

        let response = h.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["kind"], json!("invalid_input"));
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_corrupt_image_is_server_error() {
        let h = harness(StubVerifier::returning(0.1), |_| {});
        let png: &[u8] = &png_bytes();

        let (status, body) = send(
            h.app,
            compare_request(&[("image1", png), ("image2", b"\x89PNG not really".as_slice())]),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["kind"], json!("decode_error"));
        let message = body["error"].as_str().unwrap();
        assert!(message.starts_with("image2: "), "message = {message}");
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_verifier_failure_is_server_error() {
        let h = harness(StubVerifier::failing(), |_| {});
        let png: &[u8] = &png_bytes();

        let (status, body) =
            send(h.app, compare_request(&[("image1", png), ("image2", png)])).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["kind"], json!("processing_failure"));
        assert_eq!(body["error"], json!("face could not be detected in image1"));
    }

    #[tokio::test]
    async fn test_temp_files_removed_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let temp_dir = dir.path().to_path_buf();
        let h = harness(StubVerifier::returning(0.2), move |c| {
            c.image_passing = ImagePassing::TempFile;
            c.temp_dir = Some(temp_dir);
        });
        let png: &[u8] = &png_bytes();

        let (status, _) =
            send(h.app, compare_request(&[("image1", png), ("image2", png)])).await;
        assert_eq!(status, StatusCode::OK);

        let seen = h.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|(path, existed)| *existed && path.starts_with(dir.path())));
        assert!(seen.iter().all(|(path, _)| !path.exists()));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_temp_files_removed_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let temp_dir = dir.path().to_path_buf();
        let h = harness(StubVerifier::failing(), move |c| {
            c.image_passing = ImagePassing::TempFile;
            c.temp_dir = Some(temp_dir);
        });
        let png: &[u8] = &png_bytes();

        let (status, _) =
            send(h.app, compare_request(&[("image1", png), ("image2", png)])).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(h.seen.lock().unwrap().len(), 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_temp_file_cleaned_when_second_decode_fails() {
        let dir = tempfile::tempdir().unwrap();
        let temp_dir = dir.path().to_path_buf();
        let h = harness(StubVerifier::returning(0.2), move |c| {
            c.image_passing = ImagePassing::TempFile;
            c.temp_dir = Some(temp_dir);
        });
        let png: &[u8] = &png_bytes();

        let (status, _) =
            send(h.app, compare_request(&[("image1", png), ("image2", b"junk".as_slice())])).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_status_reports_settings() {
        let h = harness(StubVerifier::returning(0.1), |c| c.threshold = 0.7);
        let request = Request::builder().uri("/status").body(Body::empty()).unwrap();

        let (status, body) = send(h.app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["threshold"].as_f64().map(|t| (t - 0.7).abs() < 1e-6), Some(true));
        assert_eq!(body["image_passing"], json!("memory"));
        assert_eq!(body["version"], json!(env!("CARGO_PKG_VERSION")));
    }

    #[tokio::test]
    async fn test_openapi_document_lists_compare() {
        let h = harness(StubVerifier::returning(0.1), |_| {});
        let request = Request::builder()
            .uri("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(h.app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/compare"]["post"].is_object());
    }
}
