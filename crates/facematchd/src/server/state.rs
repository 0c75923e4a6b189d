use std::path::PathBuf;
use std::sync::Arc;

use facematch_core::{DistanceMetric, ImagePassing, ResponseFields};

use crate::config::Config;
use crate::engine::EngineHandle;

/// Application state, read-only after startup apart from the engine queue.
pub struct AppState {
    pub engine: EngineHandle,
    pub threshold: f32,
    pub image_passing: ImagePassing,
    pub temp_dir: Option<PathBuf>,
    pub response_fields: ResponseFields,
    pub max_upload_bytes: usize,
    pub model: String,
    pub detector: Option<String>,
    pub metric: DistanceMetric,
}

impl AppState {
    pub fn new(engine: EngineHandle, config: &Config) -> Arc<Self> {
        let verifier = &config.verifier;
        Arc::new(AppState {
            engine,
            threshold: config.threshold,
            image_passing: config.image_passing,
            temp_dir: config.temp_dir.clone(),
            response_fields: config.response_fields,
            max_upload_bytes: config.max_upload_bytes,
            model: verifier.model.clone(),
            detector: verifier.detector_path().map(|_| verifier.detector.to_string()),
            metric: verifier.metric,
        })
    }
}
