//! ArcFace face recognizer via ONNX Runtime.
//!
//! Turns aligned 112×112 RGB face crops into L2-normalised embeddings.

use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::borrow::Cow;
use std::path::Path;
use thiserror::Error;

use crate::alignment::{self, ALIGNED_SIZE};
use crate::types::Embedding;

const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5; // symmetric, unlike SCRFD's 128.0

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("model file not found: {0} — place an ArcFace export (e.g. w600k_r50.onnx) in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ArcFace-based face recognizer.
pub struct FaceRecognizer {
    session: Session,
    model_version: String,
}

impl FaceRecognizer {
    /// Load an ArcFace ONNX model. The file stem becomes the embedding's model version.
    pub fn load(model_path: &Path, intra_threads: usize) -> Result<Self, RecognizerError> {
        if !model_path.exists() {
            return Err(RecognizerError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)?;

        let model_version = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::info!(
            path = %model_path.display(),
            model = %model_version,
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded ArcFace model"
        );

        Ok(Self { session, model_version })
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// Embed a face crop. Crops that are not 112×112 are resized first.
    pub fn embed(&mut self, face: &RgbImage) -> Result<Embedding, RecognizerError> {
        let input = preprocess(face);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.is_empty() {
            return Err(RecognizerError::InferenceFailed("model returned an empty embedding".into()));
        }

        let embedding = Embedding {
            values: raw.to_vec(),
            model_version: Some(self.model_version.clone()),
        };
        Ok(embedding.l2_normalized())
    }
}

/// NCHW RGB tensor normalised to ArcFace's input distribution.
fn preprocess(face: &RgbImage) -> Array4<f32> {
    let face = if face.dimensions() == (ALIGNED_SIZE, ALIGNED_SIZE) {
        Cow::Borrowed(face)
    } else {
        Cow::Owned(alignment::resize_to_input(face))
    };
    let size = ALIGNED_SIZE as usize;

    Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
        (face.get_pixel(x as u32, y as u32)[c] as f32 - ARCFACE_MEAN) / ARCFACE_STD
    })
}
