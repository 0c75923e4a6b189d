//! The verification seam: two image sources in, one distance out.

use image::RgbImage;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;
use thiserror::Error;

use crate::alignment;
use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::source::{ImageSource, SourceError};
use crate::types::{BoundingBox, DistanceMetric, Embedding, ParseEnumError, Verification};

pub const DEFAULT_MODEL: &str = "w600k_r50";
const SCRFD_MODEL_FILE: &str = "det_10g.onnx";

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("image source: {0}")]
    Source(#[from] SourceError),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("face could not be detected in image{image}")]
    NoFaceDetected { image: usize },
}

/// Anything that can decide how far apart the faces in two images are.
///
/// Implementations take `&mut self` because ONNX sessions need exclusive access.
pub trait Verifier {
    fn verify(&mut self, first: &ImageSource, second: &ImageSource) -> Result<Verification, VerifyError>;

    /// Embedding model identifier.
    fn model(&self) -> &str;

    /// Detector backend identifier, `None` when detection is skipped.
    fn detector(&self) -> Option<&str>;

    fn metric(&self) -> DistanceMetric;
}

/// Face detector stage in front of the recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectorBackend {
    /// SCRFD detection plus five-landmark alignment.
    #[default]
    Scrfd,
    /// Treat the whole image as the face.
    Skip,
}

impl DetectorBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scrfd => "scrfd",
            Self::Skip => "skip",
        }
    }
}

impl fmt::Display for DetectorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectorBackend {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scrfd" => Ok(Self::Scrfd),
            "skip" | "none" => Ok(Self::Skip),
            _ => Err(ParseEnumError::new("detector backend", s)),
        }
    }
}

/// Model files and options for [`OnnxVerifier`].
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// ArcFace model file stem, loaded from `<model_dir>/<model>.onnx`.
    pub model: String,
    pub detector: DetectorBackend,
    pub metric: DistanceMetric,
    /// ONNX Runtime intra-op threads per session.
    pub intra_threads: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            model_dir: crate::default_model_dir(),
            model: DEFAULT_MODEL.to_string(),
            detector: DetectorBackend::default(),
            metric: DistanceMetric::default(),
            intra_threads: 2,
        }
    }
}

impl VerifierConfig {
    pub fn recognizer_path(&self) -> PathBuf {
        self.model_dir.join(format!("{}.onnx", self.model))
    }

    pub fn detector_path(&self) -> Option<PathBuf> {
        match self.detector {
            DetectorBackend::Scrfd => Some(self.model_dir.join(SCRFD_MODEL_FILE)),
            DetectorBackend::Skip => None,
        }
    }
}

/// SCRFD + ArcFace verifier.
pub struct OnnxVerifier {
    detector: Option<FaceDetector>,
    recognizer: FaceRecognizer,
    config: VerifierConfig,
}

impl OnnxVerifier {
    /// Load every model named by `config`. Fails if any file is missing.
    pub fn load(config: VerifierConfig) -> Result<Self, VerifyError> {
        let detector = match config.detector_path() {
            Some(path) => Some(FaceDetector::load(&path, config.intra_threads)?),
            None => None,
        };
        let recognizer = FaceRecognizer::load(&config.recognizer_path(), config.intra_threads)?;

        tracing::info!(
            model = %config.model,
            detector = %config.detector,
            metric = %config.metric,
            "verifier ready"
        );
        Ok(Self { detector, recognizer, config })
    }

    /// Faces found in `image`, most confident first. With detection skipped
    /// this is a single box covering the image.
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, VerifyError> {
        match self.detector.as_mut() {
            Some(detector) => Ok(detector.detect(image)?),
            None => Ok(vec![BoundingBox::covering(image.width(), image.height())]),
        }
    }

    /// Embed the most confident face of `image`. `index` is 1-based and only
    /// used to say which image had no face.
    pub fn represent(&mut self, image: &RgbImage, index: usize) -> Result<(Embedding, BoundingBox), VerifyError> {
        let face = self
            .detect(image)?
            .into_iter()
            .next()
            .ok_or(VerifyError::NoFaceDetected { image: index })?;

        let crop = match (&self.detector, &face.landmarks) {
            (None, _) => alignment::resize_to_input(image),
            (Some(_), Some(landmarks)) => alignment::align_face(image, landmarks),
            (Some(_), None) => alignment::crop_face(image, &face),
        };

        let embedding = self.recognizer.embed(&crop)?;
        Ok((embedding, face))
    }
}

impl Verifier for OnnxVerifier {
    fn verify(&mut self, first: &ImageSource, second: &ImageSource) -> Result<Verification, VerifyError> {
        let start = Instant::now();

        let first = first.load()?;
        let second = second.load()?;
        let (emb1, face1) = self.represent(&first, 1)?;
        let (emb2, face2) = self.represent(&second, 2)?;
        let distance = emb1.distance(&emb2, self.config.metric);

        tracing::debug!(
            distance,
            metric = %self.config.metric,
            confidence1 = face1.confidence,
            confidence2 = face2.confidence,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "verification complete"
        );

        Ok(Verification {
            distance,
            metric: self.config.metric,
            model: self.model().to_string(),
            detector: self.detector().map(str::to_string),
            facial_areas: [face1, face2],
        })
    }

    fn model(&self) -> &str {
        self.recognizer.model_version()
    }

    fn detector(&self) -> Option<&str> {
        self.detector.as_ref().map(|_| self.config.detector.as_str())
    }

    fn metric(&self) -> DistanceMetric {
        self.config.metric
    }
}
