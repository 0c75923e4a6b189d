//! facematch-core — Face comparison engine.
//!
//! Decodes uploads to RGB, hands them to a [`Verifier`] as [`ImageSource`]s and
//! turns the returned distance into a [`Comparison`]. The bundled
//! [`OnnxVerifier`] uses SCRFD for face detection and ArcFace for embeddings,
//! both running via ONNX Runtime on the CPU.

use std::path::PathBuf;

pub mod alignment;
pub mod decode;
pub mod detector;
pub mod recognizer;
pub mod source;
pub mod types;
pub mod verifier;

pub use decode::{decode_rgb, DecodeError};
pub use detector::FaceDetector;
pub use recognizer::FaceRecognizer;
pub use source::{ImagePassing, ImageSource, SourceError};
pub use types::{
    BoundingBox, Comparison, ComparisonBody, DistanceMetric, Embedding, ParseEnumError, ResponseFields,
    Verification,
};
pub use verifier::{DetectorBackend, OnnxVerifier, Verifier, VerifierConfig, VerifyError, DEFAULT_MODEL};

/// `$XDG_DATA_HOME/facematch/models`, falling back to `~/.local/share`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facematch")
        .join("models")
}
