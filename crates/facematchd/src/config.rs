use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use facematch_core::{ImagePassing, ResponseFields, VerifierConfig};

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address (default: 127.0.0.1:5000).
    pub addr: String,
    /// Model files, detector backend and distance metric.
    pub verifier: VerifierConfig,
    /// Minimum `1 - distance` for a positive match.
    pub threshold: f32,
    /// Whether decoded uploads reach the verifier as buffers or temp files.
    pub image_passing: ImagePassing,
    /// Directory for temp files; the system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
    /// JSON field naming of a successful comparison.
    pub response_fields: ResponseFields,
    /// Upper bound on a request body, both images included.
    pub max_upload_bytes: usize,
    /// Pending comparisons allowed to queue in front of the engine.
    pub queue_depth: usize,
}

impl Config {
    /// Load configuration from `FACEMATCH_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = VerifierConfig::default();
        let verifier = VerifierConfig {
            model_dir: lookup("FACEMATCH_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            model: lookup("FACEMATCH_MODEL").unwrap_or(defaults.model),
            detector: parse_or(&lookup, "FACEMATCH_DETECTOR", defaults.detector),
            metric: parse_or(&lookup, "FACEMATCH_DISTANCE_METRIC", defaults.metric),
            intra_threads: parse_or(&lookup, "FACEMATCH_INTRA_THREADS", defaults.intra_threads),
        };

        Self {
            addr: lookup("FACEMATCH_ADDR").unwrap_or_else(|| "127.0.0.1:5000".to_string()),
            verifier,
            threshold: parse_or(&lookup, "FACEMATCH_THRESHOLD", 0.6),
            image_passing: parse_or(&lookup, "FACEMATCH_IMAGE_PASSING", ImagePassing::Memory),
            temp_dir: lookup("FACEMATCH_TEMP_DIR").map(PathBuf::from),
            response_fields: parse_or(&lookup, "FACEMATCH_RESPONSE_FIELDS", ResponseFields::Similarity),
            max_upload_bytes: parse_or(&lookup, "FACEMATCH_MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            queue_depth: parse_or(&lookup, "FACEMATCH_QUEUE_DEPTH", 16),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "invalid configuration value, using default");
            default
        }
    }
}
