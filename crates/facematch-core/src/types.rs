use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    /// A box spanning a whole `width`×`height` image, used when detection is skipped.
    pub fn covering(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            confidence: 1.0,
            landmarks: None,
        }
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection-over-union with `other`, 0.0 when both boxes are empty.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);

        let intersection = (right - left).max(0.0) * (bottom - top).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// Face embedding vector (512-dimensional for the ArcFace family).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    /// Cosine similarity in [-1, 1]; 0.0 if either vector has zero norm.
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// Copy of this embedding scaled to unit length. Zero vectors are returned unchanged.
    pub fn l2_normalized(&self) -> Embedding {
        let norm = self.values.iter().map(|v| v * v).sum::<f32>().sqrt();
        let values = if norm > 0.0 {
            self.values.iter().map(|v| v / norm).collect()
        } else {
            self.values.clone()
        };
        Embedding { values, model_version: self.model_version.clone() }
    }

    /// Distance between two embeddings under `metric`. Never negative.
    pub fn distance(&self, other: &Embedding, metric: DistanceMetric) -> f32 {
        match metric {
            DistanceMetric::Cosine => (1.0 - self.cosine_similarity(other)).max(0.0),
            DistanceMetric::Euclidean => self.euclidean_distance(other),
            DistanceMetric::EuclideanL2 => {
                self.l2_normalized().euclidean_distance(&other.l2_normalized())
            }
        }
    }
}

/// How two embeddings are turned into a distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`, in [0, 2].
    #[default]
    Cosine,
    /// Plain euclidean distance on the raw vectors, unbounded.
    Euclidean,
    /// Euclidean distance on unit-length vectors, in [0, 2].
    EuclideanL2,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::EuclideanL2 => "euclidean_l2",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclidean" => Ok(Self::Euclidean),
            "euclidean_l2" => Ok(Self::EuclideanL2),
            _ => Err(ParseEnumError::new("distance metric", s)),
        }
    }
}

/// A configuration word that does not name any known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} `{value}`")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

/// Output of one verifier call: the distance plus the detection metadata behind it.
#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    pub distance: f32,
    pub metric: DistanceMetric,
    pub model: String,
    pub detector: Option<String>,
    /// Face regions used for the first and second image.
    pub facial_areas: [BoundingBox; 2],
}

/// Match decision derived from a distance and a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Comparison {
    /// `1 - distance`. Not clamped: negative when the distance exceeds 1.
    pub similarity: f32,
    pub matched: bool,
}

impl Comparison {
    pub fn from_distance(distance: f32, threshold: f32) -> Self {
        let similarity = 1.0 - distance;
        Self { similarity, matched: similarity >= threshold }
    }
}

/// Field naming of a rendered [`Comparison`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFields {
    /// `{"similarity": f, "match": b}`
    #[default]
    Similarity,
    /// `{"cosine_similarity": f, "result": b}`
    Cosine,
}

impl ResponseFields {
    pub fn render(&self, comparison: &Comparison) -> ComparisonBody {
        let Comparison { similarity, matched } = *comparison;
        match self {
            Self::Similarity => ComparisonBody::Similarity { similarity, matched },
            Self::Cosine => ComparisonBody::Cosine { cosine_similarity: similarity, result: matched },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Similarity => "similarity",
            Self::Cosine => "cosine",
        }
    }
}

impl fmt::Display for ResponseFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseFields {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "similarity" => Ok(Self::Similarity),
            "cosine" | "cosine_similarity" => Ok(Self::Cosine),
            _ => Err(ParseEnumError::new("response field style", s)),
        }
    }
}

/// A comparison as it goes over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ComparisonBody {
    Similarity {
        similarity: f32,
        #[serde(rename = "match")]
        matched: bool,
    },
    Cosine {
        cosine_similarity: f32,
        result: bool,
    },
}
