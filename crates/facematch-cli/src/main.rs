use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use facematch_core::{
    decode_rgb, BoundingBox, Comparison, ComparisonBody, DetectorBackend, DistanceMetric, ImageSource,
    OnnxVerifier, ResponseFields, Verifier, VerifierConfig, DEFAULT_MODEL,
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "facematch", about = "Compare the faces in two images", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide whether two images show the same person
    Compare {
        image1: PathBuf,
        image2: PathBuf,
        #[command(flatten)]
        models: ModelArgs,
        /// Minimum `1 - distance` for a match
        #[arg(long, default_value_t = 0.6)]
        threshold: f32,
        /// Names of the similarity and match fields: similarity or cosine
        #[arg(long, default_value = "similarity")]
        fields: ResponseFields,
    },
    /// List the faces found in an image
    Detect {
        image: PathBuf,
        #[command(flatten)]
        models: ModelArgs,
    },
}

#[derive(Args)]
struct ModelArgs {
    /// Directory containing the ONNX models
    #[arg(long, value_name = "DIR")]
    model_dir: Option<PathBuf>,
    /// ArcFace model file stem
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
    /// Face detector backend: scrfd or skip
    #[arg(long, default_value = "scrfd")]
    detector: DetectorBackend,
    /// Distance metric: cosine, euclidean or euclidean_l2
    #[arg(long, default_value = "cosine")]
    metric: DistanceMetric,
    /// ONNX Runtime threads per session
    #[arg(long, default_value_t = 2)]
    intra_threads: usize,
}

impl ModelArgs {
    fn load(self) -> Result<OnnxVerifier> {
        let defaults = VerifierConfig::default();
        let config = VerifierConfig {
            model_dir: self.model_dir.unwrap_or(defaults.model_dir),
            model: self.model,
            detector: self.detector,
            metric: self.metric,
            intra_threads: self.intra_threads,
        };
        Ok(OnnxVerifier::load(config)?)
    }
}

/// `facematch compare` output: the endpoint's body plus what produced it.
#[derive(Serialize)]
struct CompareReport<'a> {
    #[serde(flatten)]
    comparison: ComparisonBody,
    distance: f32,
    threshold: f32,
    metric: DistanceMetric,
    model: &'a str,
    detector: Option<&'a str>,
    facial_areas: &'a [BoundingBox; 2],
}

fn read_image(path: &Path) -> Result<image::RgbImage> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    decode_rgb(&bytes).with_context(|| format!("decoding {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compare { image1, image2, models, threshold, fields } => {
            let first = ImageSource::Memory(read_image(&image1)?);
            let second = ImageSource::Memory(read_image(&image2)?);

            let mut verifier = models.load()?;
            let verification = verifier.verify(&first, &second)?;
            tracing::debug!(distance = verification.distance, "verification done");
            let comparison = Comparison::from_distance(verification.distance, threshold);

            let report = CompareReport {
                comparison: fields.render(&comparison),
                distance: verification.distance,
                threshold,
                metric: verification.metric,
                model: &verification.model,
                detector: verification.detector.as_deref(),
                facial_areas: &verification.facial_areas,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Detect { image, models } => {
            let rgb = read_image(&image)?;
            let mut verifier = models.load()?;
            let faces = verifier.detect(&rgb)?;
            println!("{}", serde_json::to_string_pretty(&faces)?);
        }
    }

    Ok(())
}
