//! Stub verifier and request builders shared by the daemon's tests.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request};
use facematch_core::{
    BoundingBox, DistanceMetric, ImageSource, Verification, Verifier, VerifyError,
};
use image::{ImageFormat, Rgb, RgbImage};

pub const BOUNDARY: &str = "facematch-test-boundary";

enum Outcome {
    Distance(f32),
    NoFace,
    /// Panic on the first call, then return the distance.
    PanicOnce(f32),
}

/// Verifier returning a canned outcome and recording what it was given.
pub struct StubVerifier {
    outcome: Outcome,
    pub calls: Arc<AtomicUsize>,
    /// Temp-file paths seen, with whether each existed during the call.
    pub seen: Arc<Mutex<Vec<(PathBuf, bool)>>>,
}

impl StubVerifier {
    fn new(outcome: Outcome) -> Self {
        Self { outcome, calls: Arc::default(), seen: Arc::default() }
    }

    pub fn returning(distance: f32) -> Self {
        Self::new(Outcome::Distance(distance))
    }

    pub fn failing() -> Self {
        Self::new(Outcome::NoFace)
    }

    pub fn panicking_once(distance: f32) -> Self {
        Self::new(Outcome::PanicOnce(distance))
    }
}

impl Verifier for StubVerifier {
    fn verify(&mut self, first: &ImageSource, second: &ImageSource) -> Result<Verification, VerifyError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut seen = self.seen.lock().unwrap();
            for path in [first.path(), second.path()].into_iter().flatten() {
                seen.push((path.to_path_buf(), path.exists()));
            }
        }

        let (a, b) = (first.load()?, second.load()?);
        match self.outcome {
            Outcome::PanicOnce(_) if call == 0 => panic!("stub verifier asked to panic"),
            Outcome::Distance(distance) | Outcome::PanicOnce(distance) => Ok(Verification {
                distance,
                metric: DistanceMetric::Cosine,
                model: "stub".to_string(),
                detector: None,
                facial_areas: [
                    BoundingBox::covering(a.width(), a.height()),
                    BoundingBox::covering(b.width(), b.height()),
                ],
            }),
            Outcome::NoFace => Err(VerifyError::NoFaceDetected { image: 1 }),
        }
    }

    fn model(&self) -> &str {
        "stub"
    }

    fn detector(&self) -> Option<&str> {
        None
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::Cosine
    }
}

pub fn sample_image() -> RgbImage {
    RgbImage::from_fn(12, 10, |x, y| Rgb([x as u8 * 20, y as u8 * 25, 90]))
}

pub fn png_bytes() -> Vec<u8> {
    let mut buf = Vec::new();
    sample_image()
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// One part of a multipart body.
pub struct Part<'a> {
    name: &'a str,
    file_name: Option<String>,
    data: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn file(name: &'a str, data: &'a [u8]) -> Self {
        Self { name, file_name: Some(format!("{name}.png")), data }
    }

    pub fn text(name: &'a str, value: &'a str) -> Self {
        Self { name, file_name: None, data: value.as_bytes() }
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        let disposition = match &part.file_name {
            Some(file_name) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream",
                part.name
            ),
            None => format!("Content-Disposition: form-data; name=\"{}\"", part.name),
        };
        body.extend_from_slice(format!("--{BOUNDARY}\r\n{disposition}\r\n\r\n").as_bytes());
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// `POST /compare` with the given parts and a `Content-Length` header.
pub fn multipart_request(parts: &[Part<'_>]) -> Request<Body> {
    let body = multipart_body(parts);
    Request::builder()
        .method("POST")
        .uri("/compare")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

/// `POST /compare` with one file part per `(field, bytes)`.
pub fn compare_request(parts: &[(&str, &[u8])]) -> Request<Body> {
    let parts: Vec<Part<'_>> = parts.iter().map(|&(name, data)| Part::file(name, data)).collect();
    multipart_request(&parts)
}
