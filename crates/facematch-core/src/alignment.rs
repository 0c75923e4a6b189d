//! Face alignment onto the canonical ArcFace 112×112 crop.
//!
//! Fits a 4-DOF similarity transform (scale, rotation, translation) from the
//! five detected landmarks to the InsightFace reference positions, then warps
//! the RGB image with bilinear sampling.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::types::BoundingBox;

/// ArcFace reference landmarks for a 112×112 output.
const REFERENCE_LANDMARKS_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

pub const ALIGNED_SIZE: u32 = 112;

/// `p' = [a -b; b a] · p + (tx, ty)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityTransform {
    pub a: f32,
    pub b: f32,
    pub tx: f32,
    pub ty: f32,
}

impl SimilarityTransform {
    /// Least-squares fit mapping `src` onto `dst`.
    ///
    /// `None` when fewer than two point pairs are given or the source points coincide.
    pub fn estimate(src: &[(f32, f32)], dst: &[(f32, f32)]) -> Option<Self> {
        let n = src.len().min(dst.len());
        if n < 2 {
            return None;
        }
        let (src, dst) = (&src[..n], &dst[..n]);
        let (scx, scy) = centroid(src);
        let (dcx, dcy) = centroid(dst);

        let mut dot = 0.0f32;
        let mut cross = 0.0f32;
        let mut spread = 0.0f32;
        for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst) {
            let (sx, sy) = (sx - scx, sy - scy);
            let (dx, dy) = (dx - dcx, dy - dcy);
            dot += sx * dx + sy * dy;
            cross += sx * dy - sy * dx;
            spread += sx * sx + sy * sy;
        }
        if spread < f32::EPSILON {
            return None;
        }

        let a = dot / spread;
        let b = cross / spread;
        Some(Self {
            a,
            b,
            tx: dcx - (a * scx - b * scy),
            ty: dcy - (b * scx + a * scy),
        })
    }

    pub fn apply(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (
            self.a * x - self.b * y + self.tx,
            self.b * x + self.a * y + self.ty,
        )
    }

    pub fn inverse(&self) -> Option<Self> {
        let det = self.a * self.a + self.b * self.b;
        if det < 1e-12 {
            return None;
        }
        let a = self.a / det;
        let b = -self.b / det;
        Some(Self {
            a,
            b,
            tx: -(a * self.tx - b * self.ty),
            ty: -(b * self.tx + a * self.ty),
        })
    }
}

fn centroid(points: &[(f32, f32)]) -> (f32, f32) {
    let n = points.len() as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(ax, ay), &(x, y)| (ax + x, ay + y));
    (sx / n, sy / n)
}

/// Warp `image` through `transform` into a `size`×`size` output.
///
/// Pixels that map outside the source are black.
pub fn warp_affine(image: &RgbImage, transform: &SimilarityTransform, size: u32) -> RgbImage {
    let Some(inverse) = transform.inverse() else {
        return RgbImage::new(size, size);
    };
    RgbImage::from_fn(size, size, |x, y| {
        let (sx, sy) = inverse.apply((x as f32, y as f32));
        sample_bilinear(image, sx, sy)
    })
}

fn sample_bilinear(image: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);

    let texel = |px: i64, py: i64| -> [f32; 3] {
        if px >= 0 && px < width && py >= 0 && py < height {
            image.get_pixel(px as u32, py as u32).0.map(f32::from)
        } else {
            [0.0; 3]
        }
    };
    let (tl, tr) = (texel(x0, y0), texel(x0 + 1, y0));
    let (bl, br) = (texel(x0, y0 + 1), texel(x0 + 1, y0 + 1));

    let mut out = [0u8; 3];
    for c in 0..3 {
        let v = tl[c] * (1.0 - fx) * (1.0 - fy)
            + tr[c] * fx * (1.0 - fy)
            + bl[c] * (1.0 - fx) * fy
            + br[c] * fx * fy;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// Align a detected face into a canonical 112×112 RGB crop for ArcFace.
///
/// Falls back to [`crop_face`]-style resizing of the whole image when the
/// landmarks are degenerate.
pub fn align_face(image: &RgbImage, landmarks: &[(f32, f32); 5]) -> RgbImage {
    match SimilarityTransform::estimate(landmarks, &REFERENCE_LANDMARKS_112) {
        Some(transform) => warp_affine(image, &transform, ALIGNED_SIZE),
        None => {
            tracing::warn!(?landmarks, "degenerate landmarks, resizing whole image");
            resize_to_input(image)
        }
    }
}

/// Crop a face box without landmarks and resize it to 112×112.
pub fn crop_face(image: &RgbImage, face: &BoundingBox) -> RgbImage {
    let (width, height) = image.dimensions();
    let left = face.x.max(0.0).floor() as u32;
    let top = face.y.max(0.0).floor() as u32;
    let right = ((face.x + face.width).ceil().max(0.0) as u32).min(width);
    let bottom = ((face.y + face.height).ceil().max(0.0) as u32).min(height);

    if right <= left || bottom <= top {
        return resize_to_input(image);
    }
    let crop = imageops::crop_imm(image, left, top, right - left, bottom - top).to_image();
    resize_to_input(&crop)
}

/// Resize any image straight to the 112×112 recognizer input.
pub fn resize_to_input(image: &RgbImage) -> RgbImage {
    if image.dimensions() == (ALIGNED_SIZE, ALIGNED_SIZE) {
        return image.clone();
    }
    imageops::resize(image, ALIGNED_SIZE, ALIGNED_SIZE, FilterType::Triangle)
}
