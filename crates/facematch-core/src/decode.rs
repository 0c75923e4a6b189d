//! Upload decoding. Whatever the source format, the result is 8-bit RGB.

use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("image payload is empty")]
    Empty,
    #[error("cannot decode image: {0}")]
    Image(#[from] image::ImageError),
}

/// Decode raw upload bytes into an RGB8 buffer, dropping alpha and palette data.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let decoded = image::load_from_memory(bytes)?;
    tracing::debug!(
        width = decoded.width(),
        height = decoded.height(),
        color = ?decoded.color(),
        "decoded upload"
    );

    Ok(decoded.to_rgb8())
}
