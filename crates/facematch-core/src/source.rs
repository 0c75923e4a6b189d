//! Image sources handed to a verifier.
//!
//! Some backends want pixels, others want a path on disk. [`ImageSource`]
//! covers both; the file variant owns its temp file and removes it on drop.

use image::{ImageFormat, RgbImage};
use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::types::ParseEnumError;

const TEMP_PREFIX: &str = "facematch-";
const TEMP_SUFFIX: &str = ".png";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("temp file I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("temp image encode/decode: {0}")]
    Image(#[from] image::ImageError),
}

/// A decoded image as the verifier sees it.
pub enum ImageSource {
    Memory(RgbImage),
    /// Lossless PNG in a uniquely named temp file, deleted when dropped.
    File(NamedTempFile),
}

impl ImageSource {
    /// Write `image` to a fresh temp file, inside `dir` if given.
    pub fn persist(image: &RgbImage, dir: Option<&Path>) -> Result<Self, SourceError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX).suffix(TEMP_SUFFIX);
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        image.write_to(file.as_file_mut(), ImageFormat::Png)?;
        tracing::debug!(path = %file.path().display(), "persisted image to temp file");

        Ok(Self::File(file))
    }

    /// Filesystem path, for the file variant.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Memory(_) => None,
            Self::File(file) => Some(file.path()),
        }
    }

    /// Pixels of this source. Borrowed for memory sources, re-read from disk for files.
    pub fn load(&self) -> Result<Cow<'_, RgbImage>, SourceError> {
        match self {
            Self::Memory(image) => Ok(Cow::Borrowed(image)),
            Self::File(file) => Ok(Cow::Owned(image::open(file.path())?.to_rgb8())),
        }
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory(image) => f.debug_tuple("Memory").field(&image.dimensions()).finish(),
            Self::File(file) => f.debug_tuple("File").field(&file.path()).finish(),
        }
    }
}

/// How decoded uploads are handed to the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImagePassing {
    #[default]
    Memory,
    TempFile,
}

impl ImagePassing {
    pub fn prepare(self, image: RgbImage, temp_dir: Option<&Path>) -> Result<ImageSource, SourceError> {
        match self {
            Self::Memory => Ok(ImageSource::Memory(image)),
            Self::TempFile => ImageSource::persist(&image, temp_dir),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::TempFile => "tempfile",
        }
    }
}

impl fmt::Display for ImagePassing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImagePassing {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "tempfile" | "temp_file" => Ok(Self::TempFile),
            _ => Err(ParseEnumError::new("image passing mode", s)),
        }
    }
}
