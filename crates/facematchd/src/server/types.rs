use axum::body::Bytes;
use axum_typed_multipart::{FieldData, TryFromMultipart};
use serde::Serialize;
use utoipa::ToSchema;

/// Compare request. Both fields are optional here so a missing one can be
/// reported with the endpoint's own message.
#[derive(TryFromMultipart)]
pub struct CompareRequest {
    #[form_data(limit = "unlimited")]
    pub image1: Option<FieldData<Bytes>>,
    #[form_data(limit = "unlimited")]
    pub image2: Option<FieldData<Bytes>>,
}

impl CompareRequest {
    /// Both uploads, or `None` if either is absent. A part without a filename
    /// is a plain text field, not an upload.
    pub fn into_files(self) -> Option<(FieldData<Bytes>, FieldData<Bytes>)> {
        let is_file = |field: &FieldData<Bytes>| field.metadata.file_name.is_some();
        Some((self.image1.filter(is_file)?, self.image2.filter(is_file)?))
    }
}

/// Compare form (for API docs)
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct CompareForm {
    /// First image, any format the decoder understands
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub image1: String,
    /// Second image
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub image2: String,
}

/// Successful comparison with the default `similarity` field naming (for API docs)
#[derive(Debug, Serialize, ToSchema)]
#[allow(unused)]
pub struct CompareResponse {
    /// `1 - distance`, not clamped: negative when the distance exceeds 1
    pub similarity: f32,
    /// `similarity >= threshold`
    #[serde(rename = "match")]
    pub matched: bool,
}

/// Error body for every non-200 response.
///
/// 400 and 413 are only used for request-shape problems (`invalid_input`). Undecodable
/// images and images without a face are 500 (`decode_error`,
/// `processing_failure`); use `kind` rather than the message to tell them apart.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    /// One of `invalid_input`, `decode_error`, `processing_failure`
    pub kind: String,
}

/// Daemon status
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub version: String,
    pub model: String,
    pub detector: Option<String>,
    pub metric: String,
    pub threshold: f32,
    pub image_passing: String,
}
