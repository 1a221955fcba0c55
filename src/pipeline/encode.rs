//! Image encoding: raw bytes → base64 wrapped for the multimodal request.
//!
//! VLM APIs accept images as base64 data-URIs embedded in the JSON request
//! body. The bytes are sniffed rather than trusted by extension: phones
//! happily save HEIC files as `.jpg`, and sending those produces a confusing
//! API error instead of a clean skip.

use crate::error::ImageError;
use crate::pipeline::input::ImageBlob;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::ImageFormat;
use tracing::debug;

/// A base64-encoded image ready for a model request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Standard-alphabet base64 of the file bytes.
    pub data: String,
    /// `image/png` or `image/jpeg`, from the sniffed format.
    pub mime_type: String,
    /// Lower-cased extension the file was found with.
    pub extension: String,
}

impl EncodedImage {
    /// `data:<mime>;base64,<data>` for OpenAI-style `image_url` parts.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Attachment for an `edgequake-llm` chat message.
    ///
    /// `detail: "high"` lets GPT-4-class models tile the full image; small
    /// handwriting is unreadable from the single low-detail overview tile.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::new(self.data.clone(), self.mime_type.as_str()).with_detail("high")
    }
}

/// Validate and base64-encode an image blob.
pub fn encode_image(blob: &ImageBlob) -> Result<EncodedImage, ImageError> {
    let unsupported = || ImageError::UnsupportedExtension {
        index: 0,
        extension: blob.extension.clone(),
    };

    let mime_type = match image::guess_format(&blob.bytes).map_err(|_| unsupported())? {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        other => {
            debug!("{}: sniffed {:?}, not PNG/JPEG", blob.location, other);
            return Err(unsupported());
        }
    };

    let data = STANDARD.encode(&blob.bytes);
    debug!("Encoded {} → {} bytes base64", blob.location, data.len());

    Ok(EncodedImage {
        data,
        mime_type: mime_type.to_string(),
        extension: blob.extension.clone(),
    })
}
