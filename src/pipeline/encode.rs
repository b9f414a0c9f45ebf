//! Payload encoding for the two backends.
//!
//! The native backend uploads the PDF itself as a base64 `document` block.
//! The vision backend sends one base64 PNG per rasterised page; PNG keeps
//! small print crisp where JPEG artefacts would blur clause numbers.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Base64-encode raw PDF bytes for a native document block.
pub fn encode_document(bytes: &[u8]) -> String {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded PDF {} bytes -> {} bytes base64", bytes.len(), b64.len());
    b64
}

/// Encode a rasterised page as a base64 PNG with `detail: "high"`.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page image -> {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
