//! Image encoding: file bytes → base64 wrapped in `ImageData`.
//!
//! VLM APIs accept images as base64 data embedded in the JSON request body.
//! The MIME type comes from the file extension via `image::ImageFormat`;
//! unknown extensions are sent as PNG, which every provider accepts and most
//! sniff anyway.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::ImageFormat;
use std::path::Path;
use tracing::debug;

/// Encode raw image bytes read from `path` for the VLM API.
pub fn encode_image(path: &Path, bytes: &[u8]) -> ImageData {
    let mime = mime_for(path);
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} → {} bytes base64 ({})", path.display(), b64.len(), mime);

    ImageData::new(b64, mime).with_detail("high")
}

/// MIME type for an image path, defaulting to `image/png`.
pub fn mime_for(path: &Path) -> &'static str {
    ImageFormat::from_path(path)
        .map(|f| f.to_mime_type())
        .unwrap_or("image/png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_for(Path::new("cat.png")), "image/png");
        assert_eq!(mime_for(Path::new("dir/cat.JPG")), "image/jpeg");
        assert_eq!(mime_for(Path::new("anim.gif")), "image/gif");
        assert_eq!(mime_for(Path::new("noext")), "image/png");
    }

    #[test]
    fn encode_small_image() {
        let bytes = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        let data = encode_image(Path::new("x.png"), &bytes);
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(decoded, bytes);
    }
}
