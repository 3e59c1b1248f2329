//! Collage rendering: grid document model, chrome suppression, paint list
//! and rasterizer.

pub mod chrome;
pub mod layout;
pub mod paint;
pub mod raster;

use base64::Engine as _;
use sha2::{Digest, Sha256};

pub use chrome::{remove_empty_placeholders, remove_remove_buttons, ChromeGuard};
pub use layout::{GridDocument, Rect};
pub use raster::{finish_collage, rasterize, scale_collage_images, BackendImages, ImageSource, DEFAULT_SCALE};

#[derive(Debug, Clone)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    pub png_data: Vec<u8>,
}

/// Binary payload with its media type, as handed to upload or download code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Blob {
    pub fn png(bytes: Vec<u8>) -> Self {
        Self { mime: "image/png".to_string(), bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hex-encoded SHA-256 of the payload.
    pub fn sha256_hex(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}
