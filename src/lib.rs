//! collagekit
//!
//! Client engine for a photo-collage editor. It keeps a local grid of image
//! slots in sync with a collage backend, thumbnails images for display,
//! extracts the on-screen grid layout for submission and rasterizes the
//! finished collage to a PNG with editing chrome hidden.
//!
//! # Features
//!
//! - **Grid sync**: pulls a component's `[id, fileName]` array and merges it
//!   into a caller-owned slot array
//! - **Layout extraction**: container-relative cell positions in column-major
//!   reading order
//! - **Collage export**: scoped chrome suppression plus PNG rasterization
//!
//! # Example
//!
//! ```no_run
//! use collagekit::{ClientConfig, Slot};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig {
//!     api_url: "http://localhost:8000".to_string(),
//!     timeout_ms: 10_000,
//!     ..Default::default()
//! };
//!
//! let client = collagekit::new_client(config)?;
//! let mut slots = vec![Slot::empty(); 9];
//! let report = client.sync_grid("heart", &mut slots)?;
//! println!("{} slots assigned", report.assigned);
//! client.close();
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

pub mod error;
pub use error::{Error, Result};

pub mod client;
pub mod gallery;
pub mod grid;
pub mod http;
pub mod positions;
pub mod scaler;
pub mod selection;
pub mod state;
pub mod templates;

// Grid document model, chrome suppression and rasterization
pub mod rendering;

// Async-friendly client API (worker-thread backed)
pub mod async_api;

pub use async_api::AsyncCollageClient;
pub use client::CollageClient;
pub use grid::{ArrayEntry, Slot, SyncOptions, SyncReport};
pub use http::HttpBackend;
pub use positions::Position;
pub use rendering::Blob;
pub use state::AppState;
pub use templates::CollageTemplate;

/// Marker the backend stores in a slot that has no image assigned.
pub const EMPTY_SLOT_SENTINEL: &str = "[]";

/// Static path under the API base where uploaded images are served.
pub const UPLOADED_IMAGES_PATH: &str = "uploaded_images";

/// Configuration for the collage client
///
/// The defaults target a backend on `localhost:8000` and produce 50×50
/// thumbnails at JPEG quality 80.
///
/// # Examples
///
/// ```
/// let cfg = collagekit::ClientConfig::default();
/// assert_eq!(cfg.thumbnail.width, 50);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the collage backend
    pub api_url: String,
    /// User agent string to send with requests
    pub user_agent: String,
    /// Request timeout in milliseconds (0 disables the timeout)
    pub timeout_ms: u64,
    /// Custom HTTP headers
    pub headers: HashMap<String, String>,
    /// Fixed thumbnail dimensions produced by the scaler
    pub thumbnail: ThumbnailSize,
    /// JPEG quality for thumbnails, 1..=100
    pub jpeg_quality: u8,
    /// Whether position ids start at 0 or 1
    pub position_id_base: PositionIdBase,
    /// Maximum number of thumbnails produced concurrently during a sync
    pub scale_parallelism: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            user_agent: format!("collagekit/{}", env!("CARGO_PKG_VERSION")),
            timeout_ms: 30000,
            headers: HashMap::new(),
            thumbnail: ThumbnailSize::default(),
            jpeg_quality: 80,
            position_id_base: PositionIdBase::default(),
            scale_parallelism: num_cpus::get(),
        }
    }
}

impl ClientConfig {
    /// Check the configuration before any client is built from it.
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.api_url)
            .map_err(|e| Error::ConfigError(format!("api_url '{}': {}", self.api_url, e)))?;
        if parsed.cannot_be_a_base() {
            return Err(Error::ConfigError(format!("api_url '{}' cannot be a base URL", self.api_url)));
        }
        if self.thumbnail.width == 0 || self.thumbnail.height == 0 {
            return Err(Error::ConfigError("thumbnail dimensions must be non-zero".into()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::ConfigError(format!("jpeg_quality {} outside 1..=100", self.jpeg_quality)));
        }
        Ok(())
    }
}

/// Thumbnail dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSize {
    pub width: u32,
    pub height: u32,
}

impl ThumbnailSize {
    /// Larger preview size used by the template picker.
    pub const LARGE: ThumbnailSize = ThumbnailSize { width: 78, height: 78 };

    pub fn square(side: u32) -> Self {
        Self { width: side, height: side }
    }
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self::square(50)
    }
}

/// First id handed out by the position extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionIdBase {
    #[default]
    Zero,
    One,
}

impl PositionIdBase {
    pub fn offset(self) -> u32 {
        match self {
            PositionIdBase::Zero => 0,
            PositionIdBase::One => 1,
        }
    }
}

/// The collage backend as seen by the client
///
/// One method per endpoint. `HttpBackend` talks to the real service; tests and
/// offline tools can provide their own implementation.
pub trait Backend: Send + Sync {
    /// Base URL every endpoint and static path is resolved against
    fn api_url(&self) -> &str;

    /// List the uploaded image file names (`GET /getImages`)
    fn get_images(&self) -> Result<Vec<String>>;

    /// Fetch the stored slot array of a component (`GET /getArray`)
    fn get_array(&self, component_name: &str) -> Result<Vec<grid::ArrayEntry>>;

    /// Submit the serialized grid layout (`POST /positions`)
    fn post_positions(&self, component_name: &str, positions_json: &str, user_prompt: Option<&str>) -> Result<()>;

    /// Remove every image from a component's collage (`POST /clearCollage`)
    fn clear_collage(&self, component_name: &str) -> Result<()>;

    /// Switch the backend's image selection mode
    fn update_image_selection_mode(&self, new_mode: &str) -> Result<serde_json::Value>;

    /// Ask the backend for a new selection around a target slot
    fn new_selection(&self, component_name: &str, target_id: u32) -> Result<serde_json::Value>;

    /// Download raw bytes from any URL (uploaded images, templates)
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;

    /// Download a URL together with its media type. The default sniffs the
    /// bytes; `HttpBackend` uses the response's `Content-Type`.
    fn fetch_blob(&self, url: &str) -> Result<Blob> {
        let bytes = self.fetch_bytes(url)?;
        Ok(Blob { mime: sniff_mime(&bytes), bytes })
    }

    /// Public URL of an uploaded image, with `file_name` as one
    /// percent-encoded path segment
    fn image_url(&self, file_name: &str) -> String {
        let base = self.api_url().trim_end_matches('/');
        match url::Url::parse(base) {
            Ok(mut url) if !url.cannot_be_a_base() => {
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.pop_if_empty().push(UPLOADED_IMAGES_PATH).push(file_name);
                }
                url.to_string()
            }
            _ => {
                log::warn!("api url {} is not a base url; image url left unencoded", base);
                format!("{}/{}/{}", base, UPLOADED_IMAGES_PATH, file_name)
            }
        }
    }
}

/// Media type of image bytes, `application/octet-stream` when unknown
pub(crate) fn sniff_mime(bytes: &[u8]) -> String {
    image::guess_format(bytes)
        .map(|f| f.to_mime_type().to_string())
        .unwrap_or_else(|_| "application/octet-stream".to_string())
}

/// Create a client talking to the configured backend over HTTP
pub fn new_client(config: ClientConfig) -> Result<CollageClient<HttpBackend>> {
    CollageClient::new(config)
}
