//! Application state shared by the collage operations.
//!
//! Built once per session and passed by reference to whatever needs it. The
//! photo url and blob lists are index-aligned: entry `i` of both describes the
//! same backend image.

use crate::rendering::Blob;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    api_url: String,
    photo_urls: Vec<String>,
    photo_blobs: Vec<Blob>,
    selected_image: Option<usize>,
}

impl AppState {
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url = api_url.into();
        log::debug!("app state created for {}", api_url);
        Self {
            api_url,
            photo_urls: Vec::new(),
            photo_blobs: Vec::new(),
            selected_image: None,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn photo_urls(&self) -> &[String] {
        &self.photo_urls
    }

    pub fn photo_blobs(&self) -> &[Blob] {
        &self.photo_blobs
    }

    pub fn photo_count(&self) -> usize {
        self.photo_urls.len()
    }

    /// Swap in a freshly fetched gallery. Both lists must have the same length.
    pub fn replace_photos(&mut self, urls: Vec<String>, blobs: Vec<Blob>) -> Result<()> {
        if urls.len() != blobs.len() {
            return Err(Error::Other(format!(
                "photo list misaligned: {} urls, {} blobs",
                urls.len(),
                blobs.len()
            )));
        }
        self.photo_urls = urls;
        self.photo_blobs = blobs;
        // A selection pointing past the new gallery is stale.
        if matches!(self.selected_image, Some(i) if i >= self.photo_urls.len()) {
            self.selected_image = None;
        }
        Ok(())
    }

    pub fn selected_image(&self) -> Option<usize> {
        self.selected_image
    }

    pub fn selected_url(&self) -> Option<&str> {
        self.selected_image
            .and_then(|i| self.photo_urls.get(i))
            .map(|s| s.as_str())
    }

    pub fn select(&mut self, index: usize) -> Result<()> {
        if index >= self.photo_urls.len() {
            return Err(Error::Other(format!(
                "image index {} out of range ({} photos)",
                index,
                self.photo_urls.len()
            )));
        }
        self.selected_image = Some(index);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected_image = None;
    }

    /// End of session: drop every fetched photo and the selection.
    pub fn teardown(&mut self) {
        log::debug!(
            "tearing down app state ({} photos cached)",
            self.photo_urls.len()
        );
        self.photo_urls.clear();
        self.photo_blobs.clear();
        self.selected_image = None;
    }
}
