//! Gallery refresh: the list of uploaded images and their bytes.

use crate::state::AppState;
use crate::{Backend, Result};

/// Fetch `/getImages`, download every listed image and store both lists.
///
/// The store is only touched once every download succeeded, so its url and
/// blob lists always stay index-aligned. Returns the number of images.
pub fn refresh_gallery<B: Backend + ?Sized>(backend: &B, state: &mut AppState) -> Result<usize> {
    let files = backend.get_images().map_err(|e| {
        log::error!("Error fetching images: {}", e);
        e
    })?;

    let mut urls = Vec::with_capacity(files.len());
    let mut blobs = Vec::with_capacity(files.len());
    for name in &files {
        let url = backend.image_url(name);
        let blob = backend.fetch_blob(&url).map_err(|e| {
            log::error!("Error fetching image {}: {}", url, e);
            e
        })?;
        urls.push(url);
        blobs.push(blob);
    }

    state.replace_photos(urls, blobs)?;
    log::info!("gallery refreshed with {} images", files.len());
    Ok(files.len())
}
