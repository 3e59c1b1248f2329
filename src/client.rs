//! `CollageClient`: one editing session against one backend.
//!
//! Owns the backend connection and the application state. Created with
//! [`CollageClient::new`] (or [`crate::new_client`]) and ended with
//! [`CollageClient::close`].

use crate::grid::{self, Slot, SyncOptions, SyncReport};
use crate::positions::{self, Position};
use crate::rendering::raster::{self, BackendImages};
use crate::rendering::{Blob, GridDocument};
use crate::state::AppState;
use crate::{gallery, selection};
use crate::{Backend, ClientConfig, HttpBackend, Result};
use std::time::Duration;

pub struct CollageClient<B: Backend = HttpBackend> {
    backend: B,
    config: ClientConfig,
    state: AppState,
}

impl CollageClient<HttpBackend> {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let backend = HttpBackend::new(&config)?;
        Ok(Self::with_backend(config, backend))
    }
}

impl<B: Backend> CollageClient<B> {
    pub fn with_backend(config: ClientConfig, backend: B) -> Self {
        let state = AppState::new(backend.api_url());
        log::info!("collage session started against {}", backend.api_url());
        Self { backend, config, state }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut AppState {
        &mut self.state
    }

    fn sync_options(&self, scale: bool) -> SyncOptions {
        SyncOptions {
            scale,
            thumbnail: self.config.thumbnail,
            jpeg_quality: self.config.jpeg_quality,
            parallelism: self.config.scale_parallelism,
        }
    }

    /// Reload the gallery of uploaded images into the state.
    pub fn refresh_gallery(&mut self) -> Result<usize> {
        gallery::refresh_gallery(&self.backend, &mut self.state)
    }

    /// Merge the backend's array for `component_name` into `slots`, without thumbnails.
    pub fn sync_grid(&self, component_name: &str, slots: &mut [Slot]) -> Result<SyncReport> {
        grid::synchronize(&self.backend, component_name, slots, &self.sync_options(false))
    }

    /// Merge and thumbnail every assigned slot.
    pub fn update_collage_items(&self, component_name: &str, slots: &mut [Slot]) -> Result<SyncReport> {
        grid::update_collage_items(&self.backend, component_name, slots, &self.sync_options(true))
    }

    pub fn extract_positions(&self, doc: &GridDocument, slots: &[Slot]) -> Vec<Position> {
        positions::extract_from_document(doc, slots, self.config.position_id_base)
    }

    /// Extract the layout of `doc` and send it for `component_name`.
    pub fn submit_layout(
        &self,
        doc: &GridDocument,
        slots: &[Slot],
        component_name: &str,
        user_prompt: Option<&str>,
    ) -> Result<Vec<Position>> {
        let positions = self.extract_positions(doc, slots);
        positions::submit_positions(&self.backend, component_name, &positions, user_prompt)?;
        Ok(positions)
    }

    pub fn clear_collage(&self, component_name: &str) -> Result<()> {
        selection::clear_collage(&self.backend, component_name)
    }

    pub fn update_selection_mode(&self, new_mode: &str) -> Result<serde_json::Value> {
        selection::update_selection_mode(&self.backend, new_mode)
    }

    /// Ask for a new selection around a grid slot. The gallery selection in
    /// the state is not affected.
    pub fn new_selection(&self, component_name: &str, target_id: u32) -> Result<serde_json::Value> {
        selection::new_selection(&self.backend, component_name, target_id)
    }

    /// Export the collage as PNG, loading images through the backend.
    pub fn export_collage(&self, doc: &mut GridDocument, scale: f32) -> Result<Blob> {
        raster::finish_collage(doc, &BackendImages(&self.backend), scale)
    }

    /// End the session and drop cached photos.
    pub fn close(mut self) {
        self.state.teardown();
        log::info!("collage session closed");
    }
}

/// Block the current thread for `ms` milliseconds.
pub fn wait(ms: u64) {
    std::thread::sleep(Duration::from_millis(ms));
}
