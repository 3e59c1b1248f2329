//! Collage-level backend calls: clearing a collage and driving image selection.

use crate::{Backend, Result};

pub fn clear_collage<B: Backend + ?Sized>(backend: &B, component_name: &str) -> Result<()> {
    backend.clear_collage(component_name).map_err(|e| {
        log::error!("Error clearing collage {}: {}", component_name, e);
        e
    })?;
    log::info!("cleared collage {}", component_name);
    Ok(())
}

/// Switch how the backend picks images; returns the backend's JSON answer.
pub fn update_selection_mode<B: Backend + ?Sized>(backend: &B, new_mode: &str) -> Result<serde_json::Value> {
    backend.update_image_selection_mode(new_mode).map_err(|e| {
        log::error!("Error updating image selection mode to {}: {}", new_mode, e);
        e
    })
}

/// Request a new selection around grid slot `target_id` of `component_name`.
pub fn new_selection<B: Backend + ?Sized>(
    backend: &B,
    component_name: &str,
    target_id: u32,
) -> Result<serde_json::Value> {
    backend.new_selection(component_name, target_id).map_err(|e| {
        log::error!("Error requesting new selection for {}#{}: {}", component_name, target_id, e);
        e
    })
}
