//! Grid layout extraction and submission.
//!
//! Positions are container-relative and ordered column-major: ascending
//! `left`, ties broken by ascending `top`.

use crate::grid::Slot;
use crate::rendering::layout::{GridDocument, Rect};
use crate::{Backend, Error, PositionIdBase, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Layout of one cell at extraction time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: u32,
    pub top: f64,
    pub left: f64,
    pub file_name: Option<String>,
}

fn reading_order(a: &Position, b: &Position) -> Ordering {
    a.left.total_cmp(&b.left).then_with(|| a.top.total_cmp(&b.top))
}

/// Column-major reading order. Stable, so cells sharing both coordinates
/// keep their document order.
pub fn sort_positions(positions: &mut [Position]) {
    positions.sort_by(reading_order);
}

/// Build and sort one `Position` per cell. `cells[i]` pairs with `slots[i]`;
/// a cell without a slot gets no file name.
pub fn extract_positions(container: &Rect, cells: &[Rect], slots: &[Slot], base: PositionIdBase) -> Vec<Position> {
    let mut positions: Vec<Position> = cells
        .iter()
        .enumerate()
        .map(|(index, cell)| Position {
            id: index as u32 + base.offset(),
            top: cell.y - container.y,
            left: cell.x - container.x,
            file_name: slots.get(index).and_then(|s| s.file_name.clone()),
        })
        .collect();
    sort_positions(&mut positions);
    positions
}

/// Read the container and its direct cells from a grid document.
pub fn extract_from_document(doc: &GridDocument, slots: &[Slot], base: PositionIdBase) -> Vec<Position> {
    let container = doc.bounding_rect(doc.container());
    let cells: Vec<Rect> = doc.cells().iter().map(|&id| doc.bounding_rect(id)).collect();
    if cells.len() != slots.len() {
        log::warn!("grid has {} cells but {} slots", cells.len(), slots.len());
    }
    extract_positions(&container, &cells, slots, base)
}

/// POST the positions (and an optional free-text prompt) for `component_name`.
///
/// Failures are logged here and handed back; this never panics.
pub fn submit_positions<B: Backend + ?Sized>(
    backend: &B,
    component_name: &str,
    positions: &[Position],
    user_prompt: Option<&str>,
) -> Result<()> {
    let json = serde_json::to_string(positions)
        .map_err(|e| Error::Other(format!("Failed to serialize positions: {}", e)))?;

    match backend.post_positions(component_name, &json, user_prompt) {
        Ok(()) => {
            log::info!("sent {} grid positions for {}", positions.len(), component_name);
            Ok(())
        }
        Err(e) => {
            log::error!("Error sending grid positions to the backend: {}", e);
            Err(e)
        }
    }
}
