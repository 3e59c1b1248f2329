//! Scoped suppression of editing chrome (placeholder labels, empty-cell
//! styling, remove buttons) for export.
//!
//! A `ChromeGuard` records the exact style of every element it touches and
//! puts those styles back when it is restored or dropped, whichever comes
//! first. Guards dereference to the document, so they nest:
//!
//! ```
//! use collagekit::rendering::chrome::{remove_empty_placeholders, remove_remove_buttons};
//! use collagekit::rendering::layout::GridDocument;
//! use collagekit::Slot;
//!
//! let mut doc = GridDocument::from_slots(&[Slot::empty()], 1, 50.0, 0.0);
//! let before = doc.clone();
//! {
//!     let mut placeholders = remove_empty_placeholders(&mut doc);
//!     let buttons = remove_remove_buttons(&mut placeholders);
//!     assert_eq!(buttons.suppressed(), 0);
//! }
//! assert_eq!(doc, before);
//! ```

use super::layout::{Border, Display, ElementId, ElementKind, GridDocument, Style};
use image::Rgba;
use std::ops::{Deref, DerefMut};

pub struct ChromeGuard<'a> {
    doc: &'a mut GridDocument,
    saved: Vec<(ElementId, Style)>,
}

impl<'a> ChromeGuard<'a> {
    fn new(doc: &'a mut GridDocument) -> Self {
        Self { doc, saved: Vec::new() }
    }

    fn change(&mut self, id: ElementId, apply: impl FnOnce(&mut Style)) {
        let style = &mut self.doc.element_mut(id).style;
        let before = style.clone();
        apply(&mut *style);
        if *style != before {
            self.saved.push((id, before));
        }
    }

    /// Number of elements whose style is currently overridden.
    pub fn suppressed(&self) -> usize {
        self.saved.len()
    }

    /// Put back every recorded style. Later calls do nothing.
    pub fn restore(&mut self) {
        if self.saved.is_empty() {
            return;
        }
        log::debug!("restoring {} chrome styles", self.saved.len());
        while let Some((id, style)) = self.saved.pop() {
            self.doc.element_mut(id).style = style;
        }
    }
}

impl Deref for ChromeGuard<'_> {
    type Target = GridDocument;

    fn deref(&self) -> &GridDocument {
        self.doc
    }
}

impl DerefMut for ChromeGuard<'_> {
    fn deref_mut(&mut self) -> &mut GridDocument {
        self.doc
    }
}

impl Drop for ChromeGuard<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Hide placeholder labels and strip background and border from every cell
/// that holds no image.
pub fn remove_empty_placeholders(doc: &mut GridDocument) -> ChromeGuard<'_> {
    let labels = doc.query_kind(ElementKind::Placeholder);
    let empty_cells: Vec<ElementId> = doc
        .query_kind(ElementKind::Cell)
        .into_iter()
        .filter(|&c| !doc.cell_has_image(c))
        .collect();

    let mut guard = ChromeGuard::new(doc);
    for id in labels {
        guard.change(id, |s| s.display = Some(Display::None));
    }
    for id in empty_cells {
        guard.change(id, |s| {
            s.background_color = Some(Rgba([0, 0, 0, 0]));
            s.border = Some(Border::None);
        });
    }
    guard
}

/// Hide every remove button.
pub fn remove_remove_buttons(doc: &mut GridDocument) -> ChromeGuard<'_> {
    let buttons = doc.query_kind(ElementKind::RemoveButton);
    let mut guard = ChromeGuard::new(doc);
    for id in buttons {
        guard.change(id, |s| s.display = Some(Display::None));
    }
    guard
}
