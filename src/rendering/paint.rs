//! Paint commands produced from a grid document

use super::layout::{Border, BorderStyle, ElementKind, GridDocument, Rect};
use image::Rgba;

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    FillRect {
        rect: Rect,
        rgba: Rgba<u8>,
    },
    StrokeRect {
        rect: Rect,
        width: f64,
        style: BorderStyle,
        rgba: Rgba<u8>,
    },
    Image {
        rect: Rect,
        src: String,
    },
}

/// Walk the document in order and emit commands for everything rendered.
/// Per element: background, then image content, then border.
pub fn build_display_list(doc: &GridDocument) -> Vec<PaintCommand> {
    let mut cmds = Vec::new();
    for id in doc.ids() {
        if !doc.is_rendered(id) {
            continue;
        }
        let el = doc.element(id);
        if el.rect.width <= 0.0 || el.rect.height <= 0.0 {
            continue;
        }

        if let Some(bg) = el.style.background_color {
            if bg[3] > 0 {
                cmds.push(PaintCommand::FillRect { rect: el.rect, rgba: bg });
            }
        }

        if el.kind == ElementKind::Image {
            if let Some(src) = el.src.as_deref().filter(|s| !s.is_empty()) {
                cmds.push(PaintCommand::Image { rect: el.rect, src: src.to_string() });
            }
        }

        if let Some(Border::Line { width, style, color }) = el.style.border {
            if width > 0.0 && color[3] > 0 {
                cmds.push(PaintCommand::StrokeRect { rect: el.rect, width, style, rgba: color });
            }
        }
    }
    cmds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Slot;
    use crate::rendering::chrome::{remove_empty_placeholders, remove_remove_buttons};

    fn slots() -> Vec<Slot> {
        vec![
            Slot { src: Some("cat.png".into()), file_name: Some("cat.png".into()), scaled_src: None },
            Slot::empty(),
        ]
    }

    #[test]
    fn display_list_covers_cells_images_and_chrome() {
        let doc = GridDocument::from_slots(&slots(), 2, 50.0, 0.0);
        let cmds = build_display_list(&doc);
        let images: Vec<_> = cmds.iter().filter(|c| matches!(c, PaintCommand::Image { .. })).collect();
        assert_eq!(images.len(), 1);
        // two cell borders
        assert_eq!(cmds.iter().filter(|c| matches!(c, PaintCommand::StrokeRect { .. })).count(), 2);
        // two cell backgrounds, one remove button, one placeholder
        assert_eq!(cmds.iter().filter(|c| matches!(c, PaintCommand::FillRect { .. })).count(), 4);
    }

    #[test]
    fn suppressed_chrome_is_not_painted() {
        let mut doc = GridDocument::from_slots(&slots(), 2, 50.0, 0.0);
        let mut placeholders = remove_empty_placeholders(&mut doc);
        let buttons = remove_remove_buttons(&mut placeholders);
        let cmds = build_display_list(&buttons);
        // only the filled cell's background and border plus its image remain
        assert_eq!(cmds.len(), 3);
        assert!(matches!(cmds[2], PaintCommand::Image { .. }));
    }
}
