//! Grid document model: the collage container, its cells and their chrome.
//!
//! Geometry comes from inline `left/top/width/height` styles, each relative
//! to the parent element. No CSS cascade or flow layout is performed.

use crate::grid::Slot;
use crate::{Error, Result};
use image::Rgba;
use scraper::{ElementRef, Html, Selector};

pub const CONTAINER_CLASS: &str = "grid-container";
pub const CELL_CLASS: &str = "grid-item";
pub const PLACEHOLDER_CLASS: &str = "upload-label";
pub const REMOVE_BUTTON_CLASS: &str = "remove-button";

const REMOVE_BUTTON_SIZE: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Flex,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderStyle {
    Solid,
    Dashed,
    Dotted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Border {
    None,
    Line { width: f64, style: BorderStyle, color: Rgba<u8> },
}

/// The subset of inline style the collage cares about. `None` means "not set".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style {
    pub display: Option<Display>,
    pub background_color: Option<Rgba<u8>>,
    pub border: Option<Border>,
}

impl Style {
    pub fn is_hidden(&self) -> bool {
        self.display == Some(Display::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Container,
    Cell,
    Image,
    Placeholder,
    RemoveButton,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub kind: ElementKind,
    pub tag: String,
    pub classes: Vec<String>,
    /// Absolute rect in document coordinates
    pub rect: Rect,
    pub style: Style,
    pub src: Option<String>,
    pub parent: Option<ElementId>,
    pub children: Vec<ElementId>,
}

/// Elements are stored in document (pre-)order; index 0 is the container.
#[derive(Debug, Clone, PartialEq)]
pub struct GridDocument {
    elements: Vec<Element>,
}

impl GridDocument {
    /// Parse grid markup. The first `.grid-container` becomes the root.
    pub fn parse(html: &str) -> Result<Self> {
        let document = Html::parse_document(html);
        let sel = Selector::parse(&format!(".{}", CONTAINER_CLASS))
            .map_err(|e| Error::ParseError(format!("container selector: {:?}", e)))?;
        let root = document
            .select(&sel)
            .next()
            .ok_or_else(|| Error::ElementNotFound(format!(".{}", CONTAINER_CLASS)))?;

        let mut doc = GridDocument { elements: Vec::new() };
        // The container is positioned against the page origin.
        let page = Rect::new(0.0, 0.0, 0.0, 0.0);
        doc.add_subtree(root, None, &page)?;
        doc.elements[0].kind = ElementKind::Container;
        Ok(doc)
    }

    /// Lay out `slots` as a `columns`-wide grid of square cells, the way the
    /// editor renders them: filled cells get an image and a remove button,
    /// empty cells a placeholder label.
    pub fn from_slots(slots: &[Slot], columns: usize, cell_size: f64, gap: f64) -> Self {
        let columns = columns.max(1);
        let rows = slots.len().div_ceil(columns).max(1);
        let extent = |n: usize| n as f64 * cell_size + n.saturating_sub(1) as f64 * gap;

        let mut doc = GridDocument { elements: Vec::new() };
        let container = doc.push(Element {
            kind: ElementKind::Container,
            tag: "div".into(),
            classes: vec![CONTAINER_CLASS.into()],
            rect: Rect::new(0.0, 0.0, extent(columns), extent(rows)),
            style: Style::default(),
            src: None,
            parent: None,
            children: Vec::new(),
        });

        let cell_style = Style {
            display: None,
            background_color: Some(Rgba([240, 240, 240, 255])),
            border: Some(Border::Line { width: 2.0, style: BorderStyle::Dashed, color: Rgba([204, 204, 204, 255]) }),
        };

        for (i, slot) in slots.iter().enumerate() {
            let (col, row) = (i % columns, i / columns);
            let rect = Rect::new(
                col as f64 * (cell_size + gap),
                row as f64 * (cell_size + gap),
                cell_size,
                cell_size,
            );
            let cell = doc.push_child(container, ElementKind::Cell, "div", Some(CELL_CLASS), rect, cell_style.clone(), None);

            match slot.display_src() {
                Some(src) => {
                    doc.push_child(cell, ElementKind::Image, "img", None, rect, Style::default(), Some(src.to_string()));
                    let button = Rect::new(rect.right() - REMOVE_BUTTON_SIZE, rect.y, REMOVE_BUTTON_SIZE, REMOVE_BUTTON_SIZE);
                    let style = Style { background_color: Some(Rgba([255, 82, 82, 255])), ..Style::default() };
                    doc.push_child(cell, ElementKind::RemoveButton, "button", Some(REMOVE_BUTTON_CLASS), button, style, None);
                }
                None => {
                    let style = Style {
                        display: Some(Display::Flex),
                        background_color: Some(Rgba([224, 224, 224, 255])),
                        border: None,
                    };
                    doc.push_child(cell, ElementKind::Placeholder, "label", Some(PLACEHOLDER_CLASS), rect, style, None);
                }
            }
        }
        doc
    }

    fn push(&mut self, element: Element) -> ElementId {
        let id = ElementId(self.elements.len());
        if let Some(parent) = element.parent {
            self.elements[parent.0].children.push(id);
        }
        self.elements.push(element);
        id
    }

    #[allow(clippy::too_many_arguments)]
    fn push_child(
        &mut self,
        parent: ElementId,
        kind: ElementKind,
        tag: &str,
        class: Option<&str>,
        rect: Rect,
        style: Style,
        src: Option<String>,
    ) -> ElementId {
        self.push(Element {
            kind,
            tag: tag.to_string(),
            classes: class.map(|c| vec![c.to_string()]).unwrap_or_default(),
            rect,
            style,
            src,
            parent: Some(parent),
            children: Vec::new(),
        })
    }

    fn add_subtree(&mut self, node: ElementRef, parent: Option<ElementId>, parent_rect: &Rect) -> Result<ElementId> {
        let el = node.value();
        let tag = el.name().to_string();
        let classes: Vec<String> = el.classes().map(|c| c.to_string()).collect();
        let inline = parse_inline_style(el.attr("style").unwrap_or(""))?;
        let kind = classify(&tag, &classes);
        let rect = inline.resolve_rect(kind, parent_rect);

        let id = self.push(Element {
            kind,
            tag,
            classes,
            rect,
            style: inline.style,
            src: el.attr("src").map(|s| s.to_string()),
            parent,
            children: Vec::new(),
        });

        for child in node.children().filter_map(ElementRef::wrap) {
            self.add_subtree(child, Some(id), &rect)?;
        }
        Ok(id)
    }

    pub fn container(&self) -> ElementId {
        ElementId(0)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.0]
    }

    pub fn element_mut(&mut self, id: ElementId) -> &mut Element {
        &mut self.elements[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = ElementId> {
        (0..self.elements.len()).map(ElementId)
    }

    /// Direct cell children of the container, in document order.
    pub fn cells(&self) -> Vec<ElementId> {
        self.element(self.container())
            .children
            .iter()
            .copied()
            .filter(|&c| self.element(c).kind == ElementKind::Cell)
            .collect()
    }

    /// Every element of `kind` in document order.
    pub fn query_kind(&self, kind: ElementKind) -> Vec<ElementId> {
        self.ids().filter(|&id| self.element(id).kind == kind).collect()
    }

    pub fn has_descendant(&self, id: ElementId, kind: ElementKind) -> bool {
        self.element(id)
            .children
            .iter()
            .any(|&c| self.element(c).kind == kind || self.has_descendant(c, kind))
    }

    pub fn cell_has_image(&self, cell: ElementId) -> bool {
        self.has_descendant(cell, ElementKind::Image)
    }

    pub fn bounding_rect(&self, id: ElementId) -> Rect {
        self.element(id).rect
    }

    /// Visible when neither the element nor an ancestor is `display: none`.
    pub fn is_rendered(&self, id: ElementId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            let el = self.element(c);
            if el.style.is_hidden() {
                return false;
            }
            cur = el.parent;
        }
        true
    }
}

fn classify(tag: &str, classes: &[String]) -> ElementKind {
    let has = |name: &str| classes.iter().any(|c| c == name);
    if has(CONTAINER_CLASS) {
        ElementKind::Container
    } else if has(CELL_CLASS) {
        ElementKind::Cell
    } else if has(PLACEHOLDER_CLASS) {
        ElementKind::Placeholder
    } else if has(REMOVE_BUTTON_CLASS) {
        ElementKind::RemoveButton
    } else if tag.eq_ignore_ascii_case("img") {
        ElementKind::Image
    } else {
        ElementKind::Other
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Length {
    Px(f64),
    Percent(f64),
}

impl Length {
    fn resolve(self, extent: f64) -> f64 {
        match self {
            Length::Px(v) => v,
            Length::Percent(p) => extent * p / 100.0,
        }
    }
}

#[derive(Debug, Default)]
struct InlineStyle {
    left: Option<Length>,
    top: Option<Length>,
    width: Option<Length>,
    height: Option<Length>,
    style: Style,
}

impl InlineStyle {
    fn resolve_rect(&self, kind: ElementKind, parent: &Rect) -> Rect {
        let width = match (self.width, kind) {
            (Some(w), _) => w.resolve(parent.width),
            (None, ElementKind::RemoveButton) => REMOVE_BUTTON_SIZE,
            (None, _) => parent.width,
        };
        let height = match (self.height, kind) {
            (Some(h), _) => h.resolve(parent.height),
            (None, ElementKind::RemoveButton) => REMOVE_BUTTON_SIZE,
            (None, _) => parent.height,
        };
        let left = match (self.left, kind) {
            (Some(l), _) => l.resolve(parent.width),
            // Remove buttons sit in the top-right corner of their cell.
            (None, ElementKind::RemoveButton) => (parent.width - width).max(0.0),
            (None, _) => 0.0,
        };
        let top = self.top.map(|t| t.resolve(parent.height)).unwrap_or(0.0);
        Rect::new(parent.x + left, parent.y + top, width, height)
    }
}

fn parse_inline_style(css: &str) -> Result<InlineStyle> {
    let mut out = InlineStyle::default();
    for decl in css.split(';') {
        let Some((prop, value)) = decl.split_once(':') else {
            continue;
        };
        let prop = prop.trim().to_ascii_lowercase();
        let value = value.trim();
        match prop.as_str() {
            "left" => out.left = Some(parse_length(value)?),
            "top" => out.top = Some(parse_length(value)?),
            "width" => out.width = Some(parse_length(value)?),
            "height" => out.height = Some(parse_length(value)?),
            "display" => out.style.display = Some(parse_display(value)),
            // Paint declarations never block geometry.
            "background-color" => match parse_color(value) {
                Ok(c) => out.style.background_color = Some(c),
                Err(e) => log::warn!("ignoring background-color: {}", e),
            },
            "border" => match parse_border(value) {
                Ok(b) => out.style.border = Some(b),
                Err(e) => log::warn!("ignoring border: {}", e),
            },
            _ => {}
        }
    }
    Ok(out)
}

fn parse_length(value: &str) -> Result<Length> {
    let v = value.trim();
    let (num, percent) = match v.strip_suffix('%') {
        Some(n) => (n, true),
        None => (v.strip_suffix("px").unwrap_or(v), false),
    };
    let n: f64 = num
        .trim()
        .parse()
        .map_err(|_| Error::ParseError(format!("bad length '{}'", value)))?;
    Ok(if percent { Length::Percent(n) } else { Length::Px(n) })
}

fn parse_display(value: &str) -> Display {
    match value.to_ascii_lowercase().as_str() {
        "none" => Display::None,
        "flex" | "inline-flex" => Display::Flex,
        _ => Display::Block,
    }
}

pub fn parse_color(value: &str) -> Result<Rgba<u8>> {
    let v = value.trim().to_ascii_lowercase();
    let bad = || Error::ParseError(format!("bad color '{}'", value));

    if let Some(hex) = v.strip_prefix('#').filter(|h| h.is_ascii()) {
        let digit = |s: &str| u8::from_str_radix(s, 16).map_err(|_| bad());
        return match hex.len() {
            3 => {
                let c: Vec<u8> = hex
                    .chars()
                    .map(|ch| digit(&ch.to_string()).map(|d| d * 17))
                    .collect::<Result<_>>()?;
                Ok(Rgba([c[0], c[1], c[2], 255]))
            }
            6 | 8 => {
                let a = if hex.len() == 8 { digit(&hex[6..8])? } else { 255 };
                Ok(Rgba([digit(&hex[0..2])?, digit(&hex[2..4])?, digit(&hex[4..6])?, a]))
            }
            _ => Err(bad()),
        };
    }

    if let Some(args) = v.strip_prefix("rgba(").or_else(|| v.strip_prefix("rgb(")) {
        let parts: Vec<&str> = args.trim_end_matches(')').split(',').map(|p| p.trim()).collect();
        if parts.len() < 3 {
            return Err(bad());
        }
        let channel = |s: &str| s.parse::<f64>().map(|f| f.clamp(0.0, 255.0) as u8).map_err(|_| bad());
        let alpha = match parts.get(3) {
            Some(a) => (a.parse::<f64>().map_err(|_| bad())?.clamp(0.0, 1.0) * 255.0).round() as u8,
            None => 255,
        };
        return Ok(Rgba([channel(parts[0])?, channel(parts[1])?, channel(parts[2])?, alpha]));
    }

    if v == "transparent" || v == "none" {
        return Ok(Rgba([0, 0, 0, 0]));
    }
    NAMED_COLORS
        .binary_search_by(|(name, _)| name.cmp(&v.as_str()))
        .map(|i| {
            let rgb = NAMED_COLORS[i].1;
            Rgba([(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 255])
        })
        .map_err(|_| bad())
}

/// CSS named colors, sorted by name.
const NAMED_COLORS: &[(&str, u32)] = &[
    ("aliceblue", 0xf0f8ff),
    ("antiquewhite", 0xfaebd7),
    ("aqua", 0x00ffff),
    ("aquamarine", 0x7fffd4),
    ("azure", 0xf0ffff),
    ("beige", 0xf5f5dc),
    ("bisque", 0xffe4c4),
    ("black", 0x000000),
    ("blanchedalmond", 0xffebcd),
    ("blue", 0x0000ff),
    ("blueviolet", 0x8a2be2),
    ("brown", 0xa52a2a),
    ("burlywood", 0xdeb887),
    ("cadetblue", 0x5f9ea0),
    ("chartreuse", 0x7fff00),
    ("chocolate", 0xd2691e),
    ("coral", 0xff7f50),
    ("cornflowerblue", 0x6495ed),
    ("cornsilk", 0xfff8dc),
    ("crimson", 0xdc143c),
    ("cyan", 0x00ffff),
    ("darkblue", 0x00008b),
    ("darkcyan", 0x008b8b),
    ("darkgoldenrod", 0xb8860b),
    ("darkgray", 0xa9a9a9),
    ("darkgreen", 0x006400),
    ("darkgrey", 0xa9a9a9),
    ("darkkhaki", 0xbdb76b),
    ("darkmagenta", 0x8b008b),
    ("darkolivegreen", 0x556b2f),
    ("darkorange", 0xff8c00),
    ("darkorchid", 0x9932cc),
    ("darkred", 0x8b0000),
    ("darksalmon", 0xe9967a),
    ("darkseagreen", 0x8fbc8f),
    ("darkslateblue", 0x483d8b),
    ("darkslategray", 0x2f4f4f),
    ("darkslategrey", 0x2f4f4f),
    ("darkturquoise", 0x00ced1),
    ("darkviolet", 0x9400d3),
    ("deeppink", 0xff1493),
    ("deepskyblue", 0x00bfff),
    ("dimgray", 0x696969),
    ("dimgrey", 0x696969),
    ("dodgerblue", 0x1e90ff),
    ("firebrick", 0xb22222),
    ("floralwhite", 0xfffaf0),
    ("forestgreen", 0x228b22),
    ("fuchsia", 0xff00ff),
    ("gainsboro", 0xdcdcdc),
    ("ghostwhite", 0xf8f8ff),
    ("gold", 0xffd700),
    ("goldenrod", 0xdaa520),
    ("gray", 0x808080),
    ("green", 0x008000),
    ("greenyellow", 0xadff2f),
    ("grey", 0x808080),
    ("honeydew", 0xf0fff0),
    ("hotpink", 0xff69b4),
    ("indianred", 0xcd5c5c),
    ("indigo", 0x4b0082),
    ("ivory", 0xfffff0),
    ("khaki", 0xf0e68c),
    ("lavender", 0xe6e6fa),
    ("lavenderblush", 0xfff0f5),
    ("lawngreen", 0x7cfc00),
    ("lemonchiffon", 0xfffacd),
    ("lightblue", 0xadd8e6),
    ("lightcoral", 0xf08080),
    ("lightcyan", 0xe0ffff),
    ("lightgoldenrodyellow", 0xfafad2),
    ("lightgray", 0xd3d3d3),
    ("lightgreen", 0x90ee90),
    ("lightgrey", 0xd3d3d3),
    ("lightpink", 0xffb6c1),
    ("lightsalmon", 0xffa07a),
    ("lightseagreen", 0x20b2aa),
    ("lightskyblue", 0x87cefa),
    ("lightslategray", 0x778899),
    ("lightslategrey", 0x778899),
    ("lightsteelblue", 0xb0c4de),
    ("lightyellow", 0xffffe0),
    ("lime", 0x00ff00),
    ("limegreen", 0x32cd32),
    ("linen", 0xfaf0e6),
    ("magenta", 0xff00ff),
    ("maroon", 0x800000),
    ("mediumaquamarine", 0x66cdaa),
    ("mediumblue", 0x0000cd),
    ("mediumorchid", 0xba55d3),
    ("mediumpurple", 0x9370db),
    ("mediumseagreen", 0x3cb371),
    ("mediumslateblue", 0x7b68ee),
    ("mediumspringgreen", 0x00fa9a),
    ("mediumturquoise", 0x48d1cc),
    ("mediumvioletred", 0xc71585),
    ("midnightblue", 0x191970),
    ("mintcream", 0xf5fffa),
    ("mistyrose", 0xffe4e1),
    ("moccasin", 0xffe4b5),
    ("navajowhite", 0xffdead),
    ("navy", 0x000080),
    ("oldlace", 0xfdf5e6),
    ("olive", 0x808000),
    ("olivedrab", 0x6b8e23),
    ("orange", 0xffa500),
    ("orangered", 0xff4500),
    ("orchid", 0xda70d6),
    ("palegoldenrod", 0xeee8aa),
    ("palegreen", 0x98fb98),
    ("paleturquoise", 0xafeeee),
    ("palevioletred", 0xdb7093),
    ("papayawhip", 0xffefd5),
    ("peachpuff", 0xffdab9),
    ("peru", 0xcd853f),
    ("pink", 0xffc0cb),
    ("plum", 0xdda0dd),
    ("powderblue", 0xb0e0e6),
    ("purple", 0x800080),
    ("rebeccapurple", 0x663399),
    ("red", 0xff0000),
    ("rosybrown", 0xbc8f8f),
    ("royalblue", 0x4169e1),
    ("saddlebrown", 0x8b4513),
    ("salmon", 0xfa8072),
    ("sandybrown", 0xf4a460),
    ("seagreen", 0x2e8b57),
    ("seashell", 0xfff5ee),
    ("sienna", 0xa0522d),
    ("silver", 0xc0c0c0),
    ("skyblue", 0x87ceeb),
    ("slateblue", 0x6a5acd),
    ("slategray", 0x708090),
    ("slategrey", 0x708090),
    ("snow", 0xfffafa),
    ("springgreen", 0x00ff7f),
    ("steelblue", 0x4682b4),
    ("tan", 0xd2b48c),
    ("teal", 0x008080),
    ("thistle", 0xd8bfd8),
    ("tomato", 0xff6347),
    ("turquoise", 0x40e0d0),
    ("violet", 0xee82ee),
    ("wheat", 0xf5deb3),
    ("white", 0xffffff),
    ("whitesmoke", 0xf5f5f5),
    ("yellow", 0xffff00),
    ("yellowgreen", 0x9acd32),
];

/// Split a shorthand value on whitespace that is not inside parentheses.
fn shorthand_tokens(value: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    for (i, ch) in value.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    tokens.push(&value[s..i]);
                }
                continue;
            }
            _ => {}
        }
        if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(&value[s..]);
    }
    tokens
}

fn parse_border(value: &str) -> Result<Border> {
    let v = value.trim();
    if v.eq_ignore_ascii_case("none") || v == "0" {
        return Ok(Border::None);
    }
    let mut width = 1.0;
    let mut style = BorderStyle::Solid;
    let mut color = Rgba([0, 0, 0, 255]);
    for token in shorthand_tokens(v) {
        match token.to_ascii_lowercase().as_str() {
            "solid" => style = BorderStyle::Solid,
            "dashed" => style = BorderStyle::Dashed,
            "dotted" => style = BorderStyle::Dotted,
            "none" => return Ok(Border::None),
            t if t.starts_with(|c: char| c.is_ascii_digit() || c == '.') => {
                width = match parse_length(t)? {
                    Length::Px(w) => w,
                    Length::Percent(_) => return Err(Error::ParseError(format!("bad border width '{}'", t))),
                }
            }
            _ => color = parse_color(token)?,
        }
    }
    Ok(Border::Line { width, style, color })
}
