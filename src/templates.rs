//! Shape templates offered by the collage picker.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

pub const TEMPLATES_DIR: &str = "collage_templates";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollageTemplate {
    Heart,
    Star,
    Hexagon,
    Cloud,
    Fish,
    Leaf,
    Rectangle,
    Triangle,
}

impl CollageTemplate {
    /// Picker order.
    pub fn all() -> &'static [CollageTemplate] {
        use CollageTemplate::*;
        &[Heart, Star, Hexagon, Cloud, Fish, Leaf, Rectangle, Triangle]
    }

    pub fn name(self) -> &'static str {
        match self {
            CollageTemplate::Heart => "heart",
            CollageTemplate::Star => "star",
            CollageTemplate::Hexagon => "hexagon",
            CollageTemplate::Cloud => "cloud",
            CollageTemplate::Fish => "fish",
            CollageTemplate::Leaf => "leaf",
            CollageTemplate::Rectangle => "rectangle",
            CollageTemplate::Triangle => "triangle",
        }
    }

    /// Relative path of the template's thumbnail asset.
    pub fn asset_path(self) -> String {
        format!("{}/{}.png", TEMPLATES_DIR, self.name())
    }
}

impl fmt::Display for CollageTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CollageTemplate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().trim_end_matches(".png").to_ascii_lowercase();
        CollageTemplate::all()
            .iter()
            .copied()
            .find(|t| t.name() == wanted)
            .ok_or_else(|| Error::Other(format!("unknown collage template '{}'", s)))
    }
}
