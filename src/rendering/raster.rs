//! Collage rasterizer: executes the display list onto a transparent canvas.

use super::chrome::{remove_empty_placeholders, remove_remove_buttons};
use super::layout::{BorderStyle, GridDocument, Rect};
use super::paint::{build_display_list, PaintCommand};
use super::{Blob, Screenshot};
use crate::scaler::decode_data_url;
use crate::{Backend, Error, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;

/// Output scale used when the caller has no preference.
pub const DEFAULT_SCALE: f32 = 2.0;

/// Resolves an `img` source into pixels.
pub trait ImageSource {
    fn load_image(&self, src: &str) -> Result<DynamicImage>;
}

impl ImageSource for HashMap<String, DynamicImage> {
    fn load_image(&self, src: &str) -> Result<DynamicImage> {
        self.get(src)
            .cloned()
            .ok_or_else(|| Error::Other(format!("no image registered for {}", src)))
    }
}

/// Loads images over the backend connection.
pub struct BackendImages<'a, B: ?Sized>(pub &'a B);

impl<B: Backend + ?Sized> ImageSource for BackendImages<'_, B> {
    fn load_image(&self, src: &str) -> Result<DynamicImage> {
        let bytes = self.0.fetch_bytes(src)?;
        Ok(image::load_from_memory(&bytes)?)
    }
}

fn resolve<S: ImageSource + ?Sized>(source: &S, src: &str) -> Result<DynamicImage> {
    if src.starts_with("data:") {
        let (_, bytes) = decode_data_url(src)?;
        return Ok(image::load_from_memory(&bytes)?);
    }
    source.load_image(src)
}

struct Canvas {
    pixels: RgbaImage,
    origin_x: f64,
    origin_y: f64,
    scale: f64,
}

impl Canvas {
    /// Document rect to clipped pixel bounds `(x0, y0, x1, y1)`, end exclusive.
    fn bounds(&self, rect: &Rect) -> (u32, u32, u32, u32) {
        let px = |v: f64, max: u32| ((v * self.scale).round().max(0.0) as u32).min(max);
        let (w, h) = self.pixels.dimensions();
        (
            px(rect.x - self.origin_x, w),
            px(rect.y - self.origin_y, h),
            px(rect.right() - self.origin_x, w),
            px(rect.bottom() - self.origin_y, h),
        )
    }

    fn blend(&mut self, x: u32, y: u32, src: Rgba<u8>) {
        let dst = self.pixels.get_pixel_mut(x, y);
        let sa = src[3] as f32 / 255.0;
        if sa <= 0.0 {
            return;
        }
        if sa >= 1.0 {
            *dst = src;
            return;
        }
        let da = dst[3] as f32 / 255.0;
        let out_a = sa + da * (1.0 - sa);
        let mut out = [0u8; 4];
        for c in 0..3 {
            let v = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
            out[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        out[3] = (out_a * 255.0).round() as u8;
        *dst = Rgba(out);
    }

    fn fill(&mut self, rect: &Rect, rgba: Rgba<u8>) {
        let (x0, y0, x1, y1) = self.bounds(rect);
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend(x, y, rgba);
            }
        }
    }

    fn stroke(&mut self, rect: &Rect, width: f64, style: BorderStyle, rgba: Rgba<u8>) {
        let (x0, y0, x1, y1) = self.bounds(rect);
        if x1 <= x0 || y1 <= y0 {
            return;
        }
        // A border can be no thicker than the box it strokes.
        let t = ((width * self.scale).round() as u32).clamp(1, (x1 - x0).min(y1 - y0));
        let dash = t.saturating_mul(3);
        let on = |pos: u32| match style {
            BorderStyle::Solid => true,
            BorderStyle::Dashed => (pos / dash) % 2 == 0,
            BorderStyle::Dotted => (pos / t) % 2 == 0,
        };
        for y in y0..y1 {
            for x in x0..x1 {
                let horizontal_band = y < y0.saturating_add(t) || y.saturating_add(t) >= y1;
                let vertical_band = x < x0.saturating_add(t) || x.saturating_add(t) >= x1;
                let draw = (horizontal_band && on(x - x0)) || (vertical_band && on(y - y0));
                if draw {
                    self.blend(x, y, rgba);
                }
            }
        }
    }

    fn draw_image(&mut self, rect: &Rect, img: &DynamicImage) {
        let (x0, y0, x1, y1) = self.bounds(rect);
        if x1 <= x0 || y1 <= y0 {
            return;
        }
        let fitted = img.resize_exact(x1 - x0, y1 - y0, FilterType::Triangle).to_rgba8();
        for (dx, dy, pixel) in fitted.enumerate_pixels() {
            self.blend(x0 + dx, y0 + dy, *pixel);
        }
    }
}

/// Render the document's container at `scale` onto a transparent canvas.
pub fn rasterize<S: ImageSource + ?Sized>(doc: &GridDocument, source: &S, scale: f32) -> Result<Screenshot> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(Error::RenderError(format!("invalid scale factor {}", scale)));
    }
    let scale = scale as f64;
    let area = doc.bounding_rect(doc.container());
    let width = (area.width * scale).round() as u32;
    let height = (area.height * scale).round() as u32;
    if width == 0 || height == 0 {
        return Err(Error::RenderError("grid container has no area".into()));
    }

    let mut canvas = Canvas {
        pixels: RgbaImage::new(width, height),
        origin_x: area.x,
        origin_y: area.y,
        scale,
    };

    let mut cache: HashMap<String, Option<DynamicImage>> = HashMap::new();
    for cmd in build_display_list(doc) {
        match cmd {
            PaintCommand::FillRect { rect, rgba } => canvas.fill(&rect, rgba),
            PaintCommand::StrokeRect { rect, width, style, rgba } => canvas.stroke(&rect, width, style, rgba),
            PaintCommand::Image { rect, src } => {
                let img = cache.entry(src).or_insert_with_key(|src| match resolve(source, src) {
                    Ok(img) => Some(img),
                    Err(e) => {
                        log::warn!("skipping image {}: {}", src, e);
                        None
                    }
                });
                if let Some(img) = img {
                    canvas.draw_image(&rect, img);
                }
            }
        }
    }

    let mut png_data = Vec::new();
    DynamicImage::ImageRgba8(canvas.pixels)
        .write_to(&mut Cursor::new(&mut png_data), ImageFormat::Png)
        .map_err(|e| Error::RenderError(format!("PNG encode failed: {}", e)))?;

    Ok(Screenshot { width, height, png_data })
}

/// Rasterize the collage and hand it back as a PNG blob.
pub fn scale_collage_images<S: ImageSource + ?Sized>(doc: &GridDocument, source: &S, scale: f32) -> Result<Blob> {
    match rasterize(doc, source, scale) {
        Ok(shot) => {
            log::info!("Collage rasterized at {}x ({}x{})", scale, shot.width, shot.height);
            Ok(Blob::png(shot.png_data))
        }
        Err(e) => {
            log::error!("Error while scaling collage images: {}", e);
            Err(e)
        }
    }
}

/// Hide the chrome, rasterize, and put the chrome back on every path out.
pub fn finish_collage<S: ImageSource + ?Sized>(doc: &mut GridDocument, source: &S, scale: f32) -> Result<Blob> {
    let mut placeholders = remove_empty_placeholders(doc);
    let buttons = remove_remove_buttons(&mut placeholders);
    scale_collage_images(&buttons, source, scale)
}
