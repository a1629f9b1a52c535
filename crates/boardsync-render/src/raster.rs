//! CPU raster surface.
//!
//! Pixels are sampled at their centers with no antialiasing, so a replay of
//! the same operations always produces the same bytes.

use crate::color::Rgba;
use crate::renderer::{Composite, RenderResult, RendererError, Surface};
use image::RgbaImage;
use kurbo::{BezPath, Line, ParamCurveNearest, Point, Rect, Shape};
use peniko::Color;
use std::path::Path;

/// Glyph cell advance as a fraction of the font size.
const GLYPH_ADVANCE: f64 = 0.6;
/// Glyph cell height above the baseline as a fraction of the font size.
const GLYPH_ASCENT: f64 = 0.7;

/// RGBA8 surface backed by an [`RgbaImage`].
pub struct RasterSurface {
    pixels: RgbaImage,
}

impl RasterSurface {
    /// New fully transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        self.pixels
            .get_pixel_checked(x, y)
            .map(|p| Rgba::new(p.0[0], p.0[1], p.0[2], p.0[3]))
    }

    /// Encode the current pixels as PNG.
    pub fn to_png(&self) -> RenderResult<Vec<u8>> {
        encode_png(self.pixels.as_raw(), self.pixels.width(), self.pixels.height())
    }

    /// Write the current pixels to a PNG file.
    pub fn save_png(&self, path: &Path) -> RenderResult<()> {
        let data = self.to_png()?;
        std::fs::write(path, data).map_err(|e| RendererError::Surface(format!("{}: {}", path.display(), e)))
    }

    fn span(&self, bounds: Rect) -> Option<PixelSpan> {
        let (width, height) = self.pixels.dimensions();
        PixelSpan::clip(bounds, width, height)
    }

    /// Paint every pixel inside `bounds` whose center `covers` accepts.
    fn paint(&mut self, bounds: Rect, color: Rgba, composite: Composite, covers: impl Fn(Point) -> bool) {
        let Some(span) = self.span(bounds) else {
            return;
        };
        for y in span.y0..span.y1 {
            for x in span.x0..span.x1 {
                if covers(pixel_center(x, y)) {
                    self.composite(x, y, color, composite);
                }
            }
        }
    }

    fn composite(&mut self, x: u32, y: u32, color: Rgba, composite: Composite) {
        let pixel = self.pixels.get_pixel_mut(x, y);
        match composite {
            Composite::SourceOver => blend_over(&mut pixel.0, color),
            Composite::DestinationOut => erase(&mut pixel.0, color.a),
        }
    }
}

/// Pixel rectangle `[x0, x1) x [y0, y1)` clipped to the surface.
#[derive(Debug, Clone, Copy)]
struct PixelSpan {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

impl PixelSpan {
    fn clip(bounds: Rect, width: u32, height: u32) -> Option<Self> {
        let span = Self {
            x0: bounds.x0.floor().max(0.0) as u32,
            y0: bounds.y0.floor().max(0.0) as u32,
            x1: (bounds.x1.ceil().max(0.0) as u32).min(width),
            y1: (bounds.y1.ceil().max(0.0) as u32).min(height),
        };
        (span.x0 < span.x1 && span.y0 < span.y1).then_some(span)
    }

    fn width(&self) -> usize {
        (self.x1 - self.x0) as usize
    }

    fn len(&self) -> usize {
        self.width() * (self.y1 - self.y0) as usize
    }

    /// Row-major index of a pixel inside the span.
    fn index(&self, x: u32, y: u32) -> usize {
        (y - self.y0) as usize * self.width() + (x - self.x0) as usize
    }
}

fn pixel_center(x: u32, y: u32) -> Point {
    Point::new(x as f64 + 0.5, y as f64 + 0.5)
}

/// Non-premultiplied source-over in integer math.
fn blend_over(dst: &mut [u8; 4], src: Rgba) {
    let sa = src.a as u32;
    if sa == 255 {
        *dst = src.to_array();
        return;
    }
    if sa == 0 {
        return;
    }
    let inv = 255 - sa;
    let da = dst[3] as u32;
    let out_a = sa * 255 + da * inv;
    if out_a == 0 {
        return;
    }
    let mix = |s: u8, d: u8| ((s as u32 * sa * 255 + d as u32 * da * inv) / out_a) as u8;
    *dst = [
        mix(src.r, dst[0]),
        mix(src.g, dst[1]),
        mix(src.b, dst[2]),
        (out_a / 255) as u8,
    ];
}

fn erase(dst: &mut [u8; 4], strength: u8) {
    let remaining = dst[3] as u32 * (255 - strength as u32) / 255;
    if remaining == 0 {
        *dst = [0, 0, 0, 0];
    } else {
        dst[3] = remaining as u8;
    }
}

fn bounds_of(points: &[Point]) -> Rect {
    points
        .iter()
        .skip(1)
        .fold(Rect::from_points(points[0], points[0]), |r, p| r.union_pt(*p))
}

impl Surface for RasterSurface {
    fn size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    fn fill_background(&mut self, color: Color) {
        let value = Rgba::from(color).to_array();
        for pixel in self.pixels.pixels_mut() {
            pixel.0 = value;
        }
    }

    fn stroke_polyline(&mut self, points: &[Point], width: f64, color: Color, composite: Composite) {
        if points.is_empty() {
            return;
        }
        let half = (width / 2.0).max(0.5);
        let reach = half * half;
        let segments: Vec<Line> = if points.len() == 1 {
            vec![Line::new(points[0], points[0])]
        } else {
            points.windows(2).map(|w| Line::new(w[0], w[1])).collect()
        };
        let Some(area) = self.span(bounds_of(points).inflate(half, half)) else {
            return;
        };

        // Each segment only tests pixels near itself; the union is painted once
        // so overlapping joints don't blend twice.
        let mut covered = vec![false; area.len()];
        for segment in &segments {
            let Some(span) = self.span(segment.bounding_box().inflate(half, half)) else {
                continue;
            };
            for y in span.y0..span.y1 {
                for x in span.x0..span.x1 {
                    let index = area.index(x, y);
                    if !covered[index] && segment.nearest(pixel_center(x, y), 1e-9).distance_sq <= reach {
                        covered[index] = true;
                    }
                }
            }
        }

        let color = Rgba::from(color);
        for y in area.y0..area.y1 {
            for x in area.x0..area.x1 {
                if covered[area.index(x, y)] {
                    self.composite(x, y, color, composite);
                }
            }
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let rect = rect.abs();
        self.paint(rect, color.into(), Composite::SourceOver, |p| rect.contains(p));
    }

    fn stroke_rect(&mut self, rect: Rect, width: f64, color: Color) {
        let rect = rect.abs();
        let half = (width / 2.0).max(0.5);
        let outer = rect.inflate(half, half);
        let inner = Rect::new(rect.x0 + half, rect.y0 + half, rect.x1 - half, rect.y1 - half);
        let hollow = inner.width() > 0.0 && inner.height() > 0.0;

        self.paint(outer, color.into(), Composite::SourceOver, |p| {
            outer.contains(p) && !(hollow && inner.contains(p))
        });
    }

    fn fill_circle(&mut self, center: Point, radius: f64, color: Color) {
        let bounds = Rect::from_center_size(center, (radius * 2.0, radius * 2.0));
        let reach = radius * radius;
        self.paint(bounds, color.into(), Composite::SourceOver, |p| (p - center).hypot2() <= reach);
    }

    fn stroke_circle(&mut self, center: Point, radius: f64, width: f64, color: Color) {
        let half = (width / 2.0).max(0.5);
        let extent = (radius + half) * 2.0;
        let bounds = Rect::from_center_size(center, (extent, extent));
        self.paint(bounds, color.into(), Composite::SourceOver, |p| {
            ((p - center).hypot() - radius).abs() <= half
        });
    }

    fn fill_polygon(&mut self, points: &[Point], color: Color) {
        if points.len() < 3 {
            return;
        }
        let mut path = BezPath::new();
        path.move_to(points[0]);
        for point in &points[1..] {
            path.line_to(*point);
        }
        path.close_path();

        let bounds = path.bounding_box();
        self.paint(bounds, color.into(), Composite::SourceOver, |p| path.contains(p));
    }

    /// Glyphs are painted as solid cells; the family is not resolved.
    fn fill_text(&mut self, origin: Point, text: &str, font_size: f64, _font_family: &str, color: Color) {
        let advance = font_size * GLYPH_ADVANCE;
        for (index, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let x0 = origin.x + index as f64 * advance + font_size * 0.05;
            let cell = Rect::new(x0, origin.y - font_size * GLYPH_ASCENT, x0 + font_size * 0.5, origin.y);
            self.fill_rect(cell, color);
        }
    }

    fn draw_image(&mut self, rect: Rect, image: &RgbaImage) {
        let rect = rect.abs();
        let (iw, ih) = image.dimensions();
        if iw == 0 || ih == 0 || rect.width() <= 0.0 || rect.height() <= 0.0 {
            return;
        }

        let Some(span) = self.span(rect) else {
            return;
        };

        // Nearest-neighbour sampling.
        for y in span.y0..span.y1 {
            for x in span.x0..span.x1 {
                let center = pixel_center(x, y);
                if !rect.contains(center) {
                    continue;
                }
                let u = (((center.x - rect.x0) / rect.width()) * iw as f64) as u32;
                let v = (((center.y - rect.y0) / rect.height()) * ih as f64) as u32;
                let texel = image.get_pixel(u.min(iw - 1), v.min(ih - 1)).0;
                let src = Rgba::new(texel[0], texel[1], texel[2], texel[3]);
                blend_over(&mut self.pixels.get_pixel_mut(x, y).0, src);
            }
        }
    }
}

/// Encode RGBA8 pixels as PNG.
pub fn encode_png(rgba_data: &[u8], width: u32, height: u32) -> RenderResult<Vec<u8>> {
    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder
            .write_header()
            .map_err(|e| RendererError::Encode(format!("header: {}", e)))?;
        writer
            .write_image_data(rgba_data)
            .map_err(|e| RendererError::Encode(format!("data: {}", e)))?;
    }
    Ok(png_data)
}
