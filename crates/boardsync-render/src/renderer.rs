//! Renderer abstraction and operation replay.

use crate::color::{BACKGROUND, css_color};
use crate::images::{ImageCache, ImageState};
use boardsync_core::operation::{
    CircleShape, ImagePlacement, Operation, OperationKind, PathStroke, RectangleShape, Segment, TextLabel,
};
use image::RgbaImage;
use kurbo::{Point, Rect, Vec2};
use peniko::Color;
use std::f64::consts::FRAC_PI_6;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Surface error: {0}")]
    Surface(String),
    #[error("Image decode failed: {0}")]
    Decode(String),
    #[error("PNG encode failed: {0}")]
    Encode(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// How painted pixels combine with what is already there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Composite {
    #[default]
    SourceOver,
    /// Clears covered pixels to transparent.
    DestinationOut,
}

/// Drawing target for replays.
///
/// Geometry is in board coordinates. Rectangles may arrive with negative
/// extents; surfaces normalize them.
pub trait Surface {
    /// Surface size in pixels.
    fn size(&self) -> (u32, u32);

    /// Wipe everything to `color`.
    fn fill_background(&mut self, color: Color);

    /// Polyline with round caps and joins.
    fn stroke_polyline(&mut self, points: &[Point], width: f64, color: Color, composite: Composite);

    fn fill_rect(&mut self, rect: Rect, color: Color);

    fn stroke_rect(&mut self, rect: Rect, width: f64, color: Color);

    fn fill_circle(&mut self, center: Point, radius: f64, color: Color);

    fn stroke_circle(&mut self, center: Point, radius: f64, width: f64, color: Color);

    /// Closed, filled polygon.
    fn fill_polygon(&mut self, points: &[Point], color: Color);

    /// Text with its baseline starting at `origin`.
    fn fill_text(&mut self, origin: Point, text: &str, font_size: f64, font_family: &str, color: Color);

    /// Draw a decoded image scaled into `rect`.
    fn draw_image(&mut self, rect: Rect, image: &RgbaImage);
}

/// Summary of one replay.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderOutcome {
    /// Operations replayed.
    pub replayed: usize,
    /// Image operations skipped because their decode hasn't finished.
    pub pending_images: usize,
    /// Accumulated pan from move operations, a viewport suggestion only.
    pub pan: Vec2,
}

/// Replays operation logs onto a [`Surface`].
///
/// Output is a pure function of the operations, except for images: the first
/// replay that meets an image starts decoding it and skips it, and a later
/// replay draws it once [`ImageCache::poll`] reports it ready.
pub struct Renderer {
    background: Color,
    images: ImageCache,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            background: BACKGROUND,
            images: ImageCache::new(),
        }
    }

    /// Set the background color.
    pub fn with_background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn images(&self) -> &ImageCache {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut ImageCache {
        &mut self.images
    }

    /// Clear the surface and replay `operations` in order.
    pub fn render<'a, S, I>(&mut self, surface: &mut S, operations: I) -> RenderOutcome
    where
        S: Surface + ?Sized,
        I: IntoIterator<Item = &'a Operation>,
    {
        surface.fill_background(self.background);

        let mut outcome = RenderOutcome::default();
        for operation in operations {
            self.render_operation(surface, operation, &mut outcome);
            outcome.replayed += 1;
        }
        outcome
    }

    fn render_operation<S: Surface + ?Sized>(&mut self, surface: &mut S, operation: &Operation, outcome: &mut RenderOutcome) {
        match &operation.kind {
            OperationKind::Draw(stroke) => render_draw(surface, stroke),
            OperationKind::Erase(stroke) => render_erase(surface, stroke),
            OperationKind::Rectangle(rect) => render_rectangle(surface, rect),
            OperationKind::Circle(circle) => render_circle(surface, circle),
            OperationKind::Line(segment) => render_line(surface, segment),
            OperationKind::Arrow(segment) => render_arrow(surface, segment),
            OperationKind::Text(label) => render_text(surface, label),
            OperationKind::Image(placement) => {
                if !self.render_image(surface, placement) {
                    outcome.pending_images += 1;
                }
            }
            OperationKind::Clear => surface.fill_background(self.background),
            OperationKind::Move(pan) => outcome.pan += Vec2::new(pan.dx, pan.dy),
        }
    }

    /// Returns false while the image is still decoding.
    fn render_image<S: Surface + ?Sized>(&mut self, surface: &mut S, placement: &ImagePlacement) -> bool {
        let rect = Rect::new(
            placement.x,
            placement.y,
            placement.x + placement.width,
            placement.y + placement.height,
        )
        .abs();

        match self.images.request(&placement.src) {
            ImageState::Loading => false,
            ImageState::Ready(image) => {
                surface.draw_image(rect, &image);
                true
            }
            ImageState::Failed => {
                render_image_placeholder(surface, rect);
                true
            }
        }
    }
}

fn stroke_color(color: Option<&str>) -> Color {
    color.map(css_color).unwrap_or(crate::color::FALLBACK)
}

fn render_draw<S: Surface + ?Sized>(surface: &mut S, stroke: &PathStroke) {
    if stroke.points.len() < 2 {
        return;
    }
    let color = stroke_color(stroke.stroke_color.as_deref());
    surface.stroke_polyline(&stroke.points, stroke.stroke_width, color, Composite::SourceOver);
}

fn render_erase<S: Surface + ?Sized>(surface: &mut S, stroke: &PathStroke) {
    if stroke.points.len() < 2 {
        return;
    }
    surface.stroke_polyline(&stroke.points, stroke.stroke_width, crate::color::FALLBACK, Composite::DestinationOut);
}

fn render_rectangle<S: Surface + ?Sized>(surface: &mut S, shape: &RectangleShape) {
    let rect = Rect::new(shape.x, shape.y, shape.x + shape.width, shape.y + shape.height);
    if let Some(fill) = shape.fill_color.as_deref() {
        surface.fill_rect(rect, css_color(fill));
    }
    surface.stroke_rect(rect, shape.stroke_width, css_color(&shape.stroke_color));
}

fn render_circle<S: Surface + ?Sized>(surface: &mut S, shape: &CircleShape) {
    let center = Point::new(shape.x, shape.y);
    let radius = shape.radius.abs();
    if let Some(fill) = shape.fill_color.as_deref() {
        surface.fill_circle(center, radius, css_color(fill));
    }
    surface.stroke_circle(center, radius, shape.stroke_width, css_color(&shape.stroke_color));
}

fn render_line<S: Surface + ?Sized>(surface: &mut S, segment: &Segment) {
    surface.stroke_polyline(
        &[segment.start(), segment.end()],
        segment.stroke_width,
        css_color(&segment.stroke_color),
        Composite::SourceOver,
    );
}

fn render_arrow<S: Surface + ?Sized>(surface: &mut S, segment: &Segment) {
    let color = css_color(&segment.stroke_color);
    surface.stroke_polyline(
        &[segment.start(), segment.end()],
        segment.stroke_width,
        color,
        Composite::SourceOver,
    );
    surface.fill_polygon(&arrow_head(segment), color);
}

/// Triangle at the segment end: length `10 + strokeWidth`, 30 degrees either
/// side of the shaft.
pub fn arrow_head(segment: &Segment) -> [Point; 3] {
    let tip = segment.end();
    let angle = (tip - segment.start()).atan2();
    let length = 10.0 + segment.stroke_width;
    let wing = |offset: f64| tip - Vec2::from_angle(angle + offset) * length;
    [tip, wing(-FRAC_PI_6), wing(FRAC_PI_6)]
}

fn render_text<S: Surface + ?Sized>(surface: &mut S, label: &TextLabel) {
    if label.text.is_empty() {
        return;
    }
    surface.fill_text(
        Point::new(label.x, label.y),
        &label.text,
        label.font_size,
        &label.font_family,
        css_color(&label.text_color),
    );
}

/// Gray box with a cross for images that can't be shown.
fn render_image_placeholder<S: Surface + ?Sized>(surface: &mut S, rect: Rect) {
    surface.fill_rect(rect, Color::from_rgba8(200, 200, 200, 255));
    let cross = Color::from_rgba8(150, 150, 150, 255);
    surface.stroke_polyline(
        &[Point::new(rect.x0, rect.y0), Point::new(rect.x1, rect.y1)],
        2.0,
        cross,
        Composite::SourceOver,
    );
    surface.stroke_polyline(
        &[Point::new(rect.x1, rect.y0), Point::new(rect.x0, rect.y1)],
        2.0,
        cross,
        Composite::SourceOver,
    );
    surface.stroke_rect(rect, 2.0, Color::from_rgba8(100, 100, 100, 255));
}
