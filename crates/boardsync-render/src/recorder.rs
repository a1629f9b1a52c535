//! Surface that records draw calls instead of painting.

use crate::color::Rgba;
use crate::renderer::{Composite, Surface};
use image::RgbaImage;
use kurbo::{Point, Rect};
use peniko::Color;

/// One recorded draw call. Colors are stored as RGBA8.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Background(Rgba),
    Polyline {
        points: Vec<Point>,
        width: f64,
        color: Rgba,
        composite: Composite,
    },
    FillRect {
        rect: Rect,
        color: Rgba,
    },
    StrokeRect {
        rect: Rect,
        width: f64,
        color: Rgba,
    },
    FillCircle {
        center: Point,
        radius: f64,
        color: Rgba,
    },
    StrokeCircle {
        center: Point,
        radius: f64,
        width: f64,
        color: Rgba,
    },
    Polygon {
        points: Vec<Point>,
        color: Rgba,
    },
    Text {
        origin: Point,
        text: String,
        font_size: f64,
        font_family: String,
        color: Rgba,
    },
    Image {
        rect: Rect,
        width: u32,
        height: u32,
    },
}

/// Records every command until [`SceneRecorder::take_commands`] is called.
#[derive(Debug, Clone, Default)]
pub struct SceneRecorder {
    width: u32,
    height: u32,
    commands: Vec<DrawCommand>,
}

impl SceneRecorder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl Surface for SceneRecorder {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fill_background(&mut self, color: Color) {
        self.commands.push(DrawCommand::Background(color.into()));
    }

    fn stroke_polyline(&mut self, points: &[Point], width: f64, color: Color, composite: Composite) {
        self.commands.push(DrawCommand::Polyline {
            points: points.to_vec(),
            width,
            color: color.into(),
            composite,
        });
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.commands.push(DrawCommand::FillRect {
            rect: rect.abs(),
            color: color.into(),
        });
    }

    fn stroke_rect(&mut self, rect: Rect, width: f64, color: Color) {
        self.commands.push(DrawCommand::StrokeRect {
            rect: rect.abs(),
            width,
            color: color.into(),
        });
    }

    fn fill_circle(&mut self, center: Point, radius: f64, color: Color) {
        self.commands.push(DrawCommand::FillCircle {
            center,
            radius,
            color: color.into(),
        });
    }

    fn stroke_circle(&mut self, center: Point, radius: f64, width: f64, color: Color) {
        self.commands.push(DrawCommand::StrokeCircle {
            center,
            radius,
            width,
            color: color.into(),
        });
    }

    fn fill_polygon(&mut self, points: &[Point], color: Color) {
        self.commands.push(DrawCommand::Polygon {
            points: points.to_vec(),
            color: color.into(),
        });
    }

    fn fill_text(&mut self, origin: Point, text: &str, font_size: f64, font_family: &str, color: Color) {
        self.commands.push(DrawCommand::Text {
            origin,
            text: text.to_string(),
            font_size,
            font_family: font_family.to_string(),
            color: color.into(),
        });
    }

    fn draw_image(&mut self, rect: Rect, image: &RgbaImage) {
        self.commands.push(DrawCommand::Image {
            rect: rect.abs(),
            width: image.width(),
            height: image.height(),
        });
    }
}
