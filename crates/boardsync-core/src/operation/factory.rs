//! Constructors for well-formed operations.

use super::{
    CircleShape, ImagePlacement, Operation, OperationId, OperationKind, Pan, PathStroke,
    RectangleShape, Segment, TextLabel,
};
use kurbo::Point;
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_STROKE_COLOR: &str = "#000000";
pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;
pub const DEFAULT_ERASER_WIDTH: f64 = 20.0;
pub const DEFAULT_FONT_SIZE: f64 = 16.0;
pub const DEFAULT_FONT_FAMILY: &str = "Arial";

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Builds operations stamped with a fresh id, the current time and the
/// configured author.
///
/// Geometry is never validated: a rectangle with negative width is passed
/// through as-is, like the wire format allows.
#[derive(Debug, Clone, Default)]
pub struct OperationFactory {
    author_id: Option<String>,
}

impl OperationFactory {
    pub fn new(author_id: Option<String>) -> Self {
        Self { author_id }
    }

    /// Factory for system-generated operations (no author).
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn author_id(&self) -> Option<&str> {
        self.author_id.as_deref()
    }

    /// Wrap a payload into a new operation.
    pub fn build(&self, kind: OperationKind) -> Operation {
        Operation {
            id: OperationId::new(),
            timestamp: now_millis(),
            author_id: self.author_id.clone(),
            kind,
        }
    }

    pub fn draw(&self, points: Vec<Point>, stroke_color: &str, stroke_width: f64) -> Operation {
        self.build(OperationKind::Draw(PathStroke {
            points,
            stroke_color: Some(stroke_color.to_string()),
            stroke_width,
        }))
    }

    /// Eraser strokes carry no color.
    pub fn erase(&self, points: Vec<Point>, stroke_width: f64) -> Operation {
        self.build(OperationKind::Erase(PathStroke {
            points,
            stroke_color: None,
            stroke_width,
        }))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn rectangle(
        &self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        stroke_color: &str,
        stroke_width: f64,
        fill_color: Option<String>,
    ) -> Operation {
        self.build(OperationKind::Rectangle(RectangleShape {
            x,
            y,
            width,
            height,
            stroke_color: stroke_color.to_string(),
            stroke_width,
            fill_color,
        }))
    }

    pub fn circle(
        &self,
        x: f64,
        y: f64,
        radius: f64,
        stroke_color: &str,
        stroke_width: f64,
        fill_color: Option<String>,
    ) -> Operation {
        self.build(OperationKind::Circle(CircleShape {
            x,
            y,
            radius,
            stroke_color: stroke_color.to_string(),
            stroke_width,
            fill_color,
        }))
    }

    pub fn line(&self, x1: f64, y1: f64, x2: f64, y2: f64, stroke_color: &str, stroke_width: f64) -> Operation {
        self.build(OperationKind::Line(Segment {
            x1,
            y1,
            x2,
            y2,
            stroke_color: stroke_color.to_string(),
            stroke_width,
        }))
    }

    pub fn arrow(&self, x1: f64, y1: f64, x2: f64, y2: f64, stroke_color: &str, stroke_width: f64) -> Operation {
        self.build(OperationKind::Arrow(Segment {
            x1,
            y1,
            x2,
            y2,
            stroke_color: stroke_color.to_string(),
            stroke_width,
        }))
    }

    pub fn text(
        &self,
        x: f64,
        y: f64,
        text: &str,
        font_size: f64,
        font_family: &str,
        text_color: &str,
    ) -> Operation {
        self.build(OperationKind::Text(TextLabel {
            x,
            y,
            text: text.to_string(),
            font_size,
            font_family: font_family.to_string(),
            text_color: text_color.to_string(),
        }))
    }

    pub fn image(&self, x: f64, y: f64, width: f64, height: f64, src: &str) -> Operation {
        self.build(OperationKind::Image(ImagePlacement {
            x,
            y,
            width,
            height,
            src: src.to_string(),
        }))
    }

    pub fn clear(&self) -> Operation {
        self.build(OperationKind::Clear)
    }

    pub fn pan(&self, dx: f64, dy: f64) -> Operation {
        self.build(OperationKind::Move(Pan { dx, dy }))
    }

    // --- Tool defaults ---

    /// Pen stroke with the default black 2px style.
    pub fn default_draw(&self, points: Vec<Point>) -> Operation {
        self.draw(points, DEFAULT_STROKE_COLOR, DEFAULT_STROKE_WIDTH)
    }

    pub fn default_erase(&self, points: Vec<Point>) -> Operation {
        self.erase(points, DEFAULT_ERASER_WIDTH)
    }

    /// Text in the default 16px Arial, black.
    pub fn default_text(&self, x: f64, y: f64, text: &str) -> Operation {
        self.text(x, y, text, DEFAULT_FONT_SIZE, DEFAULT_FONT_FAMILY, DEFAULT_STROKE_COLOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let factory = OperationFactory::anonymous();
        let a = factory.clear();
        let b = factory.clear();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_author_is_stamped() {
        let factory = OperationFactory::new(Some("bob".into()));
        let op = factory.pan(1.0, 2.0);
        assert_eq!(op.author_id.as_deref(), Some("bob"));
        assert!(op.timestamp > 0);
        assert!(OperationFactory::anonymous().clear().author_id.is_none());
    }

    #[test]
    fn test_geometry_not_validated() {
        let op = OperationFactory::anonymous().rectangle(0.0, 0.0, -10.0, -5.0, "#000000", 2.0, None);
        match op.kind {
            OperationKind::Rectangle(rect) => {
                assert_eq!(rect.width, -10.0);
                assert_eq!(rect.height, -5.0);
            }
            other => panic!("Wrong kind: {}", other.name()),
        }
    }

    #[test]
    fn test_defaults() {
        let factory = OperationFactory::anonymous();
        match factory.default_erase(vec![]).kind {
            OperationKind::Erase(path) => {
                assert_eq!(path.stroke_width, DEFAULT_ERASER_WIDTH);
                assert!(path.stroke_color.is_none());
            }
            other => panic!("Wrong kind: {}", other.name()),
        }
        match factory.default_text(1.0, 2.0, "hi").kind {
            OperationKind::Text(label) => {
                assert_eq!(label.font_size, 16.0);
                assert_eq!(label.font_family, "Arial");
            }
            other => panic!("Wrong kind: {}", other.name()),
        }
    }
}
