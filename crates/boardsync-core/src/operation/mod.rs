//! Operation definitions for the board log.
//!
//! An [`Operation`] is one immutable board mutation. Its JSON form is the wire
//! format shared with the relay server and the board storage service, so every
//! field (including absent optional ones) must survive a round trip.

mod factory;

pub use factory::{
    DEFAULT_ERASER_WIDTH, DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, DEFAULT_STROKE_COLOR,
    DEFAULT_STROKE_WIDTH, OperationFactory, now_millis,
};

use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of an operation.
///
/// Locally created operations use UUID v4 strings, but ids coming from the
/// network are accepted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for OperationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OperationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single entry of the board log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    /// Creation time in milliseconds since the Unix epoch. Only a hint:
    /// log position decides rendering order.
    pub timestamp: u64,
    /// Originating user, absent for system-generated operations.
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(flatten)]
    pub kind: OperationKind,
}

impl Operation {
    /// Serialize to the JSON text used on the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse an operation from wire JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Whether this operation wipes the board.
    pub fn is_clear(&self) -> bool {
        matches!(self.kind, OperationKind::Clear)
    }
}

/// Kind-specific payload, tagged by the `type` field on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OperationKind {
    Draw(PathStroke),
    Erase(PathStroke),
    Rectangle(RectangleShape),
    Circle(CircleShape),
    Line(Segment),
    Arrow(Segment),
    Text(TextLabel),
    Image(ImagePlacement),
    Clear,
    Move(Pan),
}

impl OperationKind {
    /// Wire name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Draw(_) => "draw",
            OperationKind::Erase(_) => "erase",
            OperationKind::Rectangle(_) => "rectangle",
            OperationKind::Circle(_) => "circle",
            OperationKind::Line(_) => "line",
            OperationKind::Arrow(_) => "arrow",
            OperationKind::Text(_) => "text",
            OperationKind::Image(_) => "image",
            OperationKind::Clear => "clear",
            OperationKind::Move(_) => "move",
        }
    }
}

/// Freehand path used by draw and erase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathStroke {
    pub points: Vec<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    pub stroke_width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RectangleShape {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub stroke_color: String,
    pub stroke_width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircleShape {
    /// Center x.
    pub x: f64,
    /// Center y.
    pub y: f64,
    pub radius: f64,
    pub stroke_color: String,
    pub stroke_width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
}

/// Straight segment used by line and arrow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub stroke_color: String,
    pub stroke_width: f64,
}

impl Segment {
    pub fn start(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    pub fn end(&self) -> Point {
        Point::new(self.x2, self.y2)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLabel {
    /// Baseline origin x.
    pub x: f64,
    /// Baseline origin y.
    pub y: f64,
    pub text: String,
    pub font_size: f64,
    pub font_family: String,
    pub text_color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePlacement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Data URL or remote URL.
    pub src: String,
}

/// Viewport pan delta.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pan {
    pub dx: f64,
    pub dy: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roundtrip(op: &Operation) -> Operation {
        let json = op.to_json().unwrap();
        Operation::from_json(&json).unwrap()
    }

    #[test]
    fn test_roundtrip_every_kind() {
        let factory = OperationFactory::new(Some("u1".to_string()));
        let ops = vec![
            factory.draw(vec![Point::new(0.0, 0.0), Point::new(3.5, 4.25)], "#ff0000", 3.0),
            factory.erase(vec![Point::new(1.0, 1.0), Point::new(2.0, 2.0)], 20.0),
            factory.rectangle(1.0, 2.0, -30.0, 40.0, "#000000", 2.0, Some("#00ff00".into())),
            factory.circle(5.0, 5.0, 10.0, "#123456", 1.0, None),
            factory.line(0.0, 0.0, 10.0, 10.0, "#000000", 2.0),
            factory.arrow(0.0, 0.0, 10.0, 0.0, "#000000", 4.0),
            factory.text(10.0, 20.0, "hello", 16.0, "Arial", "#333333"),
            factory.image(0.0, 0.0, 64.0, 32.0, "data:image/png;base64,AAAA"),
            factory.clear(),
            factory.pan(12.0, -4.0),
        ];
        for op in &ops {
            assert_eq!(&roundtrip(op), op, "kind {}", op.kind.name());
        }
    }

    #[test]
    fn test_absent_stroke_color_stays_absent() {
        let op = OperationFactory::anonymous().erase(vec![Point::new(0.0, 0.0)], 20.0);
        let json = op.to_json().unwrap();
        assert!(!json.contains("strokeColor"));
        assert!(!json.contains("userId"));

        let back = roundtrip(&op);
        match back.kind {
            OperationKind::Erase(path) => assert!(path.stroke_color.is_none()),
            other => panic!("Wrong kind: {}", other.name()),
        }
    }

    #[test]
    fn test_present_stroke_color_stays_present() {
        let op = OperationFactory::anonymous().draw(vec![Point::new(0.0, 0.0)], "#abcdef", 2.0);
        let value: serde_json::Value = serde_json::from_str(&op.to_json().unwrap()).unwrap();
        assert_eq!(value["strokeColor"], "#abcdef");
    }

    #[test]
    fn test_wire_field_names() {
        let value = json!({
            "id": "op-1",
            "type": "line",
            "timestamp": 1700000000000u64,
            "userId": "alice",
            "x1": 0, "y1": 1, "x2": 2, "y2": 3,
            "strokeColor": "#000000",
            "strokeWidth": 2
        });
        let op: Operation = serde_json::from_value(value).unwrap();
        assert_eq!(op.id.as_str(), "op-1");
        assert_eq!(op.author_id.as_deref(), Some("alice"));
        match &op.kind {
            OperationKind::Line(seg) => {
                assert_eq!(seg.end(), Point::new(2.0, 3.0));
                assert_eq!(seg.stroke_width, 2.0);
            }
            other => panic!("Wrong kind: {}", other.name()),
        }
    }

    #[test]
    fn test_clear_has_no_payload() {
        let value = json!({ "id": "c", "type": "clear", "timestamp": 5 });
        let op: Operation = serde_json::from_value(value).unwrap();
        assert!(op.is_clear());
        let out: serde_json::Value = serde_json::to_value(&op).unwrap();
        assert_eq!(out, json!({ "id": "c", "type": "clear", "timestamp": 5 }));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result = Operation::from_json(r#"{"id":"x","type":"spray","timestamp":1}"#);
        assert!(result.is_err());
    }
}
