//! CSS color strings as they appear in operations.

use peniko::Color;

/// Background of a blank board.
pub const BACKGROUND: Color = Color::from_rgba8(255, 255, 255, 255);
/// Used when an operation's color can't be parsed.
pub const FALLBACK: Color = Color::from_rgba8(0, 0, 0, 255);

/// Plain RGBA8 value, comparable and hashable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl From<Color> for Rgba {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self::new(rgba.r, rgba.g, rgba.b, rgba.a)
    }
}

impl From<Rgba> for Color {
    fn from(color: Rgba) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Parse a CSS color: `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(..)`, `rgba(..)`
/// or one of a few common names.
pub fn parse_color(s: &str) -> Option<Color> {
    let s = s.trim();

    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }

    let lower = s.to_ascii_lowercase();
    if let Some(args) = lower.strip_prefix("rgba(").or_else(|| lower.strip_prefix("rgb(")) {
        return parse_rgb_args(args.strip_suffix(')')?);
    }

    let named = match lower.as_str() {
        "black" => Rgba::new(0, 0, 0, 255),
        "white" => Rgba::new(255, 255, 255, 255),
        "red" => Rgba::new(255, 0, 0, 255),
        "green" => Rgba::new(0, 128, 0, 255),
        "blue" => Rgba::new(0, 0, 255, 255),
        "yellow" => Rgba::new(255, 255, 0, 255),
        "orange" => Rgba::new(255, 165, 0, 255),
        "purple" => Rgba::new(128, 0, 128, 255),
        "gray" | "grey" => Rgba::new(128, 128, 128, 255),
        "transparent" => Rgba::transparent(),
        _ => return None,
    };
    Some(named.into())
}

/// Like [`parse_color`], falling back to black.
pub fn css_color(s: &str) -> Color {
    parse_color(s).unwrap_or_else(|| {
        log::warn!("Unparsable color {:?}, using black", s);
        FALLBACK
    })
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);

    let rgba = match hex.len() {
        3 => Rgba::new(nibble(0)?, nibble(1)?, nibble(2)?, 255),
        6 => Rgba::new(byte(0)?, byte(2)?, byte(4)?, 255),
        8 => Rgba::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?),
        _ => return None,
    };
    Some(rgba.into())
}

fn parse_rgb_args(args: &str) -> Option<Color> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |s: &str| s.parse::<f64>().ok().map(|v| v.clamp(0.0, 255.0).round() as u8);
    let alpha = match parts.get(3) {
        Some(a) => (a.parse::<f64>().ok()?.clamp(0.0, 1.0) * 255.0).round() as u8,
        None => 255,
    };
    Some(Rgba::new(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?, alpha).into())
}
