//! Canonical pixel color.
//!
//! The store has historically held a mix of `#rrggbb`, `#RRGGBB` and
//! `rgb(r, g, b)` strings.  Everything is parsed into [`Color`] at the
//! boundary, so equality is plain value equality and the serialized form is
//! always uppercase `#RRGGBB`.

use std::fmt;
use std::str::FromStr;

use egui::Color32;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::QuiltError;

/// Opaque RGB color.  No alpha channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Color(pub [u8; 3]);

impl Color {
    /// Quilt background (#F5EFEE).
    pub const BACKGROUND: Color = Color([0xF5, 0xEF, 0xEE]);
    /// Fill used for halo cells with no neighbor square.
    pub const HALO_FILL: Color = Color([0xFF, 0xFF, 0xFF]);
    pub const BLACK: Color = Color([0, 0, 0]);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color([r, g, b])
    }

    pub fn r(&self) -> u8 {
        self.0[0]
    }

    pub fn g(&self) -> u8 {
        self.0[1]
    }

    pub fn b(&self) -> u8 {
        self.0[2]
    }

    /// Uppercase `#RRGGBB`.
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.0[0], self.0[1], self.0[2])
    }

    pub fn to_color32(&self) -> Color32 {
        Color32::from_rgb(self.0[0], self.0[1], self.0[2])
    }

    pub fn to_rgba(&self) -> image::Rgba<u8> {
        image::Rgba([self.0[0], self.0[1], self.0[2], 255])
    }

    /// Parse `#RRGGBB`, `#RGB` or `rgb(r, g, b)`.
    pub fn parse(s: &str) -> Result<Self, QuiltError> {
        let trimmed = s.trim();
        if let Some(hex) = trimmed.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| QuiltError::shape(format!("bad hex color '{}'", s)));
        }
        let lower = trimmed.to_ascii_lowercase();
        if let Some(body) = lower.strip_prefix("rgb(").and_then(|b| b.strip_suffix(')')) {
            return parse_rgb_body(body)
                .ok_or_else(|| QuiltError::shape(format!("bad rgb() color '{}'", s)));
        }
        Err(QuiltError::shape(format!("unrecognized color '{}'", s)))
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        6 => {
            let val = u32::from_str_radix(hex, 16).ok()?;
            Some(Color([
                ((val >> 16) & 0xFF) as u8,
                ((val >> 8) & 0xFF) as u8,
                (val & 0xFF) as u8,
            ]))
        }
        3 => {
            // #RGB expands each nibble: #ABC -> #AABBCC
            let val = u16::from_str_radix(hex, 16).ok()?;
            let r = ((val >> 8) & 0xF) as u8;
            let g = ((val >> 4) & 0xF) as u8;
            let b = (val & 0xF) as u8;
            Some(Color([r * 17, g * 17, b * 17]))
        }
        _ => None,
    }
}

fn parse_rgb_body(body: &str) -> Option<Color> {
    let parts: Vec<&str> = body.split(',').collect();
    if parts.len() != 3 {
        return None;
    }
    let r = parts[0].trim().parse::<u8>().ok()?;
    let g = parts[1].trim().parse::<u8>().ok()?;
    let b = parts[2].trim().parse::<u8>().ok()?;
    Some(Color([r, g, b]))
}

impl Default for Color {
    fn default() -> Self {
        Color::BACKGROUND
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.0[0], self.0[1], self.0[2])
    }
}

impl FromStr for Color {
    type Err = QuiltError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::parse(s)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_case_insensitive_and_renders_uppercase() {
        let lower = Color::parse("#f5efee").unwrap();
        let upper = Color::parse("#F5EFEE").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower, Color::BACKGROUND);
        assert_eq!(lower.to_string(), "#F5EFEE");
    }

    #[test]
    fn rgb_function_normalizes_to_hex() {
        let c = Color::parse("rgb(237, 232, 231)").unwrap();
        assert_eq!(c.to_hex(), "#EDE8E7");
        assert_eq!(Color::parse("RGB(0,0,0)").unwrap(), Color::BLACK);
    }

    #[test]
    fn short_hex_expands() {
        assert_eq!(Color::parse("#fff").unwrap(), Color::HALO_FILL);
    }

    #[test]
    fn garbage_is_a_shape_error() {
        assert!(matches!(Color::parse("red"), Err(QuiltError::Shape { .. })));
        assert!(Color::parse("#12345").is_err());
        assert!(Color::parse("rgb(300, 0, 0)").is_err());
        assert!(Color::parse("#GGGGGG").is_err());
    }

    #[test]
    fn serde_uses_canonical_string() {
        let json = serde_json::to_string(&Color::rgb(255, 0, 0)).unwrap();
        assert_eq!(json, "\"#FF0000\"");
        let back: Color = serde_json::from_str("\"rgb(255, 0, 0)\"").unwrap();
        assert_eq!(back, Color::rgb(255, 0, 0));
    }
}
