//! Typeface fonts
//!
//! Fonts come in the typeface JSON layout: a `glyphs` table keyed by character
//! where each glyph has an advance (`ha`) and an outline path (`o`) made of
//! move/line/quadratic/bezier commands in font units.

use std::{collections::HashMap, fmt};

use serde::Deserialize;

use crate::gfx::scene::Geometry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(pub(crate) u32);

impl fmt::Display for FontId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "font#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    /// Horizontal advance in font units
    pub advance: f32,
    /// Number of drawing commands in the outline
    pub outline_commands: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontData {
    pub family: String,
    /// Font units per em
    pub resolution: f32,
    pub glyphs: HashMap<char, Glyph>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypefaceJson {
    glyphs: HashMap<String, GlyphJson>,
    #[serde(default)]
    family_name: String,
    resolution: f32,
}

#[derive(Deserialize)]
struct GlyphJson {
    ha: f32,
    #[serde(default)]
    o: Option<String>,
}

/// Options for turning text into extruded geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextOptions {
    pub size: f32,
    pub depth: f32,
    pub curve_segments: u32,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            size: 0.5,
            depth: 0.2,
            curve_segments: 12,
        }
    }
}

impl FontData {
    pub fn from_typeface_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: TypefaceJson = serde_json::from_str(json)?;
        let glyphs = raw
            .glyphs
            .into_iter()
            .filter_map(|(key, glyph)| {
                let mut chars = key.chars();
                let c = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                let outline_commands = glyph
                    .o
                    .as_deref()
                    .map(|path| {
                        path.split_whitespace()
                            .filter(|token| matches!(*token, "m" | "l" | "q" | "b"))
                            .count() as u32
                    })
                    .unwrap_or(0);
                Some((
                    c,
                    Glyph {
                        advance: glyph.ha,
                        outline_commands,
                    },
                ))
            })
            .collect();

        Ok(Self {
            family: raw.family_name,
            resolution: raw.resolution.max(1.0),
            glyphs,
        })
    }

    fn glyph(&self, c: char) -> Option<&Glyph> {
        self.glyphs.get(&c).or_else(|| self.glyphs.get(&'?'))
    }

    /// Width of `text` at `size` in scene units
    pub fn measure(&self, text: &str, size: f32) -> f32 {
        let scale = size / self.resolution;
        text.chars()
            .filter_map(|c| self.glyph(c))
            .map(|g| g.advance * scale)
            .sum()
    }

    /// Describes `text` as extruded geometry
    pub fn text_geometry(&self, text: &str, options: TextOptions) -> Geometry {
        let outline_segments = text
            .chars()
            .filter_map(|c| self.glyph(c))
            .map(|g| g.outline_commands)
            .sum();
        Geometry::Text {
            text: text.to_string(),
            size: options.size,
            depth: options.depth,
            curve_segments: options.curve_segments.max(1),
            outline_segments,
            width: self.measure(text, options.size),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const TINY_TYPEFACE: &str = r#"{
        "familyName": "Tiny",
        "resolution": 1000,
        "glyphs": {
            "H": { "ha": 800, "o": "m 0 0 l 0 700 l 100 700 l 100 0 z" },
            "i": { "ha": 300, "o": "m 0 0 l 0 500 q 10 510 20 500 l 20 0" },
            " ": { "ha": 250 },
            "?": { "ha": 500, "o": "m 0 0 l 10 10" }
        }
    }"#;

    #[test]
    fn parses_glyph_table() {
        let font = FontData::from_typeface_json(TINY_TYPEFACE).unwrap();
        assert_eq!(font.family, "Tiny");
        assert_eq!(font.glyphs[&'H'].outline_commands, 4);
        assert_eq!(font.glyphs[&' '].outline_commands, 0);
    }

    #[test]
    fn measure_scales_by_resolution() {
        let font = FontData::from_typeface_json(TINY_TYPEFACE).unwrap();
        assert!((font.measure("Hi", 1.0) - 1.1).abs() < 1e-6);
    }

    #[test]
    fn missing_glyphs_fall_back_to_question_mark() {
        let font = FontData::from_typeface_json(TINY_TYPEFACE).unwrap();
        match font.text_geometry("H!", TextOptions::default()) {
            Geometry::Text { outline_segments, .. } => assert_eq!(outline_segments, 4 + 2),
            other => panic!("unexpected geometry {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(FontData::from_typeface_json("{\"glyphs\": 3}").is_err());
    }
}
