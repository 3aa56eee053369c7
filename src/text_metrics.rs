//! Text width measurement.
//!
//! `FontMetrics` resolves a CSS-like font stack through fontdb and reads
//! horizontal advances with ttf-parser. When no face can be loaded, or when
//! fast metrics are requested, a calibrated per-character table is used.

use fontdb::{Database, Family, ID, Query, Stretch, Style, Weight};
use ttf_parser::Face;

/// Width of `text` rendered at `font_size`.
pub trait TextMeasure {
    fn text_width(&self, text: &str, font_size: f32) -> f32;
}

pub struct FontMetrics {
    face: Option<LoadedFace>,
}

impl FontMetrics {
    pub fn new(font_family: &str, fast: bool) -> Self {
        let face = if fast { None } else { load_face(font_family) };
        if face.is_none() && !fast {
            tracing::debug!(font_family, "no font face resolved, using fallback widths");
        }
        Self { face }
    }

    /// Table-driven metrics only; deterministic across machines.
    pub fn fallback() -> Self {
        Self { face: None }
    }
}

impl TextMeasure for FontMetrics {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        if text.is_empty() || font_size <= 0.0 {
            return 0.0;
        }
        match &self.face {
            Some(face) => face.measure(text, font_size),
            None => fallback_text_width(text, font_size),
        }
    }
}

struct LoadedFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: u16,
    ascii_advances: [u16; 128],
}

impl LoadedFace {
    fn parse(data: Vec<u8>, index: u32) -> Option<Self> {
        let (units_per_em, ascii_advances) = {
            let face = Face::parse(&data, index).ok()?;
            let mut advances = [0u16; 128];
            for byte in 0u8..=127 {
                if let Some(glyph) = face.glyph_index(byte as char) {
                    advances[byte as usize] = face.glyph_hor_advance(glyph).unwrap_or(0);
                }
            }
            (face.units_per_em().max(1), advances)
        };
        Some(Self {
            data,
            index,
            units_per_em,
            ascii_advances,
        })
    }

    fn measure(&self, text: &str, font_size: f32) -> f32 {
        let scale = font_size / self.units_per_em as f32;
        let fallback = font_size * 0.56;
        let mut face: Option<Face<'_>> = None;
        let mut width = 0.0f32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            let advance = if ch.is_ascii() {
                self.ascii_advances[ch as usize]
            } else {
                if face.is_none() {
                    face = Face::parse(&self.data, self.index).ok();
                }
                face.as_ref()
                    .and_then(|parsed| {
                        let glyph = parsed.glyph_index(ch)?;
                        parsed.glyph_hor_advance(glyph)
                    })
                    .unwrap_or(0)
            };
            if advance == 0 {
                width += fallback;
            } else {
                width += advance as f32 * scale;
            }
        }
        width.max(0.0)
    }
}

fn load_face(font_family: &str) -> Option<LoadedFace> {
    let mut names: Vec<String> = Vec::new();
    let mut generics: Vec<Option<Family<'static>>> = Vec::new();
    for part in font_family.split(',') {
        let raw = part.trim().trim_matches('"').trim_matches('\'');
        if raw.is_empty() {
            continue;
        }
        let generic = match raw.to_ascii_lowercase().as_str() {
            "serif" => Some(Family::Serif),
            "sans-serif" | "system-ui" | "-apple-system" | "ui-sans-serif" => {
                Some(Family::SansSerif)
            }
            "monospace" | "ui-monospace" => Some(Family::Monospace),
            "cursive" => Some(Family::Cursive),
            "fantasy" => Some(Family::Fantasy),
            _ => None,
        };
        if generic.is_none() {
            names.push(raw.to_string());
        }
        generics.push(generic);
    }

    let mut families: Vec<Family<'_>> = Vec::new();
    let mut name_iter = names.iter();
    for generic in generics {
        match generic {
            Some(family) => families.push(family),
            None => {
                if let Some(name) = name_iter.next() {
                    families.push(Family::Name(name.as_str()));
                }
            }
        }
    }
    if families.is_empty() {
        families.push(Family::SansSerif);
    }

    let mut db = Database::new();
    db.load_system_fonts();
    let query = Query {
        families: &families,
        weight: Weight::NORMAL,
        stretch: Stretch::Normal,
        style: Style::Normal,
    };
    let id: ID = db.query(&query)?;
    let mut loaded = None;
    db.with_face_data(id, |data, index| {
        loaded = LoadedFace::parse(data.to_vec(), index);
    });
    loaded
}

pub fn fallback_text_width(text: &str, font_size: f32) -> f32 {
    text.chars()
        .filter(|ch| *ch != '\n')
        .map(char_width_factor)
        .sum::<f32>()
        * font_size
}

pub fn char_width_factor(ch: char) -> f32 {
    // Advance widths relative to the font size for a typical sans-serif face.
    match ch {
        ' ' => 0.306,
        '\\' | '.' | ',' | ':' | ';' | '|' | '!' | '(' | ')' | '[' | ']' | '{' | '}' => 0.321,
        'I' | 'i' | 'j' | 'l' => 0.25,
        'f' | 'r' | 't' => 0.34,
        'M' | 'W' => 0.93,
        'm' | 'w' => 0.84,
        'A'..='Z' => 0.66,
        'a'..='z' => 0.56,
        '0'..='9' => 0.6,
        '@' | '#' | '%' | '&' => 0.946,
        '-' | '_' => 0.45,
        c if c.is_ascii() => 0.5,
        // CJK and other wide glyphs
        c if c as u32 >= 0x2E80 => 1.0,
        _ => 0.6,
    }
}
