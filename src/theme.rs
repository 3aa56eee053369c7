use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::layout::LayoutNode;

static HEX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$").unwrap());
static FUNC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^rgba?\(\s*([\d.]+)\s*,\s*([\d.]+)\s*,\s*([\d.]+)\s*(?:,\s*([\d.]+)\s*)?\)$")
        .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self {
            a: a.clamp(0.0, 1.0),
            ..self
        }
    }

    /// Parses `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(..)` and `rgba(..)`.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if let Some(caps) = HEX_RE.captures(trimmed) {
            let hex = caps.get(1)?.as_str();
            let expanded: String = if hex.len() == 3 {
                hex.chars().flat_map(|ch| [ch, ch]).collect()
            } else {
                hex.to_string()
            };
            let channel = |idx: usize| u8::from_str_radix(&expanded[idx..idx + 2], 16).ok();
            let a = if expanded.len() == 8 {
                channel(6)? as f32 / 255.0
            } else {
                1.0
            };
            return Some(Self::new(channel(0)?, channel(2)?, channel(4)?, a));
        }
        let lowered = trimmed.to_ascii_lowercase();
        let caps = FUNC_RE.captures(&lowered)?;
        let channel = |idx: usize| -> Option<u8> {
            let value: f32 = caps.get(idx)?.as_str().parse().ok()?;
            Some(value.round().clamp(0.0, 255.0) as u8)
        };
        let a = match caps.get(4) {
            Some(m) => m.as_str().parse::<f32>().ok()?.clamp(0.0, 1.0),
            None => 1.0,
        };
        Some(Self::new(channel(1)?, channel(2)?, channel(3)?, a))
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alpha = (self.a * 1000.0).round() / 1000.0;
        write!(f, "rgba({},{},{},{})", self.r, self.g, self.b, alpha)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub text_color: String,
    pub muted_text_color: String,
    pub line_color: String,
    pub node_color: String,
    pub root_outline_color: String,
    pub background: String,
}

impl Theme {
    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 11.0,
            text_color: "#1C2430".to_string(),
            muted_text_color: "#7A8AA6".to_string(),
            line_color: "#7A8AA6".to_string(),
            node_color: "#5B8DEF".to_string(),
            root_outline_color: "#F2A33A".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn dark() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 11.0,
            text_color: "#E6EAF2".to_string(),
            muted_text_color: "#8893A8".to_string(),
            line_color: "#8893A8".to_string(),
            node_color: "#6E9CF5".to_string(),
            root_outline_color: "#FFC46B".to_string(),
            background: "#161A22".to_string(),
        }
    }

    fn color_or(&self, raw: &str, fallback: Rgba) -> Rgba {
        Rgba::parse(raw).unwrap_or(fallback)
    }

    pub fn text(&self) -> Rgba {
        self.color_or(&self.text_color, Rgba::new(28, 36, 48, 1.0))
    }

    pub fn muted_text(&self) -> Rgba {
        self.color_or(&self.muted_text_color, Rgba::new(122, 138, 166, 1.0))
    }

    pub fn line(&self) -> Rgba {
        self.color_or(&self.line_color, Rgba::new(122, 138, 166, 1.0))
    }

    pub fn node(&self) -> Rgba {
        self.color_or(&self.node_color, Rgba::new(91, 141, 239, 1.0))
    }

    pub fn root_outline(&self) -> Rgba {
        self.color_or(&self.root_outline_color, Rgba::new(242, 163, 58, 1.0))
    }

    pub fn background(&self) -> Rgba {
        self.color_or(&self.background, Rgba::new(255, 255, 255, 1.0))
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::modern()
    }
}

/// Host-side color policy for nodes and edges.
pub trait ColorResolver {
    fn node_color(&self, raw: Option<&str>) -> Rgba;
    fn edge_color(&self, source: &LayoutNode) -> Rgba;
}

/// Resolves payload colors, falling back to the theme palette.
#[derive(Debug, Clone)]
pub struct ThemeColors {
    node: Rgba,
    line: Rgba,
}

impl ThemeColors {
    pub fn new(theme: &Theme) -> Self {
        Self {
            node: theme.node(),
            line: theme.line(),
        }
    }
}

impl ColorResolver for ThemeColors {
    fn node_color(&self, raw: Option<&str>) -> Rgba {
        raw.and_then(Rgba::parse).unwrap_or(self.node)
    }

    fn edge_color(&self, source: &LayoutNode) -> Rgba {
        if source.color == self.node {
            self.line
        } else {
            source.color.with_alpha(0.85)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_forms() {
        assert_eq!(Rgba::parse("#fff"), Some(Rgba::new(255, 255, 255, 1.0)));
        assert_eq!(Rgba::parse("#102030"), Some(Rgba::new(16, 32, 48, 1.0)));
        let with_alpha = Rgba::parse("#10203080").unwrap();
        assert!((with_alpha.a - 128.0 / 255.0).abs() < 1e-4);
    }

    #[test]
    fn parses_functional_forms() {
        assert_eq!(Rgba::parse("rgb(1, 2, 3)"), Some(Rgba::new(1, 2, 3, 1.0)));
        assert_eq!(
            Rgba::parse("RGBA(10,20,30,0.5)"),
            Some(Rgba::new(10, 20, 30, 0.5))
        );
        assert_eq!(Rgba::parse("rgb(300, 0, 0)"), Some(Rgba::new(255, 0, 0, 1.0)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(Rgba::parse("blue-ish"), None);
        assert_eq!(Rgba::parse("#12"), None);
        assert_eq!(Rgba::parse(""), None);
    }

    #[test]
    fn display_is_rgba_string() {
        assert_eq!(Rgba::new(1, 2, 3, 0.25).to_string(), "rgba(1,2,3,0.25)");
    }

    #[test]
    fn theme_colors_fall_back_to_palette() {
        let theme = Theme::modern();
        let colors = ThemeColors::new(&theme);
        assert_eq!(colors.node_color(None), theme.node());
        assert_eq!(colors.node_color(Some("nope")), theme.node());
        assert_eq!(colors.node_color(Some("#000")), Rgba::new(0, 0, 0, 1.0));
    }
}
