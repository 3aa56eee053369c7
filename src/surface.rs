//! Drawing backends.
//!
//! The renderer only talks to [`Surface`]. `SvgSurface` produces an SVG
//! document (optionally rasterized to PNG), `RecordingSurface` keeps the raw
//! operation list for headless hosts and tests.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::Result;
use crate::text_metrics::{FontMetrics, TextMeasure};
use crate::theme::Rgba;

/// Minimal path-and-text drawing target.
///
/// Paths are built with `begin_path` and the `*_to` calls, then painted with
/// `fill` or `stroke`. Text is drawn centered on `(x, y)`.
pub trait Surface: TextMeasure {
    fn size(&self) -> (f32, f32);
    fn resize(&mut self, width: f32, height: f32);
    fn clear(&mut self, color: Rgba);
    fn begin_path(&mut self);
    fn move_to(&mut self, x: f32, y: f32);
    fn line_to(&mut self, x: f32, y: f32);
    fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32);
    fn close_path(&mut self);
    fn fill(&mut self, color: Rgba);
    fn stroke(&mut self, color: Rgba, width: f32);
    fn fill_text(&mut self, text: &str, x: f32, y: f32, font_size: f32, color: Rgba);
}

pub struct SvgSurface {
    width: f32,
    height: f32,
    font_family: String,
    metrics: FontMetrics,
    body: String,
    path: String,
}

impl SvgSurface {
    pub fn new(width: f32, height: f32, font_family: &str, fast_text: bool) -> Self {
        Self {
            width,
            height,
            font_family: font_family.to_string(),
            metrics: FontMetrics::new(font_family, fast_text),
            body: String::new(),
            path: String::new(),
        }
    }

    /// Table-driven text widths, no font lookup.
    pub fn with_fallback_metrics(width: f32, height: f32, font_family: &str) -> Self {
        Self::new(width, height, font_family, true)
    }

    pub fn finish(&self) -> String {
        let (w, h) = (self.width, self.height);
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w:.2}\" height=\"{h:.2}\" viewBox=\"0 0 {w:.2} {h:.2}\">{}</svg>",
            self.body
        )
    }
}

impl TextMeasure for SvgSurface {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        self.metrics.text_width(text, font_size)
    }
}

impl Surface for SvgSurface {
    fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    fn clear(&mut self, color: Rgba) {
        self.body.clear();
        self.path.clear();
        let _ = write!(
            self.body,
            "<rect width=\"100%\" height=\"100%\" fill=\"{color}\"/>"
        );
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn move_to(&mut self, x: f32, y: f32) {
        let _ = write!(self.path, "M {x:.2} {y:.2} ");
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let _ = write!(self.path, "L {x:.2} {y:.2} ");
    }

    fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        let _ = write!(self.path, "Q {cx:.2} {cy:.2} {x:.2} {y:.2} ");
    }

    fn close_path(&mut self) {
        self.path.push_str("Z ");
    }

    fn fill(&mut self, color: Rgba) {
        let _ = write!(
            self.body,
            "<path d=\"{}\" fill=\"{color}\" stroke=\"none\"/>",
            self.path.trim_end()
        );
    }

    fn stroke(&mut self, color: Rgba, width: f32) {
        let _ = write!(
            self.body,
            "<path d=\"{}\" fill=\"none\" stroke=\"{color}\" stroke-width=\"{width:.2}\" stroke-linejoin=\"round\" stroke-linecap=\"round\"/>",
            self.path.trim_end()
        );
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, font_size: f32, color: Rgba) {
        let _ = write!(
            self.body,
            "<text x=\"{x:.2}\" y=\"{y:.2}\" text-anchor=\"middle\" dominant-baseline=\"central\" font-family=\"{}\" font-size=\"{font_size}\" fill=\"{color}\">{}</text>",
            escape_xml(&self.font_family),
            escape_xml(text)
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Clear(Rgba),
    BeginPath,
    MoveTo(f32, f32),
    LineTo(f32, f32),
    QuadTo(f32, f32, f32, f32),
    ClosePath,
    Fill(Rgba),
    Stroke(Rgba, f32),
    Text {
        text: String,
        x: f32,
        y: f32,
        font_size: f32,
        color: Rgba,
    },
}

/// Keeps every drawing call. Measures text with the fallback table so
/// results do not depend on installed fonts.
pub struct RecordingSurface {
    width: f32,
    height: f32,
    metrics: FontMetrics,
    ops: Vec<DrawOp>,
}

impl RecordingSurface {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            metrics: FontMetrics::fallback(),
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn stroke_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Stroke(..)))
            .count()
    }
}

impl TextMeasure for RecordingSurface {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        self.metrics.text_width(text, font_size)
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    fn clear(&mut self, color: Rgba) {
        self.ops.clear();
        self.ops.push(DrawOp::Clear(color));
    }

    fn begin_path(&mut self) {
        self.ops.push(DrawOp::BeginPath);
    }

    fn move_to(&mut self, x: f32, y: f32) {
        self.ops.push(DrawOp::MoveTo(x, y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.ops.push(DrawOp::LineTo(x, y));
    }

    fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        self.ops.push(DrawOp::QuadTo(cx, cy, x, y));
    }

    fn close_path(&mut self) {
        self.ops.push(DrawOp::ClosePath);
    }

    fn fill(&mut self, color: Rgba) {
        self.ops.push(DrawOp::Fill(color));
    }

    fn stroke(&mut self, color: Rgba, width: f32) {
        self.ops.push(DrawOp::Stroke(color, width));
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, font_size: f32, color: Rgba) {
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            x,
            y,
            font_size,
            color,
        });
    }
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, font_family: &str) -> Result<()> {
    use crate::error::Error;

    let mut opt = usvg::Options::default();
    opt.font_family = font_family
        .split(',')
        .next()
        .map(|family| family.trim().trim_matches('"').to_string())
        .unwrap_or_else(|| "sans-serif".to_string());
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt).map_err(|err| Error::Raster(err.to_string()))?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| Error::Raster("failed to allocate pixmap".to_string()))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap
        .save_png(output)
        .map_err(|err| Error::Raster(err.to_string()))?;
    Ok(())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn svg_paths_and_text_are_emitted() {
        let mut surface = SvgSurface::with_fallback_metrics(100.0, 40.0, "Inter");
        surface.clear(Rgba::new(255, 255, 255, 1.0));
        surface.begin_path();
        surface.move_to(0.0, 0.0);
        surface.line_to(10.0, 5.0);
        surface.stroke(Rgba::new(0, 0, 0, 1.0), 1.4);
        surface.fill_text("a < b", 50.0, 20.0, 11.0, Rgba::new(0, 0, 0, 1.0));
        let svg = surface.finish();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("d=\"M 0.00 0.00 L 10.00 5.00\""));
        assert!(svg.contains("stroke-width=\"1.40\""));
        assert!(svg.contains("a &lt; b"));
        assert!(svg.contains("viewBox=\"0 0 100.00 40.00\""));
    }

    #[test]
    fn clear_resets_the_document() {
        let mut surface = SvgSurface::with_fallback_metrics(10.0, 10.0, "Inter");
        surface.fill_text("old", 1.0, 1.0, 11.0, Rgba::new(0, 0, 0, 1.0));
        surface.clear(Rgba::new(1, 2, 3, 1.0));
        assert!(!surface.finish().contains("old"));
    }

    #[test]
    fn recording_surface_keeps_operations() {
        let mut surface = RecordingSurface::new(10.0, 10.0);
        surface.clear(Rgba::new(0, 0, 0, 1.0));
        surface.begin_path();
        surface.move_to(1.0, 2.0);
        surface.stroke(Rgba::new(0, 0, 0, 1.0), 2.0);
        surface.fill_text("x", 0.0, 0.0, 11.0, Rgba::new(0, 0, 0, 1.0));
        assert_eq!(surface.ops().len(), 5);
        assert_eq!(surface.texts(), vec!["x"]);
        assert_eq!(surface.stroke_count(), 1);
        surface.resize(20.0, 30.0);
        assert_eq!(surface.size(), (20.0, 30.0));
    }
}
