use serde::Serialize;

use crate::config::Config;
use crate::layout::{EdgeRoute, LayoutResult, NodeBox};
use crate::surface::Surface;
use crate::theme::Rgba;

type Point = (f32, f32);

/// Clickable area of one drawn box.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitRect {
    pub id: String,
    pub nid: Option<u64>,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl HitRect {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.w && y >= self.y && y <= self.y + self.h
    }
}

/// Hit rectangles of one drawing. `generation` identifies the drawing so
/// clicks aimed at an older one can be told apart.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HitMap {
    pub generation: u64,
    pub rects: Vec<HitRect>,
}

impl HitMap {
    /// Topmost rectangle under the point.
    pub fn hit_test(&self, x: f32, y: f32) -> Option<&HitRect> {
        self.rects.iter().rev().find(|rect| rect.contains(x, y))
    }
}

/// Paints a computed layout onto `surface`, resizing it to the layout size.
pub fn draw_layout<S: Surface + ?Sized>(
    layout: &LayoutResult,
    surface: &mut S,
    config: &Config,
    generation: u64,
) -> HitMap {
    let theme = &config.theme;
    let style = &config.render;
    surface.resize(layout.width, layout.height);
    surface.clear(theme.background());

    let mut hits = HitMap {
        generation,
        rects: Vec::new(),
    };
    if layout.boxes.is_empty() {
        surface.fill_text(
            &style.empty_message,
            layout.width / 2.0,
            layout.height / 2.0,
            theme.font_size,
            theme.muted_text(),
        );
        return hits;
    }

    for trunk in &layout.routed.trunks {
        surface.begin_path();
        surface.move_to(trunk.from.0, trunk.from.1);
        surface.line_to(trunk.to.0, trunk.to.1);
        surface.stroke(trunk.color, style.line_width);
    }

    let arrow_len = (style.line_width * style.arrow_scale).max(5.0);
    for route in &layout.routed.routes {
        draw_branch(surface, route, style.corner_radius, style.line_width, arrow_len);
    }

    for (fork, trunk) in layout.routed.forks.iter().zip(&layout.routed.trunks) {
        draw_dot(surface, *fork, style.dot_radius, trunk.color);
    }
    for join in &layout.routed.joins {
        draw_dot(surface, *join, style.dot_radius, theme.line());
    }

    for node in &layout.nodes {
        let Some(b) = layout.boxes.get(&node.id) else {
            continue;
        };
        rounded_rect(surface, b.x, b.y, b.w, b.h, style.box_radius);
        surface.fill(node.color.with_alpha(style.box_fill_alpha));
        rounded_rect(surface, b.x, b.y, b.w, b.h, style.box_radius);
        surface.stroke(node.color, style.box_stroke_width);
        if b.is_root {
            let gap = style.root_outline_gap;
            rounded_rect(
                surface,
                b.x - gap,
                b.y - gap,
                b.w + 2.0 * gap,
                b.h + 2.0 * gap,
                style.box_radius + gap,
            );
            surface.stroke(theme.root_outline(), style.root_outline_width);
        }
        hits.rects.push(HitRect {
            id: b.id.clone(),
            nid: node.nid,
            x: b.x,
            y: b.y,
            w: b.w,
            h: b.h,
        });
    }

    let line_height = theme.font_size * config.layout.label_line_height;
    for b in layout.boxes.values() {
        draw_label(surface, b, theme.font_size, line_height, theme.text());
    }

    hits
}

fn draw_label<S: Surface + ?Sized>(
    surface: &mut S,
    b: &NodeBox,
    font_size: f32,
    line_height: f32,
    color: Rgba,
) {
    let first = b.cy - (b.lines.len().saturating_sub(1)) as f32 * line_height / 2.0;
    for (idx, line) in b.lines.iter().enumerate() {
        surface.fill_text(line, b.cx, first + idx as f32 * line_height, font_size, color);
    }
}

fn draw_branch<S: Surface + ?Sized>(
    surface: &mut S,
    route: &EdgeRoute,
    radius: f32,
    line_width: f32,
    arrow_len: f32,
) {
    let points = route.branch();
    if points.len() < 2 {
        return;
    }
    let tip = points[points.len() - 1];
    let before = points[points.len() - 2];
    let dir = unit(before, tip);

    // Stop the line under the arrowhead so the tip stays sharp.
    let last_len = distance(before, tip);
    let end = if last_len > arrow_len {
        (tip.0 - dir.0 * arrow_len * 0.8, tip.1 - dir.1 * arrow_len * 0.8)
    } else {
        tip
    };

    surface.begin_path();
    surface.move_to(points[0].0, points[0].1);
    for idx in 1..points.len() - 1 {
        let prev = points[idx - 1];
        let corner = points[idx];
        let next = if idx + 1 == points.len() - 1 {
            end
        } else {
            points[idx + 1]
        };
        let r = radius
            .min(distance(prev, corner) / 2.0)
            .min(distance(corner, next) / 2.0);
        let into = unit(prev, corner);
        let out = unit(corner, next);
        let turn = into.0 * out.1 - into.1 * out.0;
        if r < 0.5 || turn.abs() < 1e-3 {
            surface.line_to(corner.0, corner.1);
            continue;
        }
        surface.line_to(corner.0 - into.0 * r, corner.1 - into.1 * r);
        surface.quad_to(corner.0, corner.1, corner.0 + out.0 * r, corner.1 + out.1 * r);
    }
    surface.line_to(end.0, end.1);
    surface.stroke(route.color, line_width);

    let half = arrow_len * 0.45;
    let base = (tip.0 - dir.0 * arrow_len, tip.1 - dir.1 * arrow_len);
    let normal = (-dir.1, dir.0);
    surface.begin_path();
    surface.move_to(tip.0, tip.1);
    surface.line_to(base.0 + normal.0 * half, base.1 + normal.1 * half);
    surface.line_to(base.0 - normal.0 * half, base.1 - normal.1 * half);
    surface.close_path();
    surface.fill(route.color);
}

fn draw_dot<S: Surface + ?Sized>(surface: &mut S, center: Point, radius: f32, color: Rgba) {
    let (cx, cy) = center;
    surface.begin_path();
    surface.move_to(cx + radius, cy);
    surface.quad_to(cx + radius, cy + radius, cx, cy + radius);
    surface.quad_to(cx - radius, cy + radius, cx - radius, cy);
    surface.quad_to(cx - radius, cy - radius, cx, cy - radius);
    surface.quad_to(cx + radius, cy - radius, cx + radius, cy);
    surface.close_path();
    surface.fill(color);
}

fn rounded_rect<S: Surface + ?Sized>(surface: &mut S, x: f32, y: f32, w: f32, h: f32, radius: f32) {
    let r = radius.min(w / 2.0).min(h / 2.0).max(0.0);
    surface.begin_path();
    surface.move_to(x + r, y);
    surface.line_to(x + w - r, y);
    surface.quad_to(x + w, y, x + w, y + r);
    surface.line_to(x + w, y + h - r);
    surface.quad_to(x + w, y + h, x + w - r, y + h);
    surface.line_to(x + r, y + h);
    surface.quad_to(x, y + h, x, y + h - r);
    surface.line_to(x, y + r);
    surface.quad_to(x, y, x + r, y);
    surface.close_path();
}

fn distance(a: Point, b: Point) -> f32 {
    ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt()
}

fn unit(from: Point, to: Point) -> Point {
    let len = distance(from, to);
    if len <= f32::EPSILON {
        return (0.0, 1.0);
    }
    ((to.0 - from.0) / len, (to.1 - from.1) / len)
}
