use std::collections::HashMap;

use super::ordering::Level;
use super::text::{single_line, wrap_label};
use super::{LayoutNode, NodeBox};
use crate::config::LayoutConfig;
use crate::text_metrics::TextMeasure;

/// A level split into horizontal lanes of boxes. Boxes carry their final x
/// and size; y is assigned later by the compositor.
#[derive(Debug, Clone)]
pub(super) struct PackedLevel {
    pub(super) depth: i32,
    pub(super) lanes: Vec<Vec<NodeBox>>,
}

pub(super) struct PackContext<'a, M: TextMeasure + ?Sized> {
    pub(super) nodes: &'a HashMap<&'a str, &'a LayoutNode>,
    pub(super) root: Option<&'a str>,
    pub(super) width: f32,
    pub(super) font_size: f32,
    pub(super) measure: &'a M,
    pub(super) config: &'a LayoutConfig,
}

impl<M: TextMeasure + ?Sized> PackContext<'_, M> {
    fn available_width(&self) -> f32 {
        (self.width - 2.0 * self.config.margin_x).max(self.config.min_box_width)
    }

    fn line_height(&self) -> f32 {
        self.font_size * self.config.label_line_height
    }

    fn label<'s>(&'s self, id: &'s str) -> &'s str {
        self.nodes
            .get(id)
            .map(|node| node.label.as_str())
            .unwrap_or(id)
    }

    /// Unwrapped label width plus padding.
    fn raw_width(&self, id: &str) -> f32 {
        let text = single_line(self.label(id));
        let measured = self.measure.text_width(&text, self.font_size);
        (measured + 2.0 * self.config.box_pad_x).max(self.config.min_box_width)
    }

    /// Height of a box holding a single line of text.
    pub(super) fn single_box_height(&self) -> f32 {
        self.line_height() + 2.0 * self.config.box_pad_y
    }

    fn make_box(&self, id: &str, column_width: f32, max_lines: usize, lane: usize, depth: i32) -> NodeBox {
        let inner = (column_width - 2.0 * self.config.box_pad_x).max(1.0);
        let lines = wrap_label(self.label(id), inner, self.font_size, self.measure, max_lines);
        let text_width = lines
            .iter()
            .map(|line| self.measure.text_width(line, self.font_size))
            .fold(0.0f32, f32::max);
        let w = (text_width + 2.0 * self.config.box_pad_x)
            .clamp(self.config.min_box_width, column_width.max(self.config.min_box_width));
        let h = lines.len() as f32 * self.line_height() + 2.0 * self.config.box_pad_y;
        NodeBox {
            id: id.to_string(),
            lines,
            x: 0.0,
            y: 0.0,
            w,
            h,
            cx: w / 2.0,
            cy: h / 2.0,
            depth,
            lane,
            is_root: self.root == Some(id),
        }
    }
}

/// Greedy left-to-right lane filling.
///
/// An item joins the current lane while the inflated lane width still fits;
/// the inflation keeps room for the per-lane stagger applied afterwards.
pub(super) fn split_lanes(widths: &[f32], available: f32, gap: f32, offset_factor: f32) -> Vec<Vec<usize>> {
    let inflation = 1.0 + offset_factor.max(0.0);
    let mut lanes: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut content = 0.0f32;
    for (idx, width) in widths.iter().copied().enumerate() {
        if current.is_empty() {
            current.push(idx);
            content = width;
            continue;
        }
        if (content + gap + width) * inflation <= available {
            current.push(idx);
            content += gap + width;
        } else {
            lanes.push(std::mem::take(&mut current));
            current.push(idx);
            content = width;
        }
    }
    if !current.is_empty() {
        lanes.push(current);
    }
    lanes
}

pub(super) fn pack_level<M: TextMeasure + ?Sized>(level: &Level, ctx: &PackContext<'_, M>) -> PackedLevel {
    let config = ctx.config;
    let available = ctx.available_width();
    let gap = config.item_gap;
    let widths: Vec<f32> = level.ids.iter().map(|id| ctx.raw_width(id)).collect();
    let lane_indices = split_lanes(&widths, available, gap, config.lane_offset_factor);

    let max_count = lane_indices.iter().map(Vec::len).max().unwrap_or(1).max(1);
    let usable = available / (1.0 + config.lane_offset_factor.max(0.0));
    let column_width = ((usable - gap * (max_count - 1) as f32) / max_count as f32).clamp(
        config.min_box_width,
        config.max_box_width.max(config.min_box_width),
    );

    let lane_count = lane_indices.len();
    let mut lanes = Vec::with_capacity(lane_count);
    for (lane_idx, indices) in lane_indices.into_iter().enumerate() {
        let mut boxes: Vec<NodeBox> = indices
            .into_iter()
            .map(|idx| {
                ctx.make_box(
                    &level.ids[idx],
                    column_width,
                    config.max_label_lines,
                    lane_idx,
                    level.depth,
                )
            })
            .collect();

        let lane_height = boxes.iter().map(|b| b.h).fold(0.0f32, f32::max);
        let lane_width =
            boxes.iter().map(|b| b.w).sum::<f32>() + gap * boxes.len().saturating_sub(1) as f32;
        let free = ((available - lane_width) / 2.0).max(0.0);
        let stagger = if lane_count > 1 {
            ((lane_idx as f32 - (lane_count - 1) as f32 / 2.0) * config.lane_stagger).clamp(-free, free)
        } else {
            0.0
        };
        let mut x = config.margin_x + free + stagger;
        for b in &mut boxes {
            b.h = lane_height;
            b.set_origin(x, 0.0);
            x += b.w + gap;
        }
        lanes.push(boxes);
    }

    PackedLevel {
        depth: level.depth,
        lanes,
    }
}

/// Lays out a lone root box for the compact "no data" strip.
pub(super) fn pack_single<M: TextMeasure + ?Sized>(id: &str, depth: i32, ctx: &PackContext<'_, M>) -> NodeBox {
    let column_width = ctx
        .raw_width(id)
        .min(ctx.available_width())
        .clamp(ctx.config.min_box_width, ctx.config.max_box_width.max(ctx.config.min_box_width));
    let mut single = ctx.make_box(id, column_width, 1, 0, depth);
    let x = (ctx.width - single.w) / 2.0;
    single.set_origin(x.max(0.0), 0.0);
    single
}
