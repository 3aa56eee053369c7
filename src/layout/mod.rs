mod compose;
mod depth;
mod ordering;
mod packing;
mod routing;
mod text;
pub(crate) mod types;
pub use types::*;

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::LayoutConfig;
use crate::payload::NormalizedPayload;
use crate::text_metrics::TextMeasure;
use crate::theme::{ColorResolver, Theme};
use compose::compose;
use depth::{Adjacency, assign_depths, resolve_root};
use ordering::order_levels;
use packing::{PackContext, pack_level, pack_single};
use routing::route_edges;

/// Lays out the dependency neighborhood of the payload's current node.
///
/// `width` and `height` are the host's available surface size. The returned
/// layout carries its own final size: the width is never below
/// `min_width`, the height is clamped to the configured band and may grow
/// once when the rows overflow it.
pub fn compute_layout<M: TextMeasure + ?Sized>(
    payload: &NormalizedPayload,
    width: f32,
    height: f32,
    measure: &M,
    colors: &dyn ColorResolver,
    theme: &Theme,
    config: &LayoutConfig,
) -> LayoutResult {
    let width = width.max(config.min_width);
    let Some(root_idx) = resolve_root(&payload.nodes, payload.current_nid) else {
        return empty_layout(width, config);
    };
    let root_id = payload.nodes[root_idx].id.clone();
    let edges = layout_edges(payload);

    let adjacency = Adjacency::new(&edges);
    let assignment = assign_depths(&root_id, payload.nodes.len(), &adjacency);
    if assignment.truncated {
        tracing::warn!(
            root = %root_id,
            nodes = payload.nodes.len(),
            "depth relaxation stopped at the cycle guard"
        );
    }

    let mut nodes: Vec<LayoutNode> = payload
        .nodes
        .iter()
        .map(|node| LayoutNode {
            id: node.id.clone(),
            nid: node.nid,
            label: node.label.clone(),
            color: colors.node_color(node.color.as_deref()),
            depth: if node.id == root_id {
                0
            } else {
                assignment.depth(&node.id)
            },
        })
        .collect();

    let root_connected = edges
        .iter()
        .any(|edge| edge.source == root_id || edge.target == root_id);
    if !root_connected {
        nodes.retain(|node| node.id == root_id);
        return root_only_layout(nodes, root_id, width, measure, theme, config);
    }

    let levels = order_levels(&nodes, &adjacency, config.order_passes);
    let position: HashMap<&str, usize> = levels
        .iter()
        .flat_map(|level| level.ids.iter())
        .enumerate()
        .map(|(idx, id)| (id.as_str(), idx))
        .collect();
    nodes.sort_by_key(|node| position.get(node.id.as_str()).copied().unwrap_or(usize::MAX));

    let (boxes, rows, final_height, needed_height, routed, width) = {
        let lookup: HashMap<&str, &LayoutNode> =
            nodes.iter().map(|node| (node.id.as_str(), node)).collect();
        let ctx = PackContext {
            nodes: &lookup,
            root: Some(root_id.as_str()),
            width,
            font_size: theme.font_size,
            measure,
            config,
        };
        let single_box_height = ctx.single_box_height();
        let packed: Vec<_> = levels.iter().map(|level| pack_level(level, &ctx)).collect();

        let initial_height = initial_height(payload.estimated_height, height, config);
        let mut final_height = initial_height;
        let mut placed = packed.clone();
        let (mut rows, composition) = compose(&mut placed, initial_height, single_box_height, config);
        let overflow = composition.needed_height - initial_height;
        if !composition.fits && overflow > config.grow_threshold {
            final_height = composition
                .needed_height
                .min(config.grow_ceiling)
                .max(initial_height);
            tracing::debug!(
                from = initial_height,
                to = final_height,
                "rows overflow the surface, growing once"
            );
            placed = packed;
            rows = compose(&mut placed, final_height, single_box_height, config).0;
        }

        let boxes: BTreeMap<String, NodeBox> = placed
            .into_iter()
            .flat_map(|level| level.lanes.into_iter().flatten())
            .map(|b| (b.id.clone(), b))
            .collect();
        let mut boxes = boxes;
        let mut routed = route_edges(&edges, &boxes, &lookup, colors, width, config);
        let width = fit_corridors(&mut boxes, &mut routed, width);
        (boxes, rows, final_height, composition.needed_height, routed, width)
    };

    LayoutResult {
        root_id: Some(root_id),
        nodes,
        edges,
        boxes,
        rows,
        routed,
        width,
        height: final_height,
        needed_height,
        placeholder: false,
        depth_truncated: assignment.truncated,
    }
}

/// Payload edges between known nodes, without self loops or repeats.
fn layout_edges(payload: &NormalizedPayload) -> Vec<LayoutEdge> {
    let known: HashSet<&str> = payload.nodes.iter().map(|node| node.id.as_str()).collect();
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut edges = Vec::new();
    let mut dropped = 0usize;
    for edge in &payload.edges {
        let source = edge.source.as_str();
        let target = edge.target.as_str();
        if source == target
            || !known.contains(source)
            || !known.contains(target)
            || !seen.insert((source, target))
        {
            dropped += 1;
            continue;
        }
        edges.push(LayoutEdge {
            source: source.to_string(),
            target: target.to_string(),
        });
    }
    if dropped > 0 {
        tracing::debug!(dropped, kept = edges.len(), "skipped unusable edges");
    }
    edges
}

/// Widens the drawing so detour corridors stay on the surface, shifting
/// everything right when corridors run past the left edge.
fn fit_corridors(
    boxes: &mut BTreeMap<String, NodeBox>,
    routed: &mut RoutedEdges,
    width: f32,
) -> f32 {
    const EDGE: f32 = 1.0;
    let Some((lo, hi)) = routed.x_extent() else {
        return width;
    };
    let shift = (EDGE - lo).max(0.0);
    if shift > 0.0 {
        tracing::debug!(shift, "detour corridors extend past the left edge");
        for b in boxes.values_mut() {
            b.shift_x(shift);
        }
        routed.shift_x(shift);
    }
    (width + shift).max(hi + shift + EDGE)
}

fn initial_height(estimated: f32, surface: f32, config: &LayoutConfig) -> f32 {
    let base = if estimated > 0.0 { estimated } else { surface };
    base.clamp(config.min_height, config.max_height.max(config.min_height))
}

fn empty_layout(width: f32, config: &LayoutConfig) -> LayoutResult {
    LayoutResult {
        root_id: None,
        nodes: Vec::new(),
        edges: Vec::new(),
        boxes: BTreeMap::new(),
        rows: Vec::new(),
        routed: RoutedEdges::default(),
        width,
        height: config.empty_height,
        needed_height: config.empty_height,
        placeholder: true,
        depth_truncated: false,
    }
}

fn root_only_layout<M: TextMeasure + ?Sized>(
    nodes: Vec<LayoutNode>,
    root_id: String,
    width: f32,
    measure: &M,
    theme: &Theme,
    config: &LayoutConfig,
) -> LayoutResult {
    let single = {
        let lookup: HashMap<&str, &LayoutNode> =
            nodes.iter().map(|node| (node.id.as_str(), node)).collect();
        let ctx = PackContext {
            nodes: &lookup,
            root: Some(root_id.as_str()),
            width,
            font_size: theme.font_size,
            measure,
            config,
        };
        let mut single = pack_single(&root_id, 0, &ctx);
        let y = ((config.empty_height - single.h) / 2.0).max(0.0);
        single.set_origin(single.x, y);
        single
    };
    let mut layout = empty_layout(width, config);
    layout.rows.push(RowLayout {
        depth: 0,
        lanes: vec![vec![root_id.clone()]],
        lane_heights: vec![single.h],
        lane_gap: 0.0,
        height: single.h,
        y: single.y,
    });
    layout.boxes.insert(root_id.clone(), single);
    layout.root_id = Some(root_id);
    layout.nodes = nodes;
    layout
}
