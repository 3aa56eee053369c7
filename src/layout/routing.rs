use std::collections::{BTreeMap, HashMap};

use super::{DetourSide, EdgeRoute, LayoutEdge, LayoutNode, NodeBox, RoutedEdges, Trunk};
use crate::config::LayoutConfig;
use crate::theme::ColorResolver;

type Point = (f32, f32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitSide {
    Down,
    Up,
}

/// Where a source's outgoing edges leave it.
#[derive(Debug, Clone, Copy)]
struct Port {
    exit: Point,
    fork: Point,
    shared: bool,
}

/// Hands out detour corridors, one per (source, side), spaced outward.
struct CorridorAllocator {
    min_x: f32,
    max_x: f32,
    margin: f32,
    spacing: f32,
    slots: HashMap<(String, DetourSide), usize>,
    next: [usize; 2],
}

impl CorridorAllocator {
    fn new(boxes: &BTreeMap<String, NodeBox>, width: f32, config: &LayoutConfig) -> Self {
        let min_x = boxes.values().map(|b| b.x).fold(f32::INFINITY, f32::min);
        let max_x = boxes.values().map(NodeBox::right).fold(f32::NEG_INFINITY, f32::max);
        Self {
            min_x: if min_x.is_finite() { min_x } else { 0.0 },
            max_x: if max_x.is_finite() { max_x } else { width },
            margin: config.corridor_margin,
            spacing: config.corridor_spacing,
            slots: HashMap::new(),
            next: [0, 0],
        }
    }

    fn nearer_side(&self, x: f32) -> DetourSide {
        if x - self.min_x <= self.max_x - x {
            DetourSide::Left
        } else {
            DetourSide::Right
        }
    }

    fn corridor_x(&mut self, source: &str, side: DetourSide) -> f32 {
        let side_idx = match side {
            DetourSide::Left => 0,
            DetourSide::Right => 1,
        };
        let next = &mut self.next[side_idx];
        let slot = *self
            .slots
            .entry((source.to_string(), side))
            .or_insert_with(|| {
                let slot = *next;
                *next += 1;
                slot
            });
        let offset = self.margin + slot as f32 * self.spacing;
        match side {
            DetourSide::Left => self.min_x - offset,
            DetourSide::Right => self.max_x + offset,
        }
    }
}

/// Routes every edge whose endpoints both have boxes.
///
/// Sources with two or more outgoing edges share a trunk up to a fork point.
/// Paths that cut through a third box are sent around the drawing through
/// a side corridor; if the nearer corridor also collides the far one is
/// taken unconditionally.
pub(super) fn route_edges(
    edges: &[LayoutEdge],
    boxes: &BTreeMap<String, NodeBox>,
    nodes: &HashMap<&str, &LayoutNode>,
    colors: &dyn ColorResolver,
    width: f32,
    config: &LayoutConfig,
) -> RoutedEdges {
    let routable: Vec<&LayoutEdge> = edges
        .iter()
        .filter(|edge| {
            edge.source != edge.target
                && boxes.contains_key(&edge.source)
                && boxes.contains_key(&edge.target)
        })
        .collect();

    let mut outgoing: BTreeMap<&str, Vec<&NodeBox>> = BTreeMap::new();
    for edge in &routable {
        outgoing
            .entry(edge.source.as_str())
            .or_default()
            .push(&boxes[&edge.target]);
    }

    let mut routed = RoutedEdges::default();
    let mut ports: HashMap<&str, Port> = HashMap::new();
    for (source, targets) in &outgoing {
        let source_box = &boxes[*source];
        let avg_cy = targets.iter().map(|t| t.cy).sum::<f32>() / targets.len() as f32;
        let side = if avg_cy >= source_box.cy {
            ExitSide::Down
        } else {
            ExitSide::Up
        };
        let (exit, fork) = match side {
            ExitSide::Down => (
                (source_box.cx, source_box.bottom()),
                (source_box.cx, source_box.bottom() + config.fork_stub),
            ),
            ExitSide::Up => (
                (source_box.cx, source_box.y),
                (source_box.cx, source_box.y - config.fork_stub),
            ),
        };
        let shared = targets.len() >= 2;
        if shared {
            let color = edge_color(source, nodes, colors);
            routed.trunks.push(Trunk {
                source: source.to_string(),
                from: exit,
                to: fork,
                color,
            });
            routed.forks.push(fork);
        }
        ports.insert(*source, Port { exit, fork, shared });
    }

    let mut corridors = CorridorAllocator::new(boxes, width, config);
    let mut joins: BTreeMap<(String, bool), (Point, usize)> = BTreeMap::new();

    for edge in routable {
        let source_box = &boxes[&edge.source];
        let target_box = &boxes[&edge.target];
        let port = ports[edge.source.as_str()];
        let enters_top = target_box.y >= port.fork.1;
        let (entry, approach) = if enters_top {
            (
                (target_box.cx, target_box.y),
                (target_box.cx, target_box.y - config.approach),
            )
        } else {
            (
                (target_box.cx, target_box.bottom()),
                (target_box.cx, target_box.bottom() + config.approach),
            )
        };

        let direct = dedupe(vec![
            port.exit,
            port.fork,
            (target_box.cx, port.fork.1),
            approach,
            entry,
        ]);

        let mut points = direct;
        let mut detour = None;
        let mut forced = false;
        if path_hits_boxes(&points, boxes, &source_box.id, &target_box.id) {
            let midpoint = (port.exit.0 + entry.0) / 2.0;
            let side = corridors.nearer_side(midpoint);
            let x = corridors.corridor_x(&edge.source, side);
            let candidate = detour_path(port, x, approach, entry);
            if path_hits_boxes(&candidate, boxes, &source_box.id, &target_box.id) {
                let flipped = side.opposite();
                let x = corridors.corridor_x(&edge.source, flipped);
                points = detour_path(port, x, approach, entry);
                detour = Some(flipped);
                forced = true;
                tracing::debug!(
                    source = %edge.source,
                    target = %edge.target,
                    "both detour sides collide, forcing {:?}",
                    flipped
                );
            } else {
                points = candidate;
                detour = Some(side);
            }
        }

        let join = joins
            .entry((edge.target.clone(), enters_top))
            .or_insert((approach, 0));
        join.1 += 1;

        routed.routes.push(EdgeRoute {
            source: edge.source.clone(),
            target: edge.target.clone(),
            points,
            branch_start: if port.shared { 1 } else { 0 },
            detour,
            forced,
            color: edge_color(&edge.source, nodes, colors),
        });
    }

    routed.joins = joins
        .into_values()
        .filter(|(_, count)| *count >= 2)
        .map(|(point, _)| point)
        .collect();
    routed
}

fn edge_color(
    source: &str,
    nodes: &HashMap<&str, &LayoutNode>,
    colors: &dyn ColorResolver,
) -> crate::theme::Rgba {
    match nodes.get(source) {
        Some(node) => colors.edge_color(node),
        None => colors.node_color(None),
    }
}

fn detour_path(port: Port, corridor_x: f32, approach: Point, entry: Point) -> Vec<Point> {
    dedupe(vec![
        port.exit,
        port.fork,
        (corridor_x, port.fork.1),
        (corridor_x, approach.1),
        approach,
        entry,
    ])
}

/// Drops repeated points but always keeps the first two, so the fork stays
/// at index 1.
fn dedupe(points: Vec<Point>) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for (idx, point) in points.into_iter().enumerate() {
        if idx >= 2
            && let Some(last) = out.last()
            && (last.0 - point.0).abs() < 1e-3
            && (last.1 - point.1).abs() < 1e-3
        {
            continue;
        }
        out.push(point);
    }
    out
}

pub(super) fn path_hits_boxes(
    points: &[Point],
    boxes: &BTreeMap<String, NodeBox>,
    source: &str,
    target: &str,
) -> bool {
    points.windows(2).any(|segment| {
        boxes.values().any(|b| {
            b.id != source && b.id != target && segment_intersects_box(segment[0], segment[1], b)
        })
    })
}

pub(super) fn segment_intersects_box(a: Point, b: Point, rect: &NodeBox) -> bool {
    let (x1, y1) = a;
    let (x2, y2) = b;
    if x1.max(x2) < rect.x
        || x1.min(x2) > rect.right()
        || y1.max(y2) < rect.y
        || y1.min(y2) > rect.bottom()
    {
        return false;
    }
    if rect.contains(x1, y1) || rect.contains(x2, y2) {
        return true;
    }
    let corners = [
        (rect.x, rect.y),
        (rect.right(), rect.y),
        (rect.right(), rect.bottom()),
        (rect.x, rect.bottom()),
    ];
    (0..4).any(|idx| segments_intersect(a, b, corners[idx], corners[(idx + 1) % 4]))
}

fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    fn orient(a: Point, b: Point, c: Point) -> f32 {
        (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
    }
    fn on_segment(a: Point, b: Point, c: Point) -> bool {
        c.0 >= a.0.min(b.0) - 1e-6
            && c.0 <= a.0.max(b.0) + 1e-6
            && c.1 >= a.1.min(b.1) - 1e-6
            && c.1 <= a.1.max(b.1) + 1e-6
    }
    let o1 = orient(a, b, c);
    let o2 = orient(a, b, d);
    let o3 = orient(c, d, a);
    let o4 = orient(c, d, b);
    if (o1 > 0.0 && o2 < 0.0 || o1 < 0.0 && o2 > 0.0)
        && (o3 > 0.0 && o4 < 0.0 || o3 < 0.0 && o4 > 0.0)
    {
        return true;
    }
    (o1.abs() <= 1e-6 && on_segment(a, b, c))
        || (o2.abs() <= 1e-6 && on_segment(a, b, d))
        || (o3.abs() <= 1e-6 && on_segment(c, d, a))
        || (o4.abs() <= 1e-6 && on_segment(c, d, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::{Rgba, Theme, ThemeColors};

    fn boxed(id: &str, x: f32, y: f32, w: f32, h: f32) -> NodeBox {
        NodeBox {
            id: id.to_string(),
            lines: vec![id.to_string()],
            x,
            y,
            w,
            h,
            cx: x + w / 2.0,
            cy: y + h / 2.0,
            depth: 0,
            lane: 0,
            is_root: false,
        }
    }

    fn layout_node(id: &str) -> LayoutNode {
        LayoutNode {
            id: id.to_string(),
            nid: None,
            label: id.to_string(),
            color: Rgba::new(10, 20, 30, 1.0),
            depth: 0,
        }
    }

    fn edge(source: &str, target: &str) -> LayoutEdge {
        LayoutEdge {
            source: source.to_string(),
            target: target.to_string(),
        }
    }

    fn route(edges: &[LayoutEdge], list: Vec<NodeBox>, width: f32) -> RoutedEdges {
        let boxes: BTreeMap<String, NodeBox> =
            list.into_iter().map(|b| (b.id.clone(), b)).collect();
        let owned: Vec<LayoutNode> = boxes.keys().map(|id| layout_node(id)).collect();
        let nodes: HashMap<&str, &LayoutNode> =
            owned.iter().map(|node| (node.id.as_str(), node)).collect();
        let colors = ThemeColors::new(&Theme::modern());
        route_edges(edges, &boxes, &nodes, &colors, width, &LayoutConfig::default())
    }

    #[test]
    fn segment_box_intersection_cases() {
        let b = boxed("b", 10.0, 10.0, 20.0, 20.0);
        assert!(segment_intersects_box((0.0, 20.0), (40.0, 20.0), &b));
        assert!(segment_intersects_box((20.0, 0.0), (20.0, 15.0), &b));
        assert!(segment_intersects_box((15.0, 15.0), (16.0, 16.0), &b));
        assert!(!segment_intersects_box((0.0, 0.0), (40.0, 0.0), &b));
        assert!(!segment_intersects_box((35.0, 0.0), (35.0, 40.0), &b));
    }

    #[test]
    fn shared_trunk_for_multiple_targets() {
        let routed = route(
            &[edge("a", "b"), edge("a", "c")],
            vec![
                boxed("a", 100.0, 10.0, 60.0, 24.0),
                boxed("b", 40.0, 80.0, 60.0, 24.0),
                boxed("c", 160.0, 80.0, 60.0, 24.0),
            ],
            300.0,
        );
        assert_eq!(routed.trunks.len(), 1);
        let trunk = &routed.trunks[0];
        assert_eq!(trunk.from, (130.0, 34.0));
        assert_eq!(trunk.to, (130.0, 46.0));
        assert_eq!(routed.forks, vec![(130.0, 46.0)]);
        for r in &routed.routes {
            assert_eq!(r.branch_start, 1);
            assert_eq!(r.branch()[0], (130.0, 46.0));
            assert_eq!(r.points.last().unwrap().1, 80.0);
            assert!(r.detour.is_none());
        }
    }

    #[test]
    fn single_target_has_no_trunk() {
        let routed = route(
            &[edge("a", "b")],
            vec![
                boxed("a", 100.0, 10.0, 60.0, 24.0),
                boxed("b", 100.0, 80.0, 60.0, 24.0),
            ],
            300.0,
        );
        assert!(routed.trunks.is_empty());
        assert_eq!(routed.routes[0].branch_start, 0);
        assert_eq!(
            routed.routes[0].points,
            vec![(130.0, 34.0), (130.0, 46.0), (130.0, 72.0), (130.0, 80.0)]
        );
    }

    #[test]
    fn upward_targets_enter_from_below() {
        let routed = route(
            &[edge("a", "p")],
            vec![
                boxed("a", 100.0, 80.0, 60.0, 24.0),
                boxed("p", 100.0, 10.0, 60.0, 24.0),
            ],
            300.0,
        );
        let points = &routed.routes[0].points;
        assert_eq!(points[0], (130.0, 80.0));
        assert_eq!(*points.last().unwrap(), (130.0, 34.0));
    }

    #[test]
    fn blocked_path_detours_through_corridor() {
        let list = vec![
            boxed("a", 100.0, 10.0, 60.0, 24.0),
            boxed("m", 90.0, 70.0, 80.0, 24.0),
            boxed("c", 100.0, 130.0, 60.0, 24.0),
        ];
        let routed = route(&[edge("a", "c")], list.clone(), 300.0);
        let r = &routed.routes[0];
        assert_eq!(r.detour, Some(DetourSide::Left));
        assert!(!r.forced);
        let boxes: BTreeMap<String, NodeBox> =
            list.into_iter().map(|b| (b.id.clone(), b)).collect();
        assert!(!path_hits_boxes(&r.points, &boxes, "a", "c"));
        // corridor sits just outside the leftmost box
        assert!(r.points.iter().any(|p| (p.0 - 82.0).abs() < 1e-3));
    }

    #[test]
    fn colliding_detours_are_forced_to_the_far_side() {
        let list = vec![
            boxed("s", 100.0, 0.0, 50.0, 20.0),
            boxed("m", 100.0, 100.0, 50.0, 20.0),
            boxed("t", 100.0, 200.0, 50.0, 20.0),
            boxed("l", 0.0, 28.0, 60.0, 10.0),
            boxed("r", 190.0, 28.0, 60.0, 10.0),
        ];
        let routed = route(&[edge("s", "t")], list, 400.0);
        let r = &routed.routes[0];
        assert_eq!(r.detour, Some(DetourSide::Right));
        assert!(r.forced);
    }

    #[test]
    fn separate_sources_get_separate_corridors() {
        let list = vec![
            boxed("a", 100.0, 10.0, 60.0, 24.0),
            boxed("b", 170.0, 10.0, 60.0, 24.0),
            boxed("m", 60.0, 70.0, 220.0, 24.0),
            boxed("c", 100.0, 130.0, 60.0, 24.0),
        ];
        let routed = route(&[edge("a", "c"), edge("b", "c")], list, 400.0);
        let xs: Vec<f32> = routed
            .routes
            .iter()
            .map(|r| r.points[2].0)
            .collect();
        assert_eq!(routed.routes.len(), 2);
        assert!((xs[0] - xs[1]).abs() >= 10.0 - 1e-3);
        assert_eq!(routed.joins.len(), 1);
    }

    #[test]
    fn many_blocked_sources_keep_distinct_corridors() {
        let mut list: Vec<NodeBox> = (0..4)
            .map(|i| boxed(&format!("s{i}"), 30.0 + 50.0 * i as f32, 10.0, 40.0, 24.0))
            .collect();
        list.push(boxed("m", 20.0, 70.0, 360.0, 24.0));
        list.push(boxed("t", 30.0, 130.0, 40.0, 24.0));
        let edges: Vec<LayoutEdge> = (0..4).map(|i| edge(&format!("s{i}"), "t")).collect();
        let routed = route(&edges, list, 400.0);
        assert_eq!(routed.routes.len(), 4);
        let xs: Vec<f32> = routed.routes.iter().map(|r| r.points[2].0).collect();
        for r in &routed.routes {
            assert_eq!(r.detour, Some(DetourSide::Left));
            assert!(!r.forced);
        }
        for (i, a) in xs.iter().enumerate() {
            for b in &xs[i + 1..] {
                assert!((a - b).abs() >= 10.0 - 1e-3, "corridors {a} and {b} overlap");
            }
        }
        assert_eq!(xs, vec![12.0, 2.0, -8.0, -18.0]);
    }
}
