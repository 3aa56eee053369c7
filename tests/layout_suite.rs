use std::path::Path;
use std::time::Instant;

use deptree_layout::layout::{DetourSide, LayoutResult};
use deptree_layout::text_metrics::FontMetrics;
use deptree_layout::{
    Config, DrawRequest, DrawStatus, NormalizedPayload, RecordingSurface, RenderCache,
    ThemeColors, compute_layout, normalize, parse_payload_str, render_payload_svg,
};

fn assert_valid_svg(svg: &str, fixture: &str) {
    assert!(svg.contains("<svg"), "{fixture}: missing <svg tag");
    assert!(svg.contains("</svg>"), "{fixture}: missing </svg tag");
}

fn load_fixture(name: &str) -> NormalizedPayload {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    let input = std::fs::read_to_string(&path).expect("fixture read failed");
    parse_payload_str(&input).expect("fixture parse failed")
}

fn layout_of(payload: &NormalizedPayload, width: f32, height: f32) -> LayoutResult {
    let config = Config::default();
    compute_layout(
        payload,
        width,
        height,
        &FontMetrics::fallback(),
        &ThemeColors::new(&config.theme),
        &config.theme,
        &config.layout,
    )
}

fn assert_no_overlap(layout: &LayoutResult, fixture: &str) {
    let boxes: Vec<_> = layout.boxes.values().collect();
    for (i, a) in boxes.iter().enumerate() {
        for b in &boxes[i + 1..] {
            let separate = a.right() <= b.x + 1e-3
                || b.right() <= a.x + 1e-3
                || a.bottom() <= b.y + 1e-3
                || b.bottom() <= a.y + 1e-3;
            assert!(separate, "{fixture}: boxes {} and {} overlap", a.id, b.id);
        }
    }
}

#[test]
fn render_all_fixtures() {
    let mut config = Config::default();
    config.layout.fast_text_metrics = true;
    let candidates = [
        "single.json",
        "fanout.json",
        "long_label.json",
        "detour.json",
        "cycle.json5",
        "neighborhood.json",
    ];
    for fixture in candidates {
        let payload = load_fixture(fixture);
        let (svg, layout) = render_payload_svg(&payload, 320.0, 240.0, &config);
        assert_valid_svg(&svg, fixture);
        assert_no_overlap(&layout, fixture);
        assert!(layout.width >= 120.0, "{fixture}: width below minimum");
        assert!(layout.height <= 420.0, "{fixture}: height above ceiling");
        for route in &layout.routed.routes {
            assert_ne!(route.source, route.target, "{fixture}: self edge routed");
            assert!(route.points.len() >= 2, "{fixture}: degenerate route");
        }
    }
}

#[test]
fn empty_payload_is_a_placeholder() {
    let layout = layout_of(&normalize(&serde_json::json!({})), 300.0, 200.0);
    assert!(layout.placeholder);
    assert!(layout.boxes.is_empty());
    assert_eq!(layout.height, 32.0);
    assert_eq!(layout.width, 300.0);
}

#[test]
fn single_node_uses_the_compact_strip() {
    let layout = layout_of(&load_fixture("single.json"), 300.0, 200.0);
    assert!(layout.placeholder);
    assert_eq!(layout.height, 32.0);
    assert_eq!(layout.needed_height, 32.0);
    assert_eq!(layout.boxes.len(), 1);
    let root = layout.root_box().expect("root box");
    assert!(root.is_root);
    assert_eq!(root.lines.len(), 1);
    assert!(root.y >= 0.0 && root.bottom() <= 32.0);
}

#[test]
fn fanout_has_one_trunk() {
    let layout = layout_of(&load_fixture("fanout.json"), 300.0, 200.0);
    assert_eq!(layout.node("a").map(|n| n.depth), Some(0));
    assert_eq!(layout.node("b").map(|n| n.depth), Some(1));
    assert_eq!(layout.node("c").map(|n| n.depth), Some(1));
    assert_eq!(layout.routed.trunks.len(), 1);
    assert_eq!(layout.routed.trunks[0].source, "a");
    assert_eq!(layout.routed.routes.len(), 2);
    assert_eq!(layout.rows.len(), 2);
    let b = &layout.boxes["b"];
    let c = &layout.boxes["c"];
    if b.lane == c.lane {
        assert!(c.x >= b.right() + 10.0 - 1e-3 || b.x >= c.right() + 10.0 - 1e-3);
    }
}

#[test]
fn long_labels_wrap_to_two_lines_with_ellipsis() {
    let layout = layout_of(&load_fixture("long_label.json"), 300.0, 200.0);
    let long = &layout.boxes["long"];
    assert_eq!(long.lines.len(), 2);
    assert!(long.lines[1].ends_with('\u{2026}'));
    let root = &layout.boxes["root"];
    assert!(long.h > root.h);
}

#[test]
fn blocked_edges_take_a_clear_detour() {
    let layout = layout_of(&load_fixture("detour.json"), 300.0, 200.0);
    let route = layout
        .routed
        .routes
        .iter()
        .find(|route| route.source == "r" && route.target == "x")
        .expect("r -> x routed");
    assert!(route.detour.is_some());
    assert!(!route.forced);
    let middle = &layout.boxes["a"];
    for pair in route.points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let vertical_through = (a.0 - b.0).abs() < 1e-3
            && a.0 >= middle.x
            && a.0 <= middle.right()
            && a.1.min(b.1) <= middle.bottom()
            && a.1.max(b.1) >= middle.y;
        assert!(!vertical_through, "detour still crosses the middle box");
    }
    let corridor_x = route.points[2].0;
    match route.detour {
        Some(DetourSide::Left) => {
            let leftmost = layout.boxes.values().map(|b| b.x).fold(f32::INFINITY, f32::min);
            assert!(corridor_x < leftmost);
        }
        _ => {
            let rightmost = layout.boxes.values().map(|b| b.right()).fold(0.0f32, f32::max);
            assert!(corridor_x > rightmost);
        }
    }
}

#[test]
fn identical_draws_only_count_skips() {
    let payload = load_fixture("fanout.json");
    let config = Config::default();
    let colors = ThemeColors::new(&config.theme);
    let mut cache = RenderCache::new(config);
    let mut surface = RecordingSurface::new(300.0, 200.0);
    let now = Instant::now();
    let request = DrawRequest {
        nid: 1,
        payload: &payload,
        width: 300.0,
        height: 200.0,
        force: false,
    };
    assert_eq!(
        cache.draw_at(request, &mut surface, &colors, now),
        DrawStatus::Rendered
    );
    for _ in 0..5 {
        assert_eq!(
            cache.draw_at(request, &mut surface, &colors, now),
            DrawStatus::Skipped
        );
    }
    let snap = cache.snapshot();
    assert_eq!(snap.total_renders, 1);
    assert_eq!(snap.total_skips, 5);
}

#[test]
fn layout_is_deterministic() {
    let payload = load_fixture("neighborhood.json");
    let first = layout_of(&payload, 360.0, 240.0);
    let second = layout_of(&payload, 360.0, 240.0);
    assert_eq!(first, second);
}

#[test]
fn normalization_is_idempotent() {
    let payload = load_fixture("neighborhood.json");
    let value = serde_json::to_value(&payload).expect("serialize");
    assert_eq!(normalize(&value), payload);
}

#[test]
fn self_and_dangling_edges_are_excluded() {
    let layout = layout_of(&load_fixture("neighborhood.json"), 360.0, 240.0);
    assert!(layout.edges.iter().all(|edge| edge.source != edge.target));
    assert!(layout.edges.iter().all(|edge| edge.target != "missing"));
    assert_eq!(layout.edges.len(), 9);
}

#[test]
fn root_is_centered_at_depth_zero() {
    let layout = layout_of(&load_fixture("neighborhood.json"), 360.0, 240.0);
    assert_eq!(layout.root_id.as_deref(), Some("n10"));
    assert_eq!(layout.node("n10").map(|n| n.depth), Some(0));
    assert_eq!(layout.node("n2").map(|n| n.depth), Some(-2));
    assert_eq!(layout.node("n14").map(|n| n.depth), Some(2));
    let roots: Vec<_> = layout.boxes.values().filter(|b| b.is_root).collect();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].id, "n10");
    assert_eq!(layout.routed.joins.len(), 1);
}

#[test]
fn cycles_terminate_with_truncation_flag() {
    let layout = layout_of(&load_fixture("cycle.json5"), 300.0, 200.0);
    assert!(layout.depth_truncated);
    assert_eq!(layout.node("r").map(|n| n.depth), Some(0));
    assert_eq!(layout.boxes.len(), 3);
}

#[test]
fn narrow_surfaces_keep_the_minimum_width() {
    let layout = layout_of(&load_fixture("fanout.json"), 40.0, 200.0);
    assert_eq!(layout.width, 120.0);
}
