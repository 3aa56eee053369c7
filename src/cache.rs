use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::Config;
use crate::layout::{LayoutResult, compute_layout};
use crate::payload::NormalizedPayload;
use crate::render::{HitMap, draw_layout};
use crate::surface::Surface;
use crate::theme::ColorResolver;

const PERF_WINDOW: Duration = Duration::from_millis(1000);
const SIZE_TOLERANCE: f32 = 1.0;

/// Cheap fingerprint of a payload: counts plus the first and last entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSignature {
    node_count: usize,
    edge_count: usize,
    estimated_height_bits: u32,
    first_node: Option<String>,
    last_node: Option<String>,
    first_edge: Option<(String, String)>,
    last_edge: Option<(String, String)>,
}

impl RenderSignature {
    pub fn of(payload: &NormalizedPayload) -> Self {
        let edge_pair = |edge: &crate::payload::PayloadEdge| (edge.source.clone(), edge.target.clone());
        Self {
            node_count: payload.nodes.len(),
            edge_count: payload.edges.len(),
            estimated_height_bits: payload.estimated_height.to_bits(),
            first_node: payload.nodes.first().map(|node| node.id.clone()),
            last_node: payload.nodes.last().map(|node| node.id.clone()),
            first_edge: payload.edges.first().map(edge_pair),
            last_edge: payload.edges.last().map(edge_pair),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfSnapshot {
    pub renders_per_sec: u32,
    pub skips_per_sec: u32,
    pub total_renders: u64,
    pub total_skips: u64,
}

/// Render and skip throughput over a rolling one-second window.
#[derive(Debug, Clone, Default)]
pub struct PerfCounters {
    window_start: Option<Instant>,
    window_renders: u32,
    window_skips: u32,
    snapshot: PerfSnapshot,
}

impl PerfCounters {
    pub fn record_render(&mut self, now: Instant) {
        self.roll(now);
        self.window_renders += 1;
        self.snapshot.total_renders += 1;
    }

    pub fn record_skip(&mut self, now: Instant) {
        self.roll(now);
        self.window_skips += 1;
        self.snapshot.total_skips += 1;
    }

    pub fn snapshot(&self) -> PerfSnapshot {
        self.snapshot
    }

    /// Rolls the window up to `now` before reading. Windows longer than two
    /// seconds read as zero.
    pub fn snapshot_at(&mut self, now: Instant) -> PerfSnapshot {
        self.roll(now);
        self.snapshot
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn roll(&mut self, now: Instant) {
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return;
        };
        let elapsed = now.saturating_duration_since(start);
        if elapsed < PERF_WINDOW {
            return;
        }
        if elapsed >= 2 * PERF_WINDOW {
            self.snapshot.renders_per_sec = 0;
            self.snapshot.skips_per_sec = 0;
        } else {
            let secs = elapsed.as_secs_f32();
            self.snapshot.renders_per_sec = (self.window_renders as f32 / secs).round() as u32;
            self.snapshot.skips_per_sec = (self.window_skips as f32 / secs).round() as u32;
        }
        self.window_renders = 0;
        self.window_skips = 0;
        self.window_start = Some(now);
    }
}

/// Result of the last full render.
#[derive(Debug, Clone)]
pub struct TreeDrawing {
    pub layout: LayoutResult,
    pub hits: HitMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawStatus {
    Rendered,
    Skipped,
}

#[derive(Debug, Clone, Copy)]
pub struct DrawRequest<'a> {
    pub nid: u64,
    pub payload: &'a NormalizedPayload,
    /// Space the host offers; the surface is resized to the layout's size.
    pub width: f32,
    pub height: f32,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct CacheKey {
    nid: u64,
    signature: RenderSignature,
    width: f32,
    height: f32,
}

impl CacheKey {
    fn matches(&self, other: &CacheKey) -> bool {
        self.nid == other.nid
            && self.signature == other.signature
            && (self.width - other.width).abs() <= SIZE_TOLERANCE
            && (self.height - other.height).abs() <= SIZE_TOLERANCE
    }
}

/// Single entry point for drawing. Skips the whole pipeline when the
/// request matches the previous one.
pub struct RenderCache {
    config: Config,
    last: Option<CacheKey>,
    drawing: Option<TreeDrawing>,
    counters: PerfCounters,
    generation: u64,
}

impl RenderCache {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            last: None,
            drawing: None,
            counters: PerfCounters::default(),
            generation: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn draw<S: Surface + ?Sized>(
        &mut self,
        request: DrawRequest<'_>,
        surface: &mut S,
        colors: &dyn ColorResolver,
    ) -> DrawStatus {
        self.draw_at(request, surface, colors, Instant::now())
    }

    pub fn draw_at<S: Surface + ?Sized>(
        &mut self,
        request: DrawRequest<'_>,
        surface: &mut S,
        colors: &dyn ColorResolver,
        now: Instant,
    ) -> DrawStatus {
        let key = CacheKey {
            nid: request.nid,
            signature: RenderSignature::of(request.payload),
            width: request.width,
            height: request.height,
        };
        if !request.force
            && self.drawing.is_some()
            && self.last.as_ref().is_some_and(|last| last.matches(&key))
        {
            self.counters.record_skip(now);
            return DrawStatus::Skipped;
        }

        let layout = compute_layout(
            request.payload,
            request.width,
            request.height,
            &*surface,
            colors,
            &self.config.theme,
            &self.config.layout,
        );
        self.generation += 1;
        let hits = draw_layout(&layout, surface, &self.config, self.generation);
        tracing::debug!(
            nid = request.nid,
            nodes = layout.nodes.len(),
            width = layout.width,
            height = layout.height,
            generation = self.generation,
            "rendered dependency tree"
        );
        self.last = Some(key);
        self.drawing = Some(TreeDrawing { layout, hits });
        self.counters.record_render(now);
        DrawStatus::Rendered
    }

    pub fn drawing(&self) -> Option<&TreeDrawing> {
        self.drawing.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn snapshot(&self) -> PerfSnapshot {
        self.counters.snapshot()
    }

    pub fn snapshot_at(&mut self, now: Instant) -> PerfSnapshot {
        self.counters.snapshot_at(now)
    }

    /// Forces the next draw to run the pipeline.
    pub fn invalidate(&mut self) {
        self.last = None;
    }

    /// Drops the cached drawing and the counters.
    pub fn clear(&mut self) {
        self.last = None;
        self.drawing = None;
        self.counters.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::normalize;
    use crate::surface::RecordingSurface;
    use crate::theme::ThemeColors;
    use serde_json::json;

    fn payload() -> NormalizedPayload {
        normalize(&json!({
            "current_nid": 1,
            "nodes": [{"id": "a", "nid": 1}, {"id": "b", "nid": 2}],
            "edges": [{"source": "a", "target": "b"}]
        }))
    }

    fn request(payload: &NormalizedPayload, width: f32, force: bool) -> DrawRequest<'_> {
        DrawRequest {
            nid: 1,
            payload,
            width,
            height: 200.0,
            force,
        }
    }

    #[test]
    fn signature_tracks_boundaries() {
        let a = payload();
        let mut b = a.clone();
        assert_eq!(RenderSignature::of(&a), RenderSignature::of(&b));
        b.edges[0].target = "a".to_string();
        assert_ne!(RenderSignature::of(&a), RenderSignature::of(&b));
        let mut c = a.clone();
        c.estimated_height = 150.0;
        assert_ne!(RenderSignature::of(&a), RenderSignature::of(&c));
    }

    #[test]
    fn identical_requests_are_skipped() {
        let config = Config::default();
        let colors = ThemeColors::new(&config.theme);
        let mut cache = RenderCache::new(config);
        let mut surface = RecordingSurface::new(300.0, 200.0);
        let data = payload();
        let now = Instant::now();

        assert_eq!(
            cache.draw_at(request(&data, 300.0, false), &mut surface, &colors, now),
            DrawStatus::Rendered
        );
        let ops = surface.ops().len();
        for _ in 0..3 {
            assert_eq!(
                cache.draw_at(request(&data, 300.5, false), &mut surface, &colors, now),
                DrawStatus::Skipped
            );
        }
        assert_eq!(surface.ops().len(), ops);
        let snap = cache.snapshot();
        assert_eq!(snap.total_renders, 1);
        assert_eq!(snap.total_skips, 3);
        assert_eq!(cache.generation(), 1);
    }

    #[test]
    fn size_change_or_force_rerenders() {
        let config = Config::default();
        let colors = ThemeColors::new(&config.theme);
        let mut cache = RenderCache::new(config);
        let mut surface = RecordingSurface::new(300.0, 200.0);
        let data = payload();
        let now = Instant::now();
        cache.draw_at(request(&data, 300.0, false), &mut surface, &colors, now);
        assert_eq!(
            cache.draw_at(request(&data, 302.0, false), &mut surface, &colors, now),
            DrawStatus::Rendered
        );
        assert_eq!(
            cache.draw_at(request(&data, 302.0, true), &mut surface, &colors, now),
            DrawStatus::Rendered
        );
        cache.invalidate();
        assert_eq!(
            cache.draw_at(request(&data, 302.0, false), &mut surface, &colors, now),
            DrawStatus::Rendered
        );
        assert_eq!(cache.snapshot().total_renders, 4);
    }

    #[test]
    fn counters_roll_each_second() {
        let mut counters = PerfCounters::default();
        let start = Instant::now();
        counters.record_render(start);
        counters.record_skip(start + Duration::from_millis(10));
        counters.record_skip(start + Duration::from_millis(20));
        assert_eq!(counters.snapshot().renders_per_sec, 0);

        counters.record_render(start + Duration::from_millis(1001));
        let snap = counters.snapshot();
        assert_eq!(snap.renders_per_sec, 1);
        assert_eq!(snap.skips_per_sec, 2);
        assert_eq!(snap.total_renders, 2);
        assert_eq!(snap.total_skips, 2);

        counters.clear();
        assert_eq!(counters.snapshot(), PerfSnapshot::default());
    }

    #[test]
    fn idle_counters_decay_to_zero() {
        let mut counters = PerfCounters::default();
        let start = Instant::now();
        for ms in [0, 100, 200, 300] {
            counters.record_render(start + Duration::from_millis(ms));
        }
        let busy = counters.snapshot_at(start + Duration::from_millis(1500));
        assert_eq!(busy.renders_per_sec, 3);

        let idle = counters.snapshot_at(start + Duration::from_millis(9000));
        assert_eq!(idle.renders_per_sec, 0);
        assert_eq!(idle.skips_per_sec, 0);
        assert_eq!(idle.total_renders, 4);
    }

    #[test]
    fn stretched_windows_are_not_reported_as_one_second() {
        let mut counters = PerfCounters::default();
        let start = Instant::now();
        counters.record_render(start);
        counters.record_skip(start + Duration::from_millis(10));
        counters.record_skip(start + Duration::from_millis(20));
        counters.record_render(start + Duration::from_secs(5));
        let snap = counters.snapshot();
        assert_eq!(snap.renders_per_sec, 0);
        assert_eq!(snap.skips_per_sec, 0);
        assert_eq!(snap.total_skips, 2);
    }
}
