//! Host-facing controller for the dependency tree panel.
//!
//! The view owns every piece of state the panel needs: fetched payloads, the
//! single pending request, the render cache and the drawing surface. Hosts
//! talk to it through plain method calls and receive callbacks through
//! [`HostBridge`].

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use crate::cache::{DrawRequest, DrawStatus, PerfSnapshot, RenderCache, TreeDrawing};
use crate::config::Config;
use crate::payload::NormalizedPayload;
use crate::surface::Surface;
use crate::theme::ColorResolver;

/// Callbacks into the host application.
pub trait HostBridge: ColorResolver {
    /// Whether the main graph currently shows a node with this id.
    fn has_active_node(&self, id: &str) -> bool;
    fn focus_node(&mut self, id: &str);
    fn open_editor(&mut self, nid: u64);
    /// Ask for the neighborhood payload of `nid`; the answer arrives through
    /// [`DependencyTreeView::receive_payload`].
    fn request_payload(&mut self, nid: u64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickKind {
    Primary,
    Double,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Focused(String),
    EditorOpened(u64),
    /// A box was hit but nothing in the host matches it.
    Unresolved,
    /// The click was aimed at an older drawing.
    Stale,
    Missed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    Drawn(DrawStatus),
    Requested,
    AlreadyPending,
}

/// Payloads by nid, evicting the least recently used entry past `capacity`.
struct PayloadCache {
    capacity: Option<usize>,
    entries: HashMap<u64, NormalizedPayload>,
    recency: VecDeque<u64>,
}

impl PayloadCache {
    fn new(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            recency: VecDeque::new(),
        }
    }

    fn contains(&self, nid: u64) -> bool {
        self.entries.contains_key(&nid)
    }

    fn touch(&mut self, nid: u64) {
        if let Some(pos) = self.recency.iter().position(|entry| *entry == nid) {
            self.recency.remove(pos);
        }
        self.recency.push_back(nid);
    }

    fn get(&mut self, nid: u64) -> Option<&NormalizedPayload> {
        if !self.entries.contains_key(&nid) {
            return None;
        }
        self.touch(nid);
        self.entries.get(&nid)
    }

    fn insert(&mut self, nid: u64, payload: NormalizedPayload) {
        self.entries.insert(nid, payload);
        self.touch(nid);
        if let Some(capacity) = self.capacity {
            while self.entries.len() > capacity {
                let Some(oldest) = self.recency.pop_front() else {
                    break;
                };
                self.entries.remove(&oldest);
                tracing::debug!(nid = oldest, "evicted cached payload");
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }
}

pub struct DependencyTreeView<H: HostBridge, S: Surface> {
    host: H,
    surface: S,
    cache: RenderCache,
    payloads: PayloadCache,
    active: Option<u64>,
    pending: Option<u64>,
    width: f32,
    height: f32,
}

impl<H: HostBridge, S: Surface> DependencyTreeView<H, S> {
    pub fn new(host: H, surface: S, config: Config) -> Self {
        let (width, height) = surface.size();
        Self {
            host,
            surface,
            payloads: PayloadCache::new(config.payload_cache_capacity),
            cache: RenderCache::new(config),
            active: None,
            pending: None,
            width,
            height,
        }
    }

    /// Makes `nid` the displayed item. Draws right away when its payload is
    /// cached, otherwise asks the host for it once.
    pub fn select(&mut self, nid: u64) -> SelectOutcome {
        self.active = Some(nid);
        if self.payloads.contains(nid) {
            return SelectOutcome::Drawn(self.draw_active(false));
        }
        if self.pending == Some(nid) {
            return SelectOutcome::AlreadyPending;
        }
        if let Some(previous) = self.pending.replace(nid) {
            tracing::debug!(previous, nid, "replacing pending payload request");
        }
        self.host.request_payload(nid);
        SelectOutcome::Requested
    }

    /// Stores a payload from the host. Draws only if `nid` is still the
    /// active item.
    pub fn receive_payload(&mut self, nid: u64, payload: NormalizedPayload) -> Option<DrawStatus> {
        if self.pending == Some(nid) {
            self.pending = None;
        }
        self.payloads.insert(nid, payload);
        if self.active == Some(nid) {
            Some(self.draw_active(false))
        } else {
            tracing::debug!(nid, active = ?self.active, "cached late payload without drawing");
            None
        }
    }

    pub fn resize(&mut self, width: f32, height: f32) -> Option<DrawStatus> {
        self.width = width;
        self.height = height;
        self.redraw(false)
    }

    /// Redraws the active item if its payload is known.
    pub fn redraw(&mut self, force: bool) -> Option<DrawStatus> {
        let nid = self.active?;
        self.payloads.contains(nid).then(|| self.draw_active(force))
    }

    /// Forgets every cached payload and counter, then asks again for the
    /// active item.
    pub fn dataset_changed(&mut self) {
        self.payloads.clear();
        self.pending = None;
        self.cache.clear();
        if let Some(nid) = self.active {
            self.select(nid);
        }
    }

    pub fn click(&mut self, generation: u64, x: f32, y: f32, kind: ClickKind) -> ClickOutcome {
        let Some(drawing) = self.cache.drawing() else {
            return ClickOutcome::Missed;
        };
        if drawing.hits.generation != generation {
            return ClickOutcome::Stale;
        }
        let Some(rect) = drawing.hits.hit_test(x, y) else {
            return ClickOutcome::Missed;
        };
        match kind {
            ClickKind::Primary => {
                let Some(id) = resolve_host_id(&self.host, &rect.id, rect.nid) else {
                    return ClickOutcome::Unresolved;
                };
                self.host.focus_node(&id);
                ClickOutcome::Focused(id)
            }
            ClickKind::Double => match rect.nid {
                Some(nid) => {
                    self.host.open_editor(nid);
                    ClickOutcome::EditorOpened(nid)
                }
                None => ClickOutcome::Unresolved,
            },
        }
    }

    pub fn active(&self) -> Option<u64> {
        self.active
    }

    pub fn pending(&self) -> Option<u64> {
        self.pending
    }

    pub fn cached_payloads(&self) -> usize {
        self.payloads.len()
    }

    pub fn drawing(&self) -> Option<&TreeDrawing> {
        self.cache.drawing()
    }

    pub fn generation(&self) -> u64 {
        self.cache.generation()
    }

    pub fn perf(&mut self) -> PerfSnapshot {
        self.cache.snapshot_at(Instant::now())
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    fn draw_active(&mut self, force: bool) -> DrawStatus {
        let Some(nid) = self.active else {
            return DrawStatus::Skipped;
        };
        let Some(payload) = self.payloads.get(nid) else {
            return DrawStatus::Skipped;
        };
        let request = DrawRequest {
            nid,
            payload,
            width: self.width,
            height: self.height,
            force,
        };
        self.cache.draw(request, &mut self.surface, &self.host)
    }
}

/// Maps a clicked box to a node id the host knows: the id itself, then
/// `n<nid>`, then the bare nid, then the trailing digits of the id.
fn resolve_host_id<H: HostBridge>(host: &H, id: &str, nid: Option<u64>) -> Option<String> {
    let mut candidates = vec![id.to_string()];
    if let Some(nid) = nid {
        candidates.push(format!("n{nid}"));
        candidates.push(nid.to_string());
    }
    let tail: String = {
        let digits: Vec<char> = id.chars().rev().take_while(char::is_ascii_digit).collect();
        digits.into_iter().rev().collect()
    };
    if !tail.is_empty() && tail != id {
        candidates.push(tail);
    }
    candidates
        .into_iter()
        .find(|candidate| host.has_active_node(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutNode;
    use crate::payload::normalize;
    use crate::surface::RecordingSurface;
    use crate::theme::{Rgba, Theme, ThemeColors};
    use serde_json::json;
    use std::collections::HashSet;

    struct FakeHost {
        colors: ThemeColors,
        active_nodes: HashSet<String>,
        requests: Vec<u64>,
        focused: Vec<String>,
        edited: Vec<u64>,
    }

    impl FakeHost {
        fn new(active: &[&str]) -> Self {
            Self {
                colors: ThemeColors::new(&Theme::modern()),
                active_nodes: active.iter().map(|id| id.to_string()).collect(),
                requests: Vec::new(),
                focused: Vec::new(),
                edited: Vec::new(),
            }
        }
    }

    impl ColorResolver for FakeHost {
        fn node_color(&self, raw: Option<&str>) -> Rgba {
            self.colors.node_color(raw)
        }

        fn edge_color(&self, source: &LayoutNode) -> Rgba {
            self.colors.edge_color(source)
        }
    }

    impl HostBridge for FakeHost {
        fn has_active_node(&self, id: &str) -> bool {
            self.active_nodes.contains(id)
        }

        fn focus_node(&mut self, id: &str) {
            self.focused.push(id.to_string());
        }

        fn open_editor(&mut self, nid: u64) {
            self.edited.push(nid);
        }

        fn request_payload(&mut self, nid: u64) {
            self.requests.push(nid);
        }
    }

    fn view(active: &[&str]) -> DependencyTreeView<FakeHost, RecordingSurface> {
        DependencyTreeView::new(
            FakeHost::new(active),
            RecordingSurface::new(300.0, 200.0),
            Config::default(),
        )
    }

    fn payload(root: u64) -> NormalizedPayload {
        normalize(&json!({
            "current_nid": root,
            "nodes": [
                {"id": format!("task-{root}"), "nid": root, "label": "Root"},
                {"id": "task-99", "nid": 99, "label": "Child"}
            ],
            "edges": [{"source": format!("task-{root}"), "target": "task-99"}]
        }))
    }

    #[test]
    fn one_request_per_pending_id() {
        let mut view = view(&[]);
        assert_eq!(view.select(5), SelectOutcome::Requested);
        assert_eq!(view.select(5), SelectOutcome::AlreadyPending);
        assert_eq!(view.select(6), SelectOutcome::Requested);
        assert_eq!(view.host().requests, vec![5, 6]);
        assert_eq!(view.pending(), Some(6));
    }

    #[test]
    fn late_payload_is_cached_but_not_drawn() {
        let mut view = view(&[]);
        view.select(5);
        view.select(6);
        assert_eq!(view.receive_payload(5, payload(5)), None);
        assert!(view.drawing().is_none());
        assert_eq!(view.cached_payloads(), 1);
        assert_eq!(view.pending(), Some(6));

        // switching back uses the cache and sends no new request
        assert_eq!(view.select(5), SelectOutcome::Drawn(DrawStatus::Rendered));
        assert_eq!(view.host().requests, vec![5, 6]);
    }

    #[test]
    fn clicks_focus_and_open_editor() {
        let mut view = view(&["99"]);
        view.select(5);
        view.receive_payload(5, payload(5));
        let generation = view.generation();
        let child = view
            .drawing()
            .and_then(|drawing| drawing.layout.boxes.get("task-99"))
            .map(|b| (b.cx, b.cy))
            .unwrap();

        assert_eq!(
            view.click(generation, child.0, child.1, ClickKind::Primary),
            ClickOutcome::Focused("99".to_string())
        );
        assert_eq!(
            view.click(generation, child.0, child.1, ClickKind::Double),
            ClickOutcome::EditorOpened(99)
        );
        assert_eq!(
            view.click(generation + 1, child.0, child.1, ClickKind::Primary),
            ClickOutcome::Stale
        );
        assert_eq!(view.click(generation, -10.0, -10.0, ClickKind::Primary), ClickOutcome::Missed);
        assert_eq!(view.host().focused, vec!["99"]);
        assert_eq!(view.host().edited, vec![99]);
    }

    #[test]
    fn unknown_host_node_is_unresolved() {
        let mut view = view(&[]);
        view.select(5);
        view.receive_payload(5, payload(5));
        let generation = view.generation();
        let root = view
            .drawing()
            .and_then(|drawing| drawing.layout.root_box())
            .map(|b| (b.cx, b.cy))
            .unwrap();
        assert_eq!(
            view.click(generation, root.0, root.1, ClickKind::Primary),
            ClickOutcome::Unresolved
        );
    }

    #[test]
    fn host_id_resolution_order() {
        let host = FakeHost::new(&["n7", "7", "task-7"]);
        assert_eq!(resolve_host_id(&host, "task-7", Some(7)).as_deref(), Some("task-7"));
        let host = FakeHost::new(&["n7", "7"]);
        assert_eq!(resolve_host_id(&host, "x", Some(7)).as_deref(), Some("n7"));
        let host = FakeHost::new(&["7"]);
        assert_eq!(resolve_host_id(&host, "x", Some(7)).as_deref(), Some("7"));
        let host = FakeHost::new(&["42"]);
        assert_eq!(resolve_host_id(&host, "item42", None).as_deref(), Some("42"));
        assert_eq!(resolve_host_id(&host, "item", None), None);
    }

    #[test]
    fn payload_cache_evicts_least_recent() {
        let mut cache = PayloadCache::new(Some(2));
        cache.insert(1, NormalizedPayload::default());
        cache.insert(2, NormalizedPayload::default());
        assert!(cache.get(1).is_some());
        cache.insert(3, NormalizedPayload::default());
        assert!(cache.contains(1));
        assert!(!cache.contains(2));
        assert!(cache.contains(3));
    }

    #[test]
    fn dataset_change_clears_and_rerequests() {
        let mut view = view(&[]);
        view.select(5);
        view.receive_payload(5, payload(5));
        assert_eq!(view.resize(300.0, 200.0), Some(DrawStatus::Skipped));
        view.dataset_changed();
        assert_eq!(view.cached_payloads(), 0);
        assert_eq!(view.perf().total_renders, 0);
        assert_eq!(view.host().requests, vec![5, 5]);
        assert_eq!(view.pending(), Some(5));
    }
}
