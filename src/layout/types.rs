use std::collections::BTreeMap;

use serde::Serialize;

use crate::theme::Rgba;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutNode {
    pub id: String,
    pub nid: Option<u64>,
    pub label: String,
    pub color: Rgba,
    pub depth: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LayoutEdge {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeBox {
    pub id: String,
    pub lines: Vec<String>,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub cx: f32,
    pub cy: f32,
    pub depth: i32,
    pub lane: usize,
    pub is_root: bool,
}

impl NodeBox {
    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }

    pub(crate) fn shift_x(&mut self, dx: f32) {
        self.x += dx;
        self.cx += dx;
    }

    pub(crate) fn set_origin(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.cx = x + self.w / 2.0;
        self.cy = y + self.h / 2.0;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowLayout {
    pub depth: i32,
    pub lanes: Vec<Vec<String>>,
    pub lane_heights: Vec<f32>,
    pub lane_gap: f32,
    pub height: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DetourSide {
    Left,
    Right,
}

impl DetourSide {
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeRoute {
    pub source: String,
    pub target: String,
    pub points: Vec<(f32, f32)>,
    /// Index into `points` where the drawn branch starts; points before it
    /// belong to the source's shared trunk.
    pub branch_start: usize,
    pub detour: Option<DetourSide>,
    /// The detour still collides and was kept anyway.
    pub forced: bool,
    pub color: Rgba,
}

impl EdgeRoute {
    pub fn branch(&self) -> &[(f32, f32)] {
        &self.points[self.branch_start.min(self.points.len())..]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trunk {
    pub source: String,
    pub from: (f32, f32),
    pub to: (f32, f32),
    pub color: Rgba,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoutedEdges {
    pub routes: Vec<EdgeRoute>,
    pub trunks: Vec<Trunk>,
    pub forks: Vec<(f32, f32)>,
    pub joins: Vec<(f32, f32)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutResult {
    pub root_id: Option<String>,
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
    pub boxes: BTreeMap<String, NodeBox>,
    pub rows: Vec<RowLayout>,
    pub routed: RoutedEdges,
    pub width: f32,
    pub height: f32,
    pub needed_height: f32,
    /// Drawn through the minimal "no data" branch.
    pub placeholder: bool,
    /// Depth relaxation hit the cycle guard.
    pub depth_truncated: bool,
}

impl RoutedEdges {
    /// Horizontal span of every routed point.
    pub fn x_extent(&self) -> Option<(f32, f32)> {
        self.routes
            .iter()
            .flat_map(|route| route.points.iter())
            .map(|p| p.0)
            .fold(None, |acc, x| match acc {
                None => Some((x, x)),
                Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
            })
    }

    pub(crate) fn shift_x(&mut self, dx: f32) {
        for route in &mut self.routes {
            for point in &mut route.points {
                point.0 += dx;
            }
        }
        for trunk in &mut self.trunks {
            trunk.from.0 += dx;
            trunk.to.0 += dx;
        }
        for point in self.forks.iter_mut().chain(self.joins.iter_mut()) {
            point.0 += dx;
        }
    }
}

impl LayoutResult {
    pub fn node(&self, id: &str) -> Option<&LayoutNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn root_box(&self) -> Option<&NodeBox> {
        self.root_id.as_deref().and_then(|id| self.boxes.get(id))
    }
}
