use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;

use crate::cache::PerfSnapshot;
use crate::error::Result;
use crate::layout::LayoutResult;
use crate::render::HitMap;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub root: Option<String>,
    pub width: f32,
    pub height: f32,
    pub needed_height: f32,
    pub placeholder: bool,
    pub depth_truncated: bool,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
    pub rows: Vec<RowDump>,
    pub forks: Vec<[f32; 2]>,
    pub joins: Vec<[f32; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perf: Option<PerfSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    pub nid: Option<u64>,
    pub depth: i32,
    pub lane: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub label_lines: Vec<String>,
    pub color: String,
    pub root: bool,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub from: String,
    pub to: String,
    pub points: Vec<[f32; 2]>,
    pub branch_start: usize,
    pub detour: Option<String>,
    pub forced: bool,
}

#[derive(Debug, Serialize)]
pub struct RowDump {
    pub depth: i32,
    pub y: f32,
    pub height: f32,
    pub lanes: Vec<Vec<String>>,
}

impl LayoutDump {
    pub fn from_layout(layout: &LayoutResult, hits: Option<&HitMap>) -> Self {
        let nodes = layout
            .nodes
            .iter()
            .filter_map(|node| {
                let b = layout.boxes.get(&node.id)?;
                let nid = hits
                    .and_then(|map| map.rects.iter().find(|rect| rect.id == node.id))
                    .map_or(node.nid, |rect| rect.nid);
                Some(NodeDump {
                    id: node.id.clone(),
                    nid,
                    depth: node.depth,
                    lane: b.lane,
                    x: b.x,
                    y: b.y,
                    width: b.w,
                    height: b.h,
                    label_lines: b.lines.clone(),
                    color: node.color.to_string(),
                    root: b.is_root,
                })
            })
            .collect();

        let edges = layout
            .routed
            .routes
            .iter()
            .map(|route| EdgeDump {
                from: route.source.clone(),
                to: route.target.clone(),
                points: route.points.iter().map(|(x, y)| [*x, *y]).collect(),
                branch_start: route.branch_start,
                detour: route.detour.map(|side| format!("{side:?}")),
                forced: route.forced,
            })
            .collect();

        let rows = layout
            .rows
            .iter()
            .map(|row| RowDump {
                depth: row.depth,
                y: row.y,
                height: row.height,
                lanes: row.lanes.clone(),
            })
            .collect();

        LayoutDump {
            root: layout.root_id.clone(),
            width: layout.width,
            height: layout.height,
            needed_height: layout.needed_height,
            placeholder: layout.placeholder,
            depth_truncated: layout.depth_truncated,
            nodes,
            edges,
            rows,
            forks: layout.routed.forks.iter().map(|(x, y)| [*x, *y]).collect(),
            joins: layout.routed.joins.iter().map(|(x, y)| [*x, *y]).collect(),
            perf: None,
        }
    }

    pub fn with_perf(mut self, perf: PerfSnapshot) -> Self {
        self.perf = Some(perf);
        self
    }
}

pub fn write_layout_dump(path: &Path, dump: &LayoutDump) -> Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, dump)?;
    Ok(())
}
