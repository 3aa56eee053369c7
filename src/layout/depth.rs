use std::collections::{HashMap, VecDeque};

use super::LayoutEdge;
use crate::payload::PayloadNode;

pub(super) struct Adjacency {
    preds: HashMap<String, Vec<String>>,
    succs: HashMap<String, Vec<String>>,
}

impl Adjacency {
    pub(super) fn new(edges: &[LayoutEdge]) -> Self {
        let mut preds: HashMap<String, Vec<String>> = HashMap::new();
        let mut succs: HashMap<String, Vec<String>> = HashMap::new();
        for edge in edges {
            succs
                .entry(edge.source.clone())
                .or_default()
                .push(edge.target.clone());
            preds
                .entry(edge.target.clone())
                .or_default()
                .push(edge.source.clone());
        }
        Self { preds, succs }
    }

    pub(super) fn predecessors(&self, id: &str) -> &[String] {
        self.preds.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(super) fn successors(&self, id: &str) -> &[String] {
        self.succs.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Picks the node the drawing is centered on.
pub(super) fn resolve_root(nodes: &[PayloadNode], current_nid: u64) -> Option<usize> {
    if nodes.is_empty() {
        return None;
    }
    if current_nid > 0 {
        if let Some(idx) = nodes.iter().position(|node| node.nid == Some(current_nid)) {
            return Some(idx);
        }
        let synthetic = format!("n{current_nid}");
        if let Some(idx) = nodes.iter().position(|node| node.id == synthetic) {
            return Some(idx);
        }
        let bare = current_nid.to_string();
        if let Some(idx) = nodes.iter().position(|node| node.id == bare) {
            return Some(idx);
        }
    }
    Some(0)
}

#[derive(Debug, Default)]
pub(super) struct DepthAssignment {
    pub(super) depths: HashMap<String, i32>,
    pub(super) truncated: bool,
}

impl DepthAssignment {
    pub(super) fn depth(&self, id: &str) -> i32 {
        self.depths.get(id).copied().unwrap_or(0)
    }
}

/// Ancestors get negative levels, descendants positive ones, the root 0.
///
/// In acyclic input no level can reach `node_count` in magnitude, so such a
/// proposal is refused and the assignment is flagged as truncated instead of
/// relaxing forever around a cycle.
pub(super) fn assign_depths(root: &str, node_count: usize, adjacency: &Adjacency) -> DepthAssignment {
    let limit = i32::try_from(node_count.max(1)).unwrap_or(i32::MAX);
    let mut depths: HashMap<String, i32> = HashMap::new();
    depths.insert(root.to_string(), 0);

    let upward = relax(root, &mut depths, limit, Relaxation::Ancestors, adjacency);
    let downward = relax(root, &mut depths, limit, Relaxation::Descendants, adjacency);

    DepthAssignment {
        depths,
        truncated: upward || downward,
    }
}

#[derive(Clone, Copy)]
enum Relaxation {
    Ancestors,
    Descendants,
}

fn relax(
    root: &str,
    depths: &mut HashMap<String, i32>,
    limit: i32,
    mode: Relaxation,
    adjacency: &Adjacency,
) -> bool {
    let mut truncated = false;
    let mut queue: VecDeque<String> = VecDeque::from([root.to_string()]);
    while let Some(current) = queue.pop_front() {
        let depth = depths.get(&current).copied().unwrap_or(0);
        let (neighbors, proposal) = match mode {
            Relaxation::Ancestors => (adjacency.predecessors(&current), depth - 1),
            Relaxation::Descendants => (adjacency.successors(&current), depth + 1),
        };
        for next in neighbors {
            if next == root {
                continue;
            }
            if proposal.abs() >= limit {
                truncated = true;
                continue;
            }
            let improves = match (depths.get(next), mode) {
                (None, _) => true,
                (Some(&existing), Relaxation::Ancestors) => proposal < existing,
                (Some(&existing), Relaxation::Descendants) => proposal > existing,
            };
            if improves {
                depths.insert(next.clone(), proposal);
                queue.push_back(next.clone());
            }
        }
    }
    truncated
}
