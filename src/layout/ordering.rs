use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use super::LayoutNode;
use super::depth::Adjacency;

/// One level of the drawing, ordered left to right.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Level {
    pub(super) depth: i32,
    pub(super) ids: Vec<String>,
}

/// Groups nodes by depth and reduces crossings with barycenter sweeps.
///
/// Sweeps alternate forward (against the previous level's predecessors) and
/// backward (against the next level's successors) for a fixed number of
/// passes.
pub(super) fn order_levels(
    nodes: &[LayoutNode],
    adjacency: &Adjacency,
    passes: usize,
) -> Vec<Level> {
    let labels: HashMap<&str, &str> = nodes
        .iter()
        .map(|node| (node.id.as_str(), node.label.as_str()))
        .collect();

    let mut grouped: BTreeMap<i32, Vec<String>> = BTreeMap::new();
    for node in nodes {
        grouped.entry(node.depth).or_default().push(node.id.clone());
    }
    let mut levels: Vec<Level> = grouped
        .into_iter()
        .map(|(depth, mut ids)| {
            ids.sort_by(|a, b| compare_labels(a, b, &labels));
            Level { depth, ids }
        })
        .collect();
    if levels.len() <= 1 {
        return levels;
    }

    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut level_of: HashMap<String, usize> = HashMap::new();
    for (level_idx, level) in levels.iter().enumerate() {
        for (idx, id) in level.ids.iter().enumerate() {
            positions.insert(id.clone(), idx);
            level_of.insert(id.clone(), level_idx);
        }
    }

    for pass in 0..passes {
        let forward = pass % 2 == 0;
        let order: Vec<usize> = if forward {
            (1..levels.len()).collect()
        } else {
            (0..levels.len() - 1).rev().collect()
        };
        for level_idx in order {
            if levels[level_idx].ids.len() <= 1 {
                continue;
            }
            let adjacent = if forward { level_idx - 1 } else { level_idx + 1 };
            let keys: HashMap<String, f32> = levels[level_idx]
                .ids
                .iter()
                .map(|id| {
                    let neighbors = if forward {
                        adjacency.predecessors(id)
                    } else {
                        adjacency.successors(id)
                    };
                    let key = barycenter(neighbors, adjacent, &positions, &level_of)
                        .unwrap_or_else(|| positions.get(id).copied().unwrap_or(0) as f32);
                    (id.clone(), key)
                })
                .collect();
            levels[level_idx].ids.sort_by(|a, b| {
                let ka = keys.get(a).copied().unwrap_or(0.0);
                let kb = keys.get(b).copied().unwrap_or(0.0);
                ka.total_cmp(&kb)
                    .then_with(|| compare_labels(a, b, &labels))
            });
            for (idx, id) in levels[level_idx].ids.iter().enumerate() {
                positions.insert(id.clone(), idx);
            }
        }
    }

    levels
}

fn barycenter(
    neighbors: &[String],
    adjacent_level: usize,
    positions: &HashMap<String, usize>,
    level_of: &HashMap<String, usize>,
) -> Option<f32> {
    let mut sum = 0.0f32;
    let mut count = 0usize;
    for neighbor in neighbors {
        if level_of.get(neighbor) != Some(&adjacent_level) {
            continue;
        }
        if let Some(pos) = positions.get(neighbor) {
            sum += *pos as f32;
            count += 1;
        }
    }
    (count > 0).then(|| sum / count as f32)
}

fn compare_labels(a: &str, b: &str, labels: &HashMap<&str, &str>) -> Ordering {
    let la = labels.get(a).copied().unwrap_or(a);
    let lb = labels.get(b).copied().unwrap_or(b);
    la.cmp(lb).then_with(|| a.cmp(b))
}
