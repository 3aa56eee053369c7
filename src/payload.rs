//! Payload normalization.
//!
//! Hosts hand over loosely shaped JSON. Everything here is total: missing or
//! malformed fields are defaulted or dropped, never reported.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadNode {
    pub id: String,
    pub nid: Option<u64>,
    pub label: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadEdge {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NormalizedPayload {
    pub current_nid: u64,
    pub nodes: Vec<PayloadNode>,
    pub edges: Vec<PayloadEdge>,
    pub raw_edges: Vec<(u64, u64)>,
    pub raw_labels: BTreeMap<String, Value>,
    pub estimated_height: f32,
}

impl NormalizedPayload {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

pub fn normalize(raw: &Value) -> NormalizedPayload {
    let current_nid = raw.get("current_nid").and_then(positive_int).unwrap_or(0);

    let mut nodes = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for entry in array_field(raw, "nodes") {
        let Some(node) = normalize_node(entry) else {
            continue;
        };
        if seen.insert(node.id.clone()) {
            nodes.push(node);
        }
    }

    let edges = array_field(raw, "edges")
        .iter()
        .filter_map(|entry| {
            Some(PayloadEdge {
                source: id_string(entry.get("source")?)?,
                target: id_string(entry.get("target")?)?,
            })
        })
        .collect();

    let raw_edges = array_field(raw, "raw_edges")
        .iter()
        .filter_map(|pair| {
            let items = pair.as_array()?;
            if items.len() != 2 {
                return None;
            }
            Some((positive_int(&items[0])?, positive_int(&items[1])?))
        })
        .collect();

    let raw_labels = raw
        .get("raw_labels")
        .and_then(Value::as_object)
        .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();

    let estimated_height = raw
        .get("estimated_height")
        .and_then(Value::as_f64)
        .filter(|value| value.is_finite() && *value <= f32::MAX as f64)
        .map(|value| value.max(0.0) as f32)
        .unwrap_or(0.0);

    NormalizedPayload {
        current_nid,
        nodes,
        edges,
        raw_edges,
        raw_labels,
        estimated_height,
    }
}

/// Parses JSON or JSON5 text and normalizes it.
pub fn parse_payload_str(input: &str) -> Result<NormalizedPayload> {
    Ok(normalize(&parse_value(input)?))
}

/// Like [`parse_payload_str`], but a top-level array yields one payload per
/// element.
pub fn parse_payloads_str(input: &str) -> Result<Vec<NormalizedPayload>> {
    match parse_value(input)? {
        Value::Array(items) => Ok(items.iter().map(normalize).collect()),
        value => Ok(vec![normalize(&value)]),
    }
}

fn parse_value(input: &str) -> Result<Value> {
    match serde_json::from_str::<Value>(input) {
        Ok(value) => Ok(value),
        Err(_) => json5::from_str::<Value>(input).map_err(|err| Error::Payload(err.to_string())),
    }
}

fn normalize_node(entry: &Value) -> Option<PayloadNode> {
    let nid = entry.get("nid").and_then(positive_int);
    let id = match entry.get("id").and_then(id_string) {
        Some(id) => id,
        None => format!("n{}", nid?),
    };
    let label = entry
        .get("label")
        .and_then(|value| match value {
            Value::String(text) => Some(text.clone()),
            Value::Number(num) => Some(num.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| id.clone());
    let color = entry
        .get("color")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|color| !color.is_empty())
        .map(str::to_string);
    Some(PayloadNode {
        id,
        nid,
        label,
        color,
    })
}

fn array_field<'a>(raw: &'a Value, key: &str) -> &'a [Value] {
    raw.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(num) => Some(num.to_string()),
        _ => None,
    }
}

fn positive_int(value: &Value) -> Option<u64> {
    match value {
        Value::Number(num) => {
            if let Some(int) = num.as_u64() {
                return (int > 0).then_some(int);
            }
            let float = num.as_f64()?;
            (float.is_finite() && float >= 1.0 && float.fract() == 0.0 && float <= u64::MAX as f64)
                .then_some(float as u64)
        }
        Value::String(text) => text.trim().parse::<u64>().ok().filter(|int| *int > 0),
        _ => None,
    }
}
