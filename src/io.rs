//! JSON adjacency-format interchange.
//!
//! The on-disk format is the node-link layout used by the wider districting
//! ecosystem:
//!
//! ```json
//! {
//!   "directed": false,
//!   "multigraph": false,
//!   "graph": {},
//!   "nodes": [{"id": 0, "population": 120, "county": "A"}, ...],
//!   "adjacency": [[{"id": 1, "shared_perim": 3.5}, ...], ...]
//! }
//! ```
//!
//! Node ids may be integers or strings; they are mapped to contiguous
//! internal ids in order of appearance and the external table is preserved
//! so [`store_json`] round-trips. The field names `boundary_node`,
//! `boundary_perim`, `area`, and `geometry` are reserved for geographic
//! usage; non-scalar fields (such as `geometry` polygons) are not
//! representable in the typed attribute tables and are dropped on load.
//!
//! Directed or multigraph inputs are rejected with `InvalidGraph`.

use crate::errors::{ChainError, Result};
use crate::graph::{AttrTable, Column, Graph, NodeKey};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Load a graph from a JSON file.
pub fn load_json(path: impl AsRef<Path>) -> Result<Graph> {
    let text = fs::read_to_string(path.as_ref())
        .map_err(|e| ChainError::Io(format!("{}: {e}", path.as_ref().display())))?;
    from_json_str(&text)
}

/// Parse a graph from JSON text.
pub fn from_json_str(text: &str) -> Result<Graph> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ChainError::Io(format!("bad JSON: {e}")))?;
    from_json_value(&value)
}

/// Build a graph from a parsed JSON document.
pub fn from_json_value(value: &Value) -> Result<Graph> {
    let obj = value
        .as_object()
        .ok_or_else(|| ChainError::InvalidGraph("top level must be an object".into()))?;

    if obj.get("directed").and_then(Value::as_bool).unwrap_or(false) {
        return Err(ChainError::InvalidGraph(
            "directed graphs are not supported".into(),
        ));
    }
    if obj.get("multigraph").and_then(Value::as_bool).unwrap_or(false) {
        return Err(ChainError::InvalidGraph("multigraphs are not supported".into()));
    }

    let nodes = obj
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| ChainError::InvalidGraph("missing 'nodes' array".into()))?;
    let adjacency = obj
        .get("adjacency")
        .and_then(Value::as_array)
        .ok_or_else(|| ChainError::InvalidGraph("missing 'adjacency' array".into()))?;
    if adjacency.len() != nodes.len() {
        return Err(ChainError::InvalidGraph(format!(
            "{} nodes but {} adjacency rows",
            nodes.len(),
            adjacency.len()
        )));
    }

    // External ids, in order of appearance.
    let mut external: Vec<NodeKey> = Vec::with_capacity(nodes.len());
    let mut by_key: HashMap<NodeKey, usize> = HashMap::with_capacity(nodes.len());
    for (idx, node) in nodes.iter().enumerate() {
        let key = node_key(
            node.get("id")
                .ok_or_else(|| ChainError::InvalidGraph(format!("node {idx} has no 'id' field")))?,
        )?;
        if by_key.insert(key.clone(), idx).is_some() {
            return Err(ChainError::InvalidGraph(format!("duplicate node id {key}")));
        }
        external.push(key);
    }

    let node_attrs = build_table(nodes.len(), nodes.iter().map(|n| n.as_object()), &["id"])?;

    // Undirected adjacency lists mention each edge twice; keep the u < v
    // occurrence and its attributes.
    let mut edges: Vec<(usize, usize)> = Vec::new();
    let mut edge_objs: Vec<Option<&Map<String, Value>>> = Vec::new();
    for (u, row) in adjacency.iter().enumerate() {
        let row = row
            .as_array()
            .ok_or_else(|| ChainError::InvalidGraph(format!("adjacency[{u}] is not a list")))?;
        for entry in row {
            let nbr_key = node_key(entry.get("id").ok_or_else(|| {
                ChainError::InvalidGraph(format!("adjacency[{u}] entry has no 'id'"))
            })?)?;
            let v = *by_key.get(&nbr_key).ok_or_else(|| {
                ChainError::InvalidGraph(format!("adjacency[{u}] names unknown node {nbr_key}"))
            })?;
            if u < v {
                edges.push((u, v));
                edge_objs.push(entry.as_object());
            }
        }
    }

    let edge_attrs = build_table(edges.len(), edge_objs.iter().copied(), &["id"])?;

    let mut graph = Graph::from_adjacency(external, edges, node_attrs, edge_attrs)?;
    if let Some(meta) = obj.get("graph").and_then(Value::as_object) {
        graph.meta = meta.clone();
    }
    Ok(graph)
}

/// Serialize a graph back to the node-link JSON document.
pub fn to_json_value(graph: &Graph) -> Value {
    let n = graph.num_nodes();
    let mut nodes = Vec::with_capacity(n);
    for v in 0..n {
        let mut obj = Map::new();
        obj.insert("id".into(), key_value(&graph.external_ids()[v]));
        for name in graph.node_attrs().names() {
            if let Ok(attr) = graph.node_attrs().get(name, v) {
                obj.insert(name.clone(), serde_json::to_value(attr).unwrap_or(Value::Null));
            }
        }
        nodes.push(Value::Object(obj));
    }

    let mut adjacency = Vec::with_capacity(n);
    for u in 0..n {
        let mut row = Vec::new();
        for &(v, e) in graph.adj(u) {
            let mut obj = Map::new();
            obj.insert("id".into(), key_value(&graph.external_ids()[v as usize]));
            for name in graph.edge_attrs().names() {
                if let Ok(attr) = graph.edge_attrs().get(name, e as usize) {
                    obj.insert(name.clone(), serde_json::to_value(attr).unwrap_or(Value::Null));
                }
            }
            row.push(Value::Object(obj));
        }
        adjacency.push(Value::Array(row));
    }

    let mut top = Map::new();
    top.insert("directed".into(), Value::Bool(false));
    top.insert("multigraph".into(), Value::Bool(false));
    top.insert("graph".into(), Value::Object(graph.meta.clone()));
    top.insert("nodes".into(), Value::Array(nodes));
    top.insert("adjacency".into(), Value::Array(adjacency));
    Value::Object(top)
}

/// Write a graph to a JSON file.
pub fn store_json(graph: &Graph, path: impl AsRef<Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(&to_json_value(graph))
        .map_err(|e| ChainError::Io(format!("encode: {e}")))?;
    fs::write(path.as_ref(), text)
        .map_err(|e| ChainError::Io(format!("{}: {e}", path.as_ref().display())))
}

fn node_key(value: &Value) -> Result<NodeKey> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(NodeKey::Int)
            .ok_or_else(|| ChainError::InvalidGraph(format!("non-integer node id {n}"))),
        Value::String(s) => Ok(NodeKey::Str(s.clone())),
        other => Err(ChainError::InvalidGraph(format!(
            "node id must be an integer or string, got {other}"
        ))),
    }
}

fn key_value(key: &NodeKey) -> Value {
    match key {
        NodeKey::Int(v) => Value::Number((*v).into()),
        NodeKey::Str(s) => Value::String(s.clone()),
    }
}

/// Infer a typed column per scalar field shared by every row.
///
/// A field missing from any row, or holding inconsistent types across rows,
/// is an error; mixed int/float columns promote to float; non-scalar values
/// are skipped entirely.
fn build_table<'a>(
    len: usize,
    rows: impl Iterator<Item = Option<&'a Map<String, Value>>> + Clone,
    reserved: &[&str],
) -> Result<AttrTable> {
    let mut table = AttrTable::new(len);
    if len == 0 {
        return Ok(table);
    }

    let first = rows
        .clone()
        .next()
        .flatten()
        .ok_or_else(|| ChainError::InvalidGraph("attribute row is not an object".into()))?;

    let mut names: Vec<String> = first
        .keys()
        .filter(|k| !reserved.contains(&k.as_str()))
        .cloned()
        .collect();
    names.sort();

    'columns: for name in names {
        let mut ints: Vec<i64> = Vec::with_capacity(len);
        let mut floats: Vec<f64> = Vec::with_capacity(len);
        let mut strs: Vec<String> = Vec::with_capacity(len);
        let mut bools: Vec<bool> = Vec::with_capacity(len);
        let mut kind: Option<&'static str> = None;

        for (idx, row) in rows.clone().enumerate() {
            let row = row
                .ok_or_else(|| ChainError::InvalidGraph("attribute row is not an object".into()))?;
            let Some(value) = row.get(&name) else {
                return Err(ChainError::InvalidGraph(format!(
                    "attribute '{name}' missing on row {idx}"
                )));
            };
            match value {
                Value::Bool(b) => match kind {
                    None | Some("bool") => {
                        kind = Some("bool");
                        bools.push(*b);
                    }
                    _ => return Err(mixed(&name)),
                },
                Value::Number(num) => match kind {
                    None | Some("int") if num.as_i64().is_some() => {
                        kind = Some("int");
                        ints.push(num.as_i64().unwrap());
                    }
                    None | Some("int") | Some("float") => {
                        if kind == Some("int") {
                            floats = ints.iter().map(|&v| v as f64).collect();
                            ints.clear();
                        }
                        kind = Some("float");
                        floats.push(num.as_f64().ok_or_else(|| mixed(&name))?);
                    }
                    _ => return Err(mixed(&name)),
                },
                Value::String(s) => match kind {
                    None | Some("str") => {
                        kind = Some("str");
                        strs.push(s.clone());
                    }
                    _ => return Err(mixed(&name)),
                },
                // geometry and other nested payloads
                _ => continue 'columns,
            }
        }

        match kind {
            Some("int") => table.insert(&name, Column::Int(ints))?,
            Some("float") => table.insert(&name, Column::Float(floats))?,
            Some("str") => table.insert(&name, Column::Str(strs))?,
            Some("bool") => table.insert(&name, Column::Bool(bools))?,
            _ => {}
        }
    }

    Ok(table)
}

fn mixed(name: &str) -> ChainError {
    ChainError::InvalidGraph(format!("attribute '{name}' has mixed types across rows"))
}
