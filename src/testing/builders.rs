//! Graph builders for common test topologies.

use crate::graph::{AttrTable, Column, Graph, NodeKey};

/// Rook-adjacency grid with unit populations.
///
/// Nodes are numbered row-major: node `r * width + c` sits at row `r`,
/// column `c`.
///
/// # Example
///
/// ```
/// use ironchain::testing::grid_graph;
///
/// let g = grid_graph(4, 4);
/// assert_eq!(g.num_nodes(), 16);
/// assert_eq!(g.num_edges(), 24);
/// ```
pub fn grid_graph(width: usize, height: usize) -> Graph {
    grid_graph_with_pops(width, height, vec![1; width * height])
}

/// Rook-adjacency grid with explicit per-node populations (row-major).
pub fn grid_graph_with_pops(width: usize, height: usize, pops: Vec<i64>) -> Graph {
    let n = width * height;
    assert_eq!(pops.len(), n, "need one population per node");
    let mut edges = Vec::new();
    for r in 0..height {
        for c in 0..width {
            let v = r * width + c;
            if c + 1 < width {
                edges.push((v, v + 1));
            }
            if r + 1 < height {
                edges.push((v, v + width));
            }
        }
    }
    let mut node_attrs = AttrTable::new(n);
    node_attrs
        .insert("population", Column::Int(pops))
        .expect("fresh table");
    Graph::from_adjacency(int_keys(n), edges, node_attrs, AttrTable::new(width_edges(width, height)))
        .expect("grid is a valid graph")
}

/// A path `0 — 1 — … — n-1` with the given populations.
pub fn path_graph(pops: &[i64]) -> Graph {
    let n = pops.len();
    let edges: Vec<(usize, usize)> = (0..n.saturating_sub(1)).map(|v| (v, v + 1)).collect();
    let mut node_attrs = AttrTable::new(n);
    node_attrs
        .insert("population", Column::Int(pops.to_vec()))
        .expect("fresh table");
    let n_edges = edges.len();
    Graph::from_adjacency(int_keys(n), edges, node_attrs, AttrTable::new(n_edges))
        .expect("path is a valid graph")
}

/// A cycle of `n` nodes with unit populations.
pub fn cycle_graph(n: usize) -> Graph {
    assert!(n >= 3, "a simple cycle needs at least 3 nodes");
    let mut edges: Vec<(usize, usize)> = (0..n - 1).map(|v| (v, v + 1)).collect();
    edges.push((n - 1, 0));
    let mut node_attrs = AttrTable::new(n);
    node_attrs
        .insert("population", Column::Int(vec![1; n]))
        .expect("fresh table");
    Graph::from_adjacency(int_keys(n), edges, node_attrs, AttrTable::new(n))
        .expect("cycle is a valid graph")
}

/// A grid carrying extra node columns alongside `population`.
pub fn grid_graph_with_columns(
    width: usize,
    height: usize,
    pops: Vec<i64>,
    extra: Vec<(&str, Column)>,
) -> Graph {
    let n = width * height;
    assert_eq!(pops.len(), n);
    let mut edges = Vec::new();
    for r in 0..height {
        for c in 0..width {
            let v = r * width + c;
            if c + 1 < width {
                edges.push((v, v + 1));
            }
            if r + 1 < height {
                edges.push((v, v + width));
            }
        }
    }
    let mut node_attrs = AttrTable::new(n);
    node_attrs
        .insert("population", Column::Int(pops))
        .expect("fresh table");
    for (name, column) in extra {
        node_attrs.insert(name, column).expect("distinct names");
    }
    let n_edges = edges.len();
    Graph::from_adjacency(int_keys(n), edges, node_attrs, AttrTable::new(n_edges))
        .expect("grid is a valid graph")
}

/// A grid with the geographic columns filled in: border cells are boundary
/// nodes with unit `boundary_perim`, every cell has unit `area`, every edge
/// unit `shared_perim`.
pub fn geo_grid_graph(width: usize, height: usize) -> Graph {
    let n = width * height;
    let mut edges = Vec::new();
    for r in 0..height {
        for c in 0..width {
            let v = r * width + c;
            if c + 1 < width {
                edges.push((v, v + 1));
            }
            if r + 1 < height {
                edges.push((v, v + width));
            }
        }
    }
    let boundary: Vec<bool> = (0..n)
        .map(|v| {
            let (r, c) = (v / width, v % width);
            r == 0 || c == 0 || r == height - 1 || c == width - 1
        })
        .collect();
    let boundary_perim: Vec<f64> = boundary.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect();

    let mut node_attrs = AttrTable::new(n);
    node_attrs
        .insert("population", Column::Int(vec![1; n]))
        .expect("fresh table");
    node_attrs
        .insert("boundary_node", Column::Bool(boundary))
        .expect("fresh table");
    node_attrs
        .insert("boundary_perim", Column::Float(boundary_perim))
        .expect("fresh table");
    node_attrs
        .insert("area", Column::Float(vec![1.0; n]))
        .expect("fresh table");

    let mut edge_attrs = AttrTable::new(edges.len());
    edge_attrs
        .insert("shared_perim", Column::Float(vec![1.0; edges.len()]))
        .expect("fresh table");

    Graph::from_adjacency(int_keys(n), edges, node_attrs, edge_attrs)
        .expect("grid is a valid graph")
}

fn int_keys(n: usize) -> Vec<NodeKey> {
    (0..n as i64).map(NodeKey::Int).collect()
}

fn width_edges(width: usize, height: usize) -> usize {
    // Rook grid edge count.
    height * width.saturating_sub(1) + width * height.saturating_sub(1)
}
