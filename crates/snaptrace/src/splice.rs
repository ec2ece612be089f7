//! Temporary insertion of query points into the graph, and its rollback.
//!
//! A query point that lies inside an edge has to become a vertex before
//! the shortest-path search can start or end there. [`ensure_vertex`]
//! cuts the edge in two at the point; [`revert`] undoes every cut made
//! since the last revert.
//!
//! Cuts never touch existing arena slots except the adjacency entries
//! of the cut edge's endpoints: the new vertex and both halves are
//! appended, and the cut edge is only marked inactive. Rolling back is
//! therefore a truncation to the build-time high-water mark plus
//! restoring those adjacency entries in place.

use crate::graph::{Edge, Graph, Vertex};
use crate::locate::{EdgeHit, locate_edge, locate_vertex};
use crate::types::Point;

/// Resolve `point` to a vertex index, splicing it into an edge if
/// needed.
///
/// Returns an existing vertex when one matches. Otherwise, if the point
/// lies on an active edge, that edge is split at the point and the new
/// vertex is returned. Returns `None` when the point is not on the
/// graph at all; the graph is left untouched in that case.
pub fn ensure_vertex(graph: &mut Graph, point: Point, epsilon: f64) -> Option<usize> {
    if let Some(v) = locate_vertex(graph, point, epsilon) {
        return Some(v);
    }

    let hit = locate_edge(graph, point, epsilon)?;
    Some(split_edge(graph, hit, point, epsilon))
}

/// Split the edge named by `hit` at `point` and return the new vertex.
fn split_edge(graph: &mut Graph, hit: EdgeHit, point: Point, epsilon: f64) -> usize {
    let edge = &graph.edges[hit.edge];
    let (v1, v2, source) = (edge.v1, edge.v2, edge.source);
    let (run1, run2) = edge.coords.split_at(hit.segment, point, epsilon);

    let new_vertex = graph.vertices.len();
    let e1 = graph.edges.len();
    let e2 = e1 + 1;

    // For a loop edge v1 == v2 and the edge is listed twice; each call
    // rewrites one of the two entries.
    replace_first(&mut graph.vertices[v1].edges, hit.edge, e1);
    replace_first(&mut graph.vertices[v2].edges, hit.edge, e2);
    graph.inactive_edges.insert(hit.edge);

    graph.vertices.push(Vertex {
        point,
        edges: vec![e1, e2],
    });
    graph.edges.push(Edge {
        v1,
        v2: new_vertex,
        coords: run1,
        source,
    });
    graph.edges.push(Edge {
        v1: new_vertex,
        v2,
        coords: run2,
        source,
    });
    graph.joined_vertices += 1;

    log::trace!(
        "spliced vertex {new_vertex} into edge {} (segment {}) -> edges {e1}, {e2}",
        hit.edge,
        hit.segment,
    );
    new_vertex
}

/// Replace the first occurrence of `from` in `edges` with `to`.
fn replace_first(edges: &mut [usize], from: usize, to: usize) {
    if let Some(slot) = edges.iter_mut().find(|e| **e == from) {
        *slot = to;
    }
}

/// Undo every splice made since the last revert.
///
/// Drops the spliced vertices and edge halves, puts each superseded
/// built edge back into its endpoints' adjacency lists at the positions
/// it held before, and clears the inactive set. Afterwards the vertex
/// and edge arenas and every adjacency list are identical to their
/// state right after the build. A no-op when nothing was spliced.
pub fn revert(graph: &mut Graph) {
    if graph.joined_vertices == 0 {
        graph.inactive_edges.clear();
        return;
    }

    let vertex_len = graph.base_vertex_count();
    let edge_len = graph.base_edge_count();

    let inactive = std::mem::take(&mut graph.inactive_edges);
    for &e_idx in inactive.range(..edge_len) {
        let (v1, v2) = (graph.edges[e_idx].v1, graph.edges[e_idx].v2);
        for v in [v1, v2] {
            // Every spliced half reachable from a built vertex descends
            // from exactly one built edge; put that edge back in its slot.
            let edges = &graph.edges;
            for slot in &mut graph.vertices[v].edges {
                if *slot >= edge_len && edges[*slot].source == e_idx {
                    *slot = e_idx;
                }
            }
        }
    }

    graph.vertices.truncate(vertex_len);
    graph.edges.truncate(edge_len);
    graph.joined_vertices = 0;
}
