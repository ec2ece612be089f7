//! Spatial lookup of query points against the graph.
//!
//! Two questions are answered separately: "is this point an existing
//! vertex?" and "does this point lie on the linework of an active
//! edge?". Only the second one requires the graph to be spliced, so
//! keeping them apart lets [`crate::splice::ensure_vertex`] avoid any
//! mutation when the point already is a vertex.
//!
//! Built vertices and edge segments are looked up through R\*-trees
//! filled at build time. Vertices and edges appended by splices are few
//! (at most a handful per query) and are scanned linearly.

use geo::line_measures::Distance;
use geo::{Closest, ClosestPoint, Euclidean, Line};
use rstar::{AABB, RTree};

use crate::graph::{Graph, IndexedVertex, point_to_coord};
use crate::types::Point;

/// An edge a query point lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeHit {
    /// Index of the edge.
    pub edge: usize,
    /// Index of the coordinate-run vertex the point falls after: the
    /// point lies on the segment from vertex `segment` to `segment + 1`.
    pub segment: usize,
}

/// Square query envelope of half-width `epsilon` around `p`.
fn envelope_around(p: Point, epsilon: f64) -> AABB<geo::Point<f64>> {
    AABB::from_corners(
        geo::Point::new(p.x - epsilon, p.y - epsilon),
        geo::Point::new(p.x + epsilon, p.y + epsilon),
    )
}

/// Find the lowest-indexed vertex in `index` at `p` (within `epsilon`
/// per axis).
pub(crate) fn find_indexed_vertex(
    index: &RTree<IndexedVertex>,
    p: Point,
    epsilon: f64,
) -> Option<usize> {
    index
        .locate_in_envelope(&envelope_around(p, epsilon))
        .filter(|entry| {
            let at = entry.geom();
            Point::new(at.x(), at.y()).same_location(p, epsilon)
        })
        .map(|entry| entry.data)
        .min()
}

/// Find the vertex whose location matches `point`.
///
/// A vertex matches when its coordinates equal the point's or differ by
/// less than `epsilon` on both axes. When several match, the one with
/// the lowest index wins. Vertices spliced in by the current query are
/// considered too, so a second query point landing on the first one
/// resolves to the same vertex.
#[must_use]
pub fn locate_vertex(graph: &Graph, point: Point, epsilon: f64) -> Option<usize> {
    if let Some(v) = find_indexed_vertex(&graph.vertex_index, point, epsilon) {
        return Some(v);
    }

    let base = graph.base_vertex_count();
    graph.vertices[base..]
        .iter()
        .position(|v| v.point.same_location(point, epsilon))
        .map(|offset| base + offset)
}

/// Whether `p` lies on `line`, i.e. its closest point on the segment is
/// no farther than `epsilon`.
fn point_on_line(line: &Line<f64>, p: Point, epsilon: f64) -> bool {
    let query = geo::Point::from(point_to_coord(p));
    let closest: geo::Point<f64> = match line.closest_point(&query) {
        Closest::Intersection(c) | Closest::SinglePoint(c) => c,
        Closest::Indeterminate => line.start.into(),
    };
    Euclidean.distance(&closest, &query) <= epsilon
}

/// Find an active edge whose linework passes through `point`.
///
/// The point must lie essentially on the edge (within `epsilon`), not
/// merely near it. Built edges are preferred over spliced ones; within
/// each group the lowest edge index, then the lowest segment index,
/// wins.
#[must_use]
pub fn locate_edge(graph: &Graph, point: Point, epsilon: f64) -> Option<EdgeHit> {
    let indexed = graph
        .segment_index
        .locate_in_envelope_intersecting(&envelope_around(point, epsilon))
        .filter(|entry| !graph.inactive_edges.contains(&entry.data.edge))
        .filter(|entry| point_on_line(entry.geom(), point, epsilon))
        .map(|entry| (entry.data.edge, entry.data.segment))
        .min();
    if let Some((edge, segment)) = indexed {
        return Some(EdgeHit { edge, segment });
    }

    let base = graph.base_edge_count();
    for (offset, edge) in graph.edges[base..].iter().enumerate() {
        let idx = base + offset;
        if graph.inactive_edges.contains(&idx) {
            continue;
        }
        let pts = edge.coords.points();
        for segment in 0..pts.len().saturating_sub(1) {
            let line = Line::new(point_to_coord(pts[segment]), point_to_coord(pts[segment + 1]));
            if point_on_line(&line, point, epsilon) {
                return Some(EdgeHit { edge: idx, segment });
            }
        }
    }
    None
}
