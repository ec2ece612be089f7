//! Vertex/edge graph built from linework.
//!
//! Vertices are the distinct endpoints of the input polylines and edges
//! are the polylines themselves, keeping their full coordinate runs so
//! that a found path follows the original geometry rather than the
//! straight chords between vertices.
//!
//! Vertices and edges live in two arenas addressed by dense `usize`
//! indices. Temporary splicing (see [`crate::splice`]) only ever appends
//! to the arenas and marks superseded edges inactive, so every index
//! handed out during a build stays valid until the graph is dropped.

use std::collections::BTreeSet;
use std::fmt;

use geo::Line;
use petgraph::unionfind::UnionFind;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::locate::find_indexed_vertex;
use crate::types::{Point, Polyline};

// ---------------------------------------------------------------------------
// Type conversions at the module boundary
// ---------------------------------------------------------------------------

/// Convert a snaptrace `Point` to a `geo::Coord` (z/m dropped).
pub(crate) const fn point_to_coord(p: Point) -> geo::Coord<f64> {
    geo::Coord { x: p.x, y: p.y }
}

/// Convert a `geo::Coord` back to a snaptrace `Point`.
pub(crate) const fn coord_to_point(c: geo::Coord<f64>) -> Point {
    Point::new(c.x, c.y)
}

// ---------------------------------------------------------------------------
// R-tree entries
// ---------------------------------------------------------------------------

/// Identifies one straight segment of an edge's coordinate run.
///
/// `segment` is the index of the run vertex the segment starts at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SegmentRef {
    pub(crate) edge: usize,
    pub(crate) segment: usize,
}

/// A vertex location tagged with its vertex index.
pub(crate) type IndexedVertex = GeomWithData<geo::Point<f64>, usize>;

/// An edge segment tagged with its [`SegmentRef`].
pub(crate) type IndexedSegment = GeomWithData<Line<f64>, SegmentRef>;

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// A graph node: a distinct point where linework endpoints coincide.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub(crate) point: Point,
    pub(crate) edges: Vec<usize>,
}

impl Vertex {
    /// Location of the vertex.
    #[must_use]
    pub const fn point(&self) -> Point {
        self.point
    }

    /// Indices of the active edges incident to this vertex.
    ///
    /// A loop edge appears twice.
    #[must_use]
    pub fn edges(&self) -> &[usize] {
        &self.edges
    }
}

/// A bidirectional graph arc carrying the full coordinate run between
/// its two vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub(crate) v1: usize,
    pub(crate) v2: usize,
    pub(crate) coords: Polyline,
    /// The built edge this one was cut from (itself for built edges).
    pub(crate) source: usize,
}

impl Edge {
    /// Vertex the coordinate run starts at.
    #[must_use]
    pub const fn v1(&self) -> usize {
        self.v1
    }

    /// Vertex the coordinate run ends at.
    #[must_use]
    pub const fn v2(&self) -> usize {
        self.v2
    }

    /// Coordinates of the edge, endpoints included.
    #[must_use]
    pub const fn coords(&self) -> &Polyline {
        &self.coords
    }

    /// The vertex at the other end of the edge from `v`.
    #[must_use]
    pub const fn other_vertex(&self, v: usize) -> usize {
        if self.v1 == v { self.v2 } else { self.v1 }
    }

    /// Edge weight: the planar length of its coordinate run.
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.coords.length()
    }
}

/// Linework graph with support for temporary splices.
///
/// The built part of the graph occupies the first
/// [`base_vertex_count`](Self::base_vertex_count) vertices and
/// [`base_edge_count`](Self::base_edge_count) edges. Every splice
/// appends one vertex and two edges past that mark and records the edge
/// it superseded in the inactive set; [`crate::splice::revert`] trims
/// back to the mark.
pub struct Graph {
    pub(crate) vertices: Vec<Vertex>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) inactive_edges: BTreeSet<usize>,
    pub(crate) joined_vertices: usize,
    pub(crate) vertex_index: RTree<IndexedVertex>,
    pub(crate) segment_index: RTree<IndexedSegment>,
}

impl Graph {
    /// Number of vertices, temporary ones included.
    #[must_use]
    pub const fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges, inactive and temporary ones included.
    #[must_use]
    pub const fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All vertices, indexed by vertex id.
    #[must_use]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// All edges, indexed by edge id.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Whether `edge` currently takes part in the graph (it exists and
    /// has not been superseded by a splice).
    #[must_use]
    pub fn is_edge_active(&self, edge: usize) -> bool {
        edge < self.edges.len() && !self.inactive_edges.contains(&edge)
    }

    /// Edges currently superseded by a splice, in ascending order.
    pub fn inactive_edges(&self) -> impl Iterator<Item = usize> + '_ {
        self.inactive_edges.iter().copied()
    }

    /// Number of vertices spliced in since the last revert.
    #[must_use]
    pub const fn joined_vertices(&self) -> usize {
        self.joined_vertices
    }

    /// Number of vertices created by the build (the revert mark).
    #[must_use]
    pub const fn base_vertex_count(&self) -> usize {
        self.vertices.len() - self.joined_vertices
    }

    /// Number of edges created by the build (the revert mark).
    #[must_use]
    pub const fn base_edge_count(&self) -> usize {
        self.edges.len() - 2 * self.joined_vertices
    }

    /// Number of connected components over the active edges.
    ///
    /// Isolated vertices count as their own component.
    #[must_use]
    pub fn component_count(&self) -> usize {
        let mut uf = UnionFind::<usize>::new(self.vertices.len());
        for (idx, edge) in self.edges.iter().enumerate() {
            if !self.inactive_edges.contains(&idx) {
                uf.union(edge.v1, edge.v2);
            }
        }
        let mut labels = uf.into_labeling();
        labels.sort_unstable();
        labels.dedup();
        labels.len()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("vertices", &self.vertices.len())
            .field("edges", &self.edges.len())
            .field("inactive_edges", &self.inactive_edges)
            .field("joined_vertices", &self.joined_vertices)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Build a graph from a collection of polylines.
///
/// Each polyline becomes one edge between the vertices at its two
/// endpoints. Endpoints that coincide within `epsilon` (per axis)
/// collapse onto the vertex created first.
///
/// Lines are not noded here: two lines that cross without sharing a
/// vertex stay disconnected. Run the linework through a
/// [`Noder`](crate::noding::Noder) first when that matters.
///
/// Empty polylines and polylines with a NaN or infinite coordinate are
/// skipped. A single-point polyline, or a polyline
/// whose endpoints coincide, yields a loop edge on one vertex; its
/// weight is zero only if all of its points coincide.
#[must_use]
pub fn build_graph(lines: &[Polyline], epsilon: f64) -> Graph {
    let mut vertices: Vec<Vertex> = Vec::new();
    let mut edges: Vec<Edge> = Vec::with_capacity(lines.len());
    let mut vertex_index: RTree<IndexedVertex> = RTree::new();

    let mut get_or_insert = |p: Point, vertices: &mut Vec<Vertex>| -> usize {
        if let Some(v) = find_indexed_vertex(&vertex_index, p, epsilon) {
            return v;
        }
        let idx = vertices.len();
        vertices.push(Vertex {
            point: p,
            edges: Vec::new(),
        });
        vertex_index.insert(GeomWithData::new(geo::Point::new(p.x, p.y), idx));
        idx
    };

    for (line_idx, line) in lines.iter().enumerate() {
        let (Some(&start), Some(&end)) = (line.first(), line.last()) else {
            log::trace!("skipping empty line {line_idx}");
            continue;
        };
        if !line.is_finite() {
            log::warn!("skipping line {line_idx} with non-finite coordinates");
            continue;
        }

        let v1 = get_or_insert(start, &mut vertices);
        let v2 = get_or_insert(end, &mut vertices);

        let e_idx = edges.len();
        edges.push(Edge {
            v1,
            v2,
            coords: line.clone(),
            source: e_idx,
        });
        vertices[v1].edges.push(e_idx);
        vertices[v2].edges.push(e_idx);
    }

    let segments: Vec<IndexedSegment> = edges
        .iter()
        .enumerate()
        .flat_map(|(ei, edge)| segment_entries(ei, &edge.coords))
        .collect();

    Graph {
        vertices,
        edges,
        inactive_edges: BTreeSet::new(),
        joined_vertices: 0,
        vertex_index,
        segment_index: RTree::bulk_load(segments),
    }
}

/// R-tree entries for every segment of an edge's coordinate run.
fn segment_entries(edge: usize, coords: &Polyline) -> impl Iterator<Item = IndexedSegment> + '_ {
    let pts = coords.points();
    (0..pts.len().saturating_sub(1)).map(move |si| {
        GeomWithData::new(
            Line::new(point_to_coord(pts[si]), point_to_coord(pts[si + 1])),
            SegmentRef { edge, segment: si },
        )
    })
}
