//! snaptrace: snap-tracing along existing linework (sans-IO).
//!
//! Builds a planar graph from the polylines of one or more feature
//! layers and answers shortest-path queries between arbitrary points on
//! that linework:
//!
//! layers -> linework extraction -> optional noding -> graph build ->
//! per query: splice end points -> Dijkstra -> revert -> optional offset.
//!
//! The graph is cached by a [`Tracer`] session and rebuilt lazily after
//! configuration changes or layer change notifications. Query points
//! that fall inside an edge are spliced in temporarily, so the cached
//! graph is never permanently modified by a query.
//!
//! This crate has **no I/O dependencies**. Feature data comes in through
//! the [`FeatureSource`] trait; see the `snaptrace-bench` binary for a
//! file-backed driver.

pub mod diagnostics;
pub mod graph;
pub mod locate;
pub mod noding;
pub mod offset;
pub mod shortest_path;
pub mod source;
pub mod splice;
pub mod tracer;
pub mod types;

pub use diagnostics::{BuildDiagnostics, Clock, QueryDiagnostics, StdClock};
pub use graph::{Edge, Graph, Vertex, build_graph};
pub use locate::{EdgeHit, locate_edge, locate_vertex};
pub use noding::{Noder, NodingError, SegmentNoder};
pub use offset::{JoinStyle, OffsetCurve, OffsetParams, ParallelOffset};
pub use shortest_path::shortest_path;
pub use source::{
    Feature, FeatureRequest, FeatureSource, Geometry, LayerEvent, MemoryLayer, extract_linework,
};
pub use splice::{ensure_vertex, revert};
pub use tracer::{Tracer, VisibilityPredicate};
pub use types::{Point, Polyline, Rect, TraceError, TracerConfig};
