//! The tracer session: a lazily built graph plus the public query.

use std::fmt;
use std::rc::Rc;

use crate::diagnostics::{BuildDiagnostics, Clock, QueryDiagnostics, StdClock};
use crate::graph::{Graph, build_graph};
use crate::locate::{locate_edge, locate_vertex};
use crate::noding::Noder;
use crate::offset::{JoinStyle, OffsetCurve, OffsetParams, ParallelOffset, orient_to_endpoints};
use crate::shortest_path::shortest_path;
use crate::source::{Feature, FeatureRequest, FeatureSource, LayerEvent, extract_linework};
use crate::splice::{ensure_vertex, revert};
use crate::types::{Point, Polyline, Rect, TraceError, TracerConfig};

/// Predicate deciding whether a feature is currently visible.
///
/// Stands in for a map render context: features it rejects contribute
/// no linework unless [`TracerConfig::snap_invisible_features`] is set.
pub type VisibilityPredicate = Rc<dyn Fn(&Feature) -> bool>;

/// A tracing session over a set of layers.
///
/// The graph is built on first use and cached. It stays cached until a
/// configuration change or a [`LayerEvent`] invalidates it; the next
/// query then rebuilds it from the layers. Queries splice their end
/// points into the cached graph and always roll the splices back before
/// returning, so one query never sees another's temporary vertices.
///
/// Single-threaded: layers and the visibility predicate are shared via
/// [`Rc`].
pub struct Tracer<C: Clock = StdClock> {
    config: TracerConfig,
    layers: Vec<Rc<dyn FeatureSource>>,
    render_context: Option<VisibilityPredicate>,
    noder: Option<Box<dyn Noder>>,
    offsetter: Box<dyn OffsetCurve>,
    clock: C,
    /// `None` while invalidated.
    graph: Option<Graph>,
    topology_problem: bool,
    last_build: Option<BuildDiagnostics>,
    last_query: Option<QueryDiagnostics>,
}

impl Tracer<StdClock> {
    /// Session with default configuration and no layers.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(TracerConfig::default(), StdClock)
    }

    /// Session with the given configuration and no layers.
    #[must_use]
    pub fn with_config(config: TracerConfig) -> Self {
        Self::with_clock(config, StdClock)
    }
}

impl Default for Tracer<StdClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> fmt::Debug for Tracer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("config", &self.config)
            .field(
                "layers",
                &self.layers.iter().map(|l| l.name()).collect::<Vec<_>>(),
            )
            .field("render_context", &self.render_context.is_some())
            .field("noder", &self.noder.is_some())
            .field("graph", &self.graph)
            .field("topology_problem", &self.topology_problem)
            .finish_non_exhaustive()
    }
}

impl<C: Clock> Tracer<C> {
    /// Session timed by `clock`.
    #[must_use]
    pub fn with_clock(config: TracerConfig, clock: C) -> Self {
        Self {
            config,
            layers: Vec::new(),
            render_context: None,
            noder: None,
            offsetter: Box::new(ParallelOffset),
            clock,
            graph: None,
            topology_problem: false,
            last_build: None,
            last_query: None,
        }
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &TracerConfig {
        &self.config
    }

    /// Layers the graph is built from, in order.
    #[must_use]
    pub fn layers(&self) -> &[Rc<dyn FeatureSource>] {
        &self.layers
    }

    /// Replace the layer set. A no-op when `layers` holds the same
    /// layers (by identity) in the same order.
    pub fn set_layers(&mut self, layers: Vec<Rc<dyn FeatureSource>>) {
        let unchanged = self.layers.len() == layers.len()
            && self
                .layers
                .iter()
                .zip(&layers)
                .all(|(a, b)| Rc::ptr_eq(a, b));
        if unchanged {
            return;
        }
        self.layers = layers;
        self.invalidate();
    }

    /// Restrict the linework to features intersecting `extent`. A no-op
    /// when the extent is unchanged.
    pub fn set_extent(&mut self, extent: Option<Rect>) {
        if self.config.extent == extent {
            return;
        }
        self.config.extent = extent;
        self.invalidate();
    }

    /// Coordinate system the layers are asked to deliver coordinates in.
    pub fn set_destination_crs(&mut self, crs: Option<String>) {
        self.config.destination_crs = crs;
        self.invalidate();
    }

    /// Install or remove the visibility predicate features are filtered by.
    pub fn set_render_context(&mut self, visibility: Option<VisibilityPredicate>) {
        self.render_context = visibility;
        self.invalidate();
    }

    /// Let features hidden by the render context contribute linework.
    pub fn set_snap_invisible_features(&mut self, snap: bool) {
        self.config.snap_invisible_features = snap;
        self.invalidate();
    }

    /// Change the matching tolerance. The graph is rebuilt since
    /// endpoint deduplication depends on it.
    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.config.epsilon = epsilon;
        self.invalidate();
    }

    /// Install or remove the noding step applied before graph builds.
    pub fn set_noder(&mut self, noder: Option<Box<dyn Noder>>) {
        self.noder = noder;
        self.invalidate();
    }

    /// Cap on features per build; zero means unlimited. Takes effect at
    /// the next build.
    pub const fn set_max_feature_count(&mut self, max: usize) {
        self.config.max_feature_count = max;
    }

    /// Offset distance applied to subsequent results; zero disables it.
    pub const fn set_offset(&mut self, distance: f64) {
        self.config.offset.distance = distance;
    }

    /// Offset distance applied to results.
    #[must_use]
    pub const fn offset(&self) -> f64 {
        self.config.offset.distance
    }

    /// Offset curve quality and join parameters for subsequent results.
    pub const fn set_offset_parameters(
        &mut self,
        quad_segments: u32,
        join_style: JoinStyle,
        miter_limit: f64,
    ) {
        self.config.offset.quad_segments = quad_segments;
        self.config.offset.join_style = join_style;
        self.config.offset.miter_limit = miter_limit;
    }

    /// Full offset settings, distance included.
    #[must_use]
    pub const fn offset_parameters(&self) -> &OffsetParams {
        &self.config.offset
    }

    /// Replace the offset algorithm.
    pub fn set_offset_curve(&mut self, offsetter: Box<dyn OffsetCurve>) {
        self.offsetter = offsetter;
    }

    /// React to a change notification from one of the layers.
    ///
    /// Events naming a layer not in the current set are ignored.
    pub fn handle_event(&mut self, event: &LayerEvent) {
        let name = event.layer();
        if !self.layers.iter().any(|l| l.name() == name) {
            return;
        }
        if let LayerEvent::LayerRemoved(_) = event {
            self.layers.retain(|l| l.name() != name);
        }
        log::debug!("{event:?}");
        self.invalidate();
    }

    /// Drop the cached graph; the next query rebuilds it.
    pub fn invalidate(&mut self) {
        if self.graph.take().is_some() {
            log::debug!("tracer graph invalidated");
        }
    }

    /// Whether a graph is cached.
    #[must_use]
    pub const fn is_built(&self) -> bool {
        self.graph.is_some()
    }

    /// The cached graph, if built.
    #[must_use]
    pub const fn graph(&self) -> Option<&Graph> {
        self.graph.as_ref()
    }

    /// Whether the last build fell back to un-noded linework because
    /// noding failed, or dropped lines with non-finite coordinates.
    #[must_use]
    pub const fn has_topology_problem(&self) -> bool {
        self.topology_problem
    }

    /// Diagnostics of the most recent successful build.
    #[must_use]
    pub const fn last_build_diagnostics(&self) -> Option<&BuildDiagnostics> {
        self.last_build.as_ref()
    }

    /// Diagnostics of the most recent successful query.
    #[must_use]
    pub const fn last_query_diagnostics(&self) -> Option<&QueryDiagnostics> {
        self.last_query.as_ref()
    }

    /// Build the graph unless it is already cached.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::TooManyFeatures`] when the layers yield
    /// more features than [`TracerConfig::max_feature_count`]; the
    /// session stays unbuilt.
    pub fn ensure_built(&mut self) -> Result<(), TraceError> {
        if self.graph.is_none() {
            self.graph = Some(self.build()?);
        }
        Ok(())
    }

    fn build(&mut self) -> Result<Graph, TraceError> {
        let total_start = self.clock.now();
        self.topology_problem = false;

        let request = FeatureRequest {
            extent: self.config.extent,
            destination_crs: self.config.destination_crs.as_deref(),
        };
        let visibility = if self.config.snap_invisible_features {
            None
        } else {
            self.render_context.as_ref()
        };
        let cap = self.config.max_feature_count;

        let extract_start = self.clock.now();
        let mut lines = Vec::new();
        let mut feature_count = 0_usize;
        for layer in &self.layers {
            for feature in layer.features(&request) {
                let Some(geometry) = &feature.geometry else {
                    continue;
                };
                if visibility.is_some_and(|visible| !visible(&feature)) {
                    continue;
                }
                feature_count += 1;
                if cap != 0 && feature_count > cap {
                    log::warn!("tracer graph not built: more than {cap} features");
                    return Err(TraceError::TooManyFeatures { limit: cap });
                }
                extract_linework(geometry, &mut lines);
            }
        }
        let extract = self.clock.elapsed(&extract_start);

        let mut noding = None;
        if let Some(noder) = &self.noder {
            let noding_start = self.clock.now();
            match noder.node(&lines) {
                Ok(noded) => lines = noded,
                Err(e) => {
                    log::warn!("noding failed, tracing un-noded linework: {e}");
                    self.topology_problem = true;
                }
            }
            noding = Some(self.clock.elapsed(&noding_start));
        }

        let before = lines.len();
        lines.retain(Polyline::is_finite);
        if lines.len() < before {
            log::warn!(
                "dropped {} lines with non-finite coordinates",
                before - lines.len()
            );
            self.topology_problem = true;
        }

        let make_start = self.clock.now();
        let graph = build_graph(&lines, self.config.epsilon);
        let make_graph = self.clock.elapsed(&make_start);

        let diagnostics = BuildDiagnostics {
            extract,
            noding,
            make_graph,
            total: self.clock.elapsed(&total_start),
            feature_count,
            line_count: lines.len(),
            vertex_count: graph.vertex_count(),
            edge_count: graph.edge_count(),
            component_count: graph.component_count(),
            topology_problem: self.topology_problem,
        };
        log::debug!(
            "tracer graph built: {} features, {} vertices, {} edges in {:?}",
            diagnostics.feature_count,
            diagnostics.vertex_count,
            diagnostics.edge_count,
            diagnostics.total,
        );
        self.last_build = Some(diagnostics);
        Ok(graph)
    }

    /// Find the shortest path along the linework from `p1` to `p2`.
    ///
    /// Each point must be a graph vertex or lie on an edge (within
    /// [`TracerConfig::epsilon`]). The result starts at `p1` and ends at
    /// `p2`; with a non-zero offset configured it is the offset of that
    /// path instead, still oriented from `p1` towards `p2`.
    ///
    /// # Errors
    ///
    /// - [`TraceError::TooManyFeatures`] if the graph could not be built.
    /// - [`TraceError::Point1Unresolved`] / [`TraceError::Point2Unresolved`]
    ///   if a point is not on the linework.
    /// - [`TraceError::NoPath`] if the points are not connected.
    pub fn find_shortest_path(&mut self, p1: Point, p2: Point) -> Result<Polyline, TraceError> {
        let graph = match self.graph.take() {
            Some(graph) => graph,
            None => self.build()?,
        };
        let graph = self.graph.insert(graph);
        let epsilon = self.config.epsilon;

        let prepare_start = self.clock.now();
        let endpoints = ensure_vertex(graph, p1, epsilon)
            .ok_or(TraceError::Point1Unresolved)
            .and_then(|v1| {
                ensure_vertex(graph, p2, epsilon)
                    .map(|v2| (v1, v2))
                    .ok_or(TraceError::Point2Unresolved)
            });
        let spliced_vertices = graph.joined_vertices();
        let prepare = self.clock.elapsed(&prepare_start);

        let search_start = self.clock.now();
        let path = endpoints.map(|(v1, v2)| shortest_path(graph, v1, v2));
        revert(graph);
        let search = self.clock.elapsed(&search_start);

        let path = path?;
        if path.is_empty() {
            log::debug!("no path between {p1:?} and {p2:?}");
            return Err(TraceError::NoPath);
        }

        let mut offset = None;
        let path = if self.config.offset.distance != 0.0 && path.len() >= 2 {
            let offset_start = self.clock.now();
            let result = self.offset_path(path);
            offset = Some(self.clock.elapsed(&offset_start));
            result
        } else {
            path
        };

        let diagnostics = QueryDiagnostics {
            prepare,
            search,
            offset,
            spliced_vertices,
            path_points: path.len(),
            path_length: path.length(),
        };
        log::debug!("{}", diagnostics.report());
        self.last_query = Some(diagnostics);
        Ok(path)
    }

    /// Offset `path`, keeping its direction. Falls back to `path` when
    /// the offset produces nothing usable.
    fn offset_path(&self, path: Polyline) -> Polyline {
        let (Some(&start), Some(&end)) = (path.first(), path.last()) else {
            return path;
        };
        match self.offsetter.offset_curve(&path, &self.config.offset) {
            Some(curve) if curve.len() >= 2 => orient_to_endpoints(curve, start, end),
            _ => {
                log::debug!("offset curve failed, returning the raw path");
                path
            }
        }
    }

    /// Whether `point` is a graph vertex or lies on an edge.
    ///
    /// Builds the graph if needed; returns `false` if that fails.
    pub fn is_point_snapped(&mut self, point: Point) -> bool {
        if self.ensure_built().is_err() {
            return false;
        }
        let Some(graph) = &self.graph else {
            return false;
        };
        let epsilon = self.config.epsilon;
        locate_vertex(graph, point, epsilon).is_some() || locate_edge(graph, point, epsilon).is_some()
    }
}
