//! Shared types for the snaptrace graph engine.

use serde::{Deserialize, Serialize};

use crate::offset::OffsetParams;

/// A 2D point in map coordinates.
///
/// Optional `z` and `m` values are carried along with the point but are
/// ignored for topology: vertex matching, edge matching and path lengths
/// only look at `x` and `y`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (easting / longitude).
    pub x: f64,
    /// Vertical position (northing / latitude).
    pub y: f64,
    /// Optional elevation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    /// Optional measure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m: Option<f64>,
}

impl Point {
    /// Create a new 2D point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            z: None,
            m: None,
        }
    }

    /// Create a point carrying elevation and measure values.
    #[must_use]
    pub const fn with_zm(x: f64, y: f64, z: Option<f64>, m: Option<f64>) -> Self {
        Self { x, y, z, m }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Whether both points sit at the same planar location, within
    /// `epsilon` on each axis.
    ///
    /// Exactly equal coordinates always match, even with a zero epsilon.
    #[must_use]
    pub fn same_location(self, other: Self, epsilon: f64) -> bool {
        #[allow(clippy::float_cmp)]
        let exact = self.x == other.x && self.y == other.y;
        exact || ((self.x - other.x).abs() < epsilon && (self.y - other.y).abs() < epsilon)
    }
}

/// A sequence of connected points forming a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Total planar length (sum of segment lengths).
    ///
    /// Empty and single-point polylines have length zero.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.0.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    /// Whether every point has finite `x` and `y`.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|p| p.x.is_finite() && p.y.is_finite())
    }

    /// Returns a copy with the point order reversed.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self(self.0.iter().rev().copied().collect())
    }

    /// Axis-aligned bounding rectangle, or `None` for an empty polyline.
    #[must_use]
    pub fn bounding_rect(&self) -> Option<Rect> {
        let first = self.0.first()?;
        let mut rect = Rect::new(first.x, first.y, first.x, first.y);
        for p in &self.0[1..] {
            rect.include(*p);
        }
        Some(rect)
    }

    /// Split the polyline at `point`, which lies on segment `segment`
    /// (between vertices `segment` and `segment + 1`).
    ///
    /// Both halves share `point` as their common endpoint. A vertex
    /// that already sits at `point` (within `epsilon`) is replaced by
    /// `point` rather than duplicated, so no zero-length segment is
    /// introduced at the cut.
    #[must_use]
    pub fn split_at(&self, segment: usize, point: Point, epsilon: f64) -> (Self, Self) {
        let cut = (segment + 1).min(self.0.len());

        let mut head: Vec<Point> = self.0[..cut].to_vec();
        if head.last().is_some_and(|p| p.same_location(point, epsilon)) {
            head.pop();
        }
        head.push(point);

        let rest = &self.0[cut..];
        let rest = match rest.first() {
            Some(p) if p.same_location(point, epsilon) => &rest[1..],
            _ => rest,
        };
        let mut tail = Vec::with_capacity(rest.len() + 1);
        tail.push(point);
        tail.extend_from_slice(rest);

        (Self(head), Self(tail))
    }
}

impl From<Vec<Point>> for Polyline {
    fn from(points: Vec<Point>) -> Self {
        Self(points)
    }
}

/// Axis-aligned rectangle in map coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Minimum x.
    pub min_x: f64,
    /// Minimum y.
    pub min_y: f64,
    /// Maximum x.
    pub max_x: f64,
    /// Maximum y.
    pub max_y: f64,
}

impl Rect {
    /// Create a rectangle from its corner coordinates.
    #[must_use]
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Returns `true` if the rectangle has zero or negative area.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.max_x <= self.min_x || self.max_y <= self.min_y
    }

    /// Width of the rectangle.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the rectangle.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Grow the rectangle to cover `p`.
    pub fn include(&mut self, p: Point) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    /// Smallest rectangle covering both `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Whether the two rectangles overlap (touching edges count).
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

/// Configuration for a tracer session.
///
/// Fields that influence the graph itself (`epsilon`, `extent`,
/// `destination_crs`, `snap_invisible_features`) invalidate the cached
/// graph when changed through the session setters. `offset` and
/// `max_feature_count` apply to subsequent queries and builds only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerConfig {
    /// Maximum number of features pulled from the layers in one build.
    /// Zero means unlimited.
    pub max_feature_count: usize,

    /// Matching tolerance in coordinate units, used for endpoint
    /// deduplication, vertex lookup and on-edge tests.
    pub epsilon: f64,

    /// Only features intersecting this rectangle are requested.
    pub extent: Option<Rect>,

    /// Coordinate system the layers should deliver coordinates in.
    pub destination_crs: Option<String>,

    /// When `true`, features the visibility predicate would hide still
    /// contribute linework.
    pub snap_invisible_features: bool,

    /// Post-hoc offset applied to found paths.
    pub offset: OffsetParams,
}

impl TracerConfig {
    /// Default feature cap (unlimited).
    pub const DEFAULT_MAX_FEATURE_COUNT: usize = 0;

    /// Default matching tolerance.
    pub const DEFAULT_EPSILON: f64 = 1e-6;
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            max_feature_count: Self::DEFAULT_MAX_FEATURE_COUNT,
            epsilon: Self::DEFAULT_EPSILON,
            extent: None,
            destination_crs: None,
            snap_invisible_features: false,
            offset: OffsetParams::default(),
        }
    }
}

/// Errors reported by [`Tracer::find_shortest_path`](crate::Tracer::find_shortest_path).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum TraceError {
    /// The graph could not be built because the layers returned more
    /// features than the configured cap.
    #[error("too many features to build the tracing graph (limit {limit})")]
    TooManyFeatures {
        /// The cap that was exceeded.
        limit: usize,
    },

    /// The start point is neither a graph vertex nor on any edge.
    #[error("start point is not on the traced linework")]
    Point1Unresolved,

    /// The end point is neither a graph vertex nor on any edge.
    #[error("end point is not on the traced linework")]
    Point2Unresolved,

    /// Both points resolved but no connecting path exists.
    #[error("no path connects the two points")]
    NoPath,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Point tests ---

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn same_location_ignores_zm() {
        let a = Point::with_zm(1.0, 2.0, Some(10.0), None);
        let b = Point::with_zm(1.0, 2.0, Some(99.0), Some(3.0));
        assert!(a.same_location(b, 0.0));
        assert_ne!(a, b);
    }

    #[test]
    fn same_location_uses_per_axis_tolerance() {
        let a = Point::new(0.0, 0.0);
        assert!(a.same_location(Point::new(5e-7, -5e-7), 1e-6));
        assert!(!a.same_location(Point::new(2e-6, 0.0), 1e-6));
    }

    // --- Polyline tests ---

    #[test]
    fn polyline_is_finite_ignores_zm() {
        let ok = Polyline::new(vec![
            Point::with_zm(0.0, 0.0, Some(f64::NAN), None),
            Point::new(1.0, 1.0),
        ]);
        assert!(ok.is_finite());
        assert!(Polyline::default().is_finite());
        let bad = Polyline::new(vec![Point::new(0.0, 0.0), Point::new(f64::NEG_INFINITY, 1.0)]);
        assert!(!bad.is_finite());
    }

    #[test]
    fn polyline_length() {
        let pl = Polyline::new(vec![
            Point::new(0.0, 0.0),
            Point::new(3.0, 4.0),
            Point::new(3.0, 10.0),
        ]);
        assert!((pl.length() - 11.0).abs() < 1e-12);
        assert!(Polyline::default().length().abs() < f64::EPSILON);
        assert!(
            Polyline::new(vec![Point::new(1.0, 1.0)])
                .length()
                .abs()
                < f64::EPSILON
        );
    }

    #[test]
    fn polyline_reversed() {
        let pl = Polyline::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 2.0)]);
        let rev = pl.reversed();
        assert_eq!(rev.first(), Some(&Point::new(1.0, 2.0)));
        assert_eq!(rev.last(), Some(&Point::new(0.0, 0.0)));
    }

    #[test]
    fn polyline_bounding_rect() {
        let pl = Polyline::new(vec![
            Point::new(2.0, -1.0),
            Point::new(-3.0, 4.0),
            Point::new(0.0, 0.0),
        ]);
        assert_eq!(pl.bounding_rect(), Some(Rect::new(-3.0, -1.0, 2.0, 4.0)));
        assert_eq!(Polyline::default().bounding_rect(), None);
    }

    #[test]
    fn split_inside_segment() {
        let pl = Polyline::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
        ]);
        let (head, tail) = pl.split_at(1, Point::new(10.0, 4.0), 1e-9);
        assert_eq!(
            head.points(),
            &[
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 4.0)
            ]
        );
        assert_eq!(
            tail.points(),
            &[Point::new(10.0, 4.0), Point::new(10.0, 10.0)]
        );
        assert!((head.length() + tail.length() - pl.length()).abs() < 1e-12);
    }

    #[test]
    fn split_on_existing_vertex_does_not_duplicate() {
        let pl = Polyline::new(vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(10.0, 0.0),
        ]);
        // The point sits on vertex 1, reported as the end of segment 0.
        let (head, tail) = pl.split_at(0, Point::new(5.0, 0.0), 1e-9);
        assert_eq!(head.len(), 2);
        assert_eq!(tail.len(), 2);
        assert_eq!(head.last(), tail.first());
    }

    // --- Rect tests ---

    #[test]
    fn rect_intersects() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&Rect::new(10.0, 10.0, 20.0, 20.0)));
        assert!(!a.intersects(&Rect::new(11.0, 0.0, 20.0, 5.0)));
        assert!(Rect::new(1.0, 1.0, 1.0, 5.0).is_empty());
    }

    // --- Config tests ---

    #[test]
    fn tracer_config_defaults() {
        let config = TracerConfig::default();
        assert_eq!(config.max_feature_count, 0);
        assert!((config.epsilon - 1e-6).abs() < f64::EPSILON);
        assert!(config.extent.is_none());
        assert!(!config.snap_invisible_features);
        assert!(config.offset.distance.abs() < f64::EPSILON);
    }

    #[test]
    fn tracer_config_partial_json_uses_defaults() {
        let config: TracerConfig = serde_json::from_str(r#"{"max_feature_count": 50}"#).unwrap();
        assert_eq!(config.max_feature_count, 50);
        assert!((config.epsilon - TracerConfig::DEFAULT_EPSILON).abs() < f64::EPSILON);
    }

    // --- Error tests ---

    #[test]
    fn error_display() {
        assert_eq!(
            TraceError::TooManyFeatures { limit: 10 }.to_string(),
            "too many features to build the tracing graph (limit 10)",
        );
        assert_eq!(TraceError::NoPath.to_string(), "no path connects the two points");
    }

    #[test]
    fn error_serde_round_trip() {
        let err = TraceError::TooManyFeatures { limit: 3 };
        let json = serde_json::to_string(&err).unwrap();
        let back: TraceError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }

    #[test]
    fn point_serde_skips_missing_zm() {
        let json = serde_json::to_string(&Point::new(1.0, 2.0)).unwrap();
        assert_eq!(json, r#"{"x":1.0,"y":2.0}"#);
        let back: Point = serde_json::from_str(r#"{"x":1.0,"y":2.0,"z":3.0}"#).unwrap();
        assert_eq!(back.z, Some(3.0));
    }
}
