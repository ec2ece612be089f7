//! Parallel offset of traced paths.
//!
//! A found path can be shifted sideways by a fixed distance, e.g. to
//! trace along the inside of a parcel boundary. Positive distances shift
//! to the left of the walking direction, negative to the right.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use serde::{Deserialize, Serialize};

use crate::types::{Point, Polyline};

/// How the offset curve is joined around outer corners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStyle {
    /// Circular arc approximated by `quad_segments` segments per quarter
    /// circle.
    Round,
    /// Sharp corner, clipped to a bevel past the miter limit.
    #[default]
    Miter,
    /// Straight cut across the corner.
    Bevel,
}

/// Offset parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffsetParams {
    /// Signed offset distance. Zero disables offsetting.
    pub distance: f64,

    /// Segments per quarter circle for round joins.
    pub quad_segments: u32,

    /// Corner join style.
    pub join_style: JoinStyle,

    /// Longest allowed miter, as a multiple of `|distance|`.
    pub miter_limit: f64,
}

impl OffsetParams {
    /// Default offset distance (no offset).
    pub const DEFAULT_DISTANCE: f64 = 0.0;

    /// Default segments per quarter circle.
    pub const DEFAULT_QUAD_SEGMENTS: u32 = 8;

    /// Default join style.
    pub const DEFAULT_JOIN_STYLE: JoinStyle = JoinStyle::Miter;

    /// Default miter limit.
    pub const DEFAULT_MITER_LIMIT: f64 = 5.0;
}

impl Default for OffsetParams {
    fn default() -> Self {
        Self {
            distance: Self::DEFAULT_DISTANCE,
            quad_segments: Self::DEFAULT_QUAD_SEGMENTS,
            join_style: Self::DEFAULT_JOIN_STYLE,
            miter_limit: Self::DEFAULT_MITER_LIMIT,
        }
    }
}

/// Capability to compute a single-sided offset curve.
pub trait OffsetCurve {
    /// Offset `path` by `params.distance`.
    ///
    /// Returns `None` when no usable curve exists (fewer than two
    /// distinct points in the input or output).
    fn offset_curve(&self, path: &Polyline, params: &OffsetParams) -> Option<Polyline>;
}

/// Segment-wise parallel offset.
///
/// Each segment is shifted along its normal; consecutive shifted
/// segments are joined at their intersection on inner corners and with
/// the configured [`JoinStyle`] on outer corners. The result runs in the
/// same direction as the input.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelOffset;

/// Below this, a turn is treated as straight.
const COLLINEAR_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
struct Vec2 {
    x: f64,
    y: f64,
}

impl Vec2 {
    const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn cross(self, other: Self) -> f64 {
        self.x.mul_add(other.y, -(self.y * other.x))
    }

    fn dot(self, other: Self) -> f64 {
        self.x.mul_add(other.x, self.y * other.y)
    }

    /// Normal pointing to the left of the direction.
    const fn left_normal(self) -> Self {
        Self::new(-self.y, self.x)
    }
}

/// Offset segment: shifted start and end plus the unit direction.
#[derive(Debug, Clone, Copy)]
struct Shifted {
    start: Point,
    end: Point,
    dir: Vec2,
}

fn shift(p: Point, by: Vec2) -> Point {
    Point::new(p.x + by.x, p.y + by.y)
}

/// Intersection of the infinite lines through `a` and `b`.
fn intersect(a: &Shifted, b: &Shifted) -> Option<Point> {
    let denom = a.dir.cross(b.dir);
    if denom.abs() < COLLINEAR_EPS {
        return None;
    }
    let diff = Vec2::new(b.start.x - a.start.x, b.start.y - a.start.y);
    let t = diff.cross(b.dir) / denom;
    Some(Point::new(
        a.dir.x.mul_add(t, a.start.x),
        a.dir.y.mul_add(t, a.start.y),
    ))
}

impl OffsetCurve for ParallelOffset {
    fn offset_curve(&self, path: &Polyline, params: &OffsetParams) -> Option<Polyline> {
        let mut pts: Vec<Point> = Vec::with_capacity(path.len());
        for &p in path.points() {
            if pts.last().is_none_or(|last| last.x != p.x || last.y != p.y) {
                pts.push(p);
            }
        }
        if pts.len() < 2 {
            return None;
        }

        let d = params.distance;
        if d == 0.0 {
            return Some(Polyline::new(pts));
        }

        let segments: Vec<Shifted> = pts
            .windows(2)
            .map(|w| {
                let len = w[0].distance(w[1]);
                let dir = Vec2::new((w[1].x - w[0].x) / len, (w[1].y - w[0].y) / len);
                let n = dir.left_normal();
                let by = Vec2::new(n.x * d, n.y * d);
                Shifted {
                    start: shift(w[0], by),
                    end: shift(w[1], by),
                    dir,
                }
            })
            .collect();

        let mut out = Vec::with_capacity(pts.len() * 2);
        out.push(segments[0].start);
        for (i, pair) in segments.windows(2).enumerate() {
            push_corner(&mut out, &pair[0], &pair[1], pts[i + 1], params);
        }
        if let Some(last) = segments.last() {
            out.push(last.end);
        }

        (out.len() >= 2).then(|| Polyline::new(out))
    }
}

/// Emit the join between two consecutive shifted segments around the
/// original vertex `corner`.
fn push_corner(out: &mut Vec<Point>, prev: &Shifted, next: &Shifted, corner: Point, params: &OffsetParams) {
    let d = params.distance;
    let cross = prev.dir.cross(next.dir);
    let dot = prev.dir.dot(next.dir);

    if cross.abs() < COLLINEAR_EPS && dot > 0.0 {
        out.push(prev.end);
        return;
    }

    // Turning towards the offset side: the shifted segments overlap.
    if cross * d > 0.0 {
        out.push(intersect(prev, next).unwrap_or(prev.end));
        return;
    }

    match params.join_style {
        JoinStyle::Bevel => {
            out.push(prev.end);
            out.push(next.start);
        }
        JoinStyle::Miter => match intersect(prev, next) {
            Some(tip) if tip.distance(corner) <= params.miter_limit * d.abs() => out.push(tip),
            _ => {
                out.push(prev.end);
                out.push(next.start);
            }
        },
        JoinStyle::Round => push_arc(out, prev.end, next.start, corner, params),
    }
}

/// Arc around `corner` from `from` to `to`, turning away from the offset
/// side.
fn push_arc(out: &mut Vec<Point>, from: Point, to: Point, corner: Point, params: &OffsetParams) {
    let d = params.distance;
    let radius = d.abs();
    let a0 = (from.y - corner.y).atan2(from.x - corner.x);
    let a1 = (to.y - corner.y).atan2(to.x - corner.x);

    let mut sweep = a1 - a0;
    if d > 0.0 && sweep > 0.0 {
        sweep -= TAU;
    } else if d < 0.0 && sweep < 0.0 {
        sweep += TAU;
    }
    // Antiparallel segments wrap to exactly a half turn.
    if sweep.abs() > TAU - COLLINEAR_EPS {
        sweep = -d.signum() * PI;
    }

    let step = FRAC_PI_2 / f64::from(params.quad_segments.max(1));
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let steps = ((sweep.abs() / step).ceil() as u32).max(1);

    out.push(from);
    for k in 1..steps {
        let a = sweep.mul_add(f64::from(k) / f64::from(steps), a0);
        out.push(Point::new(
            radius.mul_add(a.cos(), corner.x),
            radius.mul_add(a.sin(), corner.y),
        ));
    }
    out.push(to);
}

/// Reverse `curve` if it runs from `p2` towards `p1` rather than from
/// `p1` towards `p2`.
///
/// Offset algorithms are free to return either direction; this makes
/// the result start near the trace's start point.
#[must_use]
pub fn orient_to_endpoints(curve: Polyline, p1: Point, p2: Point) -> Polyline {
    let (Some(&start), Some(&end)) = (curve.first(), curve.last()) else {
        return curve;
    };
    let normal = start.distance(p1) + end.distance(p2);
    let reversed = start.distance(p2) + end.distance(p1);
    if reversed < normal {
        curve.reversed()
    } else {
        curve
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(points: &[(f64, f64)]) -> Polyline {
        Polyline::new(points.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    fn xy(path: &Polyline) -> Vec<(f64, f64)> {
        path.points().iter().map(|p| (p.x, p.y)).collect()
    }

    fn params(distance: f64, join_style: JoinStyle) -> OffsetParams {
        OffsetParams {
            distance,
            join_style,
            ..OffsetParams::default()
        }
    }

    fn assert_close(actual: &[(f64, f64)], expected: &[(f64, f64)]) {
        assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
        for (a, e) in actual.iter().zip(expected) {
            assert!(
                (a.0 - e.0).abs() < 1e-9 && (a.1 - e.1).abs() < 1e-9,
                "{actual:?} vs {expected:?}"
            );
        }
    }

    #[test]
    fn defaults() {
        let p = OffsetParams::default();
        assert_eq!(p.distance, 0.0);
        assert_eq!(p.quad_segments, 8);
        assert_eq!(p.join_style, JoinStyle::Miter);
        assert_eq!(p.miter_limit, 5.0);
    }

    #[test]
    fn straight_line_shifts_left_and_right() {
        let path = line(&[(0.0, 0.0), (10.0, 0.0)]);
        let left = ParallelOffset
            .offset_curve(&path, &params(1.0, JoinStyle::Miter))
            .unwrap();
        assert_close(&xy(&left), &[(0.0, 1.0), (10.0, 1.0)]);

        let right = ParallelOffset
            .offset_curve(&path, &params(-1.0, JoinStyle::Miter))
            .unwrap();
        assert_close(&xy(&right), &[(0.0, -1.0), (10.0, -1.0)]);
    }

    #[test]
    fn inner_corner_uses_intersection() {
        // Left turn; the left side is the inside.
        let path = line(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        let curve = ParallelOffset
            .offset_curve(&path, &params(1.0, JoinStyle::Round))
            .unwrap();
        assert_close(&xy(&curve), &[(0.0, 1.0), (9.0, 1.0), (9.0, 10.0)]);
    }

    #[test]
    fn outer_corner_miter() {
        let path = line(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        let curve = ParallelOffset
            .offset_curve(&path, &params(-1.0, JoinStyle::Miter))
            .unwrap();
        assert_close(&xy(&curve), &[(0.0, -1.0), (11.0, -1.0), (11.0, 10.0)]);
    }

    #[test]
    fn outer_corner_bevel() {
        let path = line(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        let curve = ParallelOffset
            .offset_curve(&path, &params(-1.0, JoinStyle::Bevel))
            .unwrap();
        assert_close(
            &xy(&curve),
            &[(0.0, -1.0), (10.0, -1.0), (11.0, 0.0), (11.0, 10.0)],
        );
    }

    #[test]
    fn outer_corner_round_stays_on_circle() {
        let path = line(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        let p = OffsetParams {
            quad_segments: 4,
            ..params(-1.0, JoinStyle::Round)
        };
        let curve = ParallelOffset.offset_curve(&path, &p).unwrap();

        // Start, four arc segments (five points), end.
        assert_eq!(curve.len(), 7);
        let corner = Point::new(10.0, 0.0);
        for p in &curve.points()[1..6] {
            assert!((p.distance(corner) - 1.0).abs() < 1e-9);
        }
        // The arc bulges away from the corner, to the lower right.
        let mid = curve.points()[3];
        assert!(mid.x > 10.0 && mid.y < 0.0);
    }

    #[test]
    fn sharp_spike_falls_back_to_bevel() {
        let path = line(&[(0.0, 0.0), (10.0, 0.0), (0.0, 0.5)]);
        let p = OffsetParams {
            miter_limit: 2.0,
            ..params(-1.0, JoinStyle::Miter)
        };
        let curve = ParallelOffset.offset_curve(&path, &p).unwrap();
        assert_eq!(curve.len(), 4);
    }

    #[test]
    fn reversal_with_round_join_makes_half_circle() {
        let path = line(&[(0.0, 0.0), (10.0, 0.0), (0.0, 0.0)]);
        let p = OffsetParams {
            quad_segments: 2,
            ..params(1.0, JoinStyle::Round)
        };
        let curve = ParallelOffset.offset_curve(&path, &p).unwrap();
        assert_eq!(curve.len(), 7);
        // Left side going east is north; the cap passes east of the tip.
        let mid = curve.points()[3];
        assert!((mid.x - 11.0).abs() < 1e-9 && mid.y.abs() < 1e-9);
    }

    #[test]
    fn duplicate_points_are_ignored() {
        let path = line(&[(0.0, 0.0), (0.0, 0.0), (10.0, 0.0), (10.0, 0.0)]);
        let curve = ParallelOffset
            .offset_curve(&path, &params(1.0, JoinStyle::Miter))
            .unwrap();
        assert_close(&xy(&curve), &[(0.0, 1.0), (10.0, 1.0)]);
    }

    #[test]
    fn degenerate_path_has_no_offset() {
        let p = params(1.0, JoinStyle::Miter);
        assert!(ParallelOffset.offset_curve(&line(&[(1.0, 1.0)]), &p).is_none());
        assert!(
            ParallelOffset
                .offset_curve(&line(&[(1.0, 1.0), (1.0, 1.0)]), &p)
                .is_none()
        );
        assert!(ParallelOffset.offset_curve(&Polyline::default(), &p).is_none());
    }

    #[test]
    fn orient_reverses_backwards_curve() {
        let curve = line(&[(0.0, 1.0), (10.0, 1.0)]);
        let oriented = orient_to_endpoints(curve.clone(), Point::new(10.0, 0.0), Point::new(0.0, 0.0));
        assert_eq!(xy(&oriented), vec![(10.0, 1.0), (0.0, 1.0)]);

        let kept = orient_to_endpoints(curve, Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        assert_eq!(xy(&kept), vec![(0.0, 1.0), (10.0, 1.0)]);
    }

    #[test]
    fn params_from_partial_json() {
        let p: OffsetParams =
            serde_json::from_str(r#"{"distance": 2.5, "join_style": "round"}"#).unwrap();
        assert_eq!(p.distance, 2.5);
        assert_eq!(p.join_style, JoinStyle::Round);
        assert_eq!(p.quad_segments, OffsetParams::DEFAULT_QUAD_SEGMENTS);
    }
}
