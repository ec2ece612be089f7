//! Noding: cutting linework at every mutual intersection.
//!
//! Layers seldom break their lines where they cross. Without noding,
//! two roads crossing in an X produce four endpoints and no shared
//! vertex, so a trace cannot turn at the crossing. A [`Noder`] rewrites
//! the extracted linework so that every intersection becomes a line
//! endpoint before the graph is built.

use std::collections::BTreeSet;

use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{Coord, Line};
use rstar::primitives::GeomWithData;
use rstar::{RTree, RTreeObject};

use crate::graph::{coord_to_point, point_to_coord};
use crate::types::Polyline;

/// Noding failure. The tracer falls back to the un-noded linework and
/// flags a topology problem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodingError {
    /// A coordinate is NaN or infinite; intersections are undefined.
    #[error("line {line} has a non-finite coordinate")]
    NonFiniteCoordinate {
        /// Index of the offending line in the input.
        line: usize,
    },
}

/// Strategy for splitting linework at intersections.
pub trait Noder {
    /// Return `lines` cut so that no two output lines cross or touch
    /// except at their endpoints.
    ///
    /// # Errors
    ///
    /// Returns a [`NodingError`] when the input cannot be noded.
    fn node(&self, lines: &[Polyline]) -> Result<Vec<Polyline>, NodingError>;
}

/// Segment-pair noder backed by an R\*-tree of all input segments.
///
/// Handles proper crossings, T-junctions (a line ending on another's
/// interior), lines touching at interior vertices, and collinear
/// overlaps. Cut points get no z/m values.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentNoder;

type SegmentEntry = GeomWithData<Line<f64>, (usize, usize)>;

/// Where one input line must be cut.
#[derive(Debug, Default)]
struct LineCuts {
    /// Cut points strictly inside each segment.
    segments: Vec<Vec<Coord<f64>>>,
    /// Interior vertex indices to cut at.
    vertices: BTreeSet<usize>,
}

impl LineCuts {
    fn for_line(line: &Polyline) -> Self {
        Self {
            segments: vec![Vec::new(); line.len().saturating_sub(1)],
            vertices: BTreeSet::new(),
        }
    }

    /// Record that the line must be cut at `at`, which lies on `segment`.
    fn record(&mut self, line_len: usize, segment: usize, seg: &Line<f64>, at: Coord<f64>) {
        if at == seg.start {
            if segment > 0 {
                self.vertices.insert(segment);
            }
        } else if at == seg.end {
            if segment + 2 < line_len {
                self.vertices.insert(segment + 1);
            }
        } else {
            self.segments[segment].push(at);
        }
    }
}

impl Noder for SegmentNoder {
    fn node(&self, lines: &[Polyline]) -> Result<Vec<Polyline>, NodingError> {
        for (idx, line) in lines.iter().enumerate() {
            if !line.is_finite() {
                return Err(NodingError::NonFiniteCoordinate { line: idx });
            }
        }

        let entries: Vec<SegmentEntry> = lines
            .iter()
            .enumerate()
            .flat_map(|(l, line)| {
                line.points().windows(2).enumerate().map(move |(s, w)| {
                    GeomWithData::new(Line::new(point_to_coord(w[0]), point_to_coord(w[1])), (l, s))
                })
            })
            .collect();
        let tree = RTree::bulk_load(entries);

        let mut cuts: Vec<LineCuts> = lines.iter().map(LineCuts::for_line).collect();

        for entry in tree.iter() {
            let (la, sa) = entry.data;
            let a = *entry.geom();
            for candidate in tree.locate_in_envelope_intersecting(&entry.envelope()) {
                let (lb, sb) = candidate.data;
                // Each unordered pair once, never a segment with itself.
                if (lb, sb) <= (la, sa) {
                    continue;
                }
                let b = *candidate.geom();
                let Some(hit) = line_intersection(a, b) else {
                    continue;
                };
                match hit {
                    LineIntersection::SinglePoint { intersection, .. } => {
                        // Consecutive segments of one line always meet at
                        // their shared vertex.
                        if la == lb && sa.abs_diff(sb) == 1 {
                            continue;
                        }
                        cuts[la].record(lines[la].len(), sa, &a, intersection);
                        cuts[lb].record(lines[lb].len(), sb, &b, intersection);
                    }
                    LineIntersection::Collinear { intersection } => {
                        for at in [intersection.start, intersection.end] {
                            cuts[la].record(lines[la].len(), sa, &a, at);
                            cuts[lb].record(lines[lb].len(), sb, &b, at);
                        }
                    }
                }
            }
        }

        let mut noded = Vec::with_capacity(lines.len());
        for (line, line_cuts) in lines.iter().zip(&mut cuts) {
            cut_line(line, line_cuts, &mut noded);
        }
        log::debug!("noded {} lines into {} pieces", lines.len(), noded.len());
        Ok(noded)
    }
}

/// Cut `line` as planned in `cuts`, appending the pieces to `out`.
fn cut_line(line: &Polyline, cuts: &mut LineCuts, out: &mut Vec<Polyline>) {
    let pts = line.points();
    let Some((&first, _)) = pts.split_first() else {
        return;
    };

    let mut current = vec![first];
    for (i, w) in pts.windows(2).enumerate() {
        let start = point_to_coord(w[0]);
        let along = |c: &Coord<f64>| (c.x - start.x).hypot(c.y - start.y);

        let seg_cuts = &mut cuts.segments[i];
        seg_cuts.sort_by(|a, b| along(a).total_cmp(&along(b)));
        seg_cuts.dedup();
        for &c in seg_cuts.iter() {
            let p = coord_to_point(c);
            current.push(p);
            out.push(Polyline::new(std::mem::replace(&mut current, vec![p])));
        }

        current.push(w[1]);
        if cuts.vertices.contains(&(i + 1)) {
            out.push(Polyline::new(std::mem::replace(&mut current, vec![w[1]])));
        }
    }
    out.push(Polyline::new(current));
}
