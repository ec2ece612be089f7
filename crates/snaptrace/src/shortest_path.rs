//! Dijkstra shortest path over the active edges of a [`Graph`].

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::graph::Graph;
use crate::types::{Point, Polyline};

/// Frontier entry. Ordered so that [`BinaryHeap`] pops the smallest
/// distance first; equal distances pop in insertion order.
#[derive(Debug, Clone, Copy)]
struct QueueItem {
    dist: f64,
    seq: u64,
    vertex: usize,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap.
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Find the shortest path between vertices `from` and `to`.
///
/// Edge weight is the planar length of the edge's coordinate run;
/// inactive edges are ignored. The result starts at `from`'s location
/// and ends at `to`'s, concatenating the traversed coordinate runs with
/// each shared junction point emitted once.
///
/// Returns an empty polyline when `to` is unreachable or either index
/// is out of range. When `from == to` the path is the single vertex
/// point.
#[must_use]
pub fn shortest_path(graph: &Graph, from: usize, to: usize) -> Polyline {
    let n = graph.vertex_count();
    if from >= n || to >= n {
        return Polyline::default();
    }
    if from == to {
        return Polyline::new(vec![graph.vertices[from].point]);
    }

    let mut dist = vec![f64::INFINITY; n];
    let mut finalized = vec![false; n];
    // (predecessor vertex, edge used to reach this vertex)
    let mut predecessor: Vec<Option<(usize, usize)>> = vec![None; n];

    let mut queue = BinaryHeap::new();
    let mut seq = 0_u64;
    dist[from] = 0.0;
    queue.push(QueueItem {
        dist: 0.0,
        seq,
        vertex: from,
    });

    while let Some(QueueItem { dist: d, vertex: u, .. }) = queue.pop() {
        if u == to {
            break;
        }
        if finalized[u] {
            continue;
        }

        for &e_idx in &graph.vertices[u].edges {
            if graph.inactive_edges.contains(&e_idx) {
                continue;
            }
            let edge = &graph.edges[e_idx];
            let v = edge.other_vertex(u);
            let candidate = d + edge.weight();
            if !finalized[v] && candidate < dist[v] {
                dist[v] = candidate;
                predecessor[v] = Some((u, e_idx));
                seq += 1;
                queue.push(QueueItem {
                    dist: candidate,
                    seq,
                    vertex: v,
                });
            }
        }

        finalized[u] = true;
    }

    if predecessor[to].is_none() {
        log::debug!("no path from vertex {from} to vertex {to}");
        return Polyline::default();
    }

    reconstruct(graph, &predecessor, to)
}

/// Walk predecessors back from `to` and assemble the path from the
/// start.
fn reconstruct(graph: &Graph, predecessor: &[Option<(usize, usize)>], to: usize) -> Polyline {
    let mut points: Vec<Point> = Vec::new();
    let mut v = to;

    while let Some((u, e_idx)) = predecessor[v] {
        let edge = &graph.edges[e_idx];
        // Run oriented from `v` back towards `u`.
        let mut run = edge.coords.points().to_vec();
        if edge.v1 != v {
            run.reverse();
        }
        if !points.is_empty() {
            points.pop();
        }
        points.extend(run);
        v = u;
    }

    points.reverse();
    Polyline::new(points)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use crate::splice::{ensure_vertex, revert};

    const EPS: f64 = 1e-6;

    fn line(points: &[(f64, f64)]) -> Polyline {
        Polyline::new(points.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    fn xy(path: &Polyline) -> Vec<(f64, f64)> {
        path.points().iter().map(|p| (p.x, p.y)).collect()
    }

    #[test]
    fn single_edge_path_is_the_edge_run() {
        let g = build_graph(&[line(&[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0)])], EPS);
        let path = shortest_path(&g, 0, 1);
        assert_eq!(xy(&path), vec![(0.0, 0.0), (5.0, 0.0), (10.0, 0.0)]);
        assert!((path.length() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn traversing_edge_backwards_reverses_its_run() {
        let g = build_graph(&[line(&[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0)])], EPS);
        let path = shortest_path(&g, 1, 0);
        assert_eq!(xy(&path), vec![(10.0, 0.0), (5.0, 0.0), (0.0, 0.0)]);
    }

    #[test]
    fn junction_points_are_not_duplicated() {
        // A -> B is stored forward, C -> B is stored backward.
        let g = build_graph(
            &[
                line(&[(0.0, 0.0), (5.0, 0.0)]),
                line(&[(5.0, 5.0), (5.0, 0.0)]),
            ],
            EPS,
        );
        let path = shortest_path(&g, 0, 2);
        assert_eq!(xy(&path), vec![(0.0, 0.0), (5.0, 0.0), (5.0, 5.0)]);
    }

    #[test]
    fn picks_shorter_of_two_routes() {
        // Square with a long detour and a direct diagonal.
        let g = build_graph(
            &[
                line(&[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0)]),
                line(&[(0.0, 0.0), (10.0, 10.0)]),
            ],
            EPS,
        );
        let path = shortest_path(&g, 0, 1);
        assert_eq!(xy(&path), vec![(0.0, 0.0), (10.0, 10.0)]);
    }

    #[test]
    fn multi_edge_route() {
        let g = build_graph(
            &[
                line(&[(0.0, 0.0), (1.0, 0.0)]),
                line(&[(1.0, 0.0), (2.0, 0.0)]),
                line(&[(3.0, 0.0), (2.0, 0.0)]),
            ],
            EPS,
        );
        let path = shortest_path(&g, 0, 3);
        assert_eq!(
            xy(&path),
            vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]
        );
    }

    #[test]
    fn unreachable_target_gives_empty_path() {
        let g = build_graph(
            &[
                line(&[(0.0, 0.0), (1.0, 0.0)]),
                line(&[(5.0, 5.0), (6.0, 5.0)]),
            ],
            EPS,
        );
        assert!(shortest_path(&g, 0, 2).is_empty());
    }

    #[test]
    fn out_of_range_vertex_gives_empty_path() {
        let g = build_graph(&[line(&[(0.0, 0.0), (1.0, 0.0)])], EPS);
        assert!(shortest_path(&g, 0, 7).is_empty());
        assert!(shortest_path(&g, 7, 0).is_empty());
    }

    #[test]
    fn same_vertex_gives_single_point() {
        let g = build_graph(&[line(&[(0.0, 0.0), (1.0, 0.0)])], EPS);
        assert_eq!(xy(&shortest_path(&g, 1, 1)), vec![(1.0, 0.0)]);
    }

    #[test]
    fn path_between_spliced_points() {
        let mut g = build_graph(&[line(&[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0)])], EPS);
        let a = ensure_vertex(&mut g, Point::new(2.0, 0.0), EPS).unwrap();
        let b = ensure_vertex(&mut g, Point::new(8.0, 0.0), EPS).unwrap();

        let path = shortest_path(&g, a, b);
        assert_eq!(xy(&path), vec![(2.0, 0.0), (5.0, 0.0), (8.0, 0.0)]);
        assert!((path.length() - 6.0).abs() < 1e-12);

        revert(&mut g);
        assert_eq!(g.joined_vertices(), 0);
    }

    #[test]
    fn inactive_edges_are_not_traversed() {
        let mut g = build_graph(&[line(&[(0.0, 0.0), (10.0, 0.0)])], EPS);
        let mid = ensure_vertex(&mut g, Point::new(5.0, 0.0), EPS).unwrap();

        // Only the halves carry the route; the superseded edge is skipped.
        let path = shortest_path(&g, 0, 1);
        assert_eq!(xy(&path), vec![(0.0, 0.0), (5.0, 0.0), (10.0, 0.0)]);
        assert_eq!(xy(&shortest_path(&g, mid, 1)), vec![(5.0, 0.0), (10.0, 0.0)]);
    }

    #[test]
    fn path_around_a_ring() {
        let mut g = build_graph(
            &[line(&[
                (0.0, 0.0),
                (4.0, 0.0),
                (4.0, 4.0),
                (0.0, 4.0),
                (0.0, 0.0),
            ])],
            EPS,
        );
        let a = ensure_vertex(&mut g, Point::new(1.0, 0.0), EPS).unwrap();
        let b = ensure_vertex(&mut g, Point::new(0.0, 1.0), EPS).unwrap();

        let path = shortest_path(&g, a, b);
        assert_eq!(xy(&path), vec![(1.0, 0.0), (0.0, 0.0), (0.0, 1.0)]);
    }
}
