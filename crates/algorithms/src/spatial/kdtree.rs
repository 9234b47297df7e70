//! 2D k-d tree for nearest-neighbour queries
//!
//! Median-split construction, O(log n) average nearest and k-nearest
//! queries, and radius search.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

use geo::Coord;
use std::cmp::Ordering;

/// A 2D k-d tree over a point set.
///
/// Result indices refer to positions in the slice given to [`KdTree::build`].
#[derive(Debug, Clone)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    points: Vec<Coord<f64>>,
}

#[derive(Debug, Clone)]
struct KdNode {
    point_idx: usize,
    /// 0 = x, 1 = y
    split_dim: u8,
    left: Option<usize>,
    right: Option<usize>,
}

/// One query hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub point: Coord<f64>,
    pub distance_sq: f64,
}

impl Neighbor {
    /// Euclidean distance to the query point.
    pub fn distance(&self) -> f64 {
        self.distance_sq.sqrt()
    }
}

impl KdTree {
    /// Build a tree in O(n log² n).
    pub fn build(points: &[Coord<f64>]) -> Self {
        let points = points.to_vec();
        let mut nodes = Vec::with_capacity(points.len());
        if !points.is_empty() {
            let mut indices: Vec<usize> = (0..points.len()).collect();
            build_recursive(&points, &mut indices, 0, &mut nodes);
        }
        Self { nodes, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points in input order.
    pub fn points(&self) -> &[Coord<f64>] {
        &self.points
    }

    /// Closest point to `query`, `None` for an empty tree.
    pub fn nearest(&self, query: Coord<f64>) -> Option<Neighbor> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut best = (f64::INFINITY, 0);
        self.nearest_recursive(0, query, &mut best);
        Some(self.neighbor(best.1, best.0))
    }

    /// Up to `k` closest points, sorted by ascending distance.
    ///
    /// A query at a stored point returns that point first, so the
    /// nearest *other* point is `k_nearest(p, 2)[1]`.
    pub fn k_nearest(&self, query: Coord<f64>, k: usize) -> Vec<Neighbor> {
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }
        // ascending by distance, never longer than k
        let mut best: Vec<(f64, usize)> = Vec::with_capacity(k + 1);
        self.knn_recursive(0, query, k, &mut best);
        best.into_iter()
            .map(|(d, i)| self.neighbor(i, d))
            .collect()
    }

    /// All points with distance `<= radius`, sorted by ascending distance.
    pub fn within_radius(&self, query: Coord<f64>, radius: f64) -> Vec<Neighbor> {
        if self.nodes.is_empty() || radius.is_nan() || radius < 0.0 {
            return Vec::new();
        }
        let mut hits = Vec::new();
        self.radius_recursive(0, query, radius * radius, &mut hits);
        hits.sort_by(|a, b| cmp_dist(a.distance_sq, b.distance_sq));
        hits
    }

    fn neighbor(&self, index: usize, distance_sq: f64) -> Neighbor {
        Neighbor {
            index,
            point: self.points[index],
            distance_sq,
        }
    }

    /// Signed offset of the query from the node's split plane, and the
    /// squared distance from the query to the node's point.
    fn visit(&self, node: &KdNode, query: Coord<f64>) -> (f64, f64) {
        let p = self.points[node.point_idx];
        let dx = query.x - p.x;
        let dy = query.y - p.y;
        let diff = if node.split_dim == 0 { dx } else { dy };
        (diff, dx * dx + dy * dy)
    }

    fn nearest_recursive(&self, node_idx: usize, query: Coord<f64>, best: &mut (f64, usize)) {
        let node = &self.nodes[node_idx];
        let (diff, dist_sq) = self.visit(node, query);

        if dist_sq < best.0 {
            *best = (dist_sq, node.point_idx);
        }

        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = first {
            self.nearest_recursive(child, query, best);
        }
        if diff * diff < best.0 {
            if let Some(child) = second {
                self.nearest_recursive(child, query, best);
            }
        }
    }

    fn knn_recursive(&self, node_idx: usize, query: Coord<f64>, k: usize, best: &mut Vec<(f64, usize)>) {
        let node = &self.nodes[node_idx];
        let (diff, dist_sq) = self.visit(node, query);

        if best.len() < k || dist_sq < best[best.len() - 1].0 {
            let pos = best.partition_point(|&(d, _)| d <= dist_sq);
            best.insert(pos, (dist_sq, node.point_idx));
            best.truncate(k);
        }

        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = first {
            self.knn_recursive(child, query, k, best);
        }

        let threshold = if best.len() < k {
            f64::INFINITY
        } else {
            best[best.len() - 1].0
        };
        if diff * diff < threshold {
            if let Some(child) = second {
                self.knn_recursive(child, query, k, best);
            }
        }
    }

    fn radius_recursive(&self, node_idx: usize, query: Coord<f64>, radius_sq: f64, hits: &mut Vec<Neighbor>) {
        let node = &self.nodes[node_idx];
        let (diff, dist_sq) = self.visit(node, query);

        if dist_sq <= radius_sq {
            hits.push(self.neighbor(node.point_idx, dist_sq));
        }

        // left holds coordinates <= the split value, right holds >=
        if let Some(left) = node.left {
            if diff <= 0.0 || diff * diff <= radius_sq {
                self.radius_recursive(left, query, radius_sq, hits);
            }
        }
        if let Some(right) = node.right {
            if diff >= 0.0 || diff * diff <= radius_sq {
                self.radius_recursive(right, query, radius_sq, hits);
            }
        }
    }
}

fn cmp_dist(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn build_recursive(
    points: &[Coord<f64>],
    indices: &mut [usize],
    depth: usize,
    nodes: &mut Vec<KdNode>,
) -> usize {
    let split_dim = (depth % 2) as u8;
    let key = |i: usize| if split_dim == 0 { points[i].x } else { points[i].y };
    indices.sort_by(|&a, &b| cmp_dist(key(a), key(b)));

    let median = indices.len() / 2;
    let node_idx = nodes.len();
    nodes.push(KdNode {
        point_idx: indices[median],
        split_dim,
        left: None,
        right: None,
    });

    let (lower, rest) = indices.split_at_mut(median);
    let upper = &mut rest[1..];

    if !lower.is_empty() {
        let left = build_recursive(points, lower, depth + 1, nodes);
        nodes[node_idx].left = Some(left);
    }
    if !upper.is_empty() {
        let right = build_recursive(points, upper, depth + 1, nodes);
        nodes[node_idx].right = Some(right);
    }

    node_idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_points() -> Vec<Coord<f64>> {
        [
            (2.0, 3.0),
            (5.0, 4.0),
            (9.0, 6.0),
            (4.0, 7.0),
            (8.0, 1.0),
            (7.0, 2.0),
            (1.0, 8.0),
            (6.0, 5.0),
        ]
        .iter()
        .map(|&(x, y)| Coord { x, y })
        .collect()
    }

    fn brute_force(pts: &[Coord<f64>], q: Coord<f64>) -> Vec<f64> {
        let mut d: Vec<f64> = pts
            .iter()
            .map(|p| (p.x - q.x).powi(2) + (p.y - q.y).powi(2))
            .collect();
        d.sort_by(|a, b| a.partial_cmp(b).unwrap());
        d
    }

    #[test]
    fn test_empty_tree() {
        let tree = KdTree::build(&[]);
        let q = Coord { x: 0.0, y: 0.0 };
        assert!(tree.is_empty());
        assert!(tree.nearest(q).is_none());
        assert!(tree.k_nearest(q, 3).is_empty());
        assert!(tree.within_radius(q, 10.0).is_empty());
    }

    #[test]
    fn test_nearest_exact() {
        let tree = KdTree::build(&sample_points());
        let hit = tree.nearest(Coord { x: 5.0, y: 4.0 }).unwrap();
        assert_eq!(hit.index, 1);
        assert_relative_eq!(hit.distance_sq, 0.0);
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let pts = sample_points();
        let tree = KdTree::build(&pts);
        for qx in 0..10 {
            for qy in 0..10 {
                let q = Coord { x: qx as f64 + 0.5, y: qy as f64 + 0.5 };
                let hit = tree.nearest(q).unwrap();
                assert_relative_eq!(hit.distance_sq, brute_force(&pts, q)[0], epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_k_nearest_sorted_and_correct() {
        let pts = sample_points();
        let tree = KdTree::build(&pts);
        let q = Coord { x: 5.0, y: 5.0 };
        let hits = tree.k_nearest(q, 3);
        let expected = brute_force(&pts, q);
        assert_eq!(hits.len(), 3);
        for (hit, want) in hits.iter().zip(&expected) {
            assert_relative_eq!(hit.distance_sq, *want, epsilon = 1e-10);
        }
        assert_eq!(tree.k_nearest(q, 100).len(), pts.len());
    }

    #[test]
    fn test_self_then_neighbour() {
        let pts = sample_points();
        let tree = KdTree::build(&pts);
        let hits = tree.k_nearest(pts[0], 2);
        assert_eq!(hits[0].index, 0);
        // (2,3) -> (5,4) at sqrt(10) is the closest other point
        assert_eq!(hits[1].index, 1);
        assert_relative_eq!(hits[1].distance(), 10f64.sqrt());
    }

    #[test]
    fn test_within_radius_matches_brute_force() {
        let pts: Vec<Coord<f64>> = (0..500)
            .map(|i| Coord {
                x: ((i * 7 + 13) % 100) as f64,
                y: ((i * 11 + 37) % 100) as f64,
            })
            .collect();
        let tree = KdTree::build(&pts);
        for &(qx, qy, r) in &[(50.0, 50.0, 5.0), (0.0, 0.0, 12.5), (99.0, 10.0, 3.0)] {
            let q = Coord { x: qx, y: qy };
            let hits = tree.within_radius(q, r);
            let expected = brute_force(&pts, q).into_iter().filter(|d| *d <= r * r).count();
            assert_eq!(hits.len(), expected);
            assert!(hits.windows(2).all(|w| w[0].distance_sq <= w[1].distance_sq));
        }
    }

    #[test]
    fn test_duplicate_coordinates() {
        let pts = vec![Coord { x: 1.0, y: 1.0 }; 4];
        let tree = KdTree::build(&pts);
        assert_eq!(tree.within_radius(Coord { x: 1.0, y: 1.0 }, 0.0).len(), 4);
        assert_eq!(tree.k_nearest(Coord { x: 0.0, y: 0.0 }, 3).len(), 3);
    }
}
