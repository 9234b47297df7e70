//! Delaunay triangulation
//!
//! Incremental Bowyer-Watson insertion inside an enclosing super-triangle.
//! Triangles are stored counter-clockwise as indices into the input points.

use std::collections::{HashMap, HashSet};

use geo::Coord;
use geoverlay_core::{Error, Result};

use super::hull::cross;

/// Circumcircle of a triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circumcircle {
    pub center: Coord<f64>,
    pub radius_sq: f64,
}

impl Circumcircle {
    /// Circle through three points, `None` for collinear input.
    pub fn of(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> Option<Self> {
        let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
        if d.abs() < 1e-12 {
            return None;
        }
        let a2 = a.x * a.x + a.y * a.y;
        let b2 = b.x * b.x + b.y * b.y;
        let c2 = c.x * c.x + c.y * c.y;
        let ux = (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d;
        let uy = (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d;
        let (dx, dy) = (a.x - ux, a.y - uy);
        Some(Self {
            center: Coord { x: ux, y: uy },
            radius_sq: dx * dx + dy * dy,
        })
    }

    fn strictly_contains(&self, p: Coord<f64>) -> bool {
        let dx = p.x - self.center.x;
        let dy = p.y - self.center.y;
        // relative tolerance keeps co-circular points out of the cavity
        dx * dx + dy * dy < self.radius_sq * (1.0 - 1e-12)
    }
}

/// Barycentric coordinates of `p` in triangle (a, b, c).
pub fn barycentric(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> (f64, f64, f64) {
    let v0 = (b.x - a.x, b.y - a.y);
    let v1 = (c.x - a.x, c.y - a.y);
    let v2 = (p.x - a.x, p.y - a.y);

    let dot00 = v0.0 * v0.0 + v0.1 * v0.1;
    let dot01 = v0.0 * v1.0 + v0.1 * v1.1;
    let dot02 = v0.0 * v2.0 + v0.1 * v2.1;
    let dot11 = v1.0 * v1.0 + v1.1 * v1.1;
    let dot12 = v1.0 * v2.0 + v1.1 * v2.1;

    let inv_denom = 1.0 / (dot00 * dot11 - dot01 * dot01);
    let v = (dot11 * dot02 - dot01 * dot12) * inv_denom;
    let w = (dot00 * dot12 - dot01 * dot02) * inv_denom;
    (1.0 - v - w, v, w)
}

/// A Delaunay triangulation of a planar point set.
#[derive(Debug, Clone)]
pub struct Triangulation {
    points: Vec<Coord<f64>>,
    simplices: Vec<[usize; 3]>,
    /// Input indices skipped because they repeat an earlier point.
    duplicates: Vec<usize>,
}

impl Triangulation {
    /// Triangulate `points`.
    ///
    /// Needs at least three distinct, non-collinear, finite points.
    pub fn new(points: &[Coord<f64>]) -> Result<Self> {
        if points.len() < 3 {
            return Err(Error::Algorithm(format!(
                "triangulation needs at least 3 points, got {}",
                points.len()
            )));
        }
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(Error::Algorithm("triangulation input contains non-finite coordinates".into()));
        }

        let (simplices, duplicates) = bowyer_watson(points);
        if simplices.is_empty() {
            return Err(Error::Algorithm("failed to triangulate (collinear points?)".into()));
        }

        Ok(Self {
            points: points.to_vec(),
            simplices,
            duplicates,
        })
    }

    pub fn points(&self) -> &[Coord<f64>] {
        &self.points
    }

    /// Triangles as counter-clockwise index triples.
    pub fn simplices(&self) -> &[[usize; 3]] {
        &self.simplices
    }

    pub fn duplicates(&self) -> &[usize] {
        &self.duplicates
    }

    /// Corner coordinates of triangle `simplex`.
    pub fn corners(&self, simplex: usize) -> [Coord<f64>; 3] {
        let [a, b, c] = self.simplices[simplex];
        [self.points[a], self.points[b], self.points[c]]
    }

    /// Index of the triangle containing `(x, y)`, boundary inclusive.
    /// `None` outside the convex hull.
    pub fn find_simplex(&self, x: f64, y: f64) -> Option<usize> {
        let p = Coord { x, y };
        const EPS: f64 = 1e-12;
        self.simplices.iter().position(|&[a, b, c]| {
            let (u, v, w) = barycentric(p, self.points[a], self.points[b], self.points[c]);
            u >= -EPS && v >= -EPS && w >= -EPS
        })
    }

    /// Triangles sharing each undirected edge, keyed `(min, max)`.
    pub fn edge_triangles(&self) -> HashMap<(usize, usize), Vec<usize>> {
        let mut edges: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        for (t, &[a, b, c]) in self.simplices.iter().enumerate() {
            for (p, q) in [(a, b), (b, c), (c, a)] {
                edges.entry((p.min(q), p.max(q))).or_default().push(t);
            }
        }
        edges
    }
}

/// Returns CCW triangles over the input indices, plus skipped duplicates.
fn bowyer_watson(points: &[Coord<f64>]) -> (Vec<[usize; 3]>, Vec<usize>) {
    let mut min_x = f64::MAX;
    let mut min_y = f64::MAX;
    let mut max_x = f64::MIN;
    let mut max_y = f64::MIN;
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    let dx = max_x - min_x;
    let dy = max_y - min_y;
    let delta = dx.max(dy).max(1.0);
    let mid_x = (min_x + max_x) / 2.0;
    let mid_y = (min_y + max_y) / 2.0;

    // super-triangle at slots 0..3, input point i at slot i + 3
    let mut vertices: Vec<Coord<f64>> = vec![
        Coord { x: mid_x - 1000.0 * delta, y: mid_y - 600.0 * delta },
        Coord { x: mid_x + 1000.0 * delta, y: mid_y - 600.0 * delta },
        Coord { x: mid_x, y: mid_y + 1000.0 * delta },
    ];
    vertices.extend_from_slice(points);

    let mut triangles: Vec<([usize; 3], Circumcircle)> = Vec::new();
    if let Some(cc) = Circumcircle::of(vertices[0], vertices[1], vertices[2]) {
        triangles.push(([0, 1, 2], cc));
    }

    let mut seen: HashSet<(u64, u64)> = HashSet::new();
    let mut duplicates = Vec::new();

    for (i, p) in points.iter().enumerate() {
        if !seen.insert((p.x.to_bits(), p.y.to_bits())) {
            duplicates.push(i);
            continue;
        }
        let vi = i + 3;
        let point = vertices[vi];

        let mut bad = Vec::new();
        let mut keep = Vec::with_capacity(triangles.len());
        for tri in triangles.drain(..) {
            if tri.1.strictly_contains(point) {
                bad.push(tri.0);
            } else {
                keep.push(tri);
            }
        }
        triangles = keep;

        // cavity boundary: edges used by exactly one bad triangle
        let mut edge_count: HashMap<(usize, usize), usize> = HashMap::new();
        for t in &bad {
            for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                *edge_count.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }
        for t in &bad {
            for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                if edge_count[&(a.min(b), a.max(b))] == 1 {
                    let tri = ccw([a, b, vi], &vertices);
                    if let Some(cc) = Circumcircle::of(vertices[tri[0]], vertices[tri[1]], vertices[tri[2]]) {
                        triangles.push((tri, cc));
                    }
                }
            }
        }
    }

    let simplices = triangles
        .into_iter()
        .filter(|(t, _)| t.iter().all(|&v| v >= 3))
        .map(|(t, _)| [t[0] - 3, t[1] - 3, t[2] - 3])
        .collect();

    (simplices, duplicates)
}

fn ccw(t: [usize; 3], vertices: &[Coord<f64>]) -> [usize; 3] {
    if cross(vertices[t[0]], vertices[t[1]], vertices[t[2]]) < 0.0 {
        [t[0], t[2], t[1]]
    } else {
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{convex_hull, scattered};
    use approx::assert_relative_eq;

    fn c(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    fn triangle_area(tri: &Triangulation, s: usize) -> f64 {
        let [a, b, c] = tri.corners(s);
        cross(a, b, c) / 2.0
    }

    #[test]
    fn test_single_triangle() {
        let tri = Triangulation::new(&[c(0.0, 0.0), c(0.0, 1.0), c(1.0, 0.0)]).unwrap();
        assert_eq!(tri.simplices().len(), 1);
        assert!(triangle_area(&tri, 0) > 0.0);
        assert_eq!(tri.find_simplex(0.2, 0.2), Some(0));
        assert_eq!(tri.find_simplex(1.0, 1.0), None);
    }

    #[test]
    fn test_square_gives_two_triangles() {
        let tri = Triangulation::new(&[c(0.0, 0.0), c(1.0, 0.0), c(1.0, 1.0), c(0.0, 1.0)]).unwrap();
        assert_eq!(tri.simplices().len(), 2);
        let total: f64 = (0..2).map(|s| triangle_area(&tri, s)).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_structure_and_empty_circles() {
        let pts = scattered(60, 100.0);
        let tri = Triangulation::new(&pts).unwrap();
        let hull = convex_hull(&pts).unwrap();

        // every triangle is CCW and the union tiles the hull
        let total: f64 = (0..tri.simplices().len()).map(|s| triangle_area(&tri, s)).sum();
        assert!((0..tri.simplices().len()).all(|s| triangle_area(&tri, s) > 0.0));
        assert_relative_eq!(total, hull.area, epsilon = 1e-6 * hull.area);

        // Euler: t = 2n - 2 - h for points in general position
        let h = hull.vertices.len();
        assert_eq!(tri.simplices().len(), 2 * pts.len() - 2 - h);

        for &[a, b, cc] in tri.simplices() {
            let circle = Circumcircle::of(pts[a], pts[b], pts[cc]).unwrap();
            for (i, p) in pts.iter().enumerate() {
                if i != a && i != b && i != cc {
                    let d2 = (p.x - circle.center.x).powi(2) + (p.y - circle.center.y).powi(2);
                    assert!(d2 >= circle.radius_sq * (1.0 - 1e-9));
                }
            }
        }
    }

    #[test]
    fn test_find_simplex_contains_point() {
        let pts = scattered(30, 100.0);
        let tri = Triangulation::new(&pts).unwrap();
        let s = tri.find_simplex(50.0, 50.0).unwrap();
        let [a, b, cc] = tri.corners(s);
        let (u, v, w) = barycentric(c(50.0, 50.0), a, b, cc);
        assert!(u >= -1e-12 && v >= -1e-12 && w >= -1e-12);
        assert_relative_eq!(u + v + w, 1.0, epsilon = 1e-12);
        assert_eq!(tri.find_simplex(-10.0, -10.0), None);
    }

    #[test]
    fn test_duplicates_and_degenerate() {
        let tri = Triangulation::new(&[c(0.0, 0.0), c(1.0, 0.0), c(0.0, 1.0), c(1.0, 0.0)]).unwrap();
        assert_eq!(tri.duplicates(), &[3]);
        assert_eq!(tri.simplices().len(), 1);

        assert!(Triangulation::new(&[c(0.0, 0.0), c(1.0, 1.0)]).is_err());
        assert!(Triangulation::new(&[c(0.0, 0.0), c(1.0, 1.0), c(2.0, 2.0)]).is_err());
    }

    #[test]
    fn test_circumcircle() {
        let cc = Circumcircle::of(c(0.0, 0.0), c(2.0, 0.0), c(0.0, 2.0)).unwrap();
        assert_relative_eq!(cc.center.x, 1.0);
        assert_relative_eq!(cc.center.y, 1.0);
        assert_relative_eq!(cc.radius_sq, 2.0);
        assert!(Circumcircle::of(c(0.0, 0.0), c(1.0, 1.0), c(2.0, 2.0)).is_none());
    }
}
