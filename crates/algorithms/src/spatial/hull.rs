//! Convex hull of a planar point set (Andrew's monotone chain)

use geo::{Coord, LineString, Polygon};
use geoverlay_core::{Error, Result};

/// Convex hull as indices into the input points.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexHull {
    /// Hull vertices in counter-clockwise order, starting at the
    /// lowest-x (then lowest-y) point. Collinear boundary points are dropped.
    pub vertices: Vec<usize>,
    /// Hull edges as index pairs, `vertices[i] -> vertices[i + 1]`.
    pub simplices: Vec<[usize; 2]>,
    pub area: f64,
    pub perimeter: f64,
}

impl ConvexHull {
    /// The hull as a closed polygon over `points`.
    pub fn polygon(&self, points: &[Coord<f64>]) -> Polygon<f64> {
        let ring: Vec<Coord<f64>> = self.vertices.iter().map(|&i| points[i]).collect();
        Polygon::new(LineString::from(ring), vec![])
    }

    /// Whether input point `index` is a hull vertex.
    pub fn contains_vertex(&self, index: usize) -> bool {
        self.vertices.contains(&index)
    }
}

/// Twice the signed area of triangle (o, a, b); positive for a left turn.
pub(crate) fn cross(o: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Compute the convex hull of `points`.
///
/// Fails with [`Error::Algorithm`] when fewer than three distinct,
/// non-collinear points are given.
pub fn convex_hull(points: &[Coord<f64>]) -> Result<ConvexHull> {
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(Error::Algorithm("convex hull input contains non-finite coordinates".into()));
    }

    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| {
        let (pa, pb) = (points[a], points[b]);
        pa.x.total_cmp(&pb.x).then(pa.y.total_cmp(&pb.y))
    });
    order.dedup_by(|a, b| points[*a] == points[*b]);

    if order.len() < 3 {
        return Err(Error::Algorithm(format!(
            "convex hull needs at least 3 distinct points, got {}",
            order.len()
        )));
    }

    let mut hull: Vec<usize> = Vec::with_capacity(2 * order.len());

    // lower chain
    for &i in &order {
        while hull.len() >= 2
            && cross(points[hull[hull.len() - 2]], points[hull[hull.len() - 1]], points[i]) <= 0.0
        {
            hull.pop();
        }
        hull.push(i);
    }

    // upper chain
    let lower_len = hull.len() + 1;
    for &i in order.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && cross(points[hull[hull.len() - 2]], points[hull[hull.len() - 1]], points[i]) <= 0.0
        {
            hull.pop();
        }
        hull.push(i);
    }
    hull.pop();

    if hull.len() < 3 {
        return Err(Error::Algorithm("convex hull of collinear points is degenerate".into()));
    }

    let n = hull.len();
    let simplices: Vec<[usize; 2]> = (0..n).map(|k| [hull[k], hull[(k + 1) % n]]).collect();

    let mut twice_area = 0.0;
    let mut perimeter = 0.0;
    for &[a, b] in &simplices {
        let (pa, pb) = (points[a], points[b]);
        twice_area += pa.x * pb.y - pb.x * pa.y;
        perimeter += (pb.x - pa.x).hypot(pb.y - pa.y);
    }

    Ok(ConvexHull {
        vertices: hull,
        simplices,
        area: twice_area / 2.0,
        perimeter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{Area, Contains, Point};

    fn c(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    #[test]
    fn test_square_with_interior_points() {
        let pts = vec![
            c(0.0, 0.0),
            c(2.0, 0.0),
            c(1.0, 1.0),
            c(2.0, 2.0),
            c(0.0, 2.0),
            c(0.5, 1.5),
            c(1.0, 0.0), // on an edge
        ];
        let hull = convex_hull(&pts).unwrap();
        assert_eq!(hull.vertices, vec![0, 1, 3, 4]);
        assert_eq!(hull.simplices.len(), 4);
        assert_eq!(hull.simplices[3], [4, 0]);
        assert_relative_eq!(hull.area, 4.0);
        assert_relative_eq!(hull.perimeter, 8.0);
        assert!(!hull.contains_vertex(6));
    }

    #[test]
    fn test_polygon_matches_geo() {
        let pts: Vec<Coord<f64>> = (0..40)
            .map(|i| {
                let t = i as f64 * 0.7;
                c(t.cos() * (1.0 + (i % 3) as f64), t.sin() * (1.0 + (i % 5) as f64))
            })
            .collect();
        let hull = convex_hull(&pts).unwrap();
        let poly = hull.polygon(&pts);
        assert_relative_eq!(poly.signed_area(), hull.area, epsilon = 1e-9);
        assert!(hull.area > 0.0);
        for (i, p) in pts.iter().enumerate() {
            if !hull.contains_vertex(i) {
                assert!(poly.contains(&Point::from(*p)) || poly.exterior().contains(&Point::from(*p)));
            }
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(convex_hull(&[c(0.0, 0.0), c(1.0, 1.0)]).is_err());
        assert!(convex_hull(&[c(0.0, 0.0), c(1.0, 1.0), c(2.0, 2.0)]).is_err());
        assert!(convex_hull(&[c(0.0, 0.0), c(0.0, 0.0), c(0.0, 0.0)]).is_err());
        assert!(convex_hull(&[c(0.0, 0.0), c(1.0, 0.0), c(f64::NAN, 1.0)]).is_err());
    }
}
