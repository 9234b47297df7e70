//! Voronoi diagram as the dual of a Delaunay triangulation
//!
//! 1. Each Delaunay triangle contributes its circumcentre as a vertex
//! 2. Each interior Delaunay edge becomes a finite ridge joining the
//!    circumcentres of its two triangles
//! 3. Each hull edge becomes a half-infinite ridge leaving its single
//!    circumcentre along the outward edge normal
//!
//! Sites on the convex hull own unbounded regions.

use geo::{Coord, LineString, Polygon};
use geoverlay_core::{Error, Result};

use super::delaunay::{Circumcircle, Triangulation};

/// Boundary between the regions of two sites.
#[derive(Debug, Clone, PartialEq)]
pub struct Ridge {
    /// The two sites this ridge separates.
    pub points: [usize; 2],
    /// Voronoi vertex indices; the second is `None` for a half-infinite ridge.
    pub vertices: [Option<usize>; 2],
    /// Unit direction of a half-infinite ridge, pointing away from the hull.
    pub direction: Option<Coord<f64>>,
}

impl Ridge {
    pub fn is_finite(&self) -> bool {
        self.vertices[1].is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Voronoi {
    points: Vec<Coord<f64>>,
    vertices: Vec<Coord<f64>>,
    ridges: Vec<Ridge>,
    regions: Vec<Vec<usize>>,
    bounded: Vec<bool>,
}

impl Voronoi {
    /// Voronoi diagram of `points`.
    pub fn new(points: &[Coord<f64>]) -> Result<Self> {
        Self::from_triangulation(&Triangulation::new(points)?)
    }

    /// Build from an existing triangulation.
    pub fn from_triangulation(tri: &Triangulation) -> Result<Self> {
        let points = tri.points().to_vec();

        let vertices = (0..tri.simplices().len())
            .map(|s| {
                let [a, b, c] = tri.corners(s);
                Circumcircle::of(a, b, c)
                    .map(|cc| cc.center)
                    .ok_or_else(|| Error::Algorithm(format!("degenerate triangle {}", s)))
            })
            .collect::<Result<Vec<_>>>()?;

        // sorted for a deterministic ridge order
        let mut edges: Vec<((usize, usize), Vec<usize>)> = tri.edge_triangles().into_iter().collect();
        edges.sort_unstable_by_key(|(edge, _)| *edge);

        let mut bounded = vec![true; points.len()];
        for &dup in tri.duplicates() {
            bounded[dup] = false;
        }

        let mut ridges = Vec::with_capacity(edges.len());
        for ((a, b), tris) in edges {
            match tris.as_slice() {
                [t1, t2] => ridges.push(Ridge {
                    points: [a, b],
                    vertices: [Some(*t1), Some(*t2)],
                    direction: None,
                }),
                [t] => {
                    bounded[a] = false;
                    bounded[b] = false;
                    let opposite = tri.simplices()[*t]
                        .iter()
                        .copied()
                        .find(|&v| v != a && v != b)
                        .ok_or_else(|| Error::Algorithm(format!("malformed triangle {}", t)))?;
                    ridges.push(Ridge {
                        points: [a, b],
                        vertices: [Some(*t), None],
                        direction: Some(outward_normal(points[a], points[b], points[opposite])),
                    });
                }
                other => {
                    return Err(Error::Algorithm(format!(
                        "edge ({}, {}) shared by {} triangles",
                        a,
                        b,
                        other.len()
                    )))
                }
            }
        }

        let mut regions: Vec<Vec<usize>> = vec![Vec::new(); points.len()];
        for (s, simplex) in tri.simplices().iter().enumerate() {
            for &v in simplex {
                regions[v].push(s);
            }
        }
        for (site, region) in regions.iter_mut().enumerate() {
            let p = points[site];
            region.sort_by(|&u, &v| {
                let au = (vertices[u].y - p.y).atan2(vertices[u].x - p.x);
                let av = (vertices[v].y - p.y).atan2(vertices[v].x - p.x);
                au.total_cmp(&av)
            });
        }

        Ok(Self {
            points,
            vertices,
            ridges,
            regions,
            bounded,
        })
    }

    /// Generator sites.
    pub fn points(&self) -> &[Coord<f64>] {
        &self.points
    }

    /// Voronoi vertices; vertex `i` is the circumcentre of triangle `i`.
    pub fn vertices(&self) -> &[Coord<f64>] {
        &self.vertices
    }

    pub fn ridges(&self) -> &[Ridge] {
        &self.ridges
    }

    /// Finite vertex indices of `site`'s region, counter-clockwise.
    pub fn region(&self, site: usize) -> &[usize] {
        &self.regions[site]
    }

    /// Whether `site`'s region is a closed polygon.
    pub fn is_bounded(&self, site: usize) -> bool {
        self.bounded[site]
    }

    /// Region of `site` as a polygon, `None` if it is unbounded.
    pub fn region_polygon(&self, site: usize) -> Option<Polygon<f64>> {
        if !self.is_bounded(site) {
            return None;
        }
        let ring: Vec<Coord<f64>> = self.regions[site].iter().map(|&v| self.vertices[v]).collect();
        Some(Polygon::new(LineString::from(ring), vec![]))
    }
}

/// Unit normal of edge (a, b) pointing away from `opposite`.
fn outward_normal(a: Coord<f64>, b: Coord<f64>, opposite: Coord<f64>) -> Coord<f64> {
    let (ex, ey) = (b.x - a.x, b.y - a.y);
    let len = ex.hypot(ey);
    let mut n = Coord { x: -ey / len, y: ex / len };
    let mid = Coord { x: (a.x + b.x) / 2.0, y: (a.y + b.y) / 2.0 };
    if n.x * (opposite.x - mid.x) + n.y * (opposite.y - mid.y) > 0.0 {
        n = Coord { x: -n.x, y: -n.y };
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{convex_hull, scattered};
    use approx::assert_relative_eq;
    use geo::Area;

    fn c(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    #[test]
    fn test_square_with_centre() {
        let pts = vec![c(0.0, 0.0), c(2.0, 0.0), c(2.0, 2.0), c(0.0, 2.0), c(1.0, 1.0)];
        let vor = Voronoi::new(&pts).unwrap();

        assert_eq!(vor.vertices().len(), 4);
        assert_eq!(vor.ridges().len(), 8);
        assert_eq!(vor.ridges().iter().filter(|r| r.is_finite()).count(), 4);

        assert!(vor.is_bounded(4));
        assert!((0..4).all(|s| !vor.is_bounded(s)));
        assert!(vor.region_polygon(0).is_none());

        let cell = vor.region_polygon(4).unwrap();
        assert_relative_eq!(cell.signed_area(), 2.0, epsilon = 1e-12);

        // bottom hull edge opens downward
        let bottom = vor.ridges().iter().find(|r| r.points == [0, 1]).unwrap();
        let dir = bottom.direction.unwrap();
        assert_relative_eq!(dir.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(dir.y, -1.0, epsilon = 1e-12);
        let v = vor.vertices()[bottom.vertices[0].unwrap()];
        assert_relative_eq!(v.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(v.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_ridges_are_bisectors() {
        let pts = scattered(40, 10.0);
        let vor = Voronoi::new(&pts).unwrap();
        let hull = convex_hull(&pts).unwrap();

        for ridge in vor.ridges() {
            let [a, b] = ridge.points;
            for v in ridge.vertices.iter().flatten() {
                let p = vor.vertices()[*v];
                let da = (p.x - pts[a].x).hypot(p.y - pts[a].y);
                let db = (p.x - pts[b].x).hypot(p.y - pts[b].y);
                assert_relative_eq!(da, db, epsilon = 1e-9 * da.max(1.0));
            }
            assert_eq!(ridge.is_finite(), ridge.direction.is_none());
        }

        let unbounded = (0..pts.len()).filter(|&s| !vor.is_bounded(s)).count();
        assert_eq!(unbounded, hull.vertices.len());
        for s in (0..pts.len()).filter(|&s| vor.is_bounded(s)) {
            assert!(vor.region_polygon(s).unwrap().signed_area() > 0.0);
        }
    }

    #[test]
    fn test_too_few_points() {
        assert!(Voronoi::new(&[c(0.0, 0.0), c(1.0, 0.0)]).is_err());
    }
}
