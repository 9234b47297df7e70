//! Point-set geometry
//!
//! - **kdtree**: nearest, k-nearest and radius queries
//! - **hull**: convex hull with area and perimeter
//! - **delaunay**: Bowyer-Watson triangulation and point location
//! - **voronoi**: Voronoi diagram built from the triangulation
//! - **distance**: condensed pairwise distances and the square matrix form
//!
//! All of it works on planar `geo::Coord` values. Distances are in the
//! units of the coordinates, so degrees for geographic input; use
//! [`reproject_points`] first to measure in metres.

mod delaunay;
mod distance;
mod hull;
mod kdtree;
mod voronoi;

pub use delaunay::{barycentric, Circumcircle, Triangulation};
pub use distance::{condensed_index, pdist, squareform};
pub use hull::{convex_hull, ConvexHull};
pub use kdtree::{KdTree, Neighbor};
pub use voronoi::{Ridge, Voronoi};

use geo::{Coord, Geometry, MultiPoint, Point};
use geoverlay_core::{Error, Reproject, Result, CRS};

/// Reproject a point list, preserving order.
pub fn reproject_points(
    points: &[Coord<f64>],
    from: &CRS,
    to: &CRS,
    reprojector: &dyn Reproject,
) -> Result<Vec<Coord<f64>>> {
    let multi: MultiPoint<f64> = points.iter().map(|&c| Point::from(c)).collect();
    match reprojector.reproject(&Geometry::MultiPoint(multi), from, to)? {
        Geometry::MultiPoint(out) => Ok(out.into_iter().map(|p| p.0).collect()),
        other => Err(Error::Reprojection(format!(
            "expected a multipoint back, got {:?}",
            other
        ))),
    }
}

/// Deterministic pseudo-random points in `[0, scale)²` for tests.
#[cfg(test)]
pub(crate) fn scattered(n: usize, scale: f64) -> Vec<Coord<f64>> {
    let mut state: u64 = 0x853c_49e6_748f_ea9b;
    let mut next = move || {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    (0..n)
        .map(|_| {
            let x = next() * scale;
            let y = next() * scale;
            Coord { x, y }
        })
        .collect()
}
