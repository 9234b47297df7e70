//! Cell membership by scanline fill.
//!
//! A cell belongs to a polygon when its centre is inside it. Rings are
//! mapped into pixel space first, so the fill works for any affine
//! transform, rotated ones included. Each pixel row is then scanned at the
//! centre height: edge crossings are sorted and spans between pairs of
//! crossings are filled (even-odd rule, which also carves out holes).
//!
//! Spans are half-open: a centre lying exactly on the left crossing is
//! inside, one on the right crossing is outside. Two polygons sharing an
//! edge therefore never both claim a cell.

use geo::Coord;
use geo_types::Geometry;
use ndarray::Array2;
use geoverlay_core::{Error, GeoTransform, Result};

/// Closed rings of a polygonal geometry.
pub(crate) fn polygon_rings(geometry: &Geometry<f64>) -> Result<Vec<Vec<Coord<f64>>>> {
    let mut rings = Vec::new();
    collect_rings(geometry, &mut rings)?;
    Ok(rings)
}

fn collect_rings(geometry: &Geometry<f64>, rings: &mut Vec<Vec<Coord<f64>>>) -> Result<()> {
    match geometry {
        Geometry::Polygon(p) => {
            rings.push(p.exterior().0.clone());
            rings.extend(p.interiors().iter().map(|r| r.0.clone()));
        }
        Geometry::MultiPolygon(mp) => {
            for p in &mp.0 {
                collect_rings(&Geometry::Polygon(p.clone()), rings)?;
            }
        }
        Geometry::Rect(r) => collect_rings(&Geometry::Polygon(r.to_polygon()), rings)?,
        Geometry::Triangle(t) => collect_rings(&Geometry::Polygon(t.to_polygon()), rings)?,
        Geometry::GeometryCollection(gc) => {
            for g in &gc.0 {
                collect_rings(g, rings)?;
            }
        }
        other => {
            return Err(Error::UnsupportedGeometry(format!(
                "expected a polygonal geometry, got {}",
                geometry_kind(other)
            )))
        }
    }
    Ok(())
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Boolean mask of the cells of a `rows` x `cols` grid whose centre lies
/// inside `geometry`.
pub fn cell_mask(
    geometry: &Geometry<f64>,
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
) -> Result<Array2<bool>> {
    let rings = polygon_rings(geometry)?;
    let mut mask = Array2::from_elem((rows, cols), false);
    scanline_fill(&rings, transform, rows, cols, |row, col| mask[(row, col)] = true);
    Ok(mask)
}

/// Visit every (row, col) whose centre is inside the rings.
pub(crate) fn scanline_fill(
    rings: &[Vec<Coord<f64>>],
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
    mut visit: impl FnMut(usize, usize),
) {
    let pixel_rings: Vec<Vec<(f64, f64)>> = rings
        .iter()
        .map(|ring| ring.iter().map(|c| transform.geo_to_pixel(c.x, c.y)).collect())
        .collect();

    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(col, row) in pixel_rings.iter().flatten() {
        if !col.is_finite() || !row.is_finite() {
            return;
        }
        lo = lo.min(row);
        hi = hi.max(row);
    }
    if lo > hi {
        return;
    }

    // rows whose centre r + 0.5 can fall in [lo, hi]
    let first = (lo - 0.5).ceil().max(0.0) as usize;
    let last = ((hi - 0.5).floor() + 1.0).clamp(0.0, rows as f64) as usize;

    let mut crossings: Vec<f64> = Vec::new();
    for row in first..last {
        let yc = row as f64 + 0.5;
        crossings.clear();

        for ring in &pixel_rings {
            let n = ring.len();
            if n < 3 {
                continue;
            }
            for i in 0..n {
                let (x0, y0) = ring[i];
                let (x1, y1) = ring[(i + 1) % n];
                if (y0 <= yc && yc < y1) || (y1 <= yc && yc < y0) {
                    crossings.push(x0 + (yc - y0) * (x1 - x0) / (y1 - y0));
                }
            }
        }

        crossings.sort_by(f64::total_cmp);
        for span in crossings.chunks_exact(2) {
            let start = (span[0] - 0.5).ceil().max(0.0);
            let end = (span[1] - 0.5).ceil().min(cols as f64);
            if end <= start {
                continue;
            }
            for col in start as usize..end as usize {
                visit(row, col);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{point, polygon, MultiPolygon, Rect};

    fn count(mask: &Array2<bool>) -> usize {
        mask.iter().filter(|&&m| m).count()
    }

    #[test]
    fn test_single_cell_identity() {
        let cell = Geometry::Rect(Rect::new((0.0, 0.0), (1.0, 1.0)));
        let mask = cell_mask(&cell, &GeoTransform::identity(), 2, 2).unwrap();
        assert!(mask[(0, 0)]);
        assert_eq!(count(&mask), 1);
    }

    #[test]
    fn test_north_up_square() {
        // 10x10 grid covering (0,0)-(10,10), north-up
        let gt = GeoTransform::new(0.0, 10.0, 1.0, -1.0);
        let square = Geometry::Polygon(polygon![
            (x: 2.0, y: 2.0),
            (x: 5.0, y: 2.0),
            (x: 5.0, y: 6.0),
            (x: 2.0, y: 6.0),
        ]);
        let mask = cell_mask(&square, &gt, 10, 10).unwrap();
        assert_eq!(count(&mask), 12);
        // x in [2,5) -> cols 2..5, y in [2,6) -> rows 4..8
        assert!(mask[(4, 2)] && mask[(7, 4)]);
        assert!(!mask[(3, 2)] && !mask[(4, 5)]);
    }

    #[test]
    fn test_shared_edge_not_double_counted() {
        let gt = GeoTransform::new(0.0, 4.0, 1.0, -1.0);
        let left = Geometry::Rect(Rect::new((0.0, 0.0), (2.5, 4.0)));
        let right = Geometry::Rect(Rect::new((2.5, 0.0), (4.0, 4.0)));
        let a = cell_mask(&left, &gt, 4, 4).unwrap();
        let b = cell_mask(&right, &gt, 4, 4).unwrap();
        assert_eq!(count(&a) + count(&b), 16);
        assert!(a.iter().zip(b.iter()).all(|(x, y)| !(x & y)));
    }

    #[test]
    fn test_hole_is_excluded() {
        let gt = GeoTransform::new(0.0, 5.0, 1.0, -1.0);
        let donut = Geometry::Polygon(polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 5.0, y: 0.0), (x: 5.0, y: 5.0), (x: 0.0, y: 5.0)],
            interiors: [[(x: 2.0, y: 2.0), (x: 3.0, y: 2.0), (x: 3.0, y: 3.0), (x: 2.0, y: 3.0)]],
        ));
        let mask = cell_mask(&donut, &gt, 5, 5).unwrap();
        assert_eq!(count(&mask), 24);
        assert!(!mask[(2, 2)]);
    }

    #[test]
    fn test_multipolygon() {
        let gt = GeoTransform::new(0.0, 4.0, 1.0, -1.0);
        let parts = MultiPolygon::new(vec![
            Rect::new((0.0, 3.0), (1.0, 4.0)).to_polygon(),
            Rect::new((3.0, 0.0), (4.0, 1.0)).to_polygon(),
        ]);
        let mask = cell_mask(&Geometry::MultiPolygon(parts), &gt, 4, 4).unwrap();
        assert_eq!(count(&mask), 2);
        assert!(mask[(0, 0)] && mask[(3, 3)]);
    }

    #[test]
    fn test_rotated_transform() {
        // 45 degree rotation; the centre of cell (0, 0) is at (0.7071, 0)
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let gt = GeoTransform {
            origin_x: 0.0,
            origin_y: 0.0,
            pixel_width: s,
            row_rotation: s,
            col_rotation: s,
            pixel_height: -s,
        };
        let (cx, cy) = gt.pixel_to_geo(0, 0);
        let around = Geometry::Rect(Rect::new((cx - 0.1, cy - 0.1), (cx + 0.1, cy + 0.1)));
        let mask = cell_mask(&around, &gt, 3, 3).unwrap();
        assert!(mask[(0, 0)]);
        assert_eq!(count(&mask), 1);
    }

    #[test]
    fn test_outside_and_points() {
        let gt = GeoTransform::new(0.0, 4.0, 1.0, -1.0);
        let far = Geometry::Rect(Rect::new((10.0, 10.0), (12.0, 12.0)));
        assert_eq!(count(&cell_mask(&far, &gt, 4, 4).unwrap()), 0);

        let err = cell_mask(&Geometry::Point(point!(x: 1.0, y: 1.0)), &gt, 4, 4).unwrap_err();
        match err {
            Error::UnsupportedGeometry(msg) => assert!(msg.ends_with("got Point"), "{}", msg),
            other => panic!("expected UnsupportedGeometry, got {:?}", other),
        }
    }
}
