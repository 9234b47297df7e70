//! Cells covered by a geometry, in pixel space.

use geo_types::{Coord, Geometry};
use geoverlay_core::GeoTransform;

use crate::overlay::{polygon_rings, scanline_fill};

/// Push every (row, col) of a `rows` x `cols` grid that `geometry` burns.
///
/// Points burn the cell containing them, lines every cell they pass
/// through and polygons the cells whose centre is inside. Cells may repeat.
pub(crate) fn burn_cells(
    geometry: &Geometry<f64>,
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
    out: &mut Vec<(usize, usize)>,
) {
    match geometry {
        Geometry::Point(p) => point_cell(p.0, transform, rows, cols, out),
        Geometry::MultiPoint(mp) => {
            for p in &mp.0 {
                point_cell(p.0, transform, rows, cols, out);
            }
        }
        Geometry::Line(line) => segment_cells(line.start, line.end, transform, rows, cols, out),
        Geometry::LineString(ls) => {
            for line in ls.lines() {
                segment_cells(line.start, line.end, transform, rows, cols, out);
            }
        }
        Geometry::MultiLineString(mls) => {
            for line in mls.0.iter().flat_map(|ls| ls.lines()) {
                segment_cells(line.start, line.end, transform, rows, cols, out);
            }
        }
        Geometry::GeometryCollection(gc) => {
            for g in &gc.0 {
                burn_cells(g, transform, rows, cols, out);
            }
        }
        polygonal => {
            if let Ok(rings) = polygon_rings(polygonal) {
                scanline_fill(&rings, transform, rows, cols, |r, c| out.push((r, c)));
            }
        }
    }
}

fn point_cell(
    coord: Coord<f64>,
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
    out: &mut Vec<(usize, usize)>,
) {
    let (col, row) = transform.geo_to_pixel(coord.x, coord.y);
    if let Some(cell) = cell_index(col.floor(), row.floor(), rows, cols) {
        out.push(cell);
    }
}

fn cell_index(col: f64, row: f64, rows: usize, cols: usize) -> Option<(usize, usize)> {
    if col.is_finite() && row.is_finite() && col >= 0.0 && row >= 0.0 && col < cols as f64 && row < rows as f64 {
        Some((row as usize, col as usize))
    } else {
        None
    }
}

/// Grid traversal (Amanatides & Woo): visits every cell the segment crosses.
fn segment_cells(
    start: Coord<f64>,
    end: Coord<f64>,
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
    out: &mut Vec<(usize, usize)>,
) {
    let (x0, y0) = transform.geo_to_pixel(start.x, start.y);
    let (x1, y1) = transform.geo_to_pixel(end.x, end.y);
    if !(x0.is_finite() && y0.is_finite() && x1.is_finite() && y1.is_finite()) {
        return;
    }
    // the walk below is linear in the segment's length, so keep only the
    // part inside the grid
    let Some((x0, y0, x1, y1)) = clip_to_grid((x0, y0), (x1, y1), rows, cols) else {
        return;
    };

    let (mut cx, mut cy) = (x0.floor(), y0.floor());
    let (ex, ey) = (x1.floor(), y1.floor());
    let (dx, dy) = (x1 - x0, y1 - y0);

    let axis = |d: f64, p: f64, cell: f64| -> (f64, f64, f64) {
        if d > 0.0 {
            (1.0, (cell + 1.0 - p) / d, 1.0 / d)
        } else if d < 0.0 {
            (-1.0, (p - cell) / -d, -1.0 / d)
        } else {
            (0.0, f64::INFINITY, f64::INFINITY)
        }
    };
    let (step_x, mut t_max_x, t_delta_x) = axis(dx, x0, cx);
    let (step_y, mut t_max_y, t_delta_y) = axis(dy, y0, cy);

    // a segment crosses at most |dx| + |dy| + 2 cells
    let max_steps = (dx.abs() + dy.abs()) as usize + 2;
    for _ in 0..=max_steps {
        if let Some(cell) = cell_index(cx, cy, rows, cols) {
            out.push(cell);
        }
        if cx == ex && cy == ey {
            break;
        }
        if t_max_x < t_max_y {
            cx += step_x;
            t_max_x += t_delta_x;
        } else {
            cy += step_y;
            t_max_y += t_delta_y;
        }
    }
}

/// Liang-Barsky clip of a pixel-space segment to `[0, cols] x [0, rows]`.
fn clip_to_grid(
    (x0, y0): (f64, f64),
    (x1, y1): (f64, f64),
    rows: usize,
    cols: usize,
) -> Option<(f64, f64, f64, f64)> {
    let (dx, dy) = (x1 - x0, y1 - y0);
    let (mut t0, mut t1) = (0.0f64, 1.0f64);
    let bounds = [
        (-dx, x0),
        (dx, cols as f64 - x0),
        (-dy, y0),
        (dy, rows as f64 - y0),
    ];
    for (p, q) in bounds {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
        }
    }
    if t0 > t1 {
        return None;
    }
    Some((x0 + t0 * dx, y0 + t0 * dy, x0 + t1 * dx, y0 + t1 * dy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, point, Line, Rect};

    fn cells(geometry: Geometry<f64>) -> Vec<(usize, usize)> {
        // 5x5 identity grid
        let mut out = Vec::new();
        burn_cells(&geometry, &GeoTransform::identity(), 5, 5, &mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    #[test]
    fn test_point() {
        assert_eq!(cells(Geometry::Point(point!(x: 2.3, y: 4.9))), vec![(4, 2)]);
        assert!(cells(Geometry::Point(point!(x: 5.0, y: 1.0))).is_empty());
    }

    #[test]
    fn test_horizontal_line() {
        let line = Geometry::LineString(line_string![(x: 0.5, y: 1.5), (x: 3.5, y: 1.5)]);
        assert_eq!(cells(line), vec![(1, 0), (1, 1), (1, 2), (1, 3)]);
    }

    #[test]
    fn test_diagonal_line_is_connected() {
        let line = Geometry::LineString(line_string![(x: 0.2, y: 0.7), (x: 4.6, y: 3.1)]);
        let hit = cells(line);
        assert!(hit.contains(&(0, 0)));
        assert!(hit.contains(&(3, 4)));
        // every column from 0 to 4 is visited
        for col in 0..5 {
            assert!(hit.iter().any(|&(_, c)| c == col));
        }
    }

    #[test]
    fn test_line_leaving_grid() {
        let line = Geometry::LineString(line_string![(x: 3.5, y: 0.5), (x: 9.5, y: 0.5)]);
        assert_eq!(cells(line), vec![(0, 3), (0, 4)]);
    }

    #[test]
    fn test_far_reaching_lines_are_clipped() {
        let across = Geometry::Line(Line::new(
            Coord { x: -1e12, y: 0.5 },
            Coord { x: 1e12, y: 0.5 },
        ));
        assert_eq!(cells(across), vec![(0, 0), (0, 1), (0, 2), (0, 3), (0, 4)]);

        let diagonal = Geometry::Line(Line::new(
            Coord { x: -1e9, y: -1e9 },
            Coord { x: 1e9, y: 1e9 },
        ));
        let hit = cells(diagonal);
        assert!(hit.contains(&(0, 0)));
        assert!(hit.contains(&(4, 4)));
        assert!(hit.len() < 25);

        let beside = Geometry::Line(Line::new(
            Coord { x: -1e12, y: 7.5 },
            Coord { x: 1e12, y: 7.5 },
        ));
        assert!(cells(beside).is_empty());
    }

    #[test]
    fn test_clip_to_grid() {
        assert_eq!(clip_to_grid((-2.0, 1.0), (8.0, 1.0), 5, 5), Some((0.0, 1.0, 5.0, 1.0)));
        assert_eq!(clip_to_grid((1.0, 1.0), (2.0, 2.0), 5, 5), Some((1.0, 1.0, 2.0, 2.0)));
        assert_eq!(clip_to_grid((6.0, 0.0), (9.0, 4.0), 5, 5), None);
    }

    #[test]
    fn test_polygon_centres() {
        let rect = Geometry::Rect(Rect::new((1.0, 1.0), (3.0, 2.0)));
        assert_eq!(cells(rect), vec![(1, 1), (1, 2)]);
    }
}
