//! Pairwise Euclidean distances
//!
//! `pdist` returns the condensed form: for `n` points, the `n(n-1)/2`
//! distances `d(i, j)` with `i < j`, row by row. `squareform` expands it
//! into the symmetric matrix with a zero diagonal.

use geo::Coord;
use geoverlay_core::{Error, Result};
use ndarray::Array2;

use crate::maybe_rayon::*;

/// Condensed pairwise distance vector.
pub fn pdist(points: &[Coord<f64>]) -> Vec<f64> {
    let n = points.len();
    let rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let p = points[i];
            points[i + 1..]
                .iter()
                .map(|q| (q.x - p.x).hypot(q.y - p.y))
                .collect()
        })
        .collect();
    rows.concat()
}

/// Number of points behind a condensed vector of length `m`.
fn points_for_condensed(m: usize) -> Option<usize> {
    // n(n-1)/2 = m  =>  n = (1 + sqrt(1 + 8m)) / 2
    let n = ((1.0 + (1.0 + 8.0 * m as f64).sqrt()) / 2.0).round() as usize;
    (n * n.saturating_sub(1) / 2 == m).then_some(n)
}

/// Expand a condensed distance vector into a square matrix.
pub fn squareform(condensed: &[f64]) -> Result<Array2<f64>> {
    let n = points_for_condensed(condensed.len()).ok_or_else(|| Error::InvalidParameter {
        name: "condensed",
        value: condensed.len().to_string(),
        reason: "length is not n(n-1)/2 for any n".into(),
    })?;

    let mut matrix = Array2::zeros((n, n));
    let mut k = 0;
    for i in 0..n {
        for j in i + 1..n {
            matrix[[i, j]] = condensed[k];
            matrix[[j, i]] = condensed[k];
            k += 1;
        }
    }
    Ok(matrix)
}

/// Index of `d(i, j)` in the condensed vector for `n` points.
pub fn condensed_index(n: usize, i: usize, j: usize) -> Option<usize> {
    if i == j || i >= n || j >= n {
        return None;
    }
    let (i, j) = if i < j { (i, j) } else { (j, i) };
    Some(n * i - i * (i + 1) / 2 + (j - i - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn c(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    #[test]
    fn test_pdist_triangle() {
        let d = pdist(&[c(0.0, 0.0), c(3.0, 0.0), c(0.0, 4.0)]);
        assert_eq!(d.len(), 3);
        assert_relative_eq!(d[0], 3.0);
        assert_relative_eq!(d[1], 4.0);
        assert_relative_eq!(d[2], 5.0);
    }

    #[test]
    fn test_squareform_symmetric() {
        let pts: Vec<Coord<f64>> = (0..7).map(|i| c(i as f64, (i * i) as f64 * 0.5)).collect();
        let d = pdist(&pts);
        let m = squareform(&d).unwrap();
        assert_eq!(m.dim(), (7, 7));
        for i in 0..7 {
            assert_eq!(m[[i, i]], 0.0);
            for j in 0..7 {
                assert_eq!(m[[i, j]], m[[j, i]]);
                if let Some(k) = condensed_index(7, i, j) {
                    assert_eq!(m[[i, j]], d[k]);
                }
            }
        }
    }

    #[test]
    fn test_small_inputs() {
        assert!(pdist(&[]).is_empty());
        assert!(pdist(&[c(1.0, 1.0)]).is_empty());
        assert_eq!(squareform(&[]).unwrap().dim(), (1, 1));
        assert_eq!(squareform(&[2.0]).unwrap()[[0, 1]], 2.0);
        assert!(squareform(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_condensed_index() {
        assert_eq!(condensed_index(4, 0, 1), Some(0));
        assert_eq!(condensed_index(4, 2, 3), Some(5));
        assert_eq!(condensed_index(4, 3, 1), Some(4));
        assert_eq!(condensed_index(4, 1, 1), None);
    }
}
