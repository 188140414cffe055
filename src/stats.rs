// Correlation statistics for map decoding.
//
// Pearson correlation of a query vector against each row of a reference
// matrix, and the Fisher z (inverse hyperbolic tangent) transform used to
// stabilize variance before averaging correlations. Coefficients between
// brain maps carry enormous degrees of freedom; callers must not read
// significance into them.

use anyhow::Result;
use ndarray::{Array1, ArrayView1, ArrayView2};

/// Correlate `x` with every row of `rows`.
///
/// Returns one Pearson coefficient per row. A row (or `x`) with zero
/// variance has no defined correlation and yields NaN for that entry.
pub fn pearson_rows(x: ArrayView1<f64>, rows: ArrayView2<f64>) -> Result<Array1<f64>> {
    if x.len() != rows.ncols() {
        anyhow::bail!(
            "Vector length {} does not match reference map length {}",
            x.len(),
            rows.ncols()
        );
    }

    let x_mean = x.mean().unwrap_or(0.0);
    let x_centered = x.mapv(|v| v - x_mean);
    let x_norm = x_centered.dot(&x_centered).sqrt();

    let mut corrs = Array1::zeros(rows.nrows());
    for (i, row) in rows.outer_iter().enumerate() {
        let row_mean = row.mean().unwrap_or(0.0);
        let row_centered = row.mapv(|v| v - row_mean);
        let row_norm = row_centered.dot(&row_centered).sqrt();
        // 0/0 propagates as NaN for degenerate rows
        corrs[i] = x_centered.dot(&row_centered) / (x_norm * row_norm);
    }
    Ok(corrs)
}

/// Fisher z-transform: `atanh` applied elementwise.
pub fn fisher_z(corrs: ArrayView1<f64>) -> Array1<f64> {
    corrs.mapv(f64::atanh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_perfect_correlation() {
        let x = arr1(&[1.0, 2.0, 3.0, 4.0]);
        let rows = arr2(&[[2.0, 4.0, 6.0, 8.0]]);
        let corrs = pearson_rows(x.view(), rows.view()).unwrap();
        assert!((corrs[0] - 1.0).abs() < 1e-12, "got {}", corrs[0]);
    }

    #[test]
    fn test_perfect_anticorrelation() {
        let x = arr1(&[1.0, 2.0, 3.0]);
        let rows = arr2(&[[3.0, 2.0, 1.0]]);
        let corrs = pearson_rows(x.view(), rows.view()).unwrap();
        assert!((corrs[0] + 1.0).abs() < 1e-12, "got {}", corrs[0]);
    }

    #[test]
    fn test_known_value() {
        // Hand-computed: x = [1,2,3,5], y = [1,2,2,4]
        // cov terms: centered x = [-1.75,-0.75,0.25,2.25], centered y = [-1.25,-0.25,-0.25,1.75]
        // dot = 2.1875+0.1875-0.0625+3.9375 = 6.25
        // |x| = sqrt(8.75), |y| = sqrt(4.75) -> r = 6.25/sqrt(41.5625)
        let x = arr1(&[1.0, 2.0, 3.0, 5.0]);
        let rows = arr2(&[[1.0, 2.0, 2.0, 4.0]]);
        let corrs = pearson_rows(x.view(), rows.view()).unwrap();
        let expected = 6.25 / 41.5625_f64.sqrt();
        assert!((corrs[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_multiple_rows() {
        let x = arr1(&[1.0, 2.0, 3.0]);
        let rows = arr2(&[[1.0, 2.0, 3.0], [3.0, 2.0, 1.0]]);
        let corrs = pearson_rows(x.view(), rows.view()).unwrap();
        assert_eq!(corrs.len(), 2);
        assert!((corrs[0] - 1.0).abs() < 1e-12);
        assert!((corrs[1] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_length_mismatch() {
        let x = arr1(&[1.0, 2.0]);
        let rows = arr2(&[[1.0, 2.0, 3.0]]);
        assert!(pearson_rows(x.view(), rows.view()).is_err());
    }

    #[test]
    fn test_constant_row_is_nan() {
        let x = arr1(&[1.0, 2.0, 3.0]);
        let rows = arr2(&[[4.0, 4.0, 4.0]]);
        let corrs = pearson_rows(x.view(), rows.view()).unwrap();
        assert!(corrs[0].is_nan());
    }

    #[test]
    fn test_fisher_z_known_value() {
        let z = fisher_z(arr1(&[0.5, 0.0]).view());
        assert!((z[0] - 0.5_f64.atanh()).abs() < 1e-12);
        assert!(z[1].abs() < 1e-12);
    }
}
