use ndarray::{Array2, ArrayView2};
use serde::Serialize;

use crate::distance::Distance;
use crate::entropy::EPSILON;

/// Student-t affinities of an embedding.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowDimAffinities {
    /// Normalized `Q`, zero diagonal, off-diagonal floored at [`EPSILON`].
    pub q: Array2<f64>,
    /// Kernel values `(1 + ||y_i - y_j||²)^-1` before normalization, zero diagonal.
    pub unnormalized: Array2<f64>,
    /// Sum of `unnormalized` over all ordered pairs `i != j`.
    pub sum: f64,
}

impl LowDimAffinities {
    pub fn compute(y: &ArrayView2<f64>) -> Self {
        let n = y.nrows();
        let mut unnormalized = Array2::zeros((n, n));
        let mut sum = 0.0;
        for i in 0..n {
            let yi = y.row(i);
            for j in (i + 1)..n {
                let kernel = 1.0 / (1.0 + Distance::squared_euclidean(&yi, &y.row(j)));
                unnormalized[[i, j]] = kernel;
                unnormalized[[j, i]] = kernel;
                sum += 2.0 * kernel;
            }
        }

        let mut q = Array2::zeros((n, n));
        if sum > 0.0 {
            for i in 0..n {
                for j in (i + 1)..n {
                    let val = f64::max(unnormalized[[i, j]] / sum, EPSILON);
                    q[[i, j]] = val;
                    q[[j, i]] = val;
                }
            }
        }

        Self { q, unnormalized, sum }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn q_is_symmetric_normalized_with_zero_diagonal() {
        let y = array![[0.0, 0.0], [1.0, 0.0], [0.0, 2.0], [-1.5, 0.5]];
        let aff = LowDimAffinities::compute(&y.view());

        for i in 0..4 {
            assert_eq!(aff.q[[i, i]], 0.0);
            assert_eq!(aff.unnormalized[[i, i]], 0.0);
            for j in 0..4 {
                assert_eq!(aff.q[[i, j]], aff.q[[j, i]]);
            }
        }
        assert_abs_diff_eq!(aff.q.sum(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(aff.unnormalized[[0, 1]], 0.5);
        assert_abs_diff_eq!(aff.unnormalized[[0, 2]], 0.2);
        assert_abs_diff_eq!(aff.unnormalized.sum(), aff.sum, epsilon = 1e-12);
    }

    #[test]
    fn works_in_one_dimension() {
        let y = array![[0.0], [3.0]];
        let aff = LowDimAffinities::compute(&y.view());
        assert_abs_diff_eq!(aff.unnormalized[[0, 1]], 0.1);
        assert_abs_diff_eq!(aff.q[[0, 1]], 0.5);
    }
}
