//! High-dimensional affinities: the conditional matrix `P(j|i)` and the symmetric joint
//! matrix `P` the optimizer pulls the embedding towards.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis, Zip};

use crate::bandwidth::gaussian_row;
use crate::entropy::EPSILON;

/// Builds `P(j|i)` row by row from the squared distances and per-point sigmas.
pub fn conditional_probabilities(
    distances: &ArrayView2<f64>,
    sigmas: &ArrayView1<f64>,
) -> Array2<f64> {
    let mut conditional = Array2::zeros(distances.raw_dim());
    Zip::indexed(conditional.axis_iter_mut(Axis(0)))
        .and(distances.axis_iter(Axis(0)))
        .and(sigmas)
        .for_each(|i, p_row, d_row, &sigma| {
            gaussian_row(&d_row, sigma, i, p_row);
        });
    conditional
}

/// `P_ij = (P(j|i) + P(i|j)) / 2N` for `i != j`, floored at [`EPSILON`].
///
/// The diagonal stays exactly zero.
pub fn symmetrize(conditional: &ArrayView2<f64>) -> Array2<f64> {
    let n = conditional.nrows();
    let n2 = (2 * n) as f64;
    let mut joint = Array2::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let p = f64::max((conditional[[i, j]] + conditional[[j, i]]) / n2, EPSILON);
            joint[[i, j]] = p;
            joint[[j, i]] = p;
        }
    }
    joint
}

/// Scales every entry of `p` by `factor` in place.
pub fn exaggerate(p: &mut Array2<f64>, factor: f64) {
    p.map_inplace(|v| *v *= factor);
}

/// Replaces the live (exaggerated) `p` with the retained unscaled copy.
pub fn remove_exaggeration(p: &mut Array2<f64>, original: &Array2<f64>) {
    p.assign(original);
}
