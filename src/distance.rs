use ndarray::{Array2, ArrayView1, ArrayView2};
#[cfg(feature = "parallel")]
use ndarray::{parallel::prelude::*, Axis};

pub struct Distance;

impl Distance {
    /// Sum of squared per-dimension differences. Callers guarantee equal lengths.
    pub fn squared_euclidean(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(&x, &y)| {
                let diff = x - y;
                diff * diff
            })
            .sum::<f64>()
    }

    /// Pairwise squared Euclidean distances between the rows of `points`.
    ///
    /// Only the upper triangle is computed; every entry is mirrored, so the result is
    /// symmetric with a zero diagonal by construction.
    pub fn matrix(points: &ArrayView2<f64>) -> Array2<f64> {
        let n = points.nrows();
        let mut distances = Array2::zeros((n, n));

        #[cfg(not(feature = "parallel"))]
        for i in 0..n {
            let row = points.row(i);
            for j in (i + 1)..n {
                distances[[i, j]] = Self::squared_euclidean(&row, &points.row(j));
            }
        }

        #[cfg(feature = "parallel")]
        distances
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(i, mut dist_row)| {
                let row = points.row(i);
                for j in (i + 1)..n {
                    dist_row[j] = Self::squared_euclidean(&row, &points.row(j));
                }
            });

        for i in 0..n {
            for j in (i + 1)..n {
                distances[[j, i]] = distances[[i, j]];
            }
        }
        distances
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    #[test]
    fn squared_distance_sums_squares() {
        let a = array![1.0, 2.0, 3.0];
        let b = array![4.0, 6.0, 3.0];
        assert_abs_diff_eq!(Distance::squared_euclidean(&a.view(), &b.view()), 25.0);
    }

    #[test]
    fn matrix_is_symmetric_with_zero_diagonal() {
        let points = array![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 2.0, 0.0], [1.0, 1.0, 1.0]];
        let d = Distance::matrix(&points.view());

        assert_eq!(d.dim(), (4, 4));
        for i in 0..4 {
            assert_eq!(d[[i, i]], 0.0);
            for j in 0..4 {
                assert_eq!(d[[i, j]], d[[j, i]]);
            }
        }
        assert_abs_diff_eq!(d[[1, 2]], 5.0);
        assert_abs_diff_eq!(d[[0, 3]], 3.0);
    }

    #[test]
    fn single_point_gives_zero_matrix() {
        let points = Array2::from_elem((1, 3), 7.0);
        let d = Distance::matrix(&points.view());
        assert_eq!(d, Array2::<f64>::zeros((1, 1)));
    }
}
