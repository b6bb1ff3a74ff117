//! KL-divergence cost, its gradient and the momentum update of the embedding.

use ndarray::{Array2, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::entropy::EPSILON;
use crate::similarity::LowDimAffinities;

/// `KL(P || Q) = Σ_{i≠j} P_ij · ln(P_ij / Q_ij)`, skipping entries of `P` at the floor.
pub fn kl_divergence(p: &ArrayView2<f64>, q: &ArrayView2<f64>) -> f64 {
    let mut cost = 0.0;
    Zip::indexed(p).and(q).for_each(|(i, j), &pij, &qij| {
        if i != j && pij > EPSILON {
            cost += pij * f64::ln(pij / qij);
        }
    });
    cost
}

/// `∂C/∂y_i = 4 Σ_j (P_ij − Q_ij) · (y_i − y_j) · (1 + ||y_i − y_j||²)^-1`.
///
/// The last factor is the unnormalized kernel, not `Q_ij`.
pub fn gradient(
    p: &ArrayView2<f64>,
    affinities: &LowDimAffinities,
    y: &ArrayView2<f64>,
) -> Array2<f64> {
    let n = y.nrows();
    let mut grad = Array2::zeros(y.raw_dim());
    for i in 0..n {
        let mut grad_row = grad.row_mut(i);
        for j in 0..n {
            if i == j {
                continue;
            }
            let kernel = affinities.unnormalized[[i, j]];
            let premult = 4.0 * (p[[i, j]] - affinities.q[[i, j]]) * kernel;
            Zip::from(&mut grad_row)
                .and(y.row(i))
                .and(y.row(j))
                .for_each(|g, &yi, &yj| *g += (yi - yj) * premult);
        }
    }
    grad
}

/// Two-phase momentum: `initial` before `switch_iteration`, `final_value` from then on.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MomentumSchedule {
    pub initial: f64,
    pub final_value: f64,
    pub switch_iteration: usize,
}

impl Default for MomentumSchedule {
    fn default() -> Self {
        Self {
            initial: 0.5,
            final_value: 0.8,
            switch_iteration: 250,
        }
    }
}

impl MomentumSchedule {
    /// Momentum for the 1-based `iteration`.
    pub fn at(&self, iteration: usize) -> f64 {
        if iteration < self.switch_iteration {
            self.initial
        } else {
            self.final_value
        }
    }
}

/// `v = momentum·v − lr·g; y += v`.
pub fn momentum_step(
    y: &mut Array2<f64>,
    velocity: &mut Array2<f64>,
    gradient: &ArrayView2<f64>,
    learning_rate: f64,
    momentum: f64,
) {
    Zip::from(y)
        .and(velocity)
        .and(gradient)
        .for_each(|yid, vid, &gid| {
            *vid = momentum * *vid - learning_rate * gid;
            *yid += *vid;
        });
}

/// Subtracts the per-dimension mean so the embedding stays zero-centred.
pub fn center(y: &mut Array2<f64>) {
    if let Some(mean) = y.mean_axis(Axis(0)) {
        *y -= &mean;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bandwidth::{search_all, BandwidthConfig};
    use crate::distance::Distance;
    use crate::probability::{conditional_probabilities, symmetrize};
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1};
    use ndarray_rand::rand_distr::{Normal, Uniform};
    use ndarray_rand::RandomExt;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn joint_p(points: &Array2<f64>, perplexity: f64) -> Array2<f64> {
        let distances = Distance::matrix(&points.view());
        let searches = search_all(&distances.view(), perplexity, &BandwidthConfig::default());
        let sigmas: Array1<f64> = searches.iter().map(|s| s.sigma).collect();
        symmetrize(&conditional_probabilities(&distances.view(), &sigmas.view()).view())
    }

    #[test]
    fn kl_is_non_negative_on_random_inputs() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..25 {
            let x = Array2::random_using((16, 3), Uniform::new(-3.0, 3.0), &mut rng);
            let y = Array2::random_using((16, 2), Normal::new(0.0, 1.0).unwrap(), &mut rng);
            let p = joint_p(&x, 4.0);
            let aff = LowDimAffinities::compute(&y.view());
            assert!(kl_divergence(&p.view(), &aff.q.view()) >= -1e-9);
        }
    }

    #[test]
    fn kl_is_zero_when_distributions_match() {
        let y = array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        let aff = LowDimAffinities::compute(&y.view());
        assert_abs_diff_eq!(kl_divergence(&aff.q.view(), &aff.q.view()), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let mut rng = StdRng::seed_from_u64(11);
        let x = Array2::random_using((8, 3), Uniform::new(-2.0, 2.0), &mut rng);
        let y = Array2::random_using((8, 2), Normal::new(0.0, 1.0).unwrap(), &mut rng);
        let p = joint_p(&x, 2.0);

        let aff = LowDimAffinities::compute(&y.view());
        let analytic = gradient(&p.view(), &aff, &y.view());

        let h = 1e-6;
        for i in 0..8 {
            for d in 0..2 {
                let mut plus = y.clone();
                plus[[i, d]] += h;
                let mut minus = y.clone();
                minus[[i, d]] -= h;
                let q_plus = LowDimAffinities::compute(&plus.view()).q;
                let q_minus = LowDimAffinities::compute(&minus.view()).q;
                let c_plus = kl_divergence(&p.view(), &q_plus.view());
                let c_minus = kl_divergence(&p.view(), &q_minus.view());
                let numeric = (c_plus - c_minus) / (2.0 * h);
                assert_abs_diff_eq!(analytic[[i, d]], numeric, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn gradient_vanishes_for_coincident_points() {
        let y = array![[0.3, -0.2], [0.3, -0.2]];
        let p = array![[0.0, 0.5], [0.5, 0.0]];
        let aff = LowDimAffinities::compute(&y.view());
        let grad = gradient(&p.view(), &aff, &y.view());
        assert_eq!(grad, Array2::<f64>::zeros((2, 2)));
    }

    #[test]
    fn momentum_switches_at_configured_iteration() {
        let schedule = MomentumSchedule {
            initial: 0.5,
            final_value: 0.8,
            switch_iteration: 250,
        };
        assert_eq!(schedule.at(1), 0.5);
        assert_eq!(schedule.at(249), 0.5);
        assert_eq!(schedule.at(250), 0.8);
        assert_eq!(schedule.at(900), 0.8);
    }

    #[test]
    fn momentum_step_then_center_keeps_zero_mean() {
        let mut y = array![[1.0, 2.0], [3.0, -1.0], [-0.5, 0.5]];
        let mut velocity = array![[0.1, 0.0], [0.0, 0.2], [-0.1, 0.1]];
        let grad = array![[0.01, -0.02], [0.03, 0.0], [-0.04, 0.02]];

        momentum_step(&mut y, &mut velocity, &grad.view(), 10.0, 0.5);
        assert_abs_diff_eq!(velocity[[0, 0]], 0.05 - 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(y[[0, 0]], 1.0 + 0.05 - 0.1, epsilon = 1e-12);

        center(&mut y);
        let mean = y.mean_axis(Axis(0)).unwrap();
        assert_abs_diff_eq!(mean, array![0.0, 0.0], epsilon = 1e-12);
    }
}
