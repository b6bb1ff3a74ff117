//! Synthetic labelled point clouds for the walkthrough.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TsneError};

/// Isotropic Gaussian blobs around well-separated centres.
///
/// Cluster `k` is centred at `separation · (1 + k / dim)` along axis `k % dim`, so
/// every centre sits at least `separation` away from the origin and from the others
/// along a distinct direction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GaussianClusters {
    pub clusters: usize,
    pub points_per_cluster: usize,
    pub dim: usize,
    /// Standard deviation within a cluster.
    pub spread: f64,
    pub separation: f64,
    pub seed: u64,
}

impl Default for GaussianClusters {
    fn default() -> Self {
        Self {
            clusters: 3,
            points_per_cluster: 10,
            dim: 3,
            spread: 0.5,
            separation: 10.0,
            seed: 42,
        }
    }
}

/// Points plus one label per point.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dataset {
    pub points: Array2<f64>,
    pub labels: Vec<i32>,
}

impl GaussianClusters {
    pub fn generate(&self) -> Result<Dataset> {
        if self.clusters == 0 || self.points_per_cluster == 0 || self.dim == 0 {
            return Err(TsneError::InvalidConfig(
                "clusters, points per cluster and dimension must all be positive".into(),
            ));
        }
        if !(self.spread.is_finite() && self.spread > 0.0) {
            return Err(TsneError::InvalidConfig(format!(
                "cluster spread must be positive and finite, got {}",
                self.spread
            )));
        }
        let noise = Normal::new(0.0, self.spread)
            .map_err(|err| TsneError::InvalidConfig(err.to_string()))?;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let n = self.clusters * self.points_per_cluster;
        let mut points = Array2::zeros((n, self.dim));
        let mut labels = Vec::with_capacity(n);
        for (i, mut row) in points.rows_mut().into_iter().enumerate() {
            let k = i / self.points_per_cluster;
            let axis = k % self.dim;
            let offset = self.separation * (1.0 + (k / self.dim) as f64);
            for (d, v) in row.iter_mut().enumerate() {
                let centre = if d == axis { offset } else { 0.0 };
                *v = centre + noise.sample(&mut rng);
            }
            labels.push(k as i32);
        }
        Ok(Dataset { points, labels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_labelled_clusters() {
        let data = GaussianClusters::default().generate().unwrap();
        assert_eq!(data.points.dim(), (30, 3));
        assert_eq!(data.labels.len(), 30);
        assert_eq!(&data.labels[..10], &[0; 10]);
        assert_eq!(&data.labels[20..], &[2; 10]);
    }

    #[test]
    fn same_seed_same_points() {
        let clusters = GaussianClusters {
            seed: 9,
            ..GaussianClusters::default()
        };
        assert_eq!(clusters.generate().unwrap(), clusters.generate().unwrap());
    }

    #[test]
    fn rejects_non_positive_spread() {
        for spread in [-1.0, 0.0, f64::NAN, f64::INFINITY] {
            let clusters = GaussianClusters {
                spread,
                ..GaussianClusters::default()
            };
            assert!(
                matches!(clusters.generate(), Err(TsneError::InvalidConfig(_))),
                "spread {spread} accepted"
            );
        }
    }
}
