//! Run configuration.
//!
//! Every knob the walkthrough exposes lives in [`TsneConfig`]. The struct deserializes
//! from a partial JS object (missing fields take their defaults), so the browser side
//! only sends what the user changed.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::bandwidth::BandwidthConfig;
use crate::error::{Result, TsneError};
use crate::optimizer::MomentumSchedule;
use crate::snapshot::CapturePolicy;

/// Configuration of one t-SNE run.
///
/// # Example
///
/// ```
/// use tsne_walkthrough::TsneConfig;
///
/// let config = TsneConfig::default()
///     .with_perplexity(5.0)
///     .with_max_iterations(300)
///     .with_seed(7);
/// assert!(config.validate(30, 3).is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TsneConfig {
    /// Target effective neighbour count per point.
    pub perplexity: f64,
    pub learning_rate: f64,
    /// Number of gradient-descent iterations.
    pub max_iterations: usize,
    /// Dimensionality of the embedding.
    pub target_dim: usize,
    /// Factor P is multiplied by during early exaggeration.
    pub exaggeration_factor: f64,
    /// Iteration after which P is restored to its unscaled values.
    pub exaggeration_stop: usize,
    pub momentum: MomentumSchedule,
    /// Standard deviation of the Gaussian initial embedding.
    pub init_std: f64,
    /// Seed for the initial embedding; `None` draws from entropy.
    pub seed: Option<u64>,
    pub bandwidth: BandwidthConfig,
    pub capture: CapturePolicy,
}

impl Default for TsneConfig {
    fn default() -> Self {
        Self {
            perplexity: 10.0,
            learning_rate: 200.0,
            max_iterations: 500,
            target_dim: 2,
            exaggeration_factor: 4.0,
            exaggeration_stop: 100,
            momentum: MomentumSchedule::default(),
            init_std: 1e-4,
            seed: None,
            bandwidth: BandwidthConfig::default(),
            capture: CapturePolicy::default(),
        }
    }
}

impl TsneConfig {
    /// Set the perplexity.
    #[must_use]
    pub fn with_perplexity(mut self, perplexity: f64) -> Self {
        self.perplexity = perplexity;
        self
    }

    /// Set the learning rate.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the number of iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the embedding dimensionality.
    #[must_use]
    pub fn with_target_dim(mut self, target_dim: usize) -> Self {
        self.target_dim = target_dim;
        self
    }

    /// Set the early exaggeration factor and the iteration at which it is removed.
    #[must_use]
    pub fn with_exaggeration(mut self, factor: f64, stop: usize) -> Self {
        self.exaggeration_factor = factor;
        self.exaggeration_stop = stop;
        self
    }

    /// Set the momentum schedule.
    #[must_use]
    pub fn with_momentum(mut self, momentum: MomentumSchedule) -> Self {
        self.momentum = momentum;
        self
    }

    /// Set the seed of the initial embedding.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the bandwidth search parameters.
    #[must_use]
    pub fn with_bandwidth(mut self, bandwidth: BandwidthConfig) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    /// Set which loop iterations are recorded.
    #[must_use]
    pub fn with_capture(mut self, capture: CapturePolicy) -> Self {
        self.capture = capture;
        self
    }

    /// Largest perplexity for which the bisection is meaningful with `points` points:
    /// each point should have at least three times as many neighbours as the target.
    pub fn recommended_max_perplexity(points: usize) -> f64 {
        points.saturating_sub(1) as f64 / 3.0
    }

    /// Copy of `self` with the perplexity clamped to what `points` points support.
    #[must_use]
    pub fn clamped_to(&self, points: usize) -> Self {
        let mut config = self.clone();
        config.perplexity = self
            .perplexity
            .min(Self::recommended_max_perplexity(points))
            .max(1.0);
        config
    }

    /// Checks the configuration against an input of `points` points of dimension `dim`.
    ///
    /// A perplexity above the number of neighbours is unreachable and rejected. One
    /// above [`Self::recommended_max_perplexity`] is accepted with a warning.
    pub fn validate(&self, points: usize, dim: usize) -> Result<()> {
        if points == 0 {
            return Err(TsneError::EmptyInput);
        }
        if points < 2 {
            return Err(TsneError::TooFewPoints { points, required: 2 });
        }
        if dim == 0 {
            return Err(TsneError::InvalidConfig("points must have at least one dimension".into()));
        }
        if !self.perplexity.is_finite() || self.perplexity < 1.0 {
            return Err(TsneError::InvalidConfig(format!(
                "perplexity must be a finite value >= 1, got {}",
                self.perplexity
            )));
        }
        let neighbours = (points - 1) as f64;
        if self.perplexity > neighbours {
            return Err(TsneError::PerplexityTooLarge {
                perplexity: self.perplexity,
                points,
                max: neighbours,
            });
        }
        if self.perplexity > Self::recommended_max_perplexity(points) {
            warn!(
                "perplexity {} exceeds (N - 1) / 3 = {:.2} for {points} points",
                self.perplexity,
                Self::recommended_max_perplexity(points)
            );
        }
        check_positive("learning rate", self.learning_rate)?;
        if self.target_dim == 0 {
            return Err(TsneError::InvalidConfig("target dimension must be at least 1".into()));
        }
        check_positive("exaggeration factor", self.exaggeration_factor)?;
        check_unit("initial momentum", self.momentum.initial)?;
        check_unit("final momentum", self.momentum.final_value)?;
        check_positive("initial embedding std", self.init_std)?;
        check_positive("bandwidth tolerance", self.bandwidth.tolerance)?;
        if self.bandwidth.max_tries == 0 {
            return Err(TsneError::InvalidConfig("bandwidth search needs at least one try".into()));
        }
        Ok(())
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TsneError::InvalidConfig(format!("{name} must be positive and finite, got {value}")))
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(TsneError::InvalidConfig(format!("{name} must lie in [0, 1), got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_for_thirty_one_points() {
        assert!(TsneConfig::default().validate(31, 3).is_ok());
    }

    #[test]
    fn rejects_too_few_points() {
        let config = TsneConfig::default();
        assert!(matches!(config.validate(0, 3), Err(TsneError::EmptyInput)));
        assert!(matches!(
            config.validate(1, 3),
            Err(TsneError::TooFewPoints { points: 1, required: 2 })
        ));
    }

    #[test]
    fn rejects_perplexity_above_neighbour_count() {
        let config = TsneConfig::default().with_perplexity(40.0);
        match config.validate(30, 3) {
            Err(TsneError::PerplexityTooLarge { max, points: 30, .. }) => assert_eq!(max, 29.0),
            other => panic!("unexpected {other:?}"),
        }
        assert!(TsneConfig::default().with_perplexity(10.0).validate(30, 3).is_ok());
    }

    #[test]
    fn clamps_to_a_third_of_neighbours() {
        let clamped = TsneConfig::default().with_perplexity(40.0).clamped_to(31);
        assert_eq!(clamped.perplexity, 10.0);
        assert_eq!(TsneConfig::default().with_perplexity(5.0).clamped_to(4).perplexity, 1.0);
    }

    #[test]
    fn rejects_bad_numbers() {
        let base = TsneConfig::default().with_perplexity(2.0);
        assert!(base.clone().with_learning_rate(0.0).validate(10, 2).is_err());
        assert!(base.clone().with_learning_rate(f64::NAN).validate(10, 2).is_err());
        assert!(base.clone().with_target_dim(0).validate(10, 2).is_err());
        assert!(base.clone().with_exaggeration(-1.0, 100).validate(10, 2).is_err());
        assert!(base
            .clone()
            .with_momentum(MomentumSchedule {
                initial: 0.5,
                final_value: 1.0,
                switch_iteration: 10,
            })
            .validate(10, 2)
            .is_err());
        assert!(base.validate(10, 0).is_err());
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: TsneConfig =
            serde_json::from_str(r#"{"perplexity": 5, "maxIterations": 20, "seed": 3}"#).unwrap();
        assert_eq!(config.perplexity, 5.0);
        assert_eq!(config.max_iterations, 20);
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.learning_rate, 200.0);
        assert_eq!(config.bandwidth, BandwidthConfig::default());
    }
}
