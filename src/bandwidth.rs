//! Per-point Gaussian bandwidth search.
//!
//! Each point gets its own sigma, chosen by binary search so that the conditional
//! distribution it induces over its neighbours has the requested perplexity. Entropy
//! grows monotonically with sigma, which is what makes bisection valid.

use ndarray::{Array1, ArrayView1, ArrayView2, ArrayViewMut1};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entropy::{entropy_to_perplexity, shannon_entropy, EPSILON};

const SIGMA_MIN: f64 = 1e-10;
const SIGMA_MAX: f64 = 1e10;
const SIGMA_START: f64 = 1.0;

/// Tuning knobs of the bisection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BandwidthConfig {
    /// Accepted absolute error on the entropy, in bits.
    pub tolerance: f64,
    /// Upper bound on bisection steps per point.
    pub max_tries: usize,
    /// Keep every `(iteration, sigma, perplexity)` probe for later display.
    pub record_trace: bool,
}

impl Default for BandwidthConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-5,
            max_tries: 50,
            record_trace: true,
        }
    }
}

/// One probe of the bisection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SearchStep {
    pub iteration: usize,
    pub sigma: f64,
    pub perplexity: f64,
}

/// Outcome of the search for a single point.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthSearch {
    pub sigma: f64,
    /// Conditional distribution `P(·|i)` at `sigma`; all zero for an unreachable point.
    pub probabilities: Array1<f64>,
    pub entropy: f64,
    pub perplexity: f64,
    /// Number of probes evaluated.
    pub iterations: usize,
    /// Whether the entropy landed within tolerance. A search that runs out of tries
    /// still returns its last probe.
    pub converged: bool,
    pub trace: Vec<SearchStep>,
}

/// Fills `out` with `exp(-d_ij / 2σ²)` normalized over `j != index`.
///
/// `distances` holds squared distances. The self entry stays zero. When the kernel
/// mass is at or below [`EPSILON`] the row is left unnormalized (all zeros in
/// practice) and the returned sum tells the caller so.
pub fn gaussian_row(
    distances: &ArrayView1<f64>,
    sigma: f64,
    index: usize,
    mut out: ArrayViewMut1<f64>,
) -> f64 {
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut sum = 0.0;
    for (j, (p, &d)) in out.iter_mut().zip(distances.iter()).enumerate() {
        *p = if j == index {
            0.0
        } else {
            f64::exp(-d / two_sigma_sq)
        };
        sum += *p;
    }

    if sum > EPSILON {
        out.map_inplace(|p| *p /= sum);
    }
    sum
}

/// Bisects sigma for point `index` until `2^H` matches `perplexity`.
pub fn search_sigma(
    distances: &ArrayView1<f64>,
    index: usize,
    perplexity: f64,
    config: &BandwidthConfig,
) -> BandwidthSearch {
    let target = perplexity.log2();
    let mut sigma_min = SIGMA_MIN;
    let mut sigma_max = SIGMA_MAX;
    let mut sigma = SIGMA_START;

    let mut probabilities = Array1::zeros(distances.len());
    let mut trace = Vec::new();
    let mut search = BandwidthSearch {
        sigma,
        probabilities: Array1::zeros(distances.len()),
        entropy: 0.0,
        perplexity: 1.0,
        iterations: 0,
        converged: false,
        trace: Vec::new(),
    };

    for iteration in 0..config.max_tries {
        gaussian_row(distances, sigma, index, probabilities.view_mut());
        let entropy = shannon_entropy(&probabilities.view());
        let current = entropy_to_perplexity(entropy);

        if config.record_trace {
            trace.push(SearchStep {
                iteration,
                sigma,
                perplexity: current,
            });
        }

        search.sigma = sigma;
        search.entropy = entropy;
        search.perplexity = current;
        search.iterations = iteration + 1;

        if (entropy - target).abs() < config.tolerance {
            search.converged = true;
            break;
        }

        if entropy > target {
            sigma_max = sigma;
            sigma = (sigma + sigma_min) / 2.0;
        } else {
            sigma_min = sigma;
            sigma = if sigma_max == SIGMA_MAX {
                sigma * 2.0
            } else {
                (sigma + sigma_max) / 2.0
            };
        }
    }

    search.probabilities = probabilities;
    search.trace = trace;
    search
}

/// Runs [`search_sigma`] for every row of a distance matrix.
pub fn search_all(
    distances: &ArrayView2<f64>,
    perplexity: f64,
    config: &BandwidthConfig,
) -> Vec<BandwidthSearch> {
    #[cfg(feature = "parallel")]
    let rows = (0..distances.nrows()).into_par_iter();
    #[cfg(not(feature = "parallel"))]
    let rows = 0..distances.nrows();

    rows.map(|i| search_sigma(&distances.row(i), i, perplexity, config))
        .collect()
}
