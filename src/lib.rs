//! Step-by-step t-SNE for teaching.
//!
//! The engine precomputes a full t-SNE run and records an immutable [`Snapshot`] at
//! every conceptual phase: distances, bandwidth search, conditional and joint
//! probabilities, early exaggeration, the gradient-descent loop and completion. A
//! viewer steps through the snapshots to render matrices, scatter plots and formulas.
//!
//! ```
//! use tsne_walkthrough::{GaussianClusters, Step, TsneConfig, TsneEncoder};
//!
//! let data = GaussianClusters::default().generate()?;
//! let config = TsneConfig::default().with_perplexity(5.0).with_max_iterations(50).with_seed(1);
//! let mut tsne = TsneEncoder::new(data.points, data.labels, config)?;
//! tsne.run();
//!
//! assert_eq!(tsne.snapshots().last().map(|s| s.step), Some(Step::Complete));
//! assert_eq!(tsne.embedding().dim(), (30, 2));
//! # Ok::<(), tsne_walkthrough::TsneError>(())
//! ```

mod algorithm;
pub mod bandwidth;
mod config;
pub mod dataset;
mod distance;
pub mod entropy;
pub mod error;
pub mod optimizer;
mod phase;
pub mod probability;
pub mod similarity;
mod snapshot;
mod utils;

use log::LevelFilter;
use wasm_bindgen::prelude::*;

pub use crate::algorithm::{CostSample, EngineState, Transition, TsneEncoder};
pub use crate::bandwidth::{BandwidthConfig, BandwidthSearch, SearchStep};
pub use crate::config::TsneConfig;
pub use crate::dataset::{Dataset, GaussianClusters};
pub use crate::distance::Distance;
pub use crate::error::TsneError;
pub use crate::optimizer::MomentumSchedule;
pub use crate::phase::{Phase, Step};
pub use crate::similarity::LowDimAffinities;
pub use crate::snapshot::{CapturePolicy, Snapshot, SnapshotRecorder};
use crate::utils::{init_console_logger, set_panic_hook};

fn js_error(err: impl std::fmt::Display) -> JsError {
    JsError::new(&err.to_string())
}

/// Browser handle on one precomputed run. Snapshots leave as serialized copies.
#[wasm_bindgen]
pub struct Tsne {
    tsne_encoder: TsneEncoder,
}

#[wasm_bindgen]
impl Tsne {
    /// `data` is row-major with `cols` values per point; `config` is a partial
    /// [`TsneConfig`] object (or `undefined` for defaults).
    #[wasm_bindgen(constructor)]
    pub fn new(
        data: &[f64],
        cols: usize,
        labels: &[i32],
        config: JsValue,
    ) -> std::result::Result<Tsne, JsError> {
        set_panic_hook();
        init_console_logger(LevelFilter::Info);

        let config: TsneConfig = if config.is_undefined() || config.is_null() {
            TsneConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };
        let tsne_encoder =
            TsneEncoder::from_flat(data, cols, labels.to_vec(), config).map_err(js_error)?;
        Ok(Tsne { tsne_encoder })
    }

    /// Runs one phase and returns its name, or `undefined` once complete.
    pub fn step(&mut self) -> Option<String> {
        self.tsne_encoder
            .step()
            .map(|phase| phase.as_str().to_owned())
    }

    pub fn run(&mut self) {
        self.tsne_encoder.run();
    }

    pub fn phase(&self) -> String {
        self.tsne_encoder.phase().as_str().to_owned()
    }

    pub fn iteration(&self) -> usize {
        self.tsne_encoder.iteration()
    }

    #[wasm_bindgen(js_name = isComplete)]
    pub fn is_complete(&self) -> bool {
        self.tsne_encoder.is_complete()
    }

    /// Current embedding, row-major.
    pub fn embedding(&self) -> Vec<f64> {
        self.tsne_encoder.embedding().iter().copied().collect()
    }

    pub fn cost(&self) -> Option<f64> {
        self.tsne_encoder.cost()
    }

    #[wasm_bindgen(js_name = costHistory)]
    pub fn cost_history(&self) -> std::result::Result<JsValue, JsError> {
        Ok(serde_wasm_bindgen::to_value(self.tsne_encoder.cost_history())?)
    }

    #[wasm_bindgen(js_name = snapshotCount)]
    pub fn snapshot_count(&self) -> usize {
        self.tsne_encoder.snapshots().len()
    }

    pub fn snapshot(&self, index: usize) -> std::result::Result<JsValue, JsError> {
        match self.tsne_encoder.snapshots().get(index) {
            Some(snapshot) => Ok(serde_wasm_bindgen::to_value(snapshot)?),
            None => Err(JsError::new(&format!("no snapshot at index {index}"))),
        }
    }

    pub fn snapshots(&self) -> std::result::Result<JsValue, JsError> {
        Ok(serde_wasm_bindgen::to_value(self.tsne_encoder.snapshots())?)
    }
}
