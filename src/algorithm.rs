use log::{debug, info, trace, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::bandwidth::{search_all, BandwidthSearch};
use crate::config::TsneConfig;
use crate::distance::Distance;
use crate::error::{Result, TsneError};
use crate::optimizer::{center, gradient, kl_divergence, momentum_step};
use crate::phase::{Phase, Step};
use crate::probability::{conditional_probabilities, exaggerate, remove_exaggeration, symmetrize};
use crate::similarity::LowDimAffinities;
use crate::snapshot::{Snapshot, SnapshotRecorder};

/// KL divergence after a given iteration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CostSample {
    pub iteration: usize,
    pub cost: f64,
}

/// Everything a run owns. Matrices are allocated up front and filled in as phases run.
#[derive(Clone, Debug, Default)]
pub struct EngineState {
    phase: Phase,
    iteration: usize,
    points: Array2<f64>,
    labels: Vec<i32>,
    distances: Array2<f64>,
    bandwidths: Vec<BandwidthSearch>,
    sigmas: Array1<f64>,
    conditional: Array2<f64>,
    p: Array2<f64>,
    /// Unexaggerated joint P, kept for restoration and for the cost.
    p_original: Array2<f64>,
    exaggerated: bool,
    y: Array2<f64>,
    /// Embedding the current Q and gradient were computed from.
    previous_y: Array2<f64>,
    velocity: Array2<f64>,
    affinities: LowDimAffinities,
    gradient: Array2<f64>,
    cost_history: Vec<CostSample>,
}

/// Result of one transition: the next state and the steps it executed, in order.
pub struct Transition {
    pub state: EngineState,
    pub steps: Vec<Step>,
}

impl EngineState {
    /// Fresh state in [`Phase::Init`]. Input must already be validated.
    pub fn new(points: Array2<f64>, labels: Vec<i32>, target_dim: usize) -> Self {
        let n = points.nrows();
        Self {
            phase: Phase::Init,
            iteration: 0,
            points,
            labels,
            distances: Array2::zeros((n, n)),
            bandwidths: Vec::with_capacity(n),
            sigmas: Array1::zeros(n),
            conditional: Array2::zeros((n, n)),
            p: Array2::zeros((n, n)),
            p_original: Array2::zeros((n, n)),
            exaggerated: false,
            y: Array2::zeros((n, target_dim)),
            previous_y: Array2::zeros((n, target_dim)),
            velocity: Array2::zeros((n, target_dim)),
            affinities: LowDimAffinities {
                q: Array2::zeros((n, n)),
                unnormalized: Array2::zeros((n, n)),
                sum: 0.0,
            },
            gradient: Array2::zeros((n, target_dim)),
            cost_history: Vec::new(),
        }
    }

    /// Runs the work of the current phase and moves to the next one.
    ///
    /// [`Phase::Iterate`] executes Q, gradient and update as one unit, and restores the
    /// unexaggerated P inline once the configured iteration is reached. Advancing a
    /// complete state returns it unchanged with no steps.
    pub fn advance(mut self, config: &TsneConfig) -> Transition {
        let n = self.points.nrows();
        let mut steps = Vec::with_capacity(5);

        match self.phase {
            Phase::Init => {
                debug!("t-SNE run over {} points of dimension {}", n, self.points.ncols());
                steps.push(Step::Init);
                self.phase = Phase::ComputeDistances;
            }
            Phase::ComputeDistances => {
                self.distances = Distance::matrix(&self.points.view());
                debug!("computed {n}x{n} squared distance matrix");
                steps.push(Step::ComputeDistances);
                self.phase = Phase::ComputeSigmas;
            }
            Phase::ComputeSigmas => {
                self.bandwidths =
                    search_all(&self.distances.view(), config.perplexity, &config.bandwidth);
                self.sigmas = self.bandwidths.iter().map(|b| b.sigma).collect();
                let unconverged = self.bandwidths.iter().filter(|b| !b.converged).count();
                if unconverged > 0 {
                    warn!(
                        "{unconverged} of {n} bandwidth searches stopped short of perplexity {}",
                        config.perplexity
                    );
                }
                debug!("found sigmas for perplexity {}", config.perplexity);
                steps.push(Step::ComputeSigmas);
                self.phase = Phase::ComputePConditional;
            }
            Phase::ComputePConditional => {
                self.conditional =
                    conditional_probabilities(&self.distances.view(), &self.sigmas.view());
                steps.push(Step::ComputePConditional);
                self.phase = Phase::SymmetrizeP;
            }
            Phase::SymmetrizeP => {
                self.p_original = symmetrize(&self.conditional.view());
                self.p = self.p_original.clone();
                steps.push(Step::SymmetrizeP);
                self.phase = Phase::ApplyEarlyExaggeration;
            }
            Phase::ApplyEarlyExaggeration => {
                if config.exaggeration_stop > 0 {
                    exaggerate(&mut self.p, config.exaggeration_factor);
                    self.exaggerated = true;
                    debug!(
                        "exaggerating P by {} until iteration {}",
                        config.exaggeration_factor, config.exaggeration_stop
                    );
                }
                steps.push(Step::ApplyEarlyExaggeration);
                self.phase = Phase::InitializeEmbedding;
            }
            Phase::InitializeEmbedding => {
                let mut rng = match config.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                let shape = (n, config.target_dim);
                self.y = Array2::random_using(shape, StandardNormal, &mut rng) * config.init_std;
                self.previous_y = self.y.clone();
                self.velocity = Array2::zeros(shape);
                self.gradient = Array2::zeros(shape);
                steps.push(Step::InitializeEmbedding);
                if config.max_iterations == 0 {
                    steps.push(Step::Complete);
                    self.phase = Phase::Complete;
                } else {
                    self.phase = Phase::Iterate;
                }
            }
            Phase::Iterate => {
                let t = self.iteration + 1;

                self.affinities = LowDimAffinities::compute(&self.y.view());
                self.gradient = gradient(&self.p.view(), &self.affinities, &self.y.view());
                let cost = kl_divergence(&self.p_original.view(), &self.affinities.q.view());
                self.previous_y.assign(&self.y);
                momentum_step(
                    &mut self.y,
                    &mut self.velocity,
                    &self.gradient.view(),
                    config.learning_rate,
                    config.momentum.at(t),
                );
                center(&mut self.y);

                self.iteration = t;
                self.cost_history.push(CostSample { iteration: t, cost });
                trace!("iteration {t}: cost {cost:.6}");
                steps.extend([Step::ComputeQ, Step::ComputeGradient, Step::UpdateEmbedding]);

                if self.exaggerated && t >= config.exaggeration_stop {
                    remove_exaggeration(&mut self.p, &self.p_original);
                    self.exaggerated = false;
                    debug!("removed early exaggeration at iteration {t}");
                    steps.push(Step::RemoveExaggeration);
                }

                if t >= config.max_iterations {
                    info!("t-SNE finished after {t} iterations, cost {cost:.6}");
                    steps.push(Step::Complete);
                    self.phase = Phase::Complete;
                }
            }
            Phase::Complete => {}
        }

        Transition { state: self, steps }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn points(&self) -> ArrayView2<f64> {
        self.points.view()
    }

    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    pub fn distances(&self) -> ArrayView2<f64> {
        self.distances.view()
    }

    pub fn bandwidths(&self) -> &[BandwidthSearch] {
        &self.bandwidths
    }

    pub fn sigmas(&self) -> ArrayView1<f64> {
        self.sigmas.view()
    }

    pub fn conditional(&self) -> ArrayView2<f64> {
        self.conditional.view()
    }

    /// Live joint P, exaggerated while early exaggeration is in effect.
    pub fn p(&self) -> ArrayView2<f64> {
        self.p.view()
    }

    pub fn p_original(&self) -> ArrayView2<f64> {
        self.p_original.view()
    }

    pub fn is_exaggerated(&self) -> bool {
        self.exaggerated
    }

    pub fn embedding(&self) -> ArrayView2<f64> {
        self.y.view()
    }

    /// Embedding before the latest update: the one [`Self::affinities`] and
    /// [`Self::gradient`] describe.
    pub fn previous_embedding(&self) -> ArrayView2<f64> {
        self.previous_y.view()
    }

    pub fn velocity(&self) -> ArrayView2<f64> {
        self.velocity.view()
    }

    pub fn affinities(&self) -> &LowDimAffinities {
        &self.affinities
    }

    pub fn gradient(&self) -> ArrayView2<f64> {
        self.gradient.view()
    }

    /// Cost of the latest iteration, if any ran.
    pub fn cost(&self) -> Option<f64> {
        self.cost_history.last().map(|c| c.cost)
    }

    pub fn cost_history(&self) -> &[CostSample] {
        &self.cost_history
    }
}

/// Drives one t-SNE run phase by phase and records its snapshot timeline.
pub struct TsneEncoder {
    config: TsneConfig,
    state: EngineState,
    recorder: SnapshotRecorder,
}

impl TsneEncoder {
    /// Validates input and configuration; no computation happens until the first step.
    pub fn new(points: Array2<f64>, labels: Vec<i32>, config: TsneConfig) -> Result<Self> {
        let (rows, cols) = points.dim();
        config.validate(rows, cols)?;
        if labels.len() != rows {
            return Err(TsneError::LabelMismatch {
                points: rows,
                labels: labels.len(),
            });
        }
        if points.iter().any(|v| !v.is_finite()) {
            return Err(TsneError::InvalidConfig("points must be finite".into()));
        }

        let recorder = SnapshotRecorder::new(config.capture.clone(), config.max_iterations);
        let state = EngineState::new(points, labels, config.target_dim);
        Ok(Self {
            config,
            state,
            recorder,
        })
    }

    /// Builds the point matrix from rows, rejecting ragged input.
    pub fn from_rows(rows: &[Vec<f64>], labels: Vec<i32>, config: TsneConfig) -> Result<Self> {
        let first = rows.first().ok_or(TsneError::EmptyInput)?;
        let cols = first.len();
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(TsneError::DimensionMismatch {
                index,
                expected: cols,
                actual: row.len(),
            });
        }
        let data: Vec<f64> = rows.iter().flatten().copied().collect();
        let points = Array2::from_shape_vec((rows.len(), cols), data)?;
        Self::new(points, labels, config)
    }

    /// Builds the point matrix from a row-major buffer with `cols` values per point.
    pub fn from_flat(
        data: &[f64],
        cols: usize,
        labels: Vec<i32>,
        config: TsneConfig,
    ) -> Result<Self> {
        if data.is_empty() {
            return Err(TsneError::EmptyInput);
        }
        if cols == 0 || data.len() % cols != 0 {
            return Err(TsneError::DimensionMismatch {
                index: data.len() / cols.max(1),
                expected: cols,
                actual: data.len() % cols.max(1),
            });
        }
        let points = Array2::from_shape_vec((data.len() / cols, cols), data.to_vec())?;
        Self::new(points, labels, config)
    }

    /// Executes one phase (one whole iteration while optimizing).
    ///
    /// Returns the phase that ran, or `None` once the run is complete.
    pub fn step(&mut self) -> Option<Phase> {
        let executed = self.state.phase();
        if executed.is_terminal() {
            return None;
        }

        let Transition { state, steps } = std::mem::take(&mut self.state).advance(&self.config);
        for step in steps {
            self.recorder.observe(&state, step);
        }
        self.state = state;
        Some(executed)
    }

    /// Runs every remaining phase.
    pub fn run(&mut self) -> &mut Self {
        while self.step().is_some() {}
        self
    }

    pub fn config(&self) -> &TsneConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn iteration(&self) -> usize {
        self.state.iteration()
    }

    pub fn is_complete(&self) -> bool {
        self.state.phase().is_terminal()
    }

    pub fn embedding(&self) -> ArrayView2<f64> {
        self.state.embedding()
    }

    pub fn cost(&self) -> Option<f64> {
        self.state.cost()
    }

    pub fn cost_history(&self) -> &[CostSample] {
        self.state.cost_history()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        self.recorder.snapshots()
    }

    pub fn into_snapshots(self) -> Vec<Snapshot> {
        self.recorder.into_snapshots()
    }
}
