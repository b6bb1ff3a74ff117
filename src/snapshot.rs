//! Immutable captures of engine state, recorded at phase boundaries for later replay.
//!
//! A [`Snapshot`] owns deep copies of every matrix it carries; the engine keeps
//! mutating its live matrices after a capture and the two never alias. The recorder
//! only reads engine state and the engine never reads snapshots back.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::algorithm::{CostSample, EngineState};
use crate::bandwidth::BandwidthSearch;
use crate::phase::Step;
use crate::similarity::LowDimAffinities;

/// Which loop iterations get an [`Step::UpdateEmbedding`] snapshot.
///
/// Snapshots of the loop carry N×N matrices, so capturing every iteration is rarely
/// what a viewer wants. Pre-loop phases, exaggeration removal, completion and the final
/// iteration are always captured.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CapturePolicy {
    /// Capture every `every`-th iteration; `0` disables periodic capture.
    pub every: usize,
    /// Explicit iteration numbers to capture.
    pub milestones: Vec<usize>,
    /// Also capture separate Q and gradient snapshots for iteration 1.
    pub loop_detail: bool,
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self {
            every: 50,
            milestones: Vec::new(),
            loop_detail: true,
        }
    }
}

impl CapturePolicy {
    /// Only the milestones (and the always-captured final iteration).
    pub fn milestones(milestones: Vec<usize>) -> Self {
        Self {
            every: 0,
            milestones,
            loop_detail: false,
        }
    }

    pub fn captures_iteration(&self, iteration: usize, last: usize) -> bool {
        iteration == last
            || (self.every > 0 && iteration % self.every == 0)
            || self.milestones.contains(&iteration)
    }

    fn captures(&self, step: Step, iteration: usize, last: usize) -> bool {
        match step {
            Step::ComputeQ | Step::ComputeGradient => self.loop_detail && iteration == 1,
            Step::UpdateEmbedding => self.captures_iteration(iteration, last),
            _ => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub step: Step,
    /// Completed loop iterations at capture time.
    pub iteration: usize,
    pub labels: Vec<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<Array2<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distances: Option<Array2<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sigmas: Option<Array1<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidths: Option<Vec<BandwidthSearch>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditional: Option<Array2<f64>>,
    /// Joint P as it stood at capture time (exaggerated or not).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<Array2<f64>>,
    /// Embedding `affinities`, `gradient` and `cost` were computed from. In a loop
    /// snapshot this is the embedding before the iteration's update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_embedding: Option<Array2<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinities: Option<LowDimAffinities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradient: Option<Array2<f64>>,
    /// Embedding once the step has run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Array2<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<Array2<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_history: Option<Vec<CostSample>>,
}

impl Snapshot {
    fn bare(state: &EngineState, step: Step) -> Self {
        Self {
            step,
            iteration: state.iteration(),
            labels: state.labels().to_vec(),
            points: None,
            distances: None,
            sigmas: None,
            bandwidths: None,
            conditional: None,
            p: None,
            input_embedding: None,
            affinities: None,
            gradient: None,
            embedding: None,
            velocity: None,
            cost: None,
            cost_history: None,
        }
    }

    /// Copies the state relevant to `step` out of `state`.
    pub fn capture(state: &EngineState, step: Step) -> Self {
        let base = Self::bare(state, step);
        match step {
            Step::Init => Self {
                points: Some(state.points().to_owned()),
                ..base
            },
            Step::ComputeDistances => Self {
                distances: Some(state.distances().to_owned()),
                ..base
            },
            Step::ComputeSigmas => Self {
                sigmas: Some(state.sigmas().to_owned()),
                bandwidths: Some(state.bandwidths().to_vec()),
                ..base
            },
            Step::ComputePConditional => Self {
                sigmas: Some(state.sigmas().to_owned()),
                conditional: Some(state.conditional().to_owned()),
                ..base
            },
            Step::SymmetrizeP | Step::ApplyEarlyExaggeration | Step::RemoveExaggeration => Self {
                p: Some(state.p().to_owned()),
                ..base
            },
            Step::InitializeEmbedding => Self {
                embedding: Some(state.embedding().to_owned()),
                velocity: Some(state.velocity().to_owned()),
                ..base
            },
            Step::ComputeQ => Self {
                input_embedding: Some(state.previous_embedding().to_owned()),
                affinities: Some(state.affinities().clone()),
                ..base
            },
            Step::ComputeGradient => Self {
                input_embedding: Some(state.previous_embedding().to_owned()),
                gradient: Some(state.gradient().to_owned()),
                ..base
            },
            Step::UpdateEmbedding => Self {
                input_embedding: Some(state.previous_embedding().to_owned()),
                affinities: Some(state.affinities().clone()),
                gradient: Some(state.gradient().to_owned()),
                embedding: Some(state.embedding().to_owned()),
                velocity: Some(state.velocity().to_owned()),
                cost: state.cost(),
                ..base
            },
            Step::Complete => Self {
                embedding: Some(state.embedding().to_owned()),
                cost: state.cost(),
                cost_history: Some(state.cost_history().to_vec()),
                ..base
            },
        }
    }
}

/// Accumulates snapshots for one run according to a [`CapturePolicy`].
#[derive(Clone, Debug, Default)]
pub struct SnapshotRecorder {
    policy: CapturePolicy,
    last_iteration: usize,
    snapshots: Vec<Snapshot>,
}

impl SnapshotRecorder {
    pub fn new(policy: CapturePolicy, last_iteration: usize) -> Self {
        Self {
            policy,
            last_iteration,
            snapshots: Vec::new(),
        }
    }

    /// Records `step` if the policy asks for it. Returns whether a snapshot was taken.
    pub fn observe(&mut self, state: &EngineState, step: Step) -> bool {
        if !self.policy.captures(step, state.iteration(), self.last_iteration) {
            return false;
        }
        self.snapshots.push(Snapshot::capture(state, step));
        true
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn into_snapshots(self) -> Vec<Snapshot> {
        self.snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periodic_milestone_and_final_iterations_are_captured() {
        let policy = CapturePolicy {
            every: 50,
            milestones: vec![1, 7],
            loop_detail: false,
        };
        let last = 120;
        let captured: Vec<usize> = (1..=last)
            .filter(|&t| policy.captures_iteration(t, last))
            .collect();
        assert_eq!(captured, vec![1, 7, 50, 100, 120]);
    }

    #[test]
    fn loop_detail_only_applies_to_first_iteration() {
        let policy = CapturePolicy::default();
        assert!(policy.captures(Step::ComputeQ, 1, 500));
        assert!(!policy.captures(Step::ComputeQ, 50, 500));
        assert!(!CapturePolicy::milestones(vec![]).captures(Step::ComputeGradient, 1, 500));
        assert!(policy.captures(Step::RemoveExaggeration, 100, 500));
    }
}
