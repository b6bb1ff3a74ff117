use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};

/// Position of the engine in its state machine: the work the next transition performs.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoStaticStr,
    EnumString,
)]
#[serde(into = "&'static str", try_from = "String")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[default]
    Init,
    ComputeDistances,
    ComputeSigmas,
    ComputePConditional,
    SymmetrizeP,
    ApplyEarlyExaggeration,
    InitializeEmbedding,
    /// One full loop body: Q, gradient and update, never split.
    Iterate,
    Complete,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        self == Phase::Complete
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Tag of a recorded snapshot. Loop sub-steps and the inline exaggeration removal get
/// their own tags even though they run inside a single [`Phase::Iterate`] transition.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoStaticStr,
    EnumString,
)]
#[serde(into = "&'static str", try_from = "String")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    Init,
    ComputeDistances,
    ComputeSigmas,
    ComputePConditional,
    SymmetrizeP,
    ApplyEarlyExaggeration,
    InitializeEmbedding,
    ComputeQ,
    ComputeGradient,
    UpdateEmbedding,
    RemoveExaggeration,
    Complete,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl TryFrom<String> for Phase {
    type Error = strum::ParseError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl TryFrom<String> for Step {
    type Error = strum::ParseError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}
