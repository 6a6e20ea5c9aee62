//! Observable session snapshot produced by the reducer.

use indexmap::IndexMap;

use crate::errors::SessionFailure;
use crate::model::StageId;

/// Progress of a single stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Observed but no start/delta/complete applied yet.
    Pending,
    Started,
    Streaming,
    /// Terminal; the stage text no longer changes.
    Complete,
}

impl StageStatus {
    /// Returns `true` for a stage that is accumulating text.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Started | Self::Streaming)
    }
}

/// Accumulated output of one stage.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StageState {
    pub id: StageId,
    pub status: StageStatus,
    /// Grows append-only while the stage is active; replaced by the
    /// authoritative content on completion.
    pub streaming_text: String,
    /// Empty until the stage completes.
    pub complete_text: String,
}

impl StageState {
    /// Creates an empty pending stage.
    pub fn pending(id: StageId) -> Self {
        Self {
            id,
            status: StageStatus::Pending,
            streaming_text: String::new(),
            complete_text: String::new(),
        }
    }

    /// Returns `true` once the stage has completed.
    pub fn is_complete(&self) -> bool {
        self.status == StageStatus::Complete
    }
}

/// Session-level outcome.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Running,
    Done,
    /// Stopped on request; not a failure.
    Stopped,
    Errored,
}

impl SessionPhase {
    /// Returns `true` for `done`, `stopped` and `errored`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Stopped | Self::Errored)
    }
}

/// Snapshot of a generation session.
///
/// Invariants maintained by [`crate::reducer::apply`]:
/// - `final_artifact` is `Some` iff `phase` is [`SessionPhase::Done`].
/// - `failure` is `Some` iff `phase` is [`SessionPhase::Errored`].
/// - `stages` iterates in the order stages were first observed.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SessionState {
    pub stages: IndexMap<StageId, StageState>,
    pub current_stage: Option<StageId>,
    pub final_artifact: Option<String>,
    pub phase: SessionPhase,
    pub failure: Option<SessionFailure>,
}

impl SessionState {
    /// Creates the snapshot of a freshly started session.
    pub fn running() -> Self {
        Self {
            phase: SessionPhase::Running,
            ..Self::default()
        }
    }

    /// Looks up a stage by id.
    pub fn stage(&self, id: &str) -> Option<&StageState> {
        self.stages.get(&StageId::from(id))
    }

    /// Returns the state of the current stage, if any.
    pub fn current(&self) -> Option<&StageState> {
        self.current_stage
            .as_ref()
            .and_then(|id| self.stages.get(id))
    }

    /// Returns `true` once the session reached a terminal phase.
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}
