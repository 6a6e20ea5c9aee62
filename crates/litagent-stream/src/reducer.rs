//! Stage State Reducer: folds typed updates into a [`SessionState`].
//!
//! Every function here takes the previous snapshot by value and returns the
//! next one. Deltas are appended in place on the owned buffer, so the cost of
//! an update does not depend on how much text a stage already holds.

use tracing::debug;

use crate::errors::SessionFailure;
use crate::interpret::TypedUpdate;
use crate::model::StageId;
use crate::state::{SessionPhase, SessionState, StageState, StageStatus};

/// Applies one update.
pub fn apply(mut state: SessionState, update: TypedUpdate) -> SessionState {
    match update {
        TypedUpdate::StageStarted { stage, message } => {
            let entry = upsert(&mut state, &stage);
            match entry.status {
                StageStatus::Complete => {
                    debug!(stage = %stage, "ignoring start text for completed stage");
                }
                StageStatus::Pending => {
                    entry.status = StageStatus::Started;
                    entry.streaming_text = message;
                }
                // A repeated start never shrinks accumulated text.
                StageStatus::Started | StageStatus::Streaming => {}
            }
            state.current_stage = Some(stage);
        }
        TypedUpdate::StageDelta { stage, delta } => {
            let entry = upsert(&mut state, &stage);
            if entry.is_complete() {
                debug!(stage = %stage, "ignoring delta text for completed stage");
            } else {
                entry.status = StageStatus::Streaming;
                entry.streaming_text.push_str(&delta);
            }
            state.current_stage = Some(stage);
        }
        TypedUpdate::StageCompleted { stage, content } => {
            let entry = upsert(&mut state, &stage);
            if entry.is_complete() {
                debug!(stage = %stage, "ignoring repeated completion");
                return state;
            }
            entry.status = StageStatus::Complete;
            entry.complete_text.clone_from(&content);
            entry.streaming_text = content;
        }
        TypedUpdate::SessionDone { final_article } => {
            if matches!(state.phase, SessionPhase::Stopped | SessionPhase::Errored) {
                debug!(phase = ?state.phase, "ignoring final article after terminal phase");
                return state;
            }
            state.final_artifact = Some(final_article);
            state.phase = SessionPhase::Done;
        }
        TypedUpdate::StreamEnded => {
            return fail(state, SessionFailure::UnexpectedEnd);
        }
        TypedUpdate::ParseFailed { .. } => {}
    }
    state
}

/// Folds a sequence of updates, starting from `state`.
pub fn fold<I>(state: SessionState, updates: I) -> SessionState
where
    I: IntoIterator<Item = TypedUpdate>,
{
    updates.into_iter().fold(state, apply)
}

/// Marks a running session as stopped by the user. No-op in any other phase.
pub fn stop(mut state: SessionState) -> SessionState {
    if state.phase == SessionPhase::Running {
        state.phase = SessionPhase::Stopped;
    }
    state
}

/// Marks a running session as errored. No-op in any other phase.
pub fn fail(mut state: SessionState, failure: SessionFailure) -> SessionState {
    if state.phase == SessionPhase::Running {
        state.phase = SessionPhase::Errored;
        state.failure = Some(failure);
    }
    state
}

fn upsert<'a>(state: &'a mut SessionState, stage: &StageId) -> &'a mut StageState {
    state
        .stages
        .entry(stage.clone())
        .or_insert_with(|| StageState::pending(stage.clone()))
}
