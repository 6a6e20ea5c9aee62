use indexmap::IndexMap;

use crate::errors::GeneratorError;
use crate::model::StageId;
use crate::state::{SessionPhase, SessionState};

/// Final aggregated output of a completed generation.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ArticleOutput {
    /// The edited article delivered with the `done` record.
    pub final_article: String,
    /// Authoritative text of every completed stage, in first-seen order.
    pub stages: IndexMap<StageId, String>,
}

impl ArticleOutput {
    /// Converts a terminal snapshot into output.
    ///
    /// Stopped sessions map to [`GeneratorError::Cancelled`] and errored ones
    /// to [`GeneratorError::Failed`].
    pub fn from_final_state(state: SessionState) -> Result<Self, GeneratorError> {
        match (state.phase, state.final_artifact, state.failure) {
            (SessionPhase::Done, Some(final_article), _) => Ok(Self {
                final_article,
                stages: state
                    .stages
                    .into_iter()
                    .filter(|(_, stage)| stage.is_complete())
                    .map(|(id, stage)| (id, stage.complete_text))
                    .collect(),
            }),
            (SessionPhase::Stopped, _, _) => Err(GeneratorError::Cancelled),
            (SessionPhase::Errored, _, Some(failure)) => Err(GeneratorError::Failed(failure)),
            (phase, _, _) => Err(GeneratorError::protocol_msg(format!(
                "session finished in unexpected phase {phase:?}"
            ))),
        }
    }

    /// Returns the completed text of one stage.
    pub fn stage(&self, id: &str) -> Option<&str> {
        self.stages.get(&StageId::from(id)).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::errors::SessionFailure;
    use crate::interpret::TypedUpdate;
    use crate::reducer;

    #[test]
    fn keeps_completed_stage_texts_in_order() {
        let state = reducer::fold(
            SessionState::running(),
            [
                TypedUpdate::StageCompleted {
                    stage: "researcher".into(),
                    content: "facts".into(),
                },
                TypedUpdate::StageStarted {
                    stage: "strategist".into(),
                    message: "thinking".into(),
                },
                TypedUpdate::StageCompleted {
                    stage: "writer".into(),
                    content: "draft".into(),
                },
                TypedUpdate::SessionDone {
                    final_article: "ART".into(),
                },
            ],
        );
        let output = ArticleOutput::from_final_state(state).expect("output");
        assert_eq!(output.final_article, "ART");
        let order: Vec<&str> = output.stages.keys().map(StageId::as_str).collect();
        assert_eq!(order, vec!["researcher", "writer"]);
        assert_eq!(output.stage("writer"), Some("draft"));
        assert_eq!(output.stage("strategist"), None);
    }

    #[test]
    fn non_done_phases_are_errors() {
        let stopped = reducer::stop(SessionState::running());
        assert_eq!(
            ArticleOutput::from_final_state(stopped),
            Err(GeneratorError::Cancelled)
        );

        let errored = reducer::fail(SessionState::running(), SessionFailure::UnexpectedEnd);
        assert_eq!(
            ArticleOutput::from_final_state(errored),
            Err(GeneratorError::Failed(SessionFailure::UnexpectedEnd))
        );

        assert!(matches!(
            ArticleOutput::from_final_state(SessionState::running()),
            Err(GeneratorError::Protocol(_))
        ));
    }
}
