//! Event Interpreter: classifies one framed record into a typed update.

use serde::Deserialize;

use crate::model::StageId;
use crate::reader::{RawEventRecord, RecordKind};

/// Payload that terminates the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Stage id the server uses for the final-article record.
pub const DONE_STAGE: &str = "done";

/// Normalized update folded by [`crate::reducer::apply`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypedUpdate {
    StageStarted { stage: StageId, message: String },
    StageDelta { stage: StageId, delta: String },
    StageCompleted { stage: StageId, content: String },
    SessionDone { final_article: String },
    /// The `[DONE]` sentinel was received.
    StreamEnded,
    /// A data payload could not be decoded. Never fatal.
    ParseFailed { raw: String, reason: String },
}

impl TypedUpdate {
    /// Returns the stage this update targets, if any.
    pub fn stage(&self) -> Option<&StageId> {
        match self {
            Self::StageStarted { stage, .. }
            | Self::StageDelta { stage, .. }
            | Self::StageCompleted { stage, .. } => Some(stage),
            Self::SessionDone { .. } | Self::StreamEnded | Self::ParseFailed { .. } => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct StagePayload {
    stage: Option<String>,
    status: Option<String>,
    delta: Option<String>,
    content: Option<String>,
    message: Option<String>,
    final_article: Option<String>,
}

/// Interprets one record.
///
/// Returns `None` for records that carry nothing to apply: non-data records
/// (comments, keep-alives) and data payloads whose field combination is not
/// meaningful (heartbeats).
pub fn interpret(raw: &RawEventRecord) -> Option<TypedUpdate> {
    if raw.kind != RecordKind::Data {
        return None;
    }
    if raw.payload == DONE_SENTINEL {
        return Some(TypedUpdate::StreamEnded);
    }

    let payload: StagePayload = match serde_json::from_str(&raw.payload) {
        Ok(payload) => payload,
        Err(err) => {
            return Some(TypedUpdate::ParseFailed {
                raw: raw.payload.clone(),
                reason: err.to_string(),
            });
        }
    };

    let StagePayload {
        stage,
        status,
        delta,
        content,
        message,
        final_article,
    } = payload;

    let stage = stage?;
    if stage == DONE_STAGE
        && let Some(final_article) = final_article
    {
        return Some(TypedUpdate::SessionDone { final_article });
    }

    let stage = StageId::new(stage);
    match (status.as_deref(), delta, content) {
        (Some("start"), _, _) => Some(TypedUpdate::StageStarted {
            stage,
            message: message.unwrap_or_default(),
        }),
        (Some("streaming"), Some(delta), _) => Some(TypedUpdate::StageDelta { stage, delta }),
        (Some("complete"), _, Some(content)) => Some(TypedUpdate::StageCompleted { stage, content }),
        _ => None,
    }
}
