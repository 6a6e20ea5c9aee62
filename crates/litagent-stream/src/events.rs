use crate::interpret::TypedUpdate;
use crate::state::SessionState;

/// Events emitted by a [`crate::GenerationStream`], in pipeline order.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// First event of every session.
    Started {
        session_id: uuid::Uuid,
        topic: String,
    },
    /// An update that was folded into the session state.
    Update {
        session_id: uuid::Uuid,
        seq: u64,
        update: TypedUpdate,
    },
    /// A data record that could not be decoded; the session continues.
    Diagnostic {
        session_id: uuid::Uuid,
        raw: String,
        reason: String,
    },
    /// Terminal event carrying the final snapshot.
    Finished {
        session_id: uuid::Uuid,
        state: SessionState,
    },
}

impl SessionEvent {
    /// Returns the id of the session that produced this event.
    pub fn session_id(&self) -> uuid::Uuid {
        match self {
            Self::Started { session_id, .. }
            | Self::Update { session_id, .. }
            | Self::Diagnostic { session_id, .. }
            | Self::Finished { session_id, .. } => *session_id,
        }
    }
}
