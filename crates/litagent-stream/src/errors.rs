use crate::model::TransportId;

/// Errors raised by a transport while opening or reading the byte source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent (connect failure, DNS, timeout).
    #[error("request failed ({transport}): {message}")]
    Request {
        transport: TransportId,
        message: String,
    },
    /// The remote answered with a non-success status.
    #[error("unexpected status {status} ({transport}): {body}")]
    Status {
        transport: TransportId,
        status: u16,
        body: String,
    },
    /// Reading the response body failed mid-stream (for example a reset).
    #[error("stream read failed ({transport}): {message}")]
    Read {
        transport: TransportId,
        message: String,
    },
    /// The source closed in a way the transport treats as a failure.
    #[error("source closed ({transport}): {message}")]
    Closed {
        transport: TransportId,
        message: String,
    },
}

impl TransportError {
    /// Creates a request-level error.
    pub fn request(transport: impl Into<TransportId>, message: impl Into<String>) -> Self {
        Self::Request {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Creates a status error from a non-success response.
    pub fn status(transport: impl Into<TransportId>, status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            transport: transport.into(),
            status,
            body: body.into(),
        }
    }

    /// Creates a mid-stream read error.
    pub fn read(transport: impl Into<TransportId>, message: impl Into<String>) -> Self {
        Self::Read {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Creates a closed-source error.
    pub fn closed(transport: impl Into<TransportId>, message: impl Into<String>) -> Self {
        Self::Closed {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Returns the transport that produced this error.
    pub fn transport_id(&self) -> &TransportId {
        match self {
            Self::Request { transport, .. }
            | Self::Status { transport, .. }
            | Self::Read { transport, .. }
            | Self::Closed { transport, .. } => transport,
        }
    }
}

/// A chunk whose bytes are not valid UTF-8.
///
/// Recoverable: the reader skips the chunk and keeps reading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid utf-8 in chunk ({len} bytes, valid up to {valid_up_to})")]
pub struct DecodeError {
    /// Number of bytes that were discarded.
    pub len: usize,
    /// Offset of the first invalid byte within the discarded bytes.
    pub valid_up_to: usize,
}

/// Why a session ended in the `errored` phase.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum SessionFailure {
    /// The stream closed without a terminal payload.
    #[error("stream ended before the article was delivered")]
    UnexpectedEnd,
    /// The byte source itself failed.
    #[error("transport failure: {message}")]
    Transport { message: String },
}

impl From<&TransportError> for SessionFailure {
    fn from(value: &TransportError) -> Self {
        SessionFailure::Transport {
            message: value.to_string(),
        }
    }
}

/// Top-level error type for the public generator API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeneratorError {
    /// Invalid generator or transport configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid input to the builder API.
    #[error("validation error: {0}")]
    Validation(String),
    /// Transport error surfaced outside a session (for example a health probe).
    #[error(transparent)]
    Transport(TransportError),
    /// The session ended in the `errored` phase.
    #[error(transparent)]
    Failed(SessionFailure),
    /// The session was stopped before the article was delivered.
    #[error("cancelled")]
    Cancelled,
    /// Internal protocol misuse or invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl GeneratorError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

impl From<SessionFailure> for GeneratorError {
    fn from(value: SessionFailure) -> Self {
        GeneratorError::Failed(value)
    }
}

impl From<TransportError> for GeneratorError {
    fn from(value: TransportError) -> Self {
        GeneratorError::Transport(value)
    }
}
