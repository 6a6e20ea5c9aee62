use std::fmt;
use std::time::Duration;

/// Stable identifier for a transport implementation (for example `http`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TransportId(pub String);

impl TransportId {
    /// Creates a transport id from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the transport id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransportId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TransportId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Opaque name of a pipeline stage (`researcher`, `writer`, ...).
///
/// Any string the server sends is a valid stage id.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct StageId(String);

impl StageId {
    /// Creates a stage id from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the stage id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StageId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl PartialEq<str> for StageId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StageId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Generic per-generation behavior options.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GenerationOptions {
    /// Optional timeout for the whole streaming request.
    pub timeout: Option<Duration>,
    /// Bounded event buffer size used by the session channel.
    pub stream_buffer_capacity: usize,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            stream_buffer_capacity: 128,
        }
    }
}

/// A validated request handed to a [`crate::Transport`].
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    /// Unique id of the session this request belongs to.
    pub session_id: uuid::Uuid,
    /// Topic the article is written about.
    pub topic: String,
    /// Request options.
    pub options: GenerationOptions,
}
