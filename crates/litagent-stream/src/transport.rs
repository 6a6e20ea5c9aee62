use std::pin::Pin;

use crate::errors::TransportError;
use crate::model::{GenerationRequest, TransportId};

/// Ordered byte chunks of one streaming response.
///
/// Dropping the source releases the underlying connection.
pub type ByteSource =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, TransportError>> + Send + 'static>>;

/// Opens the byte stream of a generation.
///
/// Implementations must deliver chunks in send order and must not yield
/// further chunks once the returned source is dropped.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Returns the stable id of this transport.
    fn id(&self) -> TransportId;

    /// Sends the request and returns the response body as a byte source.
    async fn open(&self, request: &GenerationRequest) -> Result<ByteSource, TransportError>;
}
