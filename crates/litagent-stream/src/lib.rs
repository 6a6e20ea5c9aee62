//! Streaming client for the LitAgent article-generation backend.
//!
//! Bytes from a [`Transport`] flow through the [`reader`], are classified by
//! [`interpret`] and folded into a [`SessionState`] by the [`reducer`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use litagent_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), GeneratorError> {
//! let mut generator = Generator::builder()
//!     .transport(Arc::new(HttpTransport::from_env()?))
//!     .build()?;
//!
//! let article = generator
//!     .generate("The future of solid-state batteries")
//!     .collect_article()
//!     .await?;
//!
//! println!("{article}");
//! # Ok(())
//! # }
//! ```

/// Cancellation tokens and the single-session controller.
pub mod cancel;
/// Public error types.
pub mod errors;
/// Events emitted while a session runs.
pub mod events;
/// Generator entry point and builder.
pub mod generator;
/// HTTP transport for the backend's streaming endpoint.
pub mod http;
/// Record-to-update classification.
pub mod interpret;
/// Identifiers and per-session options.
pub mod model;
/// Logging setup.
pub mod observability;
/// Aggregated output of a finished generation.
pub mod output;
/// Common imports for typical usage.
pub mod prelude;
/// Chunk decoding and record framing.
pub mod reader;
/// Pure state transitions.
pub mod reducer;
/// Session builder, streaming handle and driver task.
pub mod run;
/// Session and stage snapshots.
pub mod state;
/// Byte source contract.
pub mod transport;

pub use cancel::{CancelToken, CancellationController};
pub use errors::{DecodeError, GeneratorError, SessionFailure, TransportError};
pub use events::SessionEvent;
pub use generator::{Generator, GeneratorBuilder};
pub use http::{HttpConfig, HttpTransport};
pub use interpret::{TypedUpdate, interpret};
pub use output::ArticleOutput;
pub use model::{GenerationOptions, GenerationRequest, StageId, TransportId};
pub use reader::{EventReader, RawEventRecord, ReaderEnd, RecordKind};
pub use run::{GenerationBuilder, GenerationStream};
pub use state::{SessionPhase, SessionState, StageState, StageStatus};
pub use transport::{ByteSource, Transport};
