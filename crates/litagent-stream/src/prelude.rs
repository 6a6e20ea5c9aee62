//! Common imports for typical generator usage.
pub use crate::{
    ArticleOutput, CancelToken, GenerationBuilder, GenerationStream, Generator, GeneratorBuilder,
    GeneratorError, HttpConfig, HttpTransport, SessionEvent, SessionPhase, SessionState,
    StageId, StageStatus, Transport, TypedUpdate,
};
