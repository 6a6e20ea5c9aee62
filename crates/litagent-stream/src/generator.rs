use std::sync::Arc;
use std::time::Duration;

use crate::cancel::{CancelToken, CancellationController};
use crate::errors::GeneratorError;
use crate::model::TransportId;
use crate::run::GenerationBuilder;
use crate::transport::Transport;

/// Entry point for starting generation sessions against one transport.
///
/// At most one session is active per generator: starting a new one cancels
/// the previous session first.
pub struct Generator {
    transport: Arc<dyn Transport>,
    controller: CancellationController,
    default_timeout: Option<Duration>,
}

impl Generator {
    /// Starts a builder for configuring a `Generator`.
    pub fn builder() -> GeneratorBuilder {
        GeneratorBuilder::default()
    }

    /// Returns the id of the configured transport.
    pub fn transport_id(&self) -> TransportId {
        self.transport.id()
    }

    /// Prepares a session for `topic`, cancelling any session still active.
    pub fn generate(&mut self, topic: impl Into<String>) -> GenerationBuilder {
        let token = self.controller.start();
        let builder = GenerationBuilder::new(self.transport.clone(), token, topic.into());
        match self.default_timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    /// Stops the active session. Returns `false` if there was none to stop.
    pub fn stop(&mut self) -> bool {
        self.controller.cancel_active()
    }

    /// Returns the token of the active session, if any.
    pub fn active_token(&self) -> Option<CancelToken> {
        self.controller.active().cloned()
    }
}

/// Builder used to configure a [`Generator`].
#[derive(Default)]
pub struct GeneratorBuilder {
    transport: Option<Arc<dyn Transport>>,
    default_timeout: Option<Duration>,
}

impl GeneratorBuilder {
    /// Sets the transport every session streams from.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets a timeout applied to every session unless overridden per session.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Builds the generator. Fails when no transport was configured.
    pub fn build(self) -> Result<Generator, GeneratorError> {
        let transport = self
            .transport
            .ok_or_else(|| GeneratorError::Config("generator requires a transport".into()))?;
        Ok(Generator {
            transport,
            controller: CancellationController::new(),
            default_timeout: self.default_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportError;
    use crate::model::GenerationRequest;
    use crate::state::SessionPhase;
    use crate::transport::ByteSource;
    use crate::transport::test_support::hanging;

    struct HangingTransport;

    #[async_trait::async_trait]
    impl Transport for HangingTransport {
        fn id(&self) -> TransportId {
            TransportId::new("hanging")
        }

        async fn open(&self, _request: &GenerationRequest) -> Result<ByteSource, TransportError> {
            let (source, _dropped) = hanging(vec![
                b"data: {\"stage\":\"researcher\",\"status\":\"start\"}\n\n".to_vec(),
            ]);
            Ok(source)
        }
    }

    fn generator() -> Generator {
        Generator::builder()
            .transport(Arc::new(HangingTransport))
            .build()
            .expect("generator")
    }

    #[test]
    fn build_requires_transport() {
        assert!(matches!(
            Generator::builder().build(),
            Err(GeneratorError::Config(_))
        ));
    }

    #[tokio::test]
    async fn new_session_cancels_the_previous_one() {
        let mut generator = generator();
        let first = generator.generate("one").start_stream().await.expect("first");
        let first_token = first.cancel_token();
        assert!(!first_token.is_cancelled());

        let second = generator.generate("two").start_stream().await.expect("second");
        assert!(first_token.is_cancelled());
        assert!(!second.cancel_token().is_cancelled());

        let state = tokio::time::timeout(Duration::from_secs(1), first.finish())
            .await
            .expect("first finishes")
            .expect("state");
        assert_eq!(state.phase, SessionPhase::Stopped);

        assert!(generator.stop());
        assert!(!generator.stop());
        let state = tokio::time::timeout(Duration::from_secs(1), second.finish())
            .await
            .expect("second finishes")
            .expect("state");
        assert_eq!(state.phase, SessionPhase::Stopped);
    }

    #[test]
    fn stop_without_session_is_noop() {
        let mut generator = generator();
        assert!(!generator.stop());
        assert!(generator.active_token().is_none());
    }
}
