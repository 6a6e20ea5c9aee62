use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::errors::{GeneratorError, SessionFailure};
use crate::events::SessionEvent;
use crate::interpret::{TypedUpdate, interpret};
use crate::model::{GenerationOptions, GenerationRequest};
use crate::output::ArticleOutput;
use crate::reader::{EventReader, ReaderEnd};
use crate::reducer;
use crate::state::{SessionPhase, SessionState};
use crate::transport::Transport;

/// Builder for configuring and starting one generation session.
pub struct GenerationBuilder {
    transport: Arc<dyn Transport>,
    token: CancelToken,
    topic: String,
    options: GenerationOptions,
}

impl GenerationBuilder {
    pub(crate) fn new(transport: Arc<dyn Transport>, token: CancelToken, topic: String) -> Self {
        Self {
            transport,
            token,
            topic,
            options: GenerationOptions::default(),
        }
    }

    /// Sets a timeout for the whole streaming request.
    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Sets the bounded event buffer size between the session task and the
    /// consumer.
    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.options.stream_buffer_capacity = capacity;
        self
    }

    /// Returns the token that cancels this session.
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Validates the builder and starts the session task.
    ///
    /// The returned stream yields `Started`, then `Update`/`Diagnostic`
    /// events in arrival order, then exactly one `Finished`.
    pub async fn start_stream(self) -> Result<GenerationStream, GeneratorError> {
        let (transport, token, request) = self.validate_and_build_request()?;

        let (tx, rx) = mpsc::channel(request.options.stream_buffer_capacity);
        let (final_tx, final_rx) = oneshot::channel();
        let session_id = request.session_id;
        tokio::spawn(run_task(transport, request, token.clone(), tx, final_tx));

        Ok(GenerationStream {
            session_id,
            rx,
            final_rx,
            token,
            saw_terminal: false,
        })
    }

    /// Runs to completion and returns the final snapshot.
    pub async fn run_to_end(self) -> Result<SessionState, GeneratorError> {
        self.start_stream().await?.finish().await
    }

    /// Runs to completion and returns the article with every completed
    /// stage's text.
    ///
    /// Fails with [`GeneratorError::Failed`] for errored sessions and
    /// [`GeneratorError::Cancelled`] for stopped ones.
    pub async fn collect_output(self) -> Result<ArticleOutput, GeneratorError> {
        ArticleOutput::from_final_state(self.run_to_end().await?)
    }

    /// Runs to completion and returns only the final article.
    pub async fn collect_article(self) -> Result<String, GeneratorError> {
        Ok(self.collect_output().await?.final_article)
    }

    fn validate_and_build_request(
        self,
    ) -> Result<(Arc<dyn Transport>, CancelToken, GenerationRequest), GeneratorError> {
        let topic = self.topic.trim();
        if topic.is_empty() {
            return Err(GeneratorError::Validation("topic must not be empty".into()));
        }
        if self.options.stream_buffer_capacity == 0 {
            return Err(GeneratorError::Validation(
                "stream_buffer_capacity must be greater than 0".into(),
            ));
        }
        let request = GenerationRequest {
            session_id: uuid::Uuid::new_v4(),
            topic: topic.to_string(),
            options: self.options,
        };
        Ok((self.transport, self.token, request))
    }
}

/// Streaming handle returned by [`GenerationBuilder::start_stream`].
pub struct GenerationStream {
    session_id: uuid::Uuid,
    rx: mpsc::Receiver<SessionEvent>,
    final_rx: oneshot::Receiver<SessionState>,
    token: CancelToken,
    saw_terminal: bool,
}

impl GenerationStream {
    /// Returns the session id.
    pub fn session_id(&self) -> uuid::Uuid {
        self.session_id
    }

    /// Returns a token that stops this session when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Requests cancellation. Idempotent; a no-op once the session ended.
    pub fn cancel(&self) -> bool {
        self.token.cancel()
    }

    /// Waits for the next event. Returns `None` after the channel closed.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        let event = self.rx.recv().await;
        if let Some(SessionEvent::Finished { .. }) = &event {
            self.saw_terminal = true;
        }
        event
    }

    /// Drains remaining events and returns the final snapshot.
    ///
    /// Safe to call after consuming events with `next_event()`.
    pub async fn finish(mut self) -> Result<SessionState, GeneratorError> {
        while !self.saw_terminal {
            match self.rx.recv().await {
                Some(SessionEvent::Finished { .. }) => self.saw_terminal = true,
                Some(_) => {}
                None => break,
            }
        }

        self.final_rx.await.map_err(|_| {
            GeneratorError::protocol_msg(format!(
                "session task ended without final state (session={})",
                self.session_id
            ))
        })
    }
}

async fn run_task(
    transport: Arc<dyn Transport>,
    request: GenerationRequest,
    token: CancelToken,
    tx: mpsc::Sender<SessionEvent>,
    final_tx: oneshot::Sender<SessionState>,
) {
    let session_id = request.session_id;
    let mut state = SessionState::running();

    if !send_event(
        &tx,
        SessionEvent::Started {
            session_id,
            topic: request.topic.clone(),
        },
    )
    .await
    {
        debug!(session_id = %session_id, "consumer dropped before session start");
        return;
    }
    info!(session_id = %session_id, transport = %transport.id(), "generation started");

    let opened = tokio::select! {
        biased;
        () = token.cancelled() => None,
        opened = transport.open(&request) => Some(opened),
    };
    let source = match opened {
        Some(Ok(source)) => source,
        Some(Err(err)) => {
            error!(session_id = %session_id, error = %err, "failed to open generation stream");
            state = reducer::fail(state, SessionFailure::from(&err));
            finish_session(&tx, final_tx, session_id, state).await;
            return;
        }
        None => {
            state = reducer::stop(state);
            finish_session(&tx, final_tx, session_id, state).await;
            return;
        }
    };

    let mut reader = EventReader::new(source, token);
    let mut seq = 0_u64;
    loop {
        let record = match reader.next_record().await {
            Some(Ok(record)) => record,
            Some(Err(err)) => {
                error!(session_id = %session_id, error = %err, "generation stream failed");
                state = reducer::fail(state, SessionFailure::from(&err));
                break;
            }
            None => {
                state = match reader.end() {
                    Some(ReaderEnd::Cancelled) => reducer::stop(state),
                    // End of stream without the sentinel.
                    _ => reducer::apply(state, TypedUpdate::StreamEnded),
                };
                break;
            }
        };

        let Some(update) = interpret(&record) else {
            continue;
        };
        if let TypedUpdate::ParseFailed { raw, reason } = update {
            warn!(session_id = %session_id, reason = %reason, "skipping malformed record");
            if !send_event(&tx, SessionEvent::Diagnostic { session_id, raw, reason }).await {
                return;
            }
            continue;
        }

        debug!(session_id = %session_id, seq, stage = ?update.stage(), "applying update");
        let ended = update == TypedUpdate::StreamEnded;
        state = reducer::apply(state, update.clone());
        let sent = send_event(&tx, SessionEvent::Update { session_id, seq, update }).await;
        seq = seq.saturating_add(1);
        if !sent {
            debug!(session_id = %session_id, "consumer dropped during session");
            return;
        }
        if ended {
            // Records framed after the sentinel are not processed.
            break;
        }
    }
    drop(reader);

    finish_session(&tx, final_tx, session_id, state).await;
}

async fn finish_session(
    tx: &mpsc::Sender<SessionEvent>,
    final_tx: oneshot::Sender<SessionState>,
    session_id: uuid::Uuid,
    state: SessionState,
) {
    match state.phase {
        SessionPhase::Done => info!(session_id = %session_id, stages = state.stages.len(), "generation done"),
        SessionPhase::Stopped => info!(session_id = %session_id, "generation stopped"),
        phase => warn!(session_id = %session_id, ?phase, failure = ?state.failure, "generation did not complete"),
    }
    let _ = send_event(
        tx,
        SessionEvent::Finished {
            session_id,
            state: state.clone(),
        },
    )
    .await;
    let _ = final_tx.send(state);
}

async fn send_event(tx: &mpsc::Sender<SessionEvent>, event: SessionEvent) -> bool {
    tx.send(event).await.is_ok()
}
