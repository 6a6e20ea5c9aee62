use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Cooperative cancellation flag threaded into a session's reader.
///
/// Clones share the same flag. Cancelling is idempotent.
#[derive(Clone, Debug)]
pub struct CancelToken {
    id: u64,
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    fn new(id: u64) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            id,
            tx: Arc::new(tx),
        }
    }

    /// Creates a token that is not tracked by any controller.
    pub fn detached() -> Self {
        Self::new(0)
    }

    /// Returns the controller-assigned id of this token.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Requests cancellation.
    ///
    /// Returns `true` if this call flipped the flag, `false` if the token was
    /// already cancelled.
    pub fn cancel(&self) -> bool {
        !self.tx.send_replace(true)
    }

    /// Returns `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once cancellation is requested (immediately if it already was).
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on `true`.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Owns the single active [`CancelToken`] of a consumer.
#[derive(Debug, Default)]
pub struct CancellationController {
    active: Option<CancelToken>,
    issued: u64,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh token, cancelling the previously active one first.
    pub fn start(&mut self) -> CancelToken {
        if let Some(previous) = self.active.take()
            && previous.cancel()
        {
            debug!(token = previous.id(), "cancelled previous session token");
        }
        self.issued = self.issued.saturating_add(1);
        let token = CancelToken::new(self.issued);
        self.active = Some(token.clone());
        token
    }

    /// Cancels `token`. Safe to call repeatedly or after the session ended.
    ///
    /// Returns `true` only for the call that actually flipped the flag.
    pub fn cancel(&mut self, token: &CancelToken) -> bool {
        let flipped = token.cancel();
        if self
            .active
            .as_ref()
            .is_some_and(|active| active.id() == token.id())
        {
            self.active = None;
        }
        flipped
    }

    /// Cancels whichever token is active, if any.
    pub fn cancel_active(&mut self) -> bool {
        match self.active.take() {
            Some(token) => token.cancel(),
            None => false,
        }
    }

    /// Returns the active token, if one was issued and not yet cancelled
    /// through this controller.
    pub fn active(&self) -> Option<&CancelToken> {
        self.active.as_ref()
    }
}
