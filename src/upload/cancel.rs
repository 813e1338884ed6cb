//! Per-upload cancellation.
//!
//! Cancellation is cooperative. The session checks the token before each
//! chunk is dispatched and before each retry; [`HttpTransport`] additionally
//! races the in-flight request against the token and drops it when the token
//! fires. A custom [`Transport`] that ignores the token lets the current chunk
//! finish, and the loop stops at the next checkpoint.
//!
//! A handle created with [`CancelHandle::child_of`] also follows a parent
//! token. Cancelling the parent stops the running upload, and any upload
//! started afterwards begins with a cancelled token and sends nothing.
//!
//! [`HttpTransport`]: crate::upload::transport::HttpTransport
//! [`Transport`]: crate::upload::transport::Transport

use log::debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Owns the token of a session's current upload.
///
/// Clones share the same slot, so a clone handed to another task (a Ctrl-C
/// handler, a UI button) cancels whatever upload that session is running.
#[derive(Clone, Default)]
pub struct CancelHandle {
    current: Arc<Mutex<Option<CancellationToken>>>,
    parent: Option<CancellationToken>,
}

impl CancelHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle whose uploads are also cancelled by `parent`, e.g. one token
    /// shared by every file of a batch.
    #[must_use]
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            current: Arc::default(),
            parent: Some(parent.clone()),
        }
    }

    /// Creates a fresh token for a new upload, replacing any previous one.
    ///
    /// The token is already cancelled if the parent was.
    pub fn begin(&self) -> CancellationToken {
        let token = self
            .parent
            .as_ref()
            .map_or_else(CancellationToken::new, CancellationToken::child_token);
        *self.slot() = Some(token.clone());
        token
    }

    /// Cancels the running upload. Returns `false` if nothing was running.
    pub fn cancel(&self) -> bool {
        match self.slot().take() {
            Some(token) if !token.is_cancelled() => {
                debug!("Cancelling upload");
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Forgets the token once the upload loop has returned, so a late
    /// `cancel()` is a no-op.
    pub fn finish(&self) {
        self.slot().take();
    }

    /// Whether the parent token, if any, has been cancelled.
    #[must_use]
    pub fn is_parent_cancelled(&self) -> bool {
        self.parent.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Whether an upload is running and has not been cancelled.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.slot().as_ref().is_some_and(|t| !t.is_cancelled())
    }

    fn slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
