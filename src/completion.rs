//! Error-first completion handles
//!
//! Bridges callback-style user code into futures. A `Completion` may be cloned
//! and invoked more than once; the first result wins and later ones are dropped.

use crate::error::{backend_error, BackendError, BackendResult};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// One-shot completion callback handed to callback-style user code
pub struct Completion<T> {
    slot: Arc<Mutex<Option<oneshot::Sender<BackendResult<T>>>>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// Receiving side of a `Completion`
pub struct Pending<T> {
    rx: oneshot::Receiver<BackendResult<T>>,
}

impl<T> Completion<T> {
    /// Create a completion and the receiver its result settles
    pub fn channel() -> (Self, Pending<T>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                slot: Arc::new(Mutex::new(Some(tx))),
            },
            Pending { rx },
        )
    }

    /// Settle with a result; returns false if already settled
    pub fn complete(&self, result: BackendResult<T>) -> bool {
        let sender = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match sender {
            Some(tx) => {
                // Receiver may be gone if the caller stopped waiting
                let _ = tx.send(result);
                true
            }
            None => {
                tracing::warn!("Completion invoked more than once, ignoring later result");
                false
            }
        }
    }

    /// Settle successfully
    pub fn ok(&self, value: T) -> bool {
        self.complete(Ok(value))
    }

    /// Settle with an error
    pub fn err(&self, err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> bool {
        self.complete(Err(backend_error(err)))
    }

    /// Whether a result has already been delivered
    pub fn is_completed(&self) -> bool {
        match self.slot.lock() {
            Ok(slot) => slot.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

impl<T> Pending<T> {
    /// Wait for the first result
    ///
    /// Fails if every `Completion` was dropped without being invoked.
    pub async fn wait(self) -> BackendResult<T> {
        self.rx.await.unwrap_or_else(|_| Err(dropped()))
    }
}

fn dropped() -> BackendError {
    backend_error("completion dropped without a result")
}
