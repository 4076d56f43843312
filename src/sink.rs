//! Per-menu error channel
//!
//! Failures that happen while serving a request are broadcast to every
//! subscriber of the owning menu. Each error is emitted once.

use crate::error::MenuError;
use tokio::sync::broadcast;

/// Default number of buffered errors per subscriber
pub const DEFAULT_ERROR_CAPACITY: usize = 64;

/// Broadcast handle for menu errors
#[derive(Debug, Clone)]
pub struct ErrorSink {
    tx: broadcast::Sender<MenuError>,
}

impl ErrorSink {
    /// Create a sink buffering up to `capacity` errors per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to errors emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<MenuError> {
        self.tx.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Log and broadcast an error
    pub fn emit(&self, err: MenuError) {
        tracing::error!(error = %err, "Menu error");
        // No subscribers is not a failure; the error is still logged
        let _ = self.tx.send(err);
    }
}

impl Default for ErrorSink {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_reaches_all_subscribers() {
        let sink = ErrorSink::default();
        let mut a = sink.subscribe();
        let mut b = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 2);

        sink.emit(MenuError::Config("bad provider".to_string()));

        assert!(a.recv().await.unwrap().is_config());
        assert!(b.recv().await.unwrap().is_config());
    }

    #[test]
    fn test_emit_without_subscribers() {
        let sink = ErrorSink::new(0);
        sink.emit(MenuError::Config("nobody listening".to_string()));
        assert_eq!(sink.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_errors() {
        let sink = ErrorSink::default();
        sink.emit(MenuError::Config("early".to_string()));
        let mut rx = sink.subscribe();
        assert!(rx.try_recv().is_err());
    }
}
