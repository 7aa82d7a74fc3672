//! Cancellation signalling for escrow flows
//!
//! A flow blocked in the deadline wait must be interruptible from outside
//! (timeout, operator abort, process shutdown). The handle/signal pair
//! wraps a watch channel: cancelling is idempotent, observing is cheap,
//! and a dropped handle never fires the signal.

use tokio::sync::watch;

/// Sender side: owned by whoever may abort the flow
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Create a signal observing this handle
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Raise the cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver side: passed into a flow, polled between sleeps
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that can never fire, for flows without an external abort
    pub fn never() -> Self {
        CancelHandle::new().signal()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is raised. If the handle was dropped
    /// without cancelling, this pends forever (the flow simply runs to
    /// completion).
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_fires_signal() {
        let handle = CancelHandle::new();
        let mut signal = handle.signal();
        assert!(!signal.is_cancelled());

        handle.cancel();
        signal.cancelled().await;
        assert!(signal.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_signal_stays_pending() {
        let mut signal = CancelSignal::never();
        assert!(!signal.is_cancelled());

        let waited = tokio::time::timeout(Duration::from_secs(3600), signal.cancelled()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_cancel_observed_by_late_signal() {
        let handle = CancelHandle::new();
        handle.cancel();

        let mut signal = handle.signal();
        assert!(signal.is_cancelled());
        signal.cancelled().await;
    }
}
