//! Exactly-once session completion.
//!
//! Every concurrent task of a session holds a clone of the same
//! [`Completion`]. Whichever task first observes a terminal condition calls
//! [`Completion::complete`]; that call records the reason and cancels the
//! shared token so the sibling tasks stop. Later calls are no-ops, so
//! teardown side effects guarded by the return value run once.

use std::sync::{Arc, OnceLock};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// The client closed its transport.
    ClientClosed,
    /// The engine side (exec output, log stream) reached end of stream.
    EngineClosed,
    /// Sending to or reading from the client failed.
    TransportError,
    /// An engine call failed mid-session.
    EngineError,
    /// No output within the idle window.
    IdleTimeout,
    /// The consumer of a server-push stream went away.
    ConsumerDropped,
    /// All producers ran to completion.
    Finished,
}

/// Shared completion marker plus cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    reason: Arc<OnceLock<CompletionReason>>,
    token: CancellationToken,
}

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the session complete. Returns `true` only for the first caller.
    pub fn complete(&self, reason: CompletionReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        if first {
            self.token.cancel();
        }
        first
    }

    pub fn is_complete(&self) -> bool {
        self.reason.get().is_some()
    }

    pub fn reason(&self) -> Option<CompletionReason> {
        self.reason.get().copied()
    }

    /// Resolves once the session has been marked complete.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Send `item` unless the session is already complete.
    ///
    /// A send blocked on a full channel is abandoned when completion fires.
    /// Returns `false` when nothing was delivered (complete, or receiver gone).
    pub async fn send_guarded<T: Send>(&self, tx: &mpsc::Sender<T>, item: T) -> bool {
        if self.is_complete() {
            return false;
        }
        tokio::select! {
            biased;
            () = self.token.cancelled() => false,
            res = tx.send(item) => res.is_ok(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn first_reason_wins() {
        let c = Completion::new();
        assert!(!c.is_complete());
        assert!(c.complete(CompletionReason::ClientClosed));
        assert!(!c.complete(CompletionReason::EngineClosed));
        assert_eq!(c.reason(), Some(CompletionReason::ClientClosed));
    }

    #[tokio::test]
    async fn clones_share_state() {
        let a = Completion::new();
        let b = a.clone();
        let waiter = tokio::spawn(async move { b.cancelled().await });
        assert!(a.complete(CompletionReason::Finished));
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn guarded_send_refuses_after_completion() {
        let c = Completion::new();
        let (tx, mut rx) = mpsc::channel(4);
        assert!(c.send_guarded(&tx, 1).await);
        c.complete(CompletionReason::ConsumerDropped);
        assert!(!c.send_guarded(&tx, 2).await);
        assert_eq!(rx.recv().await, Some(1));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn guarded_send_unblocks_on_completion() {
        let c = Completion::new();
        let (tx, _rx) = mpsc::channel(1);
        assert!(c.send_guarded(&tx, 1).await);

        let blocked = {
            let c = c.clone();
            let tx = tx.clone();
            tokio::spawn(async move { c.send_guarded(&tx, 2).await })
        };
        tokio::task::yield_now().await;
        c.complete(CompletionReason::ConsumerDropped);
        assert!(!blocked.await.unwrap());
    }
}
