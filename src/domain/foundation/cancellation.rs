//! Explicit cooperative cancellation signal.
//!
//! A `Cancellation` is passed through every blocking operation instead of
//! relying on an ambient context. The relay and the command handlers check
//! it between steps; the unit of work checks it before flushing.

use tokio::sync::watch;

/// Cooperative cancellation signal backed by a watch channel.
///
/// `Cancellation::none()` never fires and is the right choice for tests and
/// fire-and-forget callers.
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: Option<watch::Receiver<bool>>,
}

impl Cancellation {
    /// A signal that can never fire.
    pub fn none() -> Self {
        Self { rx: None }
    }

    /// Creates a linked sender/signal pair.
    ///
    /// Sending `true` on the returned sender cancels the signal.
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx: Some(rx) })
    }

    /// Wraps an existing shutdown receiver.
    pub fn from_watch(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }

    /// True once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolves when cancellation is requested; pends forever for `none()`.
    pub async fn cancelled(&self) {
        match &self.rx {
            Some(rx) => {
                let mut rx = rx.clone();
                if *rx.borrow() {
                    return;
                }
                // Channel closure without a cancel means the controlling side
                // is gone; treat it as cancellation.
                while rx.changed().await.is_ok() {
                    if *rx.borrow() {
                        return;
                    }
                }
            }
            None => std::future::pending().await,
        }
    }
}
