//! One-shot cancellation shared between the turn's producer, consumer and
//! the backend's stream task.

use std::sync::Arc;

use tokio::sync::watch;

/// A cloneable cancellation flag. Once raised it stays raised.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Raise the signal, waking every waiter.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the signal is raised.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as any clone of the signal, so `wait_for`
        // only fails if the signal is being torn down.
        let raised = rx.wait_for(|raised| *raised).await.map(|_| ());
        if raised.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve when `signal` is raised, or never when there is no signal.
pub async fn cancelled(signal: Option<&CancelSignal>) {
    match signal {
        Some(signal) => signal.cancelled().await,
        None => std::future::pending().await,
    }
}
