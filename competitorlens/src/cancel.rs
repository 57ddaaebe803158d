use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::LensError;

/// Trigger side of a cancellation pair. Dropping it without calling
/// [`CancelHandle::cancel`] leaves tokens un-cancelled forever.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observer side, cloned into every network call of one analysis.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        // send_replace succeeds even with no live receivers
        self.tx.send_replace(true);
    }
}

impl CancelToken {
    /// A token that never fires.
    pub fn never() -> Self {
        let (_handle, token) = cancel_pair();
        token
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Handle dropped without cancelling.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Run `fut` bounded by `timeout` and this token.
    ///
    /// The outer error is `LensError::Cancelled`; a timeout is reported as an
    /// inner `anyhow` error so strategies can treat it like any other network failure.
    pub async fn run<F, T>(&self, timeout: Duration, fut: F) -> Result<anyhow::Result<T>, LensError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(LensError::Cancelled),
            res = tokio::time::timeout(timeout, fut) => Ok(match res {
                Ok(inner) => inner,
                Err(_) => Err(anyhow::anyhow!("request timed out after {:?}", timeout)),
            }),
        }
    }
}
