use std::future::Future;

use tokio::sync::watch;

/// Owner side of a cancellation pair. Dropping it without calling
/// [`CancelHandle::cancel`] never cancels.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn pair() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx })
    }

    /// A signal that is never raised.
    pub fn never() -> Self {
        let (_, signal) = Self::pair();
        signal
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal is raised; pends forever if the handle is
    /// dropped first.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Runs `fut` to completion unless the signal fires first, in which
    /// case the future is dropped and `None` is returned.
    pub async fn guard<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_guard_aborts_in_flight_future() {
        let (handle, signal) = CancelSignal::pair();
        let task = tokio::spawn({
            let signal = signal.clone();
            async move {
                signal
                    .guard(tokio::time::sleep(Duration::from_secs(3600)))
                    .await
            }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.cancel();
        assert_eq!(task.await.unwrap(), None);
        assert!(signal.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_lets_future_finish() {
        let signal = CancelSignal::never();
        let out = signal.guard(async { 7 }).await;
        assert_eq!(out, Some(7));
        assert!(!signal.is_cancelled());
    }
}
