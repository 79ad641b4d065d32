use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// One-shot broadcast cancellation shared by every simulation task.
///
/// Cloning yields another handle to the same signal. Triggering more than
/// once is a no-op; only the first [`trigger`](Self::trigger) reports `true`.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
    triggered: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) -> bool {
        if self.triggered.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_only_first_trigger_counts() {
        let signal = ShutdownSignal::new();
        let other = signal.clone();

        assert!(!other.is_triggered());
        assert!(signal.trigger());
        assert!(!other.trigger());
        assert!(other.is_triggered());
    }

    #[tokio::test]
    async fn test_waiters_observe_trigger() {
        let signal = ShutdownSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.cancelled().await })
        };

        signal.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should observe the signal")
            .unwrap();
    }
}
