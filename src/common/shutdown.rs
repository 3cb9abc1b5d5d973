//! Cooperative shutdown signal shared between background tasks.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::Notify;

/// One-shot shutdown latch.
///
/// Tasks `select!` on [`Shutdown::wait`]; once [`Shutdown::shutdown`] is called
/// every current and future waiter resolves immediately.
#[derive(Debug, Default)]
pub struct Shutdown {
    terminated: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the shutdown and wake all waiters.
    pub fn shutdown(&self) {
        self.terminated.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Returns true once shutdown has been triggered.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Wait until shutdown is triggered.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let terminated = self.terminated.clone();
        let notify = self.notify.clone();
        async move {
            loop {
                let notified = notify.notified();
                if terminated.load(Ordering::SeqCst) {
                    return;
                }
                notified.await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_wait_resolves_after_shutdown() {
        let shutdown = Arc::new(Shutdown::new());
        let waiter = shutdown.wait();
        let handle = tokio::spawn(waiter);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!shutdown.is_terminated());
        shutdown.shutdown();

        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert!(shutdown.is_terminated());
    }

    #[tokio::test]
    async fn test_wait_after_shutdown_is_immediate() {
        let shutdown = Shutdown::new();
        shutdown.shutdown();
        tokio::time::timeout(Duration::from_millis(100), shutdown.wait()).await.unwrap();
    }
}
