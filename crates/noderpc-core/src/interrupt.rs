//! Operator-initiated abort.
//!
//! Every suspension point of the client (connect, send/receive, backoff
//! sleep) runs through [`Interrupt::guard`], so raising the interrupt ends the
//! in-flight call with [`RpcError::Interrupted`]. Interrupts are never retried.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::RpcError;

/// Cloneable abort handle shared between a client and its operator.
#[derive(Clone, Debug)]
pub struct Interrupt {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupt {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raise the interrupt. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Lower the interrupt so the client can be used again.
    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Raise the interrupt on Ctrl-C.
    pub fn on_ctrl_c(&self) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, aborting in-flight call");
                this.trigger();
            }
        })
    }

    /// Run `fut` unless the interrupt fires first.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T, RpcError>
    where
        F: Future<Output = Result<T, RpcError>>,
    {
        let mut rx = self.tx.subscribe();
        if *rx.borrow_and_update() {
            return Err(RpcError::Interrupted);
        }
        tokio::select! {
            res = fut => res,
            _ = rx.wait_for(|raised| *raised) => Err(RpcError::Interrupted),
        }
    }

    /// Sleep for `delay` unless interrupted.
    pub async fn sleep(&self, delay: std::time::Duration) -> Result<(), RpcError> {
        self.guard(async {
            tokio::time::sleep(delay).await;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn guard_passes_through() {
        let int = Interrupt::new();
        let v = int.guard(async { Ok::<_, RpcError>(7) }).await.unwrap();
        assert_eq!(v, 7);
    }

    #[tokio::test]
    async fn triggered_interrupt_short_circuits() {
        let int = Interrupt::new();
        int.trigger();
        let err = int.guard(async { Ok::<_, RpcError>(7) }).await.unwrap_err();
        assert!(matches!(err, RpcError::Interrupted));
        int.reset();
        assert!(!int.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_cancels_sleep() {
        let int = Interrupt::new();
        let handle = int.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.trigger();
        });
        let err = int.sleep(Duration::from_secs(3600)).await.unwrap_err();
        assert!(matches!(err, RpcError::Interrupted));
    }
}
