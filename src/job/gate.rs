// src/job/gate.rs - Awaitable open/closed gate for cooperative suspension
use std::sync::Arc;

use tokio::sync::watch;

/// The continuation gate the execution task parks on while a job is paused.
/// Closing it makes `wait_open` suspend; opening releases every waiter.
#[derive(Debug, Clone)]
pub struct Gate {
    tx: Arc<watch::Sender<bool>>,
}

impl Gate {
    /// A new gate starts open.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(true);
        Self { tx: Arc::new(tx) }
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    pub fn close(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    /// Suspend until the gate is open; returns immediately when it already is.
    pub async fn wait_open(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn open_gate_does_not_block() {
        let gate = Gate::new();
        tokio::time::timeout(Duration::from_millis(50), gate.wait_open())
            .await
            .expect("open gate must not block");
    }

    #[tokio::test]
    async fn closed_gate_blocks_until_opened() {
        let gate = Gate::new();
        gate.close();
        assert!(
            tokio::time::timeout(Duration::from_millis(50), gate.wait_open())
                .await
                .is_err()
        );

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait_open().await })
        };
        gate.open();
        tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .expect("waiter must be released")
            .expect("waiter must not panic");
    }

    #[tokio::test]
    async fn is_open_reflects_transitions() {
        let gate = Gate::new();
        assert!(gate.is_open());
        gate.close();
        assert!(!gate.is_open());
        gate.open();
        assert!(gate.is_open());
    }
}
