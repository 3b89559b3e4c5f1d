use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// A "wait for shell" gate: blocks until the Sentinel Parser reports
/// `ready` (its first `CMD_END` observed), or a boot timeout elapses.
/// The Channel is agnostic to whether that took 30s (cold boot) or
/// 1-3s (snapshot restore) — the Driver flips this gate the moment the
/// Parser's `became_ready` fires.
pub struct ReadyGate {
    ready: AtomicBool,
    notify: Notify,
}

impl ReadyGate {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Blocks until ready, or returns an error once `timeout` elapses
    /// (spec.md §5: 120s boot timeout is fatal, surfaced to the user).
    pub async fn wait(&self, timeout: Duration) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }
        tokio::select! {
            _ = self.notify.notified() => Ok(()),
            _ = tokio::time::sleep(timeout) => Err(anyhow!("shell not ready within {:?}", timeout)),
        }
    }
}

impl Default for ReadyGate {
    fn default() -> Self {
        Self::new()
    }
}
