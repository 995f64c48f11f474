//! Termination signal plumbing.
//!
//! OS signals are turned into a `watch` channel flag that the scheduler
//! checks on every iteration.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Sending half of the shutdown flag
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Request termination
    pub fn trigger(&self) {
        // send_replace never fails, even when every receiver is gone
        self.tx.send_replace(true);
    }

    /// Whether termination was already requested
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Create a shutdown flag, initially unset
pub fn channel() -> (ShutdownTrigger, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, rx)
}

/// Fire `trigger` on SIGINT or SIGTERM.
///
/// Handlers are registered before this returns, so a signal delivered
/// afterwards is never lost to the default disposition.
pub fn spawn_signal_listener(trigger: ShutdownTrigger) -> JoinHandle<()> {
    let signals = Signals::register();
    tokio::spawn(async move {
        let signal = signals.recv().await;
        info!(signal, "Termination signal received");
        trigger.trigger();
    })
}

#[cfg(unix)]
struct Signals {
    interrupt: Option<tokio::signal::unix::Signal>,
    terminate: Option<tokio::signal::unix::Signal>,
}

#[cfg(unix)]
impl Signals {
    fn register() -> Self {
        use tokio::signal::unix::{SignalKind, signal};

        let interrupt = signal(SignalKind::interrupt())
            .map_err(|e| warn!("Failed to register SIGINT handler: {}", e))
            .ok();
        let terminate = signal(SignalKind::terminate())
            .map_err(|e| warn!("Failed to register SIGTERM handler: {}", e))
            .ok();
        Self {
            interrupt,
            terminate,
        }
    }

    async fn recv(mut self) -> &'static str {
        tokio::select! {
            Some(_) = recv_opt(self.interrupt.as_mut()) => "SIGINT",
            Some(_) = recv_opt(self.terminate.as_mut()) => "SIGTERM",
            else => std::future::pending().await,
        }
    }
}

#[cfg(unix)]
async fn recv_opt(signal: Option<&mut tokio::signal::unix::Signal>) -> Option<()> {
    match signal {
        Some(signal) => signal.recv().await,
        // Without a handler the only way out is the other signal or SIGKILL
        None => std::future::pending().await,
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn register() -> Self {
        Signals
    }

    async fn recv(self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        "SIGINT"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_sets_flag() {
        let (trigger, mut rx) = channel();
        assert!(!*rx.borrow());
        assert!(!trigger.is_triggered());

        trigger.trigger();

        rx.changed().await.unwrap();
        assert!(*rx.borrow());
        assert!(trigger.is_triggered());
    }

    #[tokio::test]
    async fn test_trigger_without_receivers() {
        let (trigger, rx) = channel();
        drop(rx);
        trigger.trigger();
        assert!(trigger.is_triggered());
    }
}
