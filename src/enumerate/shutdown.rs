//! Cancellation broadcast and OS signal listener

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Cloneable, idempotent cancellation flag.
///
/// Only the producer consults it; workers stop when the queue closes.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Request shutdown. Calling it again has no further effect on the run.
    ///
    /// Returns `true` when shutdown had already been requested.
    pub fn trigger(&self) -> bool {
        self.tx.send_replace(true)
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been requested
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as `self`, so this only returns on trigger.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }

    /// Trigger this signal on SIGINT or SIGTERM.
    ///
    /// The first signal starts a graceful shutdown. A second one while the
    /// workers drain exits the process immediately with status 1, leaving the
    /// previous state file in place.
    #[cfg(unix)]
    pub fn listen_for_os_signals(&self) -> JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{signal as unix_signal, SignalKind};

            let (mut sigint, mut sigterm) = match (
                unix_signal(SignalKind::interrupt()),
                unix_signal(SignalKind::terminate()),
            ) {
                (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
                (Err(e), _) | (_, Err(e)) => {
                    warn!("Failed to install signal handlers: {}", e);
                    return;
                }
            };

            loop {
                let name = tokio::select! {
                    _ = sigint.recv() => "SIGINT",
                    _ = sigterm.recv() => "SIGTERM",
                };
                signal.escalate(name);
            }
        })
    }

    /// Trigger this signal on Ctrl+C; a second Ctrl+C exits immediately
    #[cfg(not(unix))]
    pub fn listen_for_os_signals(&self) -> JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for Ctrl+C signal: {}", e);
                    return;
                }
                signal.escalate("Ctrl+C");
            }
        })
    }

    fn escalate(&self, name: &str) {
        if self.trigger() {
            warn!("Received {} again, exiting without waiting for workers", name);
            std::process::exit(1);
        }
        info!("Received {}, saving state and shutting down (repeat to force exit)", name);
    }
}
