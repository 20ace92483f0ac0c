//! Process-wide cancellation.
//!
//! A single [`Cancellation`] is created at startup and cloned into everything
//! that can block on the container engine. [`install_handler`] connects it to
//! the interrupt and terminate class of OS signals.
use std::sync::Arc;

use tokio::sync::watch;

/// A broadcast flag that is set at most once.
#[derive(Debug, Clone)]
pub struct Cancellation {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Wakes every task waiting in [`Cancellation::cancelled`].
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Completes once [`Cancellation::cancel`] has been called, immediately if it already was.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns once the flag is set.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Spawns a task cancelling `cancellation` on SIGINT, SIGTERM, SIGHUP or SIGQUIT.
///
/// # Errors
///
/// Returns an error if a signal handler cannot be registered.
#[cfg(unix)]
pub fn install_handler(
    cancellation: Cancellation,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut quit = signal(SignalKind::quit())?;

    Ok(tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                _ = interrupt.recv() => "SIGINT",
                _ = terminate.recv() => "SIGTERM",
                _ = hangup.recv() => "SIGHUP",
                _ = quit.recv() => "SIGQUIT",
            };
            log::warn!("Received {name}, stopping in-flight containers");
            cancellation.cancel();
        }
    }))
}

/// Spawns a task cancelling `cancellation` on Ctrl-C.
///
/// # Errors
///
/// Never fails on this platform; the signature matches the unix variant.
#[cfg(not(unix))]
pub fn install_handler(
    cancellation: Cancellation,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        loop {
            if let Err(err) = tokio::signal::ctrl_c().await {
                log::error!("failed to listen for Ctrl-C: {err}");
                return;
            }
            log::warn!("Received Ctrl-C, stopping in-flight containers");
            cancellation.cancel();
        }
    }))
}
