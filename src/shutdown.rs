//! Shutdown coordination.
//!
//! [`Shutdown`] is a cancellation token shared by the HTTP server and the
//! sampler. OS signals are only one way to trigger it; tests trigger it
//! directly.

use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

/// Trigger side of the shutdown token. Cheap to clone.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

/// Receiving side of the shutdown token.
#[derive(Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Requests shutdown. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl ShutdownListener {
    /// Resolves once shutdown has been requested.
    ///
    /// A dropped [`Shutdown`] counts as a request.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

/// OS signals that request shutdown.
///
/// Handlers are registered on construction, so a signal delivered before the
/// first [`recv`](Self::recv) is not lost.
pub struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: signal::unix::Signal,
    #[cfg(unix)]
    terminate: signal::unix::Signal,
}

impl ShutdownSignals {
    /// Registers the handlers. Must run inside the tokio runtime.
    #[cfg(unix)]
    pub fn install() -> std::io::Result<Self> {
        use signal::unix::{signal, SignalKind};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Waits for SIGINT or SIGTERM and returns the signal name.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> &'static str {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        "SIGINT"
    }
}

/// Spawns a task that triggers `shutdown` on the first SIGINT/SIGTERM.
///
/// The handlers are in place when this returns.
pub fn spawn_signal_handler(
    shutdown: Shutdown,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let mut signals = ShutdownSignals::install()?;
    Ok(tokio::spawn(async move {
        let name = signals.recv().await;
        info!("Received {}, shutting down gracefully...", name);
        shutdown.trigger();
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_listener_resolves_after_trigger() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();
        assert!(!listener.is_triggered());

        let waiter = tokio::spawn(async move {
            listener.wait().await;
        });
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("listener did not resolve")
            .unwrap();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_late_listener_sees_earlier_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.trigger();
        let mut listener = shutdown.listener();
        tokio::time::timeout(Duration::from_millis(100), listener.wait())
            .await
            .expect("late listener should resolve immediately");
    }

    #[tokio::test]
    async fn test_dropped_trigger_releases_listeners() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();
        drop(shutdown);
        tokio::time::timeout(Duration::from_millis(100), listener.wait())
            .await
            .expect("listener should resolve when the trigger is gone");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signal_before_first_poll_triggers_shutdown() {
        use nix::sys::signal::{raise, Signal};

        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();
        let handle = spawn_signal_handler(shutdown.clone()).unwrap();

        // Raised before the spawned task had a chance to run
        raise(Signal::SIGTERM).unwrap();

        tokio::time::timeout(Duration::from_secs(5), listener.wait())
            .await
            .expect("SIGTERM did not trigger shutdown");
        handle.await.unwrap();
    }
}
