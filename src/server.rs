//! HTTP server wiring and process lifecycle.
//!
//! The server stops accepting connections once the shutdown token fires,
//! lets in-flight requests finish within the grace period and then gives up.

use axum::{routing::get, Router};
use std::fmt;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time;
use tracing::{debug, error, info};

use crate::error::ExporterError;
use crate::handlers::{health_handler, metrics_handler, root_handler};
use crate::shutdown::ShutdownListener;
use crate::state::SharedState;

/// Lifecycle phase of the exporter process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Starting = 0,
    Running = 1,
    ShuttingDown = 2,
    Stopped = 3,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Phase::Starting,
            1 => Phase::Running,
            2 => Phase::ShuttingDown,
            _ => Phase::Stopped,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Starting => "starting",
            Phase::Running => "running",
            Phase::ShuttingDown => "shutting down",
            Phase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Shared, lock-free holder of the current [`Phase`].
///
/// Phases only move forward.
#[derive(Debug)]
pub struct Lifecycle {
    phase: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Starting as u8),
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Moves to `next` unless a later phase was already reached.
    pub fn advance(&self, next: Phase) {
        let previous = Phase::from_u8(self.phase.fetch_max(next as u8, Ordering::AcqRel));
        if (previous as u8) < (next as u8) {
            debug!("Lifecycle: {} -> {}", previous, next);
        }
    }
}

/// Configures HTTP server routes.
pub fn build_router(state: SharedState) -> Router {
    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler));

    if state.config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    app.with_state(state)
}

/// Binds the listener. Failure here is fatal for the process.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, ExporterError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ExporterError::ServerStart { addr, source })
}

/// Serves `router` until `shutdown` fires, then drains for at most `grace`.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    lifecycle: Arc<Lifecycle>,
    mut shutdown: ShutdownListener,
    grace: Duration,
) -> Result<(), ExporterError> {
    let (draining_tx, draining_rx) = oneshot::channel::<()>();
    let signal_lifecycle = Arc::clone(&lifecycle);

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        shutdown.wait().await;
        signal_lifecycle.advance(Phase::ShuttingDown);
        info!(
            "Stopped accepting connections, waiting up to {}s for in-flight requests",
            grace.as_secs()
        );
        let _ = draining_tx.send(());
    });
    let mut server = std::pin::pin!(server.into_future());

    lifecycle.advance(Phase::Running);

    let result = tokio::select! {
        result = &mut server => result.map_err(ExporterError::from),
        Ok(()) = draining_rx => {
            match time::timeout(grace, &mut server).await {
                Ok(result) => result.map_err(ExporterError::from),
                Err(_) => Err(ExporterError::ServerShutdown { grace }),
            }
        }
    };

    lifecycle.advance(Phase::Stopped);
    if let Err(e) = &result {
        error!("{}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_moves_forward_only() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.phase(), Phase::Starting);

        lifecycle.advance(Phase::Running);
        assert_eq!(lifecycle.phase(), Phase::Running);

        lifecycle.advance(Phase::Stopped);
        lifecycle.advance(Phase::ShuttingDown);
        assert_eq!(lifecycle.phase(), Phase::Stopped);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::ShuttingDown.to_string(), "shutting down");
        assert_eq!(Phase::from_u8(9), Phase::Stopped);
    }

    #[tokio::test]
    async fn test_bind_reports_address_on_failure() {
        let taken = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = taken.local_addr().unwrap();

        match bind(addr).await {
            Err(ExporterError::ServerStart { addr: failed, .. }) => assert_eq!(failed, addr),
            other => panic!("expected ServerStart error, got {other:?}"),
        }
    }
}
