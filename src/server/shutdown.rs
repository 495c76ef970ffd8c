//! Shutdown signal handling
//!
//! The server drains on Ctrl+C or SIGTERM. A handler that cannot be installed
//! is logged and then never fires, so it cannot trigger a shutdown by itself.

use std::future::Future;
use std::io;

use tokio::signal;
use tracing::{error, info};

/// Resolves once the process receives Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = wait_for_signal("Ctrl+C", signal::ctrl_c());

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, draining connections");
}

/// Waits on a signal future; if the handler failed to install, logs it and
/// waits forever instead.
pub(crate) async fn wait_for_signal<F>(name: &str, signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!(signal = name, error = %e, "Failed to install signal handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_delivered_signal_resolves() {
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            wait_for_signal("test", async { Ok(()) }),
        )
        .await;
        assert!(result.is_ok(), "a delivered signal should resolve");
    }

    #[tokio::test]
    async fn test_failed_handler_install_never_resolves() {
        let failing = async { Err(io::Error::new(io::ErrorKind::Other, "no signal driver")) };

        let result =
            tokio::time::timeout(Duration::from_millis(50), wait_for_signal("test", failing)).await;

        assert!(result.is_err(), "an install failure must not trigger shutdown");
    }
}
