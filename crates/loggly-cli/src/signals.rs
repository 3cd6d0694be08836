//! Process signals that cancel a running command.

use std::io;

use tokio_util::sync::CancellationToken;

/// Cancels `cancel` on the first SIGINT or SIGTERM.
///
/// Handlers are installed before this returns, so a signal that arrives
/// afterwards is never lost. Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns an error if a signal handler cannot be installed.
#[cfg(unix)]
pub fn cancel_on_shutdown(cancel: CancellationToken) -> io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        let name = tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        };
        tracing::info!(signal = name, "interrupted, cancelling");
        cancel.cancel();
    });
    Ok(())
}

/// Cancels `cancel` on ctrl-c.
///
/// # Errors
///
/// Never fails on this platform; a handler error is logged instead.
#[cfg(not(unix))]
pub fn cancel_on_shutdown(cancel: CancellationToken) -> io::Result<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupted, cancelling");
                cancel.cancel();
            }
            Err(err) => tracing::warn!(error = %err, "cannot listen for ctrl-c"),
        }
    });
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sigterm_cancels() {
        let cancel = CancellationToken::new();
        cancel_on_shutdown(cancel.clone()).unwrap();
        assert!(!cancel.is_cancelled());

        let status = Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), cancel.cancelled())
            .await
            .expect("SIGTERM did not cancel the token");
    }
}
