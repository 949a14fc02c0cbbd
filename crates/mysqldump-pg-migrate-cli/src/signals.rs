//! Graceful shutdown on SIGINT / SIGTERM.
//!
//! Cancellation is coarse: the library stops starting new databases, tables
//! or constraints, and the statement in flight finishes (or rolls back).

use tokio_util::sync::CancellationToken;
use tracing::warn;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[cfg(unix)]
fn watch(token: CancellationToken, kind: SignalKind, label: &'static str) {
    tokio::spawn(async move {
        let mut stream = match signal(kind) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to install {} handler: {}", label, e);
                return;
            }
        };
        stream.recv().await;
        eprintln!("\nReceived {}. Finishing the current unit of work...", label);
        token.cancel();
    });
}

/// Token cancelled on SIGINT or SIGTERM. Must be called inside a runtime.
#[cfg(unix)]
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    watch(token.clone(), SignalKind::interrupt(), "SIGINT");
    watch(token.clone(), SignalKind::terminate(), "SIGTERM");
    token
}

/// Token cancelled on Ctrl-C. Must be called inside a runtime.
#[cfg(not(unix))]
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl-C handler: {}", e);
            return;
        }
        eprintln!("\nReceived Ctrl-C. Finishing the current unit of work...");
        cancel.cancel();
    });
    token
}
