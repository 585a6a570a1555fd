use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Cancel the returned token on the first SIGTERM or SIGINT.
///
/// Cancellation stops the listener and kills running children; the node
/// then drains their FAILED reports before `run` returns.
///
/// # Errors
///
/// Fails if the signal handlers cannot be registered.
pub fn install_shutdown_handler() -> std::io::Result<CancellationToken> {
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        let received = tokio::select! {
            _ = terminate.recv() => "SIGTERM",
            _ = interrupt.recv() => "SIGINT",
        };
        tracing::info!(signal = received, "Shutdown requested, draining in-flight tasks");
        trigger.cancel();
    });

    Ok(token)
}
