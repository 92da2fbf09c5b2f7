// Server loop module
// Accepts connections until a shutdown is requested

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::time::{sleep, Instant};

use super::connection::accept_connection;
use crate::config;
use crate::logger;

/// Run the accept loop on `listener` until `shutdown` is notified.
///
/// Once the listener is closed, connections already being served get up to
/// `performance.shutdown_timeout` seconds to finish before the call returns.
#[allow(clippy::ignored_unit_patterns)]
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<config::AppState>,
    active_connections: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
) -> std::io::Result<()> {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            _ = shutdown.notified() => break,
        }
    }

    drop(listener);
    let grace = Duration::from_secs(state.config.performance.shutdown_timeout);
    let remaining = drain_connections(&active_connections, grace).await;
    logger::log_shutdown(remaining);
    Ok(())
}

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Wait until `active_connections` drops to zero or `grace` elapses.
/// Returns the number of connections still open at the end.
async fn drain_connections(active_connections: &AtomicUsize, grace: Duration) -> usize {
    let deadline = Instant::now() + grace;
    loop {
        let remaining = active_connections.load(Ordering::SeqCst);
        if remaining == 0 || Instant::now() >= deadline {
            return remaining;
        }
        sleep(DRAIN_POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now()))).await;
    }
}
