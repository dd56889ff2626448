//! Accept loop of the protocol endpoint.
//!
//! Each accepted connection runs as a session task in a [`JoinSet`]. A
//! [`Semaphore`] caps concurrent sessions: when no permit is free the
//! connection gets one `BadTooManySessions` error frame and is closed.
//! When the server leaves `Running` the loop stops accepting, aborts
//! the remaining sessions and drops the socket, which closes the
//! endpoint. Failed accepts (such as running out of file descriptors)
//! back off exponentially instead of retrying in a tight loop.

use std::sync::Arc;
use std::time::Duration;

use opcsim_types::ServerState;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::protocol::StatusCode;
use crate::session::{self, SessionContext};

/// First delay after a failed accept.
const ACCEPT_BACKOFF_INITIAL: Duration = Duration::from_millis(10);

/// Longest delay between accept retries.
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Delay schedule for retrying a failing `accept`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AcceptBackoff {
    next: Duration,
}

impl AcceptBackoff {
    const fn new() -> Self {
        Self {
            next: ACCEPT_BACKOFF_INITIAL,
        }
    }

    /// Delay to wait now; doubles the following one up to the cap.
    fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(ACCEPT_BACKOFF_MAX);
        delay
    }

    const fn reset(&mut self) {
        self.next = ACCEPT_BACKOFF_INITIAL;
    }
}

/// The bound endpoint and what its sessions share.
#[derive(Debug)]
pub(crate) struct Listener {
    socket: TcpListener,
    ctx: Arc<SessionContext>,
    permits: Arc<Semaphore>,
}

impl Listener {
    pub(crate) fn new(socket: TcpListener, ctx: SessionContext, max_sessions: usize) -> Self {
        Self {
            socket,
            ctx: Arc::new(ctx),
            permits: Arc::new(Semaphore::new(max_sessions.max(1))),
        }
    }

    /// Accept connections until the lifecycle state leaves `Running`.
    ///
    /// Returns the number of sessions served.
    pub(crate) async fn run(self, mut state: watch::Receiver<ServerState>) -> u64 {
        let mut sessions = JoinSet::new();
        let mut served: u64 = 0;
        let mut backoff = AcceptBackoff::new();

        loop {
            if !state.borrow().is_running() {
                break;
            }
            tokio::select! {
                accepted = self.socket.accept() => match accepted {
                    Ok((stream, peer)) => {
                        backoff.reset();
                        if let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() {
                            served = served.saturating_add(1);
                            let ctx = Arc::clone(&self.ctx);
                            sessions.spawn(async move {
                                let _permit = permit;
                                session::serve(stream, peer, ctx).await
                            });
                        } else {
                            sessions.spawn(session::reject(
                                stream,
                                peer,
                                StatusCode::BadTooManySessions,
                                "session limit reached",
                            ));
                        }
                    }
                    Err(e) => {
                        let delay = backoff.next_delay();
                        warn!(
                            error = %e,
                            retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "Accept failed"
                        );
                        tokio::select! {
                            () = tokio::time::sleep(delay) => {}
                            _ = state.changed() => {}
                        }
                    }
                },
                Some(joined) = sessions.join_next() => match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => debug!(error = %e, "Session ended with I/O error"),
                    Err(e) => warn!(error = %e, "Session task failed"),
                },
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        let open = sessions.len();
        sessions.shutdown().await;
        info!(served, aborted = open, "Protocol listener stopped");
        served
    }
}
