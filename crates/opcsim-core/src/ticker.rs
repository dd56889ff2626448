//! Periodic ticker bound to the server lifecycle.
//!
//! Every background loop (simulation, broadcaster, protocol
//! subscriptions) waits on a [`Ticker`]. It yields once per period while
//! the shared [`ServerState`] is `Running` and returns `false` as soon as
//! the state leaves `Running` or the lifecycle sender is dropped, so a
//! stop is observed without waiting out the rest of the period.

use std::time::Duration;

use opcsim_types::ServerState;
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Shortest period a ticker accepts.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Fixed-period ticker that stops with the server.
#[derive(Debug)]
pub struct Ticker {
    interval: Interval,
    state: watch::Receiver<ServerState>,
}

impl Ticker {
    /// Ticker whose first tick fires one full period from now.
    pub fn new(period: Duration, state: watch::Receiver<ServerState>) -> Self {
        let period = period.max(MIN_PERIOD);
        let start = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
        Self::with_interval(tokio::time::interval_at(start, period), state)
    }

    /// Ticker whose first tick fires immediately.
    pub fn immediate(period: Duration, state: watch::Receiver<ServerState>) -> Self {
        Self::with_interval(tokio::time::interval(period.max(MIN_PERIOD)), state)
    }

    fn with_interval(mut interval: Interval, state: watch::Receiver<ServerState>) -> Self {
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, state }
    }

    /// Wait for the next tick.
    ///
    /// Returns `true` when a tick elapsed while running, `false` once the
    /// server is stopping.
    pub async fn tick(&mut self) -> bool {
        loop {
            if !self.is_running() {
                return false;
            }
            tokio::select! {
                _ = self.interval.tick() => return self.is_running(),
                changed = self.state.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    /// Whether the lifecycle state is currently `Running`.
    pub fn is_running(&self) -> bool {
        self.state.borrow().is_running()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_while_running() {
        let (_tx, rx) = watch::channel(ServerState::Running);
        let mut ticker = Ticker::new(Duration::from_millis(50), rx);
        assert!(ticker.tick().await);
        assert!(ticker.tick().await);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_wait() {
        let (tx, rx) = watch::channel(ServerState::Running);
        let mut ticker = Ticker::new(Duration::from_secs(3600), rx);
        let waiter = tokio::spawn(async move { ticker.tick().await });
        tokio::task::yield_now().await;
        tx.send_replace(ServerState::Stopped);
        let ticked = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(!ticked);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_sender_stops_ticker() {
        let (tx, rx) = watch::channel(ServerState::Running);
        let mut ticker = Ticker::new(Duration::from_secs(3600), rx);
        drop(tx);
        assert!(!ticker.tick().await);
    }

    #[tokio::test]
    async fn never_ticks_when_stopped() {
        let (_tx, rx) = watch::channel(ServerState::Stopped);
        let mut ticker = Ticker::immediate(Duration::from_millis(1), rx);
        assert!(!ticker.tick().await);
    }
}
