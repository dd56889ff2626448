//! Periodic fan-out of current values to external listeners.
//!
//! The broadcaster takes a snapshot of the address space every period
//! and publishes it as a [`ValuesUpdate`] on a
//! [`tokio::sync::broadcast`] channel. Listeners that fall behind skip to
//! the newest update; having no listeners at all is normal and only
//! logged. Snapshots read one node at a time, so a broadcast never locks
//! out a simulation tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use opcsim_types::{ServerState, ValuesUpdate};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::address_space::AddressSpace;
use crate::ticker::Ticker;

/// Capacity of the values broadcast channel.
///
/// A listener that falls behind by more than this many updates receives
/// [`broadcast::error::RecvError::Lagged`] and skips ahead.
pub const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Default period between broadcasts.
pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_secs(2);

/// Publishes value snapshots of one address space.
#[derive(Debug)]
pub struct UpdateBroadcaster {
    space: Arc<AddressSpace>,
    tx: broadcast::Sender<ValuesUpdate>,
    sequence: u64,
}

impl UpdateBroadcaster {
    /// Create a broadcaster publishing on `tx`.
    pub const fn new(space: Arc<AddressSpace>, tx: broadcast::Sender<ValuesUpdate>) -> Self {
        Self {
            space,
            tx,
            sequence: 0,
        }
    }

    /// Snapshot the address space and publish it.
    ///
    /// Returns the number of listeners reached, or `None` when there was
    /// nothing to publish.
    pub fn publish(&mut self) -> Option<usize> {
        let values = self.space.snapshot();
        if values.is_empty() {
            debug!("Address space snapshot empty, nothing to broadcast");
            return None;
        }

        self.sequence = self.sequence.saturating_add(1);
        let update = ValuesUpdate {
            sequence: self.sequence,
            timestamp: Utc::now(),
            values,
        };

        // send only fails when nobody is subscribed, which is not an error.
        let receivers = self.tx.send(update).unwrap_or(0);
        debug!(sequence = self.sequence, receivers, "Values update broadcast");
        Some(receivers)
    }

    /// Publish every `period` until the lifecycle state leaves `Running`.
    ///
    /// Returns the number of updates published.
    pub async fn run(mut self, period: Duration, state: watch::Receiver<ServerState>) -> u64 {
        info!(
            period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            "Update broadcaster starting"
        );

        let mut ticker = Ticker::new(period, state);
        while ticker.tick().await {
            self.publish();
        }

        info!(published = self.sequence, "Update broadcaster stopped");
        self.sequence
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use opcsim_types::{TagValue, VariableConfig};

    use super::*;
    use crate::variables::VariableSet;

    fn make_space() -> Arc<AddressSpace> {
        let mut vars = VariableSet::new();
        vars.insert("Temperature", VariableConfig::random(0.0, 100.0))
            .unwrap();
        vars.insert("Status", VariableConfig::text("Active")).unwrap();
        Arc::new(AddressSpace::build(&vars, 10))
    }

    #[test]
    fn publish_without_listeners_is_not_an_error() {
        let (tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let mut broadcaster = UpdateBroadcaster::new(make_space(), tx);
        assert_eq!(broadcaster.publish(), Some(0));
        assert_eq!(broadcaster.publish(), Some(0));
    }

    #[test]
    fn empty_space_publishes_nothing() {
        let (tx, mut rx) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let mut broadcaster = UpdateBroadcaster::new(Arc::new(AddressSpace::default()), tx);
        assert_eq!(broadcaster.publish(), None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn listeners_receive_sequenced_snapshots() {
        let space = make_space();
        let (tx, mut rx) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let mut broadcaster = UpdateBroadcaster::new(Arc::clone(&space), tx);

        broadcaster.publish();
        space.write("Status", TagValue::from("Idle")).unwrap();
        broadcaster.publish();

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(first.values["Status"].value, TagValue::from("Active"));
        assert_eq!(second.values["Status"].value, TagValue::from("Idle"));
        assert_eq!(second.values["Temperature"].value, TagValue::Numeric(50.0));
    }

    #[tokio::test(start_paused = true)]
    async fn run_publishes_until_stopped() {
        let (tx, mut rx) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ServerState::Running);
        let handle = tokio::spawn(
            UpdateBroadcaster::new(make_space(), tx).run(Duration::from_secs(2), state_rx),
        );

        let update = rx.recv().await.unwrap();
        assert_eq!(update.sequence, 1);
        assert_eq!(update.values.len(), 2);

        state_tx.send_replace(ServerState::Stopped);
        let published = handle.await.unwrap();
        assert!(published >= 1);
    }
}
