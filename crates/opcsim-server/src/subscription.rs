//! Change-notification subscriptions.
//!
//! Each subscription runs as its own task on a [`Ticker`] that fires
//! immediately and then once per publishing interval. A node is included
//! in a `data_change` frame when its version moved since the previous
//! notification, so the first frame carries every monitored node.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use opcsim_core::{AddressSpace, Ticker};
use opcsim_types::ServerState;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::protocol::{DataValue, NodeId, Response, ResponseFrame, StatusCode};

/// A set of monitored nodes pushing changes into one session.
#[derive(Debug)]
pub(crate) struct Subscription {
    id: u32,
    space: Arc<AddressSpace>,
    nodes: Vec<NodeId>,
    interval: Duration,
    seen: BTreeMap<String, u64>,
    out: mpsc::Sender<ResponseFrame>,
}

impl Subscription {
    pub(crate) const fn new(
        id: u32,
        space: Arc<AddressSpace>,
        nodes: Vec<NodeId>,
        interval: Duration,
        out: mpsc::Sender<ResponseFrame>,
    ) -> Self {
        Self {
            id,
            space,
            nodes,
            interval,
            seen: BTreeMap::new(),
            out,
        }
    }

    /// Run on a background task until the server stops, the session
    /// goes away or the handle is aborted.
    pub(crate) fn spawn(self, state: watch::Receiver<ServerState>) -> JoinHandle<()> {
        tokio::spawn(self.run(state))
    }

    async fn run(mut self, state: watch::Receiver<ServerState>) {
        let mut ticker = Ticker::immediate(self.interval, state);
        while ticker.tick().await {
            let items = self.changed_items();
            if items.is_empty() {
                continue;
            }
            debug!(subscription_id = self.id, items = items.len(), "Publishing data change");
            let frame = ResponseFrame::push(Response::DataChange {
                subscription_id: self.id,
                items,
            });
            if self.out.send(frame).await.is_err() {
                break;
            }
        }
        debug!(subscription_id = self.id, "Subscription ended");
    }

    /// Items whose version changed since the last call.
    fn changed_items(&mut self) -> Vec<DataValue> {
        let mut items = Vec::new();
        for id in &self.nodes {
            let sample = match self.space.node(id.name()).and_then(|node| node.sample()) {
                Ok(sample) => sample,
                Err(e) => {
                    warn!(subscription_id = self.id, variable = id.name(), error = %e, "Skipping monitored item");
                    continue;
                }
            };
            if self.seen.get(id.name()) == Some(&sample.version) {
                continue;
            }
            self.seen.insert(id.name().to_owned(), sample.version);
            items.push(DataValue {
                node_id: id.clone(),
                status: StatusCode::Good,
                value: Some(sample.value),
                source_timestamp: Some(sample.source_timestamp),
            });
        }
        items
    }
}
