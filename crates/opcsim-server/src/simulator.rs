//! The simulator lifecycle: start, stop and live access to the nodes.
//!
//! [`Simulator`] is the single object the rest of the system talks to.
//! `start` builds a fresh address space from a variable set, binds the
//! protocol endpoint and launches three background tasks (simulation
//! engine, update broadcaster, protocol listener), all bound to one
//! `watch` channel of [`ServerState`]. `stop` flips that channel to
//! `Stopped` and joins every task against one shared deadline; a task that
//! does not finish in time is aborted and reported in the
//! [`StopReport`], never treated as a failure of the transition.
//!
//! Start and stop are serialized by a lifecycle mutex. Reads of the
//! running instance only take a short read lock, so HTTP handlers and
//! protocol sessions never wait on a stop in progress.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use opcsim_core::broadcaster::UPDATE_CHANNEL_CAPACITY;
use opcsim_core::config::{ServerSettings, SimulationSettings};
use opcsim_core::views::{self, HISTORY_VIEW_LIMIT};
use opcsim_core::{AddressSpace, SimulationEngine, UpdateBroadcaster, VariableSet};
use opcsim_types::{
    ChartSeries, CurrentValue, HistoryEntry, HistoryRecord, ServerState, TagValue, ValuesUpdate,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::ServerError;
use crate::listener::Listener;
use crate::session::SessionContext;

/// Background tasks and shared state of a running server.
#[derive(Debug)]
struct Running {
    space: Arc<AddressSpace>,
    state_tx: watch::Sender<ServerState>,
    simulation: JoinHandle<u64>,
    broadcaster: JoinHandle<u64>,
    listener: JoinHandle<u64>,
    endpoint: SocketAddr,
    started_at: DateTime<Utc>,
}

/// What `stop` observed while shutting the background tasks down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopReport {
    /// The simulation engine finished within the timeout.
    pub simulation_joined: bool,
    /// The update broadcaster finished within the timeout.
    pub broadcaster_joined: bool,
    /// The listener finished and its socket was closed.
    pub endpoint_closed: bool,
}

impl StopReport {
    /// Whether every task finished on its own.
    pub const fn is_clean(&self) -> bool {
        self.simulation_joined && self.broadcaster_joined && self.endpoint_closed
    }
}

/// Result of [`Simulator::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The server was running and is now stopped.
    Stopped(StopReport),
    /// The server was not running; nothing changed.
    AlreadyStopped,
}

/// Owner of the protocol server and its simulation.
#[derive(Debug)]
pub struct Simulator {
    server: ServerSettings,
    simulation: SimulationSettings,
    updates: broadcast::Sender<ValuesUpdate>,
    lifecycle: Mutex<()>,
    running: RwLock<Option<Running>>,
}

impl Simulator {
    /// Create a stopped simulator.
    pub fn new(server: ServerSettings, simulation: SimulationSettings) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            server,
            simulation,
            updates,
            lifecycle: Mutex::new(()),
            running: RwLock::new(None),
        }
    }

    /// Protocol endpoint settings.
    pub const fn server_settings(&self) -> &ServerSettings {
        &self.server
    }

    /// Simulation timing settings.
    pub const fn simulation_settings(&self) -> &SimulationSettings {
        &self.simulation
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Build the address space from `variables`, bind the endpoint and
    /// launch the background tasks.
    ///
    /// Returns the bound endpoint address. On error nothing is left
    /// running.
    pub async fn start(&self, variables: &VariableSet) -> Result<SocketAddr, ServerError> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.running.read().await.is_some() {
            return Err(ServerError::AlreadyRunning);
        }
        if variables.is_empty() {
            return Err(ServerError::NoVariables);
        }

        let address = self.server.socket_addr()?;
        let socket = TcpListener::bind(address)
            .await
            .map_err(|source| ServerError::Bind { address, source })?;
        let endpoint = socket
            .local_addr()
            .map_err(|source| ServerError::Bind { address, source })?;

        let space = Arc::new(AddressSpace::build(
            variables,
            self.simulation.history_capacity,
        ));
        let (state_tx, state_rx) = watch::channel(ServerState::Running);

        let rng = self
            .simulation
            .seed
            .map_or_else(SmallRng::from_os_rng, SmallRng::seed_from_u64);
        let simulation = tokio::spawn(
            SimulationEngine::new(Arc::clone(&space), rng)
                .run(self.simulation.tick_interval(), state_rx.clone()),
        );
        let broadcaster = tokio::spawn(
            UpdateBroadcaster::new(Arc::clone(&space), self.updates.clone())
                .run(self.simulation.broadcast_interval(), state_rx.clone()),
        );
        let ctx = SessionContext {
            space: Arc::clone(&space),
            state: state_rx.clone(),
            server_name: self.server.server_name.clone(),
            endpoint_url: format!("opc.tcp://{}:{}", self.server.host, endpoint.port()),
        };
        let listener =
            tokio::spawn(Listener::new(socket, ctx, self.server.max_sessions).run(state_rx));

        info!(
            %endpoint,
            variables = space.len(),
            server_name = %self.server.server_name,
            "Protocol server started"
        );

        *self.running.write().await = Some(Running {
            space,
            state_tx,
            simulation,
            broadcaster,
            listener,
            endpoint,
            started_at: Utc::now(),
        });
        Ok(endpoint)
    }

    /// Signal every background task to stop and wait for them.
    pub async fn stop(&self) -> StopOutcome {
        let _lifecycle = self.lifecycle.lock().await;
        let Some(running) = self.running.write().await.take() else {
            debug!("Stop requested while already stopped");
            return StopOutcome::AlreadyStopped;
        };

        running.state_tx.send_replace(ServerState::Stopped);
        let deadline = stop_deadline(self.simulation.stop_timeout());
        let report = StopReport {
            simulation_joined: join_bounded("simulation", running.simulation, deadline).await,
            broadcaster_joined: join_bounded("broadcaster", running.broadcaster, deadline).await,
            endpoint_closed: join_bounded("listener", running.listener, deadline).await,
        };

        let uptime_secs = Utc::now()
            .signed_duration_since(running.started_at)
            .num_seconds();
        if report.is_clean() {
            info!(endpoint = %running.endpoint, uptime_secs, "Protocol server stopped");
        } else {
            warn!(
                endpoint = %running.endpoint,
                uptime_secs,
                ?report,
                "Protocol server stopped with unfinished tasks"
            );
        }
        StopOutcome::Stopped(report)
    }

    // -----------------------------------------------------------------------
    // State
    // -----------------------------------------------------------------------

    /// Current lifecycle state.
    pub async fn state(&self) -> ServerState {
        if self.running.read().await.is_some() {
            ServerState::Running
        } else {
            ServerState::Stopped
        }
    }

    /// Whether the server is running.
    pub async fn is_running(&self) -> bool {
        self.state().await.is_running()
    }

    /// The bound endpoint address while running.
    pub async fn endpoint(&self) -> Option<SocketAddr> {
        self.running.read().await.as_ref().map(|r| r.endpoint)
    }

    /// The live address space while running.
    pub async fn address_space(&self) -> Option<Arc<AddressSpace>> {
        self.running
            .read()
            .await
            .as_ref()
            .map(|r| Arc::clone(&r.space))
    }

    /// Receive every [`ValuesUpdate`] published from now on.
    ///
    /// The channel outlives individual runs, so a receiver keeps working
    /// across stop and start.
    pub fn subscribe(&self) -> broadcast::Receiver<ValuesUpdate> {
        self.updates.subscribe()
    }

    // -----------------------------------------------------------------------
    // Node access
    // -----------------------------------------------------------------------

    /// Write a value into a running node.
    ///
    /// Returns `false` when the server is stopped, the node is unknown
    /// or the value cannot be coerced to the node type.
    pub async fn update_variable(&self, name: &str, value: TagValue) -> bool {
        match self.try_update_variable(name, value).await {
            Ok(stored) => {
                debug!(variable = name, value = %stored, "Variable updated");
                true
            }
            Err(e) => {
                debug!(variable = name, error = %e, "Variable update rejected");
                false
            }
        }
    }

    /// Write a value into a running node, returning the stored value.
    pub async fn try_update_variable(
        &self,
        name: &str,
        value: TagValue,
    ) -> Result<TagValue, ServerError> {
        let space = self.address_space().await.ok_or(ServerError::NotRunning)?;
        Ok(space.write(name, value)?)
    }

    /// Current value, kind and descriptor of every node; empty when
    /// stopped.
    pub async fn current_values(&self) -> BTreeMap<String, CurrentValue> {
        self.address_space()
            .await
            .map(|space| space.snapshot())
            .unwrap_or_default()
    }

    /// Every node's history, most recent last; empty when stopped.
    pub async fn history_snapshot(&self) -> BTreeMap<String, Vec<HistoryEntry>> {
        self.address_space()
            .await
            .map(|space| space.history_snapshot())
            .unwrap_or_default()
    }

    /// Merged history of all nodes, newest first.
    pub async fn history_view(&self) -> Vec<HistoryRecord> {
        views::merged_history(&self.history_snapshot().await, HISTORY_VIEW_LIMIT)
    }

    /// Chart series for the random-walk numeric variables in `variables`.
    ///
    /// Ranges come from `variables` rather than the running nodes, so a
    /// registry edit shows up before the next restart.
    pub async fn chart_data(&self, variables: &VariableSet) -> BTreeMap<String, ChartSeries> {
        views::chart_series(
            &self.history_snapshot().await,
            variables.iter().map(|(name, config)| (name.as_str(), config)),
        )
    }
}

/// One deadline shared by every join, so `stop` waits at most `limit` in
/// total.
fn stop_deadline(limit: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(limit).unwrap_or(now)
}

/// Wait until `deadline` for a background task; abort it once passed.
async fn join_bounded<T>(task: &'static str, mut handle: JoinHandle<T>, deadline: Instant) -> bool {
    match tokio::time::timeout_at(deadline, &mut handle).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            warn!(task, error = %e, "Background task failed");
            false
        }
        Err(_elapsed) => {
            handle.abort();
            warn!(task, "Background task did not stop in time, aborted");
            false
        }
    }
}
