//! The simulation engine: advances random-walk tags and snapshots every
//! node into its history once per tick.
//!
//! # Per-tick algorithm
//!
//! - **Numeric, random mode**: the engine keeps its own running value,
//!   seeded at the midpoint of `[min, max]`. Each tick it moves by
//!   `uniform(-1, 1) * (max - min) * 0.05`, is clamped to the range,
//!   rounded to two decimals, written into the node and recorded.
//! - **Everything else**: the node is left alone; its current value is
//!   recorded so that external writes show up in history.
//!
//! A failure on one variable is logged and that variable is skipped for
//! the tick; the others still advance.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use opcsim_types::{ServerState, TagValue, round2};
use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::address_space::{AddressSpace, AddressSpaceError, Node};
use crate::ticker::Ticker;

/// Fraction of a variable's range a single tick may move it.
pub const STEP_FRACTION: f64 = 0.05;

/// Default period between simulation ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(2);

/// Running state of one random-walk variable.
#[derive(Debug, Clone, Copy)]
struct RandomWalk {
    running: f64,
    min: f64,
    max: f64,
}

impl RandomWalk {
    fn new(min: f64, max: f64) -> Self {
        Self {
            running: (min + max) / 2.0,
            min,
            max,
        }
    }

    /// Advance one step and return the rounded published value.
    fn step(&mut self, rng: &mut impl Rng) -> f64 {
        let delta = rng.random_range(-1.0..=1.0) * (self.max - self.min) * STEP_FRACTION;
        self.running = (self.running + delta).max(self.min).min(self.max);
        round2(self.running)
    }
}

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Random-walk variables whose node was updated.
    pub updated: usize,
    /// Variables whose value was appended to history.
    pub recorded: usize,
    /// Variables skipped because of a read or write failure.
    pub skipped: usize,
}

/// Periodic driver for random-walk variables and history snapshots.
#[derive(Debug)]
pub struct SimulationEngine<R> {
    space: Arc<AddressSpace>,
    walks: BTreeMap<String, RandomWalk>,
    rng: R,
    tick: u64,
}

impl<R: Rng> SimulationEngine<R> {
    /// Create an engine over `space`, seeding one random walk per
    /// random-mode numeric node.
    pub fn new(space: Arc<AddressSpace>, rng: R) -> Self {
        let walks = space
            .nodes()
            .filter_map(|node| {
                node.config()
                    .random_range()
                    .map(|(min, max)| (node.name().to_owned(), RandomWalk::new(min, max)))
            })
            .collect();
        Self {
            space,
            walks,
            rng,
            tick: 0,
        }
    }

    /// Number of ticks executed so far.
    pub const fn ticks(&self) -> u64 {
        self.tick
    }

    /// Execute one tick at time `now`.
    pub fn step(&mut self, now: DateTime<Utc>) -> TickReport {
        self.tick = self.tick.saturating_add(1);
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        let space = Arc::clone(&self.space);
        for node in space.nodes() {
            let outcome = match self.walks.get_mut(node.name()) {
                Some(walk) => {
                    let value = TagValue::Numeric(walk.step(&mut self.rng));
                    advance(node, value, now).map(|()| {
                        report.updated = report.updated.saturating_add(1);
                    })
                }
                None => node.read().and_then(|value| node.record(now, value)),
            };

            match outcome {
                Ok(()) => report.recorded = report.recorded.saturating_add(1),
                Err(e) => {
                    warn!(tick = self.tick, variable = node.name(), error = %e, "Skipping variable this tick");
                    report.skipped = report.skipped.saturating_add(1);
                }
            }
        }

        report
    }
}

impl<R: Rng + Send + 'static> SimulationEngine<R> {
    /// Tick every `period` until the lifecycle state leaves `Running`.
    ///
    /// The first tick fires one period after the call. Returns the number
    /// of ticks executed.
    pub async fn run(mut self, period: Duration, state: watch::Receiver<ServerState>) -> u64 {
        info!(
            variables = self.space.len(),
            random_walks = self.walks.len(),
            period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            "Simulation engine starting"
        );

        let mut ticker = Ticker::new(period, state);
        while ticker.tick().await {
            let report = self.step(Utc::now());
            debug!(
                tick = report.tick,
                updated = report.updated,
                recorded = report.recorded,
                skipped = report.skipped,
                "Simulation tick complete"
            );
        }

        info!(ticks = self.tick, "Simulation engine stopped");
        self.tick
    }
}

fn advance(node: &Node, value: TagValue, now: DateTime<Utc>) -> Result<(), AddressSpaceError> {
    node.store(value.clone(), now)?;
    node.record(now, value)
}
