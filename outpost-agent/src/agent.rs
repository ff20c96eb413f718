use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use outpost_config::Config;
use outpost_crypto::keys::{self, RsaPublicKey};

use crate::collector::{HostCollector, RuntimeCollector};
use crate::shipper::Shipper;

/// How long in-flight pollers and shippers get to drain on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// An error raised while starting the agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The configured public key did not load.
    #[error("failed to load public key")]
    KeyLoad(#[from] keys::KeyError),
}

/// The metrics collection agent.
///
/// Owns the mutex-guarded gauge map both samplers write into and the
/// monotonic poll counter. The counter is drained on every report, so each
/// `PollCount` delta equals the number of poll ticks since the previous
/// report and the server-side sum tracks the total tick count.
pub struct Agent {
    config: Arc<Config>,
    gauges: Arc<Mutex<HashMap<String, f64>>>,
    pending_polls: Arc<AtomicI64>,
    runtime: Arc<Mutex<RuntimeCollector>>,
    host: Arc<Mutex<HostCollector>>,
    shipper: Shipper,
}

impl Agent {
    /// Creates the agent, loading the public key if one is configured.
    pub fn new(config: Arc<Config>) -> Result<Self, AgentError> {
        let public_key: Option<RsaPublicKey> = match config.crypto_key() {
            Some(path) => Some(keys::load_public_key(path)?),
            None => None,
        };

        Ok(Self {
            shipper: Shipper::new(Arc::clone(&config), public_key),
            config,
            gauges: Arc::new(Mutex::new(HashMap::new())),
            pending_polls: Arc::new(AtomicI64::new(0)),
            runtime: Arc::new(Mutex::new(RuntimeCollector::new())),
            host: Arc::new(Mutex::new(HostCollector::new())),
        })
    }

    /// Runs the poll and report tickers until the shutdown channel fires,
    /// then drains in-flight work within the grace period.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        outpost_log::info!(
            poll = ?self.config.poll_interval(),
            report = ?self.config.report_interval(),
            "agent running"
        );

        let mut poll_ticker = ticker(self.config.poll_interval());
        let mut report_ticker = ticker(self.config.report_interval());
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                _ = poll_ticker.tick() => self.poll().await,
                _ = report_ticker.tick() => {
                    let agent = self.handle();
                    in_flight.spawn(async move { agent.report().await });
                }
                _ = shutdown.changed() => break,
            }
        }

        outpost_log::info!("waiting for in-flight work");
        let drain = async {
            while in_flight.join_next().await.is_some() {}
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            outpost_log::warn!("in-flight work did not drain within the grace period");
        }
        outpost_log::info!("agent stopped");
    }

    /// Runs both samplers concurrently and bumps the poll counter.
    async fn poll(&self) {
        let runtime = async {
            let sample = self.runtime.lock().await.sample();
            self.merge(sample).await;
        };
        let host = async {
            let sample = self.host.lock().await.sample();
            self.merge(sample).await;
        };

        tokio::join!(runtime, host);
        self.pending_polls.fetch_add(1, Ordering::Relaxed);
    }

    async fn merge(&self, sample: HashMap<String, f64>) {
        let mut gauges = self.gauges.lock().await;
        gauges.extend(sample);
    }

    /// A cheap handle for spawned report tasks.
    fn handle(&self) -> AgentHandle {
        AgentHandle {
            gauges: Arc::clone(&self.gauges),
            pending_polls: Arc::clone(&self.pending_polls),
            shipper: self.shipper.clone(),
        }
    }
}

/// The subset of agent state a report task needs.
struct AgentHandle {
    gauges: Arc<Mutex<HashMap<String, f64>>>,
    pending_polls: Arc<AtomicI64>,
    shipper: Shipper,
}

impl AgentHandle {
    async fn report(&self) {
        let gauges: Vec<(String, f64)> = {
            let gauges = self.gauges.lock().await;
            gauges.iter().map(|(k, v)| (k.clone(), *v)).collect()
        };
        let poll_delta = self.pending_polls.swap(0, Ordering::Relaxed);

        self.shipper.ship(gauges, poll_delta).await;
    }
}

/// A ticker that first fires one period from now, like the report loop
/// expects; tokio's default fires immediately.
fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
