//! Timer-driven polling of a capture session
//!
//! [`StreamPoller`] fetches the session status and the full packet snapshot
//! on a fixed interval and hands each result to a callback. At most one
//! fetch cycle runs at a time: a tick that fires while the previous cycle is
//! still outstanding is dropped, not queued.
//!
//! Polling ends on its own once a status reports the session is no longer
//! capturing and that tick's snapshot has been delivered.

use async_trait::async_trait;
use packetlens_core::{CaptureStatus, Error, PacketRecord, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default poll period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Consecutive failed cycles before a connectivity warning is raised
pub const DEFAULT_WARN_AFTER: u32 = 3;

/// The two reads a poll cycle needs from the capture service
#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn capture_status(&self) -> Result<CaptureStatus>;

    async fn all_packets(&self) -> Result<Vec<PacketRecord>>;
}

/// Poller configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Time between ticks
    pub interval: Duration,
    /// Consecutive failures before [`PollEvent::ConnectivityWarning`]
    pub warn_after: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            warn_after: DEFAULT_WARN_AFTER,
        }
    }
}

/// Something the poller has to tell its owner
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// A complete cycle: status and the snapshot fetched right after it
    Update {
        status: CaptureStatus,
        packets: Vec<PacketRecord>,
    },
    /// The service has failed `consecutive_failures` cycles in a row
    ConnectivityWarning {
        consecutive_failures: u32,
        error: String,
    },
    /// A cycle succeeded after a connectivity warning
    ConnectivityRestored,
}

/// What a finished poller did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollSummary {
    /// Cycles that delivered an update
    pub cycles: u64,
    /// Ticks dropped because a cycle was still in flight
    pub skipped_ticks: u64,
    /// Cycles that failed
    pub failures: u64,
    /// Status from the last delivered update
    pub last_status: Option<CaptureStatus>,
}

type Cycle = Result<(CaptureStatus, Vec<PacketRecord>)>;

async fn fetch_cycle(api: &dyn SessionApi) -> Cycle {
    let status = api.capture_status().await?;
    let packets = api.all_packets().await?;
    Ok((status, packets))
}

/// Bookkeeping for delivered and failed cycles
struct Delivery<F> {
    on_event: F,
    warn_after: u32,
    consecutive_failures: u32,
    summary: PollSummary,
}

impl<F: FnMut(PollEvent)> Delivery<F> {
    fn new(on_event: F, warn_after: u32) -> Self {
        Self {
            on_event,
            warn_after: warn_after.max(1),
            consecutive_failures: 0,
            summary: PollSummary::default(),
        }
    }

    /// Record a finished cycle. Returns true once the session is over.
    fn complete(&mut self, cycle: Cycle) -> bool {
        match cycle {
            Ok((status, packets)) => {
                if self.consecutive_failures >= self.warn_after {
                    info!("Capture service reachable again");
                    (self.on_event)(PollEvent::ConnectivityRestored);
                }
                self.consecutive_failures = 0;
                self.summary.cycles += 1;

                let capturing = status.capturing;
                debug!(
                    packets = packets.len(),
                    capturing = capturing,
                    "Poll cycle complete"
                );
                self.summary.last_status = Some(status.clone());
                (self.on_event)(PollEvent::Update { status, packets });
                !capturing
            }
            Err(e) => {
                self.summary.failures += 1;
                self.consecutive_failures += 1;
                if self.consecutive_failures == self.warn_after {
                    warn!(
                        failures = self.consecutive_failures,
                        error = %e,
                        "Capture service not responding"
                    );
                    (self.on_event)(PollEvent::ConnectivityWarning {
                        consecutive_failures: self.consecutive_failures,
                        error: e.to_string(),
                    });
                } else {
                    debug!(
                        failures = self.consecutive_failures,
                        error = %e,
                        "Poll cycle failed"
                    );
                }
                false
            }
        }
    }
}

/// Periodic status and snapshot fetcher
pub struct StreamPoller {
    api: Arc<dyn SessionApi>,
    config: PollerConfig,
}

impl StreamPoller {
    pub fn new(api: Arc<dyn SessionApi>) -> Self {
        Self::with_config(api, PollerConfig::default())
    }

    pub fn with_config(api: Arc<dyn SessionApi>, config: PollerConfig) -> Self {
        Self { api, config }
    }

    /// Start polling. The first cycle begins immediately.
    ///
    /// `on_event` runs on the poller task and is never called again once
    /// [`PollHandle::stop`], [`PollHandle::abort`] or [`PollHandle::join`]
    /// has returned.
    pub fn spawn<F>(self, on_event: F) -> PollHandle
    where
        F: FnMut(PollEvent) + Send + 'static,
    {
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(on_event, stop_rx));
        PollHandle {
            stop_tx: Some(stop_tx),
            task: Some(task),
        }
    }

    async fn run<F>(self, on_event: F, mut stop_rx: oneshot::Receiver<()>) -> PollSummary
    where
        F: FnMut(PollEvent) + Send + 'static,
    {
        let StreamPoller { api, config } = self;
        let mut delivery = Delivery::new(on_event, config.warn_after);

        let (done_tx, mut done_rx) = mpsc::channel::<Cycle>(1);
        let mut ticker = time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight = false;

        info!(interval_ms = config.interval.as_millis() as u64, "Poller started");

        loop {
            tokio::select! {
                biased;

                _ = &mut stop_rx => {
                    // Deliver one last cycle before returning
                    let last = if in_flight {
                        done_rx.recv().await
                    } else {
                        Some(fetch_cycle(api.as_ref()).await)
                    };
                    if let Some(cycle) = last {
                        delivery.complete(cycle);
                    }
                    info!("Poller stopped");
                    break;
                }

                Some(cycle) = done_rx.recv() => {
                    in_flight = false;
                    if delivery.complete(cycle) {
                        info!("Capture finished, poller exiting");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    if in_flight {
                        delivery.summary.skipped_ticks += 1;
                        debug!("Previous poll still running, skipping tick");
                        continue;
                    }
                    in_flight = true;
                    let api = Arc::clone(&api);
                    let done_tx = done_tx.clone();
                    tokio::spawn(async move {
                        let cycle = fetch_cycle(api.as_ref()).await;
                        let _ = done_tx.send(cycle).await;
                    });
                }
            }
        }

        delivery.summary
    }
}

/// Handle to a running poller.
///
/// Dropping the handle aborts the poller.
pub struct PollHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<PollSummary>>,
}

impl PollHandle {
    /// Whether polling has ended
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Stop polling after delivering one final cycle
    pub async fn stop(mut self) -> Result<PollSummary> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        self.wait().await
    }

    /// Wait for polling to end on its own (the session stopped)
    pub async fn join(mut self) -> Result<PollSummary> {
        self.wait().await
    }

    /// Stop immediately. An in-flight cycle is discarded.
    pub async fn abort(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }

    async fn wait(&mut self) -> Result<PollSummary> {
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| Error::engine(format!("poller task failed: {}", e))),
            None => Ok(PollSummary::default()),
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
