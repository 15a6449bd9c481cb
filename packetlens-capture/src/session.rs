//! Capture session lifecycle
//!
//! The `CaptureSessionManager` owns the one capture that may run at a time:
//!
//! - `Idle -> Capturing` on [`CaptureSessionManager::start`]
//! - `Capturing -> Stopped` on stop, timeout, count cap, end of input or
//!   engine failure
//! - `Stopped -> Capturing` on the next start
//!
//! Capture runs on a dedicated OS thread because engine reads block. The
//! worker appends through a [`StoreWriter`]; a stop that outlives the grace
//! period revokes that writer so a late engine can never touch the store
//! again.

use packetlens_core::{
    CaptureRequest, CaptureState, CaptureStatus, Error, InterfaceInfo, PacketRecord, Result,
    StopOutcome, StopReason,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::{CaptureEngine, PacketSource, SourceEvent};
use crate::stats::StatsAccumulator;
use crate::store::{PacketStore, StoreWriter};

/// Default time `stop` waits for the capture worker to drain
const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(2);

/// Session manager configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a stop waits for the worker before detaching it
    pub stop_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }
}

/// Everything known about the current (or last) session
#[derive(Debug, Clone)]
struct SessionInfo {
    id: Uuid,
    interface: String,
    filter: Option<String>,
    stop_reason: Option<StopReason>,
    error: Option<String>,
    stats: StatsAccumulator,
}

#[derive(Debug, Default)]
struct Shared {
    state: CaptureState,
    session: Option<SessionInfo>,
}

impl Shared {
    /// Move the given session to `Stopped` if it is still the capturing one
    fn finish(&mut self, id: Uuid, reason: StopReason, error: Option<String>) -> bool {
        if self.state != CaptureState::Capturing {
            return false;
        }
        match self.session.as_mut() {
            Some(session) if session.id == id => {
                session.stats.freeze();
                session.stop_reason = Some(reason);
                session.error = error;
                self.state = CaptureState::Stopped;
                true
            }
            _ => false,
        }
    }
}

/// Handle to a running capture worker
struct Worker {
    id: Uuid,
    running: Arc<AtomicBool>,
    done: oneshot::Receiver<()>,
}

/// Owns the capture lifecycle and the packet store it feeds
pub struct CaptureSessionManager {
    engine: Arc<dyn CaptureEngine>,
    store: PacketStore,
    config: SessionConfig,
    shared: Arc<RwLock<Shared>>,
    /// Serializes start/stop/clear/install
    lifecycle: Mutex<Option<Worker>>,
}

impl CaptureSessionManager {
    /// Create a manager with a fresh store
    pub fn new(engine: Arc<dyn CaptureEngine>) -> Self {
        Self::with_config(engine, PacketStore::new(), SessionConfig::default())
    }

    pub fn with_config(
        engine: Arc<dyn CaptureEngine>,
        store: PacketStore,
        config: SessionConfig,
    ) -> Self {
        info!(stop_grace_ms = config.stop_grace.as_millis() as u64, "Creating CaptureSessionManager");
        Self {
            engine,
            store,
            config,
            shared: Arc::new(RwLock::new(Shared::default())),
            lifecycle: Mutex::new(None),
        }
    }

    /// The store this manager appends to
    pub fn store(&self) -> &PacketStore {
        &self.store
    }

    /// Enumerate interfaces through the engine
    pub async fn list_interfaces(&self) -> Result<Vec<InterfaceInfo>> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || engine.list_interfaces())
            .await
            .map_err(|e| Error::engine(format!("interface enumeration failed: {}", e)))?
    }

    /// Enumerate connected interfaces through the engine
    pub async fn list_connected_interfaces(&self) -> Result<Vec<InterfaceInfo>> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || engine.list_connected_interfaces())
            .await
            .map_err(|e| Error::engine(format!("interface enumeration failed: {}", e)))?
    }

    /// Start a capture session.
    ///
    /// Returns once the engine is open and the worker is running; packets
    /// arrive asynchronously.
    pub async fn start(&self, request: CaptureRequest) -> Result<CaptureStatus> {
        let mut slot = self.lifecycle.lock().await;

        if self.shared.read().state == CaptureState::Capturing {
            warn!(interface = %request.interface, "Capture already in progress");
            return Err(Error::AlreadyCapturing);
        }

        let interfaces = self.list_interfaces().await?;
        if !interfaces.iter().any(|i| i.name == request.interface) {
            return Err(Error::InvalidInterface(request.interface.clone()));
        }

        let engine = Arc::clone(&self.engine);
        let open_request = request.clone();
        let source = tokio::task::spawn_blocking(move || engine.open(&open_request))
            .await
            .map_err(|e| Error::engine(format!("capture open failed: {}", e)))??;

        // A worker that stopped on its own is finished; drop its handle
        slot.take();

        if request.clear {
            self.store.clear();
        }

        let id = Uuid::now_v7();
        let stats = StatsAccumulator::new();
        let running = Arc::new(AtomicBool::new(true));
        let (done_tx, done_rx) = oneshot::channel();

        {
            let mut shared = self.shared.write();
            shared.state = CaptureState::Capturing;
            shared.session = Some(SessionInfo {
                id,
                interface: request.interface.clone(),
                filter: request.filter.clone(),
                stop_reason: None,
                error: None,
                stats: stats.clone(),
            });
        }

        let worker = CaptureWorker {
            id,
            running: Arc::clone(&running),
            writer: self.store.writer(),
            stats,
            shared: Arc::clone(&self.shared),
            count_cap: request.count_cap,
            deadline: request.timeout.map(|t| Instant::now() + t),
            drain_limit: self.config.stop_grace,
        };

        let spawned = thread::Builder::new()
            .name("packetlens-capture".to_string())
            .spawn(move || worker.run(source, done_tx));

        if let Err(e) = spawned {
            error!(session = %id, error = %e, "Failed to spawn capture thread");
            self.shared
                .write()
                .finish(id, StopReason::Error, Some(e.to_string()));
            return Err(Error::Io(e));
        }

        *slot = Some(Worker {
            id,
            running,
            done: done_rx,
        });

        info!(
            session = %id,
            interface = %request.interface,
            filter = ?request.filter,
            count_cap = ?request.count_cap,
            timeout = ?request.timeout,
            "Capture started"
        );

        Ok(self.status())
    }

    /// Stop the running capture. Succeeds as a no-op when nothing runs.
    pub async fn stop(&self) -> StopOutcome {
        let mut slot = self.lifecycle.lock().await;
        self.stop_locked(&mut slot).await
    }

    async fn stop_locked(&self, slot: &mut Option<Worker>) -> StopOutcome {
        let was_capturing = self.shared.read().state == CaptureState::Capturing;

        if let Some(worker) = slot.take() {
            worker.running.store(false, Ordering::Release);
            if was_capturing {
                debug!(session = %worker.id, "Waiting for capture worker to drain");
                match tokio::time::timeout(self.config.stop_grace, worker.done).await {
                    Ok(_) => debug!(session = %worker.id, "Capture worker drained"),
                    Err(_) => {
                        warn!(
                            session = %worker.id,
                            grace_ms = self.config.stop_grace.as_millis() as u64,
                            "Capture worker did not stop in time, detaching it"
                        );
                        self.store.revoke_writers();
                    }
                }
                self.shared
                    .write()
                    .finish(worker.id, StopReason::Manual, None);
            }
        }

        let packet_count = self.store.len() as u64;
        if was_capturing {
            info!(packets = packet_count, "Capture stopped");
        } else {
            debug!("Stop requested with no capture running");
        }

        StopOutcome {
            was_capturing,
            packet_count,
        }
    }

    /// Current session state and store size. Never fails.
    pub fn status(&self) -> CaptureStatus {
        let packet_count = self.store.len() as u64;
        let shared = self.shared.read();
        let Some(session) = shared.session.as_ref() else {
            return CaptureStatus::idle(packet_count);
        };

        CaptureStatus {
            state: shared.state,
            capturing: shared.state == CaptureState::Capturing,
            packet_count,
            session_id: Some(session.id),
            interface: Some(session.interface.clone()),
            filter: session.filter.clone(),
            stop_reason: session.stop_reason,
            error: session.error.clone(),
            stats: session.stats.snapshot(),
        }
    }

    /// Check if a capture is running
    pub fn is_capturing(&self) -> bool {
        self.shared.read().state == CaptureState::Capturing
    }

    /// Empty the store. Rejected while capturing.
    pub async fn clear(&self) -> Result<()> {
        let _slot = self.lifecycle.lock().await;
        if self.is_capturing() {
            return Err(Error::CaptureActive);
        }
        self.store.clear();
        info!("Packet store cleared");
        Ok(())
    }

    /// Install an imported capture, stopping any running session first.
    ///
    /// Returns the records as installed (renumbered from 1), read before
    /// the lifecycle lock is released.
    pub async fn install(&self, records: Vec<PacketRecord>) -> Vec<PacketRecord> {
        let mut slot = self.lifecycle.lock().await;
        if self.is_capturing() {
            info!("Stopping capture before installing imported packets");
            self.stop_locked(&mut slot).await;
        }
        let count = self.store.replace(records);
        info!(packets = count, "Installed imported packets");
        self.store.snapshot()
    }
}

impl Drop for CaptureSessionManager {
    fn drop(&mut self) {
        if let Some(worker) = self.lifecycle.get_mut().as_ref() {
            worker.running.store(false, Ordering::Release);
        }
    }
}

/// State moved onto the capture thread
struct CaptureWorker {
    id: Uuid,
    running: Arc<AtomicBool>,
    writer: StoreWriter,
    stats: StatsAccumulator,
    shared: Arc<RwLock<Shared>>,
    count_cap: Option<u64>,
    deadline: Option<Instant>,
    /// How long a stop request lets buffered packets drain
    drain_limit: Duration,
}

impl CaptureWorker {
    fn run(self, mut source: Box<dyn PacketSource>, done: oneshot::Sender<()>) {
        let (reason, failure) = self.pump(source.as_mut());

        match reason {
            StopReason::Error => error!(
                session = %self.id,
                error = failure.as_deref().unwrap_or("unknown"),
                "Capture failed"
            ),
            _ => debug!(session = %self.id, reason = %reason, "Capture loop finished"),
        }

        if self.shared.write().finish(self.id, reason, failure) {
            info!(
                session = %self.id,
                reason = %reason,
                packets = self.stats.packets_captured(),
                "Capture stopped"
            );
        }

        drop(source);
        let _ = done.send(());
    }

    fn pump(&self, source: &mut dyn PacketSource) -> (StopReason, Option<String>) {
        let mut captured: u64 = 0;
        loop {
            if matches!(self.count_cap, Some(cap) if captured >= cap) {
                return (StopReason::CountReached, None);
            }
            if !self.running.load(Ordering::Acquire) {
                self.drain(source, captured);
                return (StopReason::Manual, None);
            }
            if matches!(self.deadline, Some(deadline) if Instant::now() >= deadline) {
                return (StopReason::Timeout, None);
            }

            match source.next_event() {
                Ok(SourceEvent::Packet(record)) => {
                    let size = record.length as usize;
                    match self.writer.append(record) {
                        Some(_) => {
                            self.stats.record_packet(size);
                            captured += 1;
                        }
                        // Detached by a stop that timed out
                        None => return (StopReason::Manual, None),
                    }
                }
                Ok(SourceEvent::Idle) => continue,
                Ok(SourceEvent::Closed) if source.is_finite() => {
                    return (StopReason::EndOfInput, None);
                }
                Ok(SourceEvent::Closed) => {
                    return (
                        StopReason::Error,
                        Some("capture stream closed unexpectedly".to_string()),
                    );
                }
                Err(e) => return (StopReason::Error, Some(e.to_string())),
            }
        }
    }

    /// Store packets the source already holds when a stop arrives. Ends when
    /// the source runs dry, the count cap is hit, the grace period runs out
    /// or the writer is revoked.
    fn drain(&self, source: &mut dyn PacketSource, mut captured: u64) {
        let until = Instant::now() + self.drain_limit;
        let mut drained: u64 = 0;

        while self.writer.is_valid() && Instant::now() < until {
            if matches!(self.count_cap, Some(cap) if captured >= cap) {
                break;
            }
            match source.next_buffered() {
                Ok(SourceEvent::Packet(record)) => {
                    let size = record.length as usize;
                    if self.writer.append(record).is_none() {
                        break;
                    }
                    self.stats.record_packet(size);
                    captured += 1;
                    drained += 1;
                }
                Ok(SourceEvent::Idle) | Ok(SourceEvent::Closed) => break,
                Err(e) => {
                    debug!(session = %self.id, error = %e, "Drain ended by engine error");
                    break;
                }
            }
        }

        if drained > 0 {
            debug!(session = %self.id, packets = drained, "Drained buffered packets");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ReplayEngine, REPLAY_INTERFACE};
    use std::collections::VecDeque;

    fn records(n: usize) -> Vec<PacketRecord> {
        (0..n)
            .map(|i| PacketRecord::new("t", 60 + i as u32, "TCP"))
            .collect()
    }

    fn manager(engine: impl CaptureEngine + 'static) -> CaptureSessionManager {
        CaptureSessionManager::new(Arc::new(engine))
    }

    async fn wait_for_stop(manager: &CaptureSessionManager) -> CaptureStatus {
        for _ in 0..300 {
            let status = manager.status();
            if !status.capturing {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("capture did not stop");
    }

    /// Yields `good` packets, then fails
    struct FailingEngine {
        good: usize,
    }

    struct FailingSource {
        left: usize,
    }

    impl PacketSource for FailingSource {
        fn next_event(&mut self) -> Result<SourceEvent> {
            if self.left == 0 {
                return Err(Error::engine("device went away"));
            }
            self.left -= 1;
            Ok(SourceEvent::Packet(PacketRecord::new("t", 10, "UDP")))
        }
    }

    impl CaptureEngine for FailingEngine {
        fn list_interfaces(&self) -> Result<Vec<InterfaceInfo>> {
            Ok(vec![InterfaceInfo::new("eth0")])
        }

        fn open(&self, _request: &CaptureRequest) -> Result<Box<dyn PacketSource>> {
            Ok(Box::new(FailingSource { left: self.good }))
        }
    }

    /// Ignores stop requests and takes a long time per packet
    struct StuckEngine;

    struct StuckSource;

    impl PacketSource for StuckSource {
        fn next_event(&mut self) -> Result<SourceEvent> {
            thread::sleep(Duration::from_millis(300));
            Ok(SourceEvent::Packet(PacketRecord::new("t", 10, "TCP")))
        }
    }

    impl CaptureEngine for StuckEngine {
        fn list_interfaces(&self) -> Result<Vec<InterfaceInfo>> {
            Ok(vec![InterfaceInfo::new("eth0")])
        }

        fn open(&self, _request: &CaptureRequest) -> Result<Box<dyn PacketSource>> {
            Ok(Box::new(StuckSource))
        }
    }

    /// Holds `n` packets already delivered by the device, each read taking 2ms
    struct QueuedEngine {
        n: usize,
    }

    struct QueuedSource {
        queued: VecDeque<PacketRecord>,
    }

    impl PacketSource for QueuedSource {
        fn next_event(&mut self) -> Result<SourceEvent> {
            thread::sleep(Duration::from_millis(2));
            Ok(match self.queued.pop_front() {
                Some(record) => SourceEvent::Packet(record),
                None => SourceEvent::Idle,
            })
        }
    }

    impl CaptureEngine for QueuedEngine {
        fn list_interfaces(&self) -> Result<Vec<InterfaceInfo>> {
            Ok(vec![InterfaceInfo::new("eth0")])
        }

        fn open(&self, _request: &CaptureRequest) -> Result<Box<dyn PacketSource>> {
            Ok(Box::new(QueuedSource {
                queued: records(self.n).into(),
            }))
        }
    }

    #[tokio::test]
    async fn test_initial_status_is_idle() {
        let manager = manager(ReplayEngine::new(records(1)));
        let status = manager.status();
        assert_eq!(status.state, CaptureState::Idle);
        assert!(!status.capturing);
        assert_eq!(status.packet_count, 0);
        assert!(status.session_id.is_none());
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let manager = manager(ReplayEngine::new(records(1)));
        let outcome = manager.stop().await;
        assert!(!outcome.was_capturing);
        assert_eq!(manager.status().state, CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let engine = ReplayEngine::new(records(1))
            .repeating()
            .with_interval(Duration::from_millis(5));
        let manager = manager(engine);

        let first = manager.start(CaptureRequest::new(REPLAY_INTERFACE)).await.unwrap();
        assert!(first.capturing);

        let err = manager
            .start(CaptureRequest::new(REPLAY_INTERFACE))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyCapturing));

        let status = manager.status();
        assert!(status.capturing);
        assert_eq!(status.session_id, first.session_id);

        manager.stop().await;
    }

    #[tokio::test]
    async fn test_stop_twice() {
        let engine = ReplayEngine::new(records(1))
            .repeating()
            .with_interval(Duration::from_millis(5));
        let manager = manager(engine);
        manager.start(CaptureRequest::new(REPLAY_INTERFACE)).await.unwrap();

        let first = manager.stop().await;
        assert!(first.was_capturing);
        let status = manager.status();
        assert_eq!(status.state, CaptureState::Stopped);
        assert_eq!(status.stop_reason, Some(StopReason::Manual));

        let second = manager.stop().await;
        assert!(!second.was_capturing);
        assert_eq!(second.packet_count, first.packet_count);
        assert_eq!(manager.status().stop_reason, Some(StopReason::Manual));
    }

    #[tokio::test]
    async fn test_invalid_interface() {
        let manager = manager(ReplayEngine::new(records(1)));
        let err = manager.start(CaptureRequest::new("eth9")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInterface(name) if name == "eth9"));
        assert_eq!(manager.status().state, CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_count_cap_stops_session() {
        let engine = ReplayEngine::new(records(3)).repeating();
        let manager = manager(engine);
        manager
            .start(CaptureRequest::new(REPLAY_INTERFACE).with_count_cap(7))
            .await
            .unwrap();

        let status = wait_for_stop(&manager).await;
        assert_eq!(status.stop_reason, Some(StopReason::CountReached));
        assert_eq!(status.packet_count, 7);
        assert_eq!(status.stats.packets_captured, 7);

        let numbers: Vec<u64> = manager.store().snapshot().iter().map(|r| r.number).collect();
        assert_eq!(numbers, (1..=7).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_end_of_input() {
        let manager = manager(ReplayEngine::new(records(4)));
        manager.start(CaptureRequest::new(REPLAY_INTERFACE)).await.unwrap();

        let status = wait_for_stop(&manager).await;
        assert_eq!(status.stop_reason, Some(StopReason::EndOfInput));
        assert_eq!(status.packet_count, 4);
    }

    #[tokio::test]
    async fn test_timeout_stops_session() {
        let engine = ReplayEngine::new(records(1))
            .repeating()
            .with_interval(Duration::from_millis(5));
        let manager = manager(engine);
        manager
            .start(CaptureRequest::new(REPLAY_INTERFACE).with_timeout(Duration::from_millis(100)))
            .await
            .unwrap();

        let status = wait_for_stop(&manager).await;
        assert_eq!(status.stop_reason, Some(StopReason::Timeout));
        assert!(status.stats.elapsed_ms >= 100);
    }

    #[tokio::test]
    async fn test_engine_failure_keeps_records() {
        let manager = manager(FailingEngine { good: 2 });
        manager.start(CaptureRequest::new("eth0")).await.unwrap();

        let status = wait_for_stop(&manager).await;
        assert_eq!(status.stop_reason, Some(StopReason::Error));
        assert!(status.error.unwrap().contains("device went away"));
        assert_eq!(manager.store().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_rejected_while_capturing() {
        let engine = ReplayEngine::new(records(1))
            .repeating()
            .with_interval(Duration::from_millis(5));
        let manager = manager(engine);
        manager.start(CaptureRequest::new(REPLAY_INTERFACE)).await.unwrap();

        assert!(matches!(manager.clear().await, Err(Error::CaptureActive)));

        manager.stop().await;
        manager.clear().await.unwrap();
        assert_eq!(manager.status().packet_count, 0);
        assert_eq!(manager.store().append(PacketRecord::new("t", 1, "TCP")), 1);
    }

    #[tokio::test]
    async fn test_start_clears_unless_asked_to_keep() {
        let manager = manager(ReplayEngine::new(records(2)));

        manager.start(CaptureRequest::new(REPLAY_INTERFACE)).await.unwrap();
        wait_for_stop(&manager).await;
        manager.start(CaptureRequest::new(REPLAY_INTERFACE)).await.unwrap();
        wait_for_stop(&manager).await;
        assert_eq!(manager.store().len(), 2);

        manager
            .start(CaptureRequest::new(REPLAY_INTERFACE).keep_existing())
            .await
            .unwrap();
        wait_for_stop(&manager).await;
        let numbers: Vec<u64> = manager.store().snapshot().iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_install_stops_running_capture() {
        let engine = ReplayEngine::new(records(1))
            .repeating()
            .with_interval(Duration::from_millis(5));
        let manager = manager(engine);
        manager.start(CaptureRequest::new(REPLAY_INTERFACE)).await.unwrap();

        let mut imported = records(3);
        imported[0].number = 10;
        let installed = manager.install(imported).await;
        let numbers: Vec<u64> = installed.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        let status = manager.status();
        assert_eq!(status.state, CaptureState::Stopped);
        assert_eq!(status.stop_reason, Some(StopReason::Manual));

        tokio::time::sleep(Duration::from_millis(30)).await;
        let numbers: Vec<u64> = manager.store().snapshot().iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_stop_drains_queued_packets() {
        let manager = manager(QueuedEngine { n: 200 });
        manager.start(CaptureRequest::new("eth0")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let outcome = manager.stop().await;
        assert!(outcome.was_capturing);
        assert_eq!(outcome.packet_count, 200);

        let status = manager.status();
        assert_eq!(status.stop_reason, Some(StopReason::Manual));
        assert_eq!(status.stats.packets_captured, 200);
        let numbers: Vec<u64> = manager.store().snapshot().iter().map(|r| r.number).collect();
        assert_eq!(numbers, (1..=200).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_stop_does_not_drain_past_count_cap() {
        let manager = manager(QueuedEngine { n: 200 });
        manager
            .start(CaptureRequest::new("eth0").with_count_cap(150))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        manager.stop().await;
        assert_eq!(manager.store().len(), 150);
    }

    #[tokio::test]
    async fn test_stop_detaches_stuck_worker() {
        let store = PacketStore::new();
        let config = SessionConfig {
            stop_grace: Duration::from_millis(50),
        };
        let manager = CaptureSessionManager::with_config(Arc::new(StuckEngine), store.clone(), config);
        manager.start(CaptureRequest::new("eth0")).await.unwrap();

        let started = Instant::now();
        let outcome = manager.stop().await;
        assert!(outcome.was_capturing);
        assert!(started.elapsed() < Duration::from_millis(250));
        assert_eq!(manager.status().state, CaptureState::Stopped);

        // The late packet must not land in the store
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(store.is_empty());
    }
}
