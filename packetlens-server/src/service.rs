//! Request dispatch for the capture service

use packetlens_capture::{codec, CaptureSessionManager};
use packetlens_core::{CaptureRequest, Error, PacketRecord, Request, Response, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Maps wire requests onto the session manager and packet store
#[derive(Clone)]
pub struct CaptureService {
    manager: Arc<CaptureSessionManager>,
}

impl CaptureService {
    pub fn new(manager: Arc<CaptureSessionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<CaptureSessionManager> {
        &self.manager
    }

    /// Handle one request. Failures become `error` responses.
    pub async fn handle(&self, request: Request) -> Response {
        let op = request.op();
        debug!(op = %op, "Handling request");
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                if e.is_session_conflict() {
                    debug!(op = %op, error = %e, "Request rejected");
                } else {
                    warn!(op = %op, error = %e, "Request failed");
                }
                Response::error(&e)
            }
        }
    }

    async fn dispatch(&self, request: Request) -> Result<Response> {
        match request {
            Request::ListInterfaces => Ok(Response::Interfaces {
                interfaces: self.manager.list_interfaces().await?,
            }),
            Request::ListConnectedInterfaces => Ok(Response::Interfaces {
                interfaces: self.manager.list_connected_interfaces().await?,
            }),
            Request::StartCapture {
                interface,
                packet_count,
                filter,
                timeout,
                clear,
            } => {
                let mut req = CaptureRequest::new(interface)
                    .with_count_cap(packet_count)
                    .with_timeout(Duration::from_secs(timeout));
                if let Some(filter) = filter.filter(|f| !f.trim().is_empty()) {
                    req = req.with_filter(filter);
                }
                if !clear {
                    req = req.keep_existing();
                }
                let status = self.manager.start(req).await?;
                Ok(Response::Started { status })
            }
            Request::StopCapture => {
                let outcome = self.manager.stop().await;
                Ok(Response::Stopped {
                    was_capturing: outcome.was_capturing,
                    packet_count: outcome.packet_count,
                })
            }
            Request::CaptureStatus => Ok(Response::Status {
                status: self.manager.status(),
            }),
            Request::GetPackets { offset, limit } => {
                let store = self.manager.store();
                let packets = store.page(offset, limit)?;
                Ok(Response::Packets {
                    packets,
                    total: store.len() as u64,
                    offset,
                    limit,
                })
            }
            Request::GetAllPackets => {
                let packets = self.manager.store().snapshot();
                let total = packets.len();
                Ok(Response::Packets {
                    packets,
                    total: total as u64,
                    offset: 0,
                    limit: total,
                })
            }
            Request::ClearPackets => {
                self.manager.clear().await?;
                Ok(Response::Cleared)
            }
            Request::ExportPackets { path, packets } => {
                let packets = packets.unwrap_or_else(|| self.manager.store().snapshot());
                let packet_count = export_blocking(path.clone(), packets).await? as u64;
                Ok(Response::Exported { path, packet_count })
            }
            Request::ImportPackets { path } => {
                let records = import_blocking(path).await?;
                let packets = self.manager.install(records).await;
                let packet_count = packets.len() as u64;
                Ok(Response::Imported {
                    packets,
                    packet_count,
                })
            }
        }
    }
}

async fn export_blocking(path: PathBuf, packets: Vec<PacketRecord>) -> Result<usize> {
    tokio::task::spawn_blocking(move || codec::export_to_path(&path, &packets))
        .await
        .map_err(|e| Error::engine(format!("export task failed: {}", e)))?
}

async fn import_blocking(path: PathBuf) -> Result<Vec<PacketRecord>> {
    tokio::task::spawn_blocking(move || codec::import_from_path(&path))
        .await
        .map_err(|e| Error::engine(format!("import task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use packetlens_capture::{ReplayEngine, REPLAY_INTERFACE};
    use packetlens_core::{CaptureState, ErrorCode, StopReason};

    fn records(protocols: &[&str]) -> Vec<PacketRecord> {
        protocols
            .iter()
            .map(|p| PacketRecord::new("t", 60, *p))
            .collect()
    }

    fn service(engine: ReplayEngine) -> CaptureService {
        CaptureService::new(Arc::new(CaptureSessionManager::new(Arc::new(engine))))
    }

    fn live_engine() -> ReplayEngine {
        ReplayEngine::new(records(&["TCP"]))
            .repeating()
            .with_interval(Duration::from_millis(5))
    }

    fn start(interface: &str) -> Request {
        Request::StartCapture {
            interface: interface.to_string(),
            packet_count: 0,
            filter: None,
            timeout: 0,
            clear: true,
        }
    }

    fn error_code(response: Response) -> ErrorCode {
        match response {
            Response::Error { code, .. } => code,
            other => panic!("expected error, got {:?}", other),
        }
    }

    async fn wait_idle(service: &CaptureService) {
        for _ in 0..300 {
            if !service.manager().is_capturing() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("capture did not stop");
    }

    #[tokio::test]
    async fn test_list_interfaces() {
        let service = service(live_engine());
        match service.handle(Request::ListInterfaces).await {
            Response::Interfaces { interfaces } => {
                assert_eq!(interfaces[0].name, REPLAY_INTERFACE)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_start_conflict_and_invalid_interface() {
        let service = service(live_engine());

        let code = error_code(service.handle(start("eth42")).await);
        assert_eq!(code, ErrorCode::InvalidInterface);

        assert!(matches!(
            service.handle(start(REPLAY_INTERFACE)).await,
            Response::Started { .. }
        ));
        let code = error_code(service.handle(start(REPLAY_INTERFACE)).await);
        assert_eq!(code, ErrorCode::AlreadyCapturing);

        service.handle(Request::StopCapture).await;
    }

    #[tokio::test]
    async fn test_stop_when_idle() {
        let service = service(live_engine());
        match service.handle(Request::StopCapture).await {
            Response::Stopped { was_capturing, .. } => assert!(!was_capturing),
            other => panic!("unexpected {:?}", other),
        }
        match service.handle(Request::CaptureStatus).await {
            Response::Status { status } => {
                assert_eq!(status.state, CaptureState::Idle);
                assert!(!status.capturing);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_paging_and_clear() {
        let engine = ReplayEngine::new(records(&["TCP", "DNS", "ARP", "UDP"]));
        let service = service(engine);
        service.handle(start(REPLAY_INTERFACE)).await;
        wait_idle(&service).await;

        match service
            .handle(Request::GetPackets {
                offset: 1,
                limit: 2,
            })
            .await
        {
            Response::Packets {
                packets, total, ..
            } => {
                assert_eq!(total, 4);
                let numbers: Vec<u64> = packets.iter().map(|p| p.number).collect();
                assert_eq!(numbers, vec![2, 3]);
            }
            other => panic!("unexpected {:?}", other),
        }

        let code = error_code(
            service
                .handle(Request::GetPackets {
                    offset: -3,
                    limit: 2,
                })
                .await,
        );
        assert_eq!(code, ErrorCode::OutOfRange);

        assert_eq!(service.handle(Request::ClearPackets).await, Response::Cleared);
        match service.handle(Request::GetAllPackets).await {
            Response::Packets { packets, total, .. } => {
                assert!(packets.is_empty());
                assert_eq!(total, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clear_while_capturing() {
        let service = service(live_engine());
        service.handle(start(REPLAY_INTERFACE)).await;
        let code = error_code(service.handle(Request::ClearPackets).await);
        assert_eq!(code, ErrorCode::CaptureActive);
        service.handle(Request::StopCapture).await;
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.json");
        let service = service(ReplayEngine::new(records(&["TCP", "DNS"])));
        service.handle(start(REPLAY_INTERFACE)).await;
        wait_idle(&service).await;

        match service
            .handle(Request::ExportPackets {
                path: path.clone(),
                packets: None,
            })
            .await
        {
            Response::Exported { packet_count, .. } => assert_eq!(packet_count, 2),
            other => panic!("unexpected {:?}", other),
        }

        service.handle(Request::ClearPackets).await;
        match service.handle(Request::ImportPackets { path }).await {
            Response::Imported {
                packets,
                packet_count,
            } => {
                assert_eq!(packet_count, 2);
                assert_eq!(packets[1].protocol, "DNS");
                assert_eq!(packets[1].number, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_export_explicit_packets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subset.json");
        let service = service(live_engine());

        let response = service
            .handle(Request::ExportPackets {
                path: path.clone(),
                packets: Some(records(&["ARP"])),
            })
            .await;
        assert!(matches!(response, Response::Exported { packet_count: 1, .. }));
        assert_eq!(codec::import_from_path(&path).unwrap()[0].protocol, "ARP");
    }

    #[tokio::test]
    async fn test_import_errors() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(live_engine());

        let code = error_code(
            service
                .handle(Request::ImportPackets {
                    path: dir.path().join("missing.json"),
                })
                .await,
        );
        assert_eq!(code, ErrorCode::IoError);

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, b"{ nope").unwrap();
        let code = error_code(service.handle(Request::ImportPackets { path: bad }).await);
        assert_eq!(code, ErrorCode::MalformedFile);
    }

    #[tokio::test]
    async fn test_import_stops_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.json");
        codec::export_to_path(&path, &records(&["ARP", "ARP", "ARP"])).unwrap();

        let service = service(live_engine());
        service.handle(start(REPLAY_INTERFACE)).await;

        match service.handle(Request::ImportPackets { path }).await {
            Response::Imported {
                packets,
                packet_count,
            } => {
                assert_eq!(packet_count, 3);
                assert!(packets.iter().all(|p| p.protocol == "ARP"));
                let numbers: Vec<u64> = packets.iter().map(|p| p.number).collect();
                assert_eq!(numbers, vec![1, 2, 3]);
            }
            other => panic!("unexpected {:?}", other),
        }

        let status = service.manager().status();
        assert_eq!(status.state, CaptureState::Stopped);
        assert_eq!(status.stop_reason, Some(StopReason::Manual));
        assert_eq!(status.packet_count, 3);
    }
}
