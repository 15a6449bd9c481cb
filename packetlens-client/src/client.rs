//! TCP client for the packetlens capture service

use async_trait::async_trait;
use packetlens_core::protocol::{decode_line, encode_line};
use packetlens_core::{
    CaptureRequest, CaptureStatus, Error, InterfaceInfo, PacketRecord, Request, Response, Result,
    StopOutcome,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::poller::SessionApi;

/// Default service address
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:8000";

/// One page of packets
#[derive(Debug, Clone, PartialEq)]
pub struct PacketPage {
    pub packets: Vec<PacketRecord>,
    /// Store size when the page was read
    pub total: u64,
    pub offset: i64,
    pub limit: usize,
}

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    async fn open(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::transport(format!("cannot connect to {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        info!(addr = %addr, "Connected to capture service");
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
        })
    }

    async fn round_trip(&mut self, request: &Request) -> Result<Response> {
        let line = encode_line(request)?;
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::transport(format!("send failed: {}", e)))?;
        self.writer
            .flush()
            .await
            .map_err(|e| Error::transport(format!("send failed: {}", e)))?;

        let mut reply = String::new();
        let read = self
            .reader
            .read_line(&mut reply)
            .await
            .map_err(|e| Error::transport(format!("receive failed: {}", e)))?;
        if read == 0 {
            return Err(Error::transport("connection closed by server"));
        }
        decode_line(reply.trim_end())
    }
}

/// Client for a remote capture service.
///
/// Requests are serialized over one persistent connection. A transport
/// failure drops the connection and the next call dials again.
pub struct ServiceClient {
    addr: String,
    conn: Mutex<Option<Connection>>,
}

impl ServiceClient {
    /// Create a client; nothing is dialled until the first request
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            conn: Mutex::new(None),
        }
    }

    /// Create a client and connect immediately
    pub async fn connect(addr: impl Into<String>) -> Result<Self> {
        let client = Self::new(addr);
        *client.conn.lock().await = Some(Connection::open(&client.addr).await?);
        Ok(client)
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send one request and wait for its response.
    ///
    /// `error` responses are returned as `Err`. The connection is held
    /// outside the lock while the request is in flight, so a cancelled call
    /// drops it and the next call dials again.
    pub async fn call(&self, request: Request) -> Result<Response> {
        let mut guard = self.conn.lock().await;
        let mut conn = match guard.take() {
            Some(conn) => conn,
            None => Connection::open(&self.addr).await?,
        };

        match conn.round_trip(&request).await {
            Ok(response) => {
                *guard = Some(conn);
                response.into_result()
            }
            Err(e) => {
                debug!(op = request.op(), error = %e, "Dropping connection");
                Err(e)
            }
        }
    }

    /// Drop the connection after a reply that does not match the request
    async fn mismatch(&self, response: &Response, op: &str) -> Error {
        warn!(op, kind = response.kind(), "Unexpected response, dropping connection");
        *self.conn.lock().await = None;
        Error::transport(format!(
            "unexpected '{}' response to {}",
            response.kind(),
            op
        ))
    }

    pub async fn list_interfaces(&self) -> Result<Vec<InterfaceInfo>> {
        match self.call(Request::ListInterfaces).await? {
            Response::Interfaces { interfaces } => Ok(interfaces),
            other => Err(self.mismatch(&other, "list_interfaces").await),
        }
    }

    pub async fn list_connected_interfaces(&self) -> Result<Vec<InterfaceInfo>> {
        match self.call(Request::ListConnectedInterfaces).await? {
            Response::Interfaces { interfaces } => Ok(interfaces),
            other => Err(self.mismatch(&other, "list_connected_interfaces").await),
        }
    }

    /// Start a capture session
    pub async fn start_capture(&self, request: &CaptureRequest) -> Result<CaptureStatus> {
        let wire = Request::StartCapture {
            interface: request.interface.clone(),
            packet_count: request.count_cap.unwrap_or(0),
            filter: request.filter.clone(),
            timeout: request.timeout.map(|t| t.as_secs()).unwrap_or(0),
            clear: request.clear,
        };
        match self.call(wire).await? {
            Response::Started { status } => Ok(status),
            other => Err(self.mismatch(&other, "start_capture").await),
        }
    }

    /// Stop the running capture, if any
    pub async fn stop_capture(&self) -> Result<StopOutcome> {
        match self.call(Request::StopCapture).await? {
            Response::Stopped {
                was_capturing,
                packet_count,
            } => Ok(StopOutcome {
                was_capturing,
                packet_count,
            }),
            other => Err(self.mismatch(&other, "stop_capture").await),
        }
    }

    pub async fn capture_status(&self) -> Result<CaptureStatus> {
        match self.call(Request::CaptureStatus).await? {
            Response::Status { status } => Ok(status),
            other => Err(self.mismatch(&other, "capture_status").await),
        }
    }

    pub async fn get_packets(&self, offset: i64, limit: usize) -> Result<PacketPage> {
        match self.call(Request::GetPackets { offset, limit }).await? {
            Response::Packets {
                packets,
                total,
                offset,
                limit,
            } => Ok(PacketPage {
                packets,
                total,
                offset,
                limit,
            }),
            other => Err(self.mismatch(&other, "get_packets").await),
        }
    }

    pub async fn get_all_packets(&self) -> Result<Vec<PacketRecord>> {
        match self.call(Request::GetAllPackets).await? {
            Response::Packets { packets, .. } => Ok(packets),
            other => Err(self.mismatch(&other, "get_all_packets").await),
        }
    }

    pub async fn clear_packets(&self) -> Result<()> {
        match self.call(Request::ClearPackets).await? {
            Response::Cleared => Ok(()),
            other => Err(self.mismatch(&other, "clear_packets").await),
        }
    }

    /// Export `packets` (or the whole store when `None`) to a file on the
    /// service host. Returns the number of records written.
    pub async fn export_packets(
        &self,
        path: impl Into<PathBuf>,
        packets: Option<Vec<PacketRecord>>,
    ) -> Result<u64> {
        let request = Request::ExportPackets {
            path: path.into(),
            packets,
        };
        match self.call(request).await? {
            Response::Exported { packet_count, .. } => Ok(packet_count),
            other => Err(self.mismatch(&other, "export_packets").await),
        }
    }

    /// Replace the service's store with the contents of a capture file on
    /// the service host
    pub async fn import_packets(&self, path: impl Into<PathBuf>) -> Result<Vec<PacketRecord>> {
        match self.call(Request::ImportPackets { path: path.into() }).await? {
            Response::Imported { packets, .. } => Ok(packets),
            other => Err(self.mismatch(&other, "import_packets").await),
        }
    }
}

#[async_trait]
impl SessionApi for ServiceClient {
    async fn capture_status(&self) -> Result<CaptureStatus> {
        ServiceClient::capture_status(self).await
    }

    async fn all_packets(&self) -> Result<Vec<PacketRecord>> {
        self.get_all_packets().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packetlens_capture::{CaptureSessionManager, ReplayEngine, REPLAY_INTERFACE};
    use packetlens_server::{CaptureServer, CaptureService, ServerConfig};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn spawn_server(engine: ReplayEngine) -> SocketAddr {
        let manager = Arc::new(CaptureSessionManager::new(Arc::new(engine)));
        let config = ServerConfig {
            bind_addr: "127.0.0.1".to_string(),
            port: 0,
        };
        let server = CaptureServer::bind(&config, CaptureService::new(manager))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        addr
    }

    fn records(protocols: &[&str]) -> Vec<PacketRecord> {
        protocols
            .iter()
            .map(|p| PacketRecord::new("t", 60, *p))
            .collect()
    }

    async fn wait_stopped(client: &ServiceClient) -> CaptureStatus {
        for _ in 0..300 {
            let status = client.capture_status().await.unwrap();
            if !status.capturing {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("capture did not stop");
    }

    #[tokio::test]
    async fn test_full_session_over_tcp() {
        let addr = spawn_server(ReplayEngine::new(records(&["TCP", "DNS", "ARP"]))).await;
        let client = ServiceClient::connect(addr.to_string()).await.unwrap();

        let names: Vec<_> = client
            .list_interfaces()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec![REPLAY_INTERFACE.to_string()]);

        let status = client
            .start_capture(&CaptureRequest::new(REPLAY_INTERFACE))
            .await
            .unwrap();
        assert!(status.capturing);

        let status = wait_stopped(&client).await;
        assert_eq!(status.packet_count, 3);

        let page = client.get_packets(1, 5).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.packets.len(), 2);
        assert_eq!(page.packets[0].protocol, "DNS");

        let outcome = client.stop_capture().await.unwrap();
        assert!(!outcome.was_capturing);

        client.clear_packets().await.unwrap();
        assert!(client.get_all_packets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_errors_keep_their_variant() {
        let engine = ReplayEngine::new(records(&["TCP"]))
            .repeating()
            .with_interval(Duration::from_millis(5));
        let addr = spawn_server(engine).await;
        let client = ServiceClient::new(addr.to_string());

        let err = client
            .start_capture(&CaptureRequest::new("eth99"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInterface(_)));

        client
            .start_capture(&CaptureRequest::new(REPLAY_INTERFACE))
            .await
            .unwrap();
        let err = client
            .start_capture(&CaptureRequest::new(REPLAY_INTERFACE))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyCapturing));
        assert!(matches!(
            client.clear_packets().await.unwrap_err(),
            Error::CaptureActive
        ));

        let err = client.get_packets(-1, 10).await.unwrap_err();
        assert_eq!(err.code(), packetlens_core::ErrorCode::OutOfRange);

        assert!(client.stop_capture().await.unwrap().was_capturing);
    }

    #[tokio::test]
    async fn test_export_and_import_through_client() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.json");
        let addr = spawn_server(ReplayEngine::new(records(&["UDP", "ICMP"]))).await;
        let client = ServiceClient::new(addr.to_string());

        client
            .start_capture(&CaptureRequest::new(REPLAY_INTERFACE))
            .await
            .unwrap();
        wait_stopped(&client).await;

        assert_eq!(client.export_packets(path.clone(), None).await.unwrap(), 2);
        client.clear_packets().await.unwrap();

        let imported = client.import_packets(path).await.unwrap();
        assert_eq!(imported.len(), 2);
        assert_eq!(imported[1].protocol, "ICMP");
        assert_eq!(client.capture_status().await.unwrap().packet_count, 2);
    }

    #[tokio::test]
    async fn test_connect_failure_is_transport_error() {
        // Grab a free port, then close it
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ServiceClient::new(addr.to_string());
        assert!(matches!(
            client.capture_status().await,
            Err(Error::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_reconnects_after_server_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // First connection is closed without a reply, the second is served
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);

            let (socket, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = socket.into_split();
            let mut reader = BufReader::new(reader);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let reply = encode_line(&Response::Status {
                status: CaptureStatus::idle(7),
            })
            .unwrap();
            writer.write_all(reply.as_bytes()).await.unwrap();
        });

        let client = ServiceClient::connect(addr.to_string()).await.unwrap();
        assert!(matches!(
            client.capture_status().await,
            Err(Error::Transport(_))
        ));
        let status = client.capture_status().await.unwrap();
        assert_eq!(status.packet_count, 7);
    }

    /// Serve every connection in its own task, answering by op. The very
    /// first reply is held back for 200ms.
    async fn spawn_slow_first_reply() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let delayed = Arc::new(AtomicBool::new(false));

        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let delayed = delayed.clone();
                tokio::spawn(async move {
                    let (reader, mut writer) = socket.into_split();
                    let mut reader = BufReader::new(reader);
                    let mut line = String::new();
                    while reader.read_line(&mut line).await.unwrap_or(0) > 0 {
                        let request: Request = decode_line(line.trim_end()).unwrap();
                        line.clear();
                        if !delayed.swap(true, Ordering::SeqCst) {
                            tokio::time::sleep(Duration::from_millis(200)).await;
                        }
                        let response = match request {
                            Request::CaptureStatus => Response::Status {
                                status: CaptureStatus::idle(4),
                            },
                            Request::GetAllPackets => Response::Packets {
                                packets: records(&["TCP", "UDP"]),
                                total: 2,
                                offset: 0,
                                limit: 2,
                            },
                            _ => Response::Cleared,
                        };
                        let reply = encode_line(&response).unwrap();
                        if writer.write_all(reply.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_cancelled_call_does_not_leak_reply() {
        let addr = spawn_slow_first_reply().await;
        let client = ServiceClient::connect(addr.to_string()).await.unwrap();

        let cancelled =
            tokio::time::timeout(Duration::from_millis(50), client.capture_status()).await;
        assert!(cancelled.is_err());

        // Let the late status reply reach the abandoned connection
        tokio::time::sleep(Duration::from_millis(250)).await;

        let packets = client.get_all_packets().await.unwrap();
        assert_eq!(packets.len(), 2);
        let status = client.capture_status().await.unwrap();
        assert_eq!(status.packet_count, 4);
    }

    #[tokio::test]
    async fn test_mismatched_reply_drops_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // First connection answers with the wrong kind, then a stray status
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = socket.into_split();
            let mut reader = BufReader::new(reader);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let wrong = encode_line(&Response::Cleared).unwrap();
            let stray = encode_line(&Response::Status {
                status: CaptureStatus::idle(1),
            })
            .unwrap();
            writer.write_all(wrong.as_bytes()).await.unwrap();
            writer.write_all(stray.as_bytes()).await.unwrap();

            let (socket, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = socket.into_split();
            let mut reader = BufReader::new(reader);
            line.clear();
            reader.read_line(&mut line).await.unwrap();
            let reply = encode_line(&Response::Status {
                status: CaptureStatus::idle(9),
            })
            .unwrap();
            writer.write_all(reply.as_bytes()).await.unwrap();
        });

        let client = ServiceClient::connect(addr.to_string()).await.unwrap();
        let err = client.capture_status().await.unwrap_err();
        assert!(matches!(err, Error::Transport(msg) if msg.contains("unexpected 'cleared'")));
        assert_eq!(client.capture_status().await.unwrap().packet_count, 9);
    }
}
