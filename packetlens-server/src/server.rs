//! JSON-lines TCP server for the capture service
//!
//! Each connection carries newline-delimited JSON: one [`Request`] per line
//! in, one [`Response`] per line out. All connections share one
//! [`CaptureService`], and therefore one capture session.

use packetlens_core::protocol::{decode_line, encode_line};
use packetlens_core::{Error, ErrorCode, Request, Response, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::service::CaptureService;

/// Default bind address
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";

/// Default port
pub const DEFAULT_PORT: u16 = 8000;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address
    pub bind_addr: String,
    /// Port to listen on (0 picks a free port)
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// `host:port` string to bind
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

/// Capture service bound to a TCP listener
pub struct CaptureServer {
    listener: TcpListener,
    service: CaptureService,
    client_count: Arc<AtomicUsize>,
}

impl CaptureServer {
    /// Bind the listener
    pub async fn bind(config: &ServerConfig, service: CaptureService) -> Result<Self> {
        let listener = TcpListener::bind(config.addr()).await?;
        Ok(Self {
            listener,
            service,
            client_count: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Address actually bound
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Number of connected clients
    pub fn client_count(&self) -> usize {
        self.client_count.load(Ordering::Relaxed)
    }

    /// Serve until the process ends
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Serve until `shutdown` resolves, then stop any running capture and
    /// drop every connection
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        info!(addr = %addr, "packetlens server listening");

        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => {
                        info!(peer = %peer_addr, "New connection");
                        self.client_count.fetch_add(1, Ordering::Relaxed);

                        let service = self.service.clone();
                        let client_count = Arc::clone(&self.client_count);
                        connections.spawn(async move {
                            if let Err(e) = handle_client(socket, peer_addr, service).await {
                                error!(peer = %peer_addr, error = %e, "Error handling client");
                            }
                            client_count.fetch_sub(1, Ordering::Relaxed);
                            info!(peer = %peer_addr, "Client disconnected");
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                },
                // Reap finished connection tasks
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        connections.abort_all();
        let outcome = self.service.manager().stop().await;
        if outcome.was_capturing {
            info!(packets = outcome.packet_count, "Stopped capture on shutdown");
        }
        Ok(())
    }
}

/// Serve one connection until the peer closes it
async fn handle_client(socket: TcpStream, peer_addr: SocketAddr, service: CaptureService) -> Result<()> {
    let (reader, mut writer) = socket.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            debug!(peer = %peer_addr, "Client closed connection");
            break;
        }

        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        let response = match decode_line::<Request>(text) {
            Ok(request) => service.handle(request).await,
            Err(e) => {
                debug!(peer = %peer_addr, error = %e, "Bad request line");
                bad_request(&e)
            }
        };

        writer.write_all(encode_line(&response)?.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

fn bad_request(err: &Error) -> Response {
    Response::Error {
        code: ErrorCode::BadRequest,
        message: err.to_string(),
    }
}
