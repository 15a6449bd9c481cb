//! Simple capture server example
//!
//! Serves a replay engine, so no capture privileges are needed.
//!
//! Usage:
//!   cargo run --example simple_server
//!
//! Then send a request:
//!   echo '{"op":"start_capture","interface":"replay0"}' | nc localhost 8000

use packetlens_capture::{CaptureSessionManager, ReplayEngine};
use packetlens_core::PacketRecord;
use packetlens_server::{CaptureServer, CaptureService, ServerConfig};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let samples = ["TCP", "UDP", "DNS", "ARP", "HTTP"]
        .iter()
        .map(|p| PacketRecord::new("2024-01-01 12:00:00.000000", 60, *p))
        .collect();
    let engine = ReplayEngine::new(samples)
        .repeating()
        .with_interval(Duration::from_millis(200));

    let manager = Arc::new(CaptureSessionManager::new(Arc::new(engine)));
    let config = ServerConfig::default();
    let server = CaptureServer::bind(&config, CaptureService::new(manager)).await?;

    println!("Listening on {}. Press Ctrl+C to stop.", server.local_addr()?);

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
