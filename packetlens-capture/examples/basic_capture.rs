//! Example: Capture packets on an interface and print them
//!
//! Run with: sudo cargo run --example basic_capture -- eth0

use packetlens_capture::{CaptureSessionManager, PcapEngine};
use packetlens_core::CaptureRequest;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let interface = std::env::args().nth(1).unwrap_or_else(|| "eth0".to_string());
    let manager = CaptureSessionManager::new(Arc::new(PcapEngine::new()));

    let request = CaptureRequest::new(interface)
        .with_count_cap(20)
        .with_timeout(Duration::from_secs(10));
    manager.start(request).await?;

    while manager.is_capturing() {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    let status = manager.status();
    println!(
        "Captured {} packets, stopped by {}",
        status.packet_count,
        status.stop_reason.map(|r| r.to_string()).unwrap_or_default()
    );
    for packet in manager.store().snapshot() {
        println!("{}", packet.summary_line());
    }

    Ok(())
}
