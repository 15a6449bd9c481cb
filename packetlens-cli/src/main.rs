use packetlens_capture::filters::capture_filter;
use packetlens_capture::{
    codec, CaptureEngine, CaptureSessionManager, PacketStore, PcapEngine, ReplayEngine,
    SessionConfig,
};
use packetlens_cli::{filter_state, parse_categories, Cli, Commands};
use packetlens_client::{CaptureView, PollEvent, PollerConfig, ServiceClient, StreamPoller};
use packetlens_core::filter::filter;
use packetlens_core::{CaptureRequest, CaptureStatus, Error, Result};
use packetlens_server::{CaptureServer, CaptureService, ServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let client = ServiceClient::new(cli.server.clone());

    match cli.command {
        Commands::Serve {
            bind,
            port,
            replay,
            replay_interval_ms,
            stop_grace_ms,
        } => {
            let engine: Arc<dyn CaptureEngine> = match replay {
                Some(path) => {
                    let records = codec::import_from_path(&path)?;
                    info!(path = %path.display(), packets = records.len(), "Serving replay");
                    Arc::new(
                        ReplayEngine::new(records)
                            .with_interval(Duration::from_millis(replay_interval_ms)),
                    )
                }
                None => Arc::new(PcapEngine::new()),
            };
            let config = SessionConfig {
                stop_grace: Duration::from_millis(stop_grace_ms),
            };
            let manager = Arc::new(CaptureSessionManager::with_config(
                engine,
                PacketStore::new(),
                config,
            ));

            let server_config = ServerConfig {
                bind_addr: bind,
                port,
            };
            let server = CaptureServer::bind(&server_config, CaptureService::new(manager)).await?;
            println!("packetlens listening on {}", server.local_addr()?);
            server.run_until(shutdown_signal()).await?;
        }

        Commands::Interfaces { connected } => {
            let interfaces = if connected {
                client.list_connected_interfaces().await?
            } else {
                client.list_interfaces().await?
            };
            for iface in interfaces {
                match &iface.description {
                    Some(desc) => println!("{}  - {}", iface, desc),
                    None => println!("{}", iface),
                }
            }
        }

        Commands::Start {
            interface,
            count,
            filter,
            only,
            ips,
            timeout,
            keep,
        } => {
            let expression = capture_filter(filter.as_deref(), &parse_categories(&only)?, &ips);

            let mut request = CaptureRequest::new(interface)
                .with_count_cap(count)
                .with_timeout(Duration::from_secs(timeout));
            if !expression.is_empty() {
                request = request.with_filter(expression);
            }
            if keep {
                request = request.keep_existing();
            }

            let status = client.start_capture(&request).await?;
            println!("Capture started");
            print_status(&status);
        }

        Commands::Stop => {
            let outcome = client.stop_capture().await?;
            if outcome.was_capturing {
                println!("Capture stopped ({} packets)", outcome.packet_count);
            } else {
                println!("No capture running ({} packets)", outcome.packet_count);
            }
        }

        Commands::Status => print_status(&client.capture_status().await?),

        Commands::Packets { offset, limit } => {
            let page = client.get_packets(offset, limit).await?;
            for packet in &page.packets {
                println!("{}", packet.summary_line());
            }
            println!("{} of {} packets", page.packets.len(), page.total);
        }

        Commands::Clear => {
            client.clear_packets().await?;
            println!("Packets cleared");
        }

        Commands::Export { path, only, ips } => {
            let subset = if only.is_empty() && ips.is_empty() {
                None
            } else {
                let state = filter_state(&only, &ips)?;
                let all = client.get_all_packets().await?;
                Some(filter(&all, &state).into_iter().cloned().collect())
            };
            let count = client.export_packets(path.clone(), subset).await?;
            println!("Exported {} packets to {}", count, path.display());
        }

        Commands::Import { path } => {
            let packets = client.import_packets(path.clone()).await?;
            println!("Imported {} packets from {}", packets.len(), path.display());
        }

        Commands::Watch {
            only,
            ips,
            interval_ms,
        } => {
            let state = filter_state(&only, &ips)?;
            watch(Arc::new(client), CaptureView::with_filter(state), interval_ms).await?;
        }

        Commands::Inspect { number } => {
            let offset = number as i64 - 1;
            let page = client.get_packets(offset, 1).await?;
            match page.packets.first() {
                Some(packet) => print!("{}", packet.describe()),
                None => return Err(Error::OutOfRange(offset)),
            }
        }
    }

    Ok(())
}

/// Print packets as they arrive until the capture ends or Ctrl-C
async fn watch(client: Arc<ServiceClient>, mut view: CaptureView, interval_ms: u64) -> Result<()> {
    let config = PollerConfig {
        interval: Duration::from_millis(interval_ms),
        ..PollerConfig::default()
    };
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = StreamPoller::with_config(client, config).spawn(move |event| {
        let _ = tx.send(event);
    });

    let mut printed = 0;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let interrupted = loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => printed = show(&mut view, event, printed),
                // Poller exited on its own
                None => break false,
            },
            _ = &mut ctrl_c => break true,
        }
    };

    let summary = if interrupted {
        let summary = handle.stop().await?;
        while let Some(event) = rx.recv().await {
            printed = show(&mut view, event, printed);
        }
        summary
    } else {
        handle.join().await?
    };

    let shown = view.visible().len();
    match view.status() {
        Some(status) => println!(
            "{} packets shown, {} captured ({})",
            shown, status.packet_count, status.state
        ),
        None => println!("No status received"),
    }
    info!(
        cycles = summary.cycles,
        skipped = summary.skipped_ticks,
        failures = summary.failures,
        "Watch finished"
    );
    Ok(())
}

/// Apply a poll event and print records not shown yet. Returns the highest
/// record number printed so far.
fn show(view: &mut CaptureView, event: PollEvent, mut printed: u64) -> u64 {
    let is_warning = matches!(event, PollEvent::ConnectivityWarning { .. });
    let is_restored = matches!(event, PollEvent::ConnectivityRestored);
    view.apply(event);

    if let Some(warning) = view.warning().filter(|_| is_warning) {
        eprintln!("warning: {}", warning);
    }
    if is_restored {
        eprintln!("connection to capture service restored");
    }

    // Numbering restarts after a clear or an import
    if view.packets().last().map_or(0, |p| p.number) < printed {
        printed = 0;
    }
    for packet in view.visible() {
        if packet.number > printed {
            println!("{}", packet.summary_line());
        }
    }
    view.visible().last().map_or(printed, |p| p.number.max(printed))
}

fn print_status(status: &CaptureStatus) {
    println!("State:     {}", status.state);
    if let Some(id) = &status.session_id {
        println!("Session:   {}", id);
    }
    if let Some(iface) = &status.interface {
        println!("Interface: {}", iface);
    }
    if let Some(filter) = &status.filter {
        println!("Filter:    {}", filter);
    }
    println!("Packets:   {}", status.packet_count);
    let stats = &status.stats;
    if stats.elapsed_ms > 0 {
        println!(
            "Captured:  {} packets, {} bytes in {:.1}s ({:.1} pkt/s)",
            stats.packets_captured,
            stats.bytes_captured,
            stats.elapsed_ms as f64 / 1000.0,
            stats.packets_per_second()
        );
    }
    if let Some(reason) = &status.stop_reason {
        println!("Stopped:   {}", reason);
    }
    if let Some(error) = &status.error {
        println!("Error:     {}", error);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
