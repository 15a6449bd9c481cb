//! CLI argument parsing

use clap::{Parser, Subcommand};
use packetlens_client::DEFAULT_SERVER_ADDR;
use packetlens_core::{FilterState, ProtocolCategory, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "packetlens")]
#[command(version, about = "Packet capture service and live viewer", long_about = None)]
pub struct Cli {
    /// Address of the capture service
    #[arg(short = 's', long, global = true, default_value = DEFAULT_SERVER_ADDR)]
    pub server: String,

    /// Verbose output (-v, -vv, -vvv for increasing verbosity)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the capture service
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,

        /// Port to listen on
        #[arg(short, long, default_value_t = 8000)]
        port: u16,

        /// Serve records from a capture file instead of live interfaces
        #[arg(long, value_name = "FILE")]
        replay: Option<PathBuf>,

        /// Delay between replayed records
        #[arg(long, value_name = "MS", default_value_t = 100)]
        replay_interval_ms: u64,

        /// Time a stop waits for the capture to drain
        #[arg(long, value_name = "MS", default_value_t = 2000)]
        stop_grace_ms: u64,
    },

    /// List capture interfaces
    Interfaces {
        /// Only interfaces that are up and have an address
        #[arg(short, long)]
        connected: bool,
    },

    /// Start a capture
    Start {
        /// Interface to capture on
        #[arg(short, long)]
        interface: String,

        /// Stop after this many packets (0 = no limit)
        #[arg(short = 'c', long, default_value_t = 0)]
        count: u64,

        /// BPF capture filter
        #[arg(short, long)]
        filter: Option<String>,

        /// Only capture these categories (tcp,udp,http,dns,icmp,arp,tls,stp,vrrp,pim,other)
        #[arg(long, value_delimiter = ',', value_name = "CATEGORIES")]
        only: Vec<String>,

        /// Only capture traffic to or from this address (repeatable)
        #[arg(long = "ip", value_name = "ADDR")]
        ips: Vec<String>,

        /// Stop after this many seconds (0 = no timeout)
        #[arg(short, long, value_name = "SECONDS", default_value_t = 0)]
        timeout: u64,

        /// Keep previously captured packets
        #[arg(long)]
        keep: bool,
    },

    /// Stop the running capture
    Stop,

    /// Show capture status
    Status,

    /// List captured packets
    Packets {
        /// Index of the first packet
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        offset: i64,

        /// Maximum number of packets
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },

    /// Discard captured packets
    Clear,

    /// Write captured packets to a file on the service host
    Export {
        /// Destination file
        path: PathBuf,

        /// Only export these categories
        #[arg(long, value_delimiter = ',', value_name = "CATEGORIES")]
        only: Vec<String>,

        /// Only export packets to or from this address (repeatable)
        #[arg(long = "ip", value_name = "ADDR")]
        ips: Vec<String>,
    },

    /// Replace captured packets with the contents of a file on the service host
    Import {
        /// Capture file
        path: PathBuf,
    },

    /// Follow a running capture
    Watch {
        /// Only show these categories
        #[arg(long, value_delimiter = ',', value_name = "CATEGORIES")]
        only: Vec<String>,

        /// Only show packets to or from this address (repeatable)
        #[arg(long = "ip", value_name = "ADDR")]
        ips: Vec<String>,

        /// Poll interval
        #[arg(long, value_name = "MS", default_value_t = 500)]
        interval_ms: u64,
    },

    /// Show one packet layer by layer
    Inspect {
        /// Packet number
        number: u64,
    },
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Parse category names given on the command line
pub fn parse_categories(names: &[String]) -> Result<Vec<ProtocolCategory>> {
    names
        .iter()
        .filter(|n| !n.trim().is_empty())
        .map(|n| n.parse())
        .collect()
}

/// Build a display filter from `--only` and `--ip` flags.
///
/// No `--only` means every category is shown.
pub fn filter_state(only: &[String], ips: &[String]) -> Result<FilterState> {
    let categories = parse_categories(only)?;
    let mut state = if categories.is_empty() {
        FilterState::default()
    } else {
        FilterState::only(categories)
    };
    for ip in ips {
        state.add_ip(ip.as_str());
    }
    Ok(state)
}
