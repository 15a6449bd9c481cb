//! packetlens core library
//!
//! Shared packet model, error taxonomy, wire messages and the pure view
//! logic (filtering and navigation) used by the capture service and its
//! clients.

pub mod error;
pub mod filter;
pub mod interface;
pub mod navigation;
pub mod packet;
pub mod protocol;
pub mod types;

// Re-export commonly used types
pub use error::{Error, ErrorCode, Result};
pub use filter::{FilterState, ProtocolCategory};
pub use interface::InterfaceInfo;
pub use navigation::Navigator;
pub use packet::{
    ApplicationInfo, ArpInfo, EthernetInfo, NetworkInfo, PacketRecord, TransportInfo,
};
pub use protocol::{Request, Response};
pub use types::*;
