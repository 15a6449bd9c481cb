//! Example: List network interfaces
//!
//! Run with: cargo run --example list_interfaces

use packetlens_capture::{list_connected_interfaces, list_interfaces};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== All Network Interfaces ===\n");

    for iface in &list_interfaces()? {
        println!("Interface: {}", iface.name);
        if let Some(ref description) = iface.description {
            println!("  Description: {}", description);
        }
        if let Some(ref mac) = iface.mac {
            println!("  MAC Address: {}", mac);
        }

        println!("  Addresses:");
        for addr in &iface.addresses {
            println!("    - {}", addr);
        }

        println!("  Up: {}  Loopback: {}  Connected: {}", iface.is_up, iface.is_loopback, iface.is_connected());
        println!();
    }

    println!("=== Connected Interfaces ===\n");
    for iface in &list_connected_interfaces()? {
        println!("  {}", iface);
    }

    Ok(())
}
