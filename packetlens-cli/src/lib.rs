//! Command-line front end for packetlens
//!
//! This crate provides argument parsing for the `packetlens` binary, which
//! runs the capture service and talks to it as a client.

pub mod args;

pub use args::{filter_state, parse_categories, Cli, Commands};
