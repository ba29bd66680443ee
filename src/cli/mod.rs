//! Command-line front end

pub mod commands;

pub use commands::{cmd_assemble, cmd_decode, cmd_merkle_root, cmd_ping, CliResult};
