// Module layout for the pktview packet-log viewer core.

// Core model
pub mod error;
pub mod log;
pub mod unit;
pub mod decoder;

// Decode pipeline
pub mod cache;
pub mod registry;
pub mod scheduler;

// Session and its surroundings
pub mod session;
pub mod host;
pub mod conf;
pub mod protocols;
pub mod runtime;

#[cfg(test)]
mod testing;
