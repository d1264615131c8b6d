//! Runtime module: boot, stdin replay, shutdown.

pub mod boot;
pub mod replay;
