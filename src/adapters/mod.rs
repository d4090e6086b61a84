//! Adapters binding the engine's ports to concrete systems.

pub mod http;
pub mod memory;
pub mod sqlite;
