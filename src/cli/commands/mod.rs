//! CLI command implementations.

pub mod analyze;
pub mod fix;
pub mod intent;
pub mod reset;
pub mod status;
