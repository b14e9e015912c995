//! tally probe library entry.
//!
//! Loads a metric schema from YAML, publishes it through a `tally_core`
//! block and keeps the values moving. Consumed by the binary (`main.rs`)
//! and by integration tests.

pub mod config;
pub mod probe;
