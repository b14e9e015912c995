//! Top-level facade crate for tally.
//!
//! Re-exports the core format and the probe library so users can depend on a single crate.

pub mod core {
    pub use tally_core::*;
}

pub mod probe {
    pub use tally_probe::*;
}
