//! tally core: in-memory metrics exchange format.
//!
//! A producer (`Metrics`) lays out typed, named, described metrics in one
//! memory block; any number of viewers (`View`), in other threads or other
//! processes mapping the same bytes, read the metadata and live values
//! without copying values or taking locks.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Foreign or corrupted blocks surface as `Error`/`Result` instead of
//! crashing the reader.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod block;
pub mod error;
pub mod info;
pub mod json;
pub mod kind;
pub mod metrics;
pub mod protocol;
mod slot;
pub mod view;

pub use block::Block;
pub use error::{Error, ErrorCode, Result};
pub use info::{Category, EnumLabel, MetricInfo};
pub use json::{to_json, to_json_slim, MetricSource};
pub use kind::{Kind, Value};
pub use metrics::{Metrics, Slot};
pub use protocol::{block_size, parse_metadata, PROTOCOL_VERSION};
pub use view::View;
