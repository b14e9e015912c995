//! Probe config loader (strict parsing).

pub mod schema;

use std::fs;

use tally_core::error::{Error, Result};

pub use schema::{KindName, MetricConfig, ProbeConfig, ProbeSection};

pub fn load_from_file(path: &str) -> Result<ProbeConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| Error::InvalidDefinition(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ProbeConfig> {
    let cfg: ProbeConfig = serde_yaml::from_str(s)
        .map_err(|e| Error::InvalidDefinition(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
