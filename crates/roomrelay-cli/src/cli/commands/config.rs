//! `roomrelay config` – show where config lives and what is in effect.

use anyhow::Result;
use roomrelay_core::config::{self, RelayConfig};
use roomrelay_core::logging;
use std::path::Path;

pub fn run_config(cfg: &RelayConfig, explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => config::config_path()?,
    };
    println!("# config: {}", path.display());
    if let Ok(log) = logging::log_path() {
        println!("# log:    {}", log.display());
    }
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
