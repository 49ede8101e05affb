use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{BridgeError, Result};

/// Load and validate a TOML config file. Unlike the teacher's proxy config (which tolerates
/// a missing file and falls back to defaults at call sites), a missing or malformed bridge
/// config is a hard startup error: catalog paths and broker coordinates are load-bearing for
/// every connection the bridge accepts.
pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| BridgeError::Config(format!("failed to read config file: {e}")))?;
    let cfg: Config = toml::from_str(&txt)
        .map_err(|e| BridgeError::Config(format!("failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.packet_defs.paths.is_empty() && cfg.packet_defs.patterns.is_empty() {
        return Err(BridgeError::Config(
            "packet_defs must declare at least one path or pattern".to_string(),
        ));
    }
    if cfg.mqtt.client_id.trim().is_empty() {
        return Err(BridgeError::Config("mqtt.client_id must not be empty".to_string()));
    }
    Ok(())
}
