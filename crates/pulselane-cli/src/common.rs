//! Shared helpers for CLI commands.

use std::error::Error;
use std::path::PathBuf;

use pulselane_core::storage::data_dir;
use pulselane_core::{EngineConfig, SessionRecord};

/// Path of the engine configuration file.
pub fn config_path() -> Result<PathBuf, Box<dyn Error>> {
    Ok(data_dir()?.join("config.toml"))
}

/// Load the engine configuration, falling back to defaults when no file
/// exists yet.
pub fn load_engine_config() -> Result<EngineConfig, Box<dyn Error>> {
    let path = config_path()?;
    if path.exists() {
        Ok(EngineConfig::load_from_path(&path)?)
    } else {
        Ok(EngineConfig::default())
    }
}

/// Read a session record from a JSON file.
pub fn load_record(path: &PathBuf) -> Result<SessionRecord, Box<dyn Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(SessionRecord::from_json(&raw)?)
}

/// Compact per-zone totals line, hottest zones last.
pub fn format_zone_totals(record: &SessionRecord) -> String {
    record
        .totals
        .per_zone
        .iter()
        .map(|(zone, coins)| format!("{}={coins:.0}", zone.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}
