use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::game::GameType;

/// a saved session: game paths, plugin state and the conditions to check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub game: GameType,
    pub data_path: PathBuf,
    pub local_path: PathBuf,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_data_paths: Vec<PathBuf>,
    #[serde(default)]
    pub active_plugins: Vec<String>,
    /// plugin name to version string
    #[serde(default)]
    pub plugin_versions: BTreeMap<String, String>,
    /// plugin name to CRC-32, written in hexadecimal
    #[serde(default)]
    pub plugin_crcs: BTreeMap<String, String>,
    /// conditions expected to parse
    #[serde(default)]
    pub conditions: Vec<String>,
}

impl SessionConfig {
    pub fn new(game: GameType, data_path: impl Into<PathBuf>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            game,
            data_path: data_path.into(),
            local_path: local_path.into(),
            additional_data_paths: Vec::new(),
            active_plugins: Vec::new(),
            plugin_versions: BTreeMap::new(),
            plugin_crcs: BTreeMap::new(),
            conditions: Vec::new(),
        }
    }
}

/// parse a checksum as written in config files, with or without a `0x` prefix
pub fn parse_crc(value: &str) -> Result<u32, String> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);

    if digits.is_empty() || digits.len() > 8 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!(
            "invalid checksum '{}': expected 1 to 8 hexadecimal digits",
            value
        ));
    }

    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid checksum '{}': {}", value, e))
}
