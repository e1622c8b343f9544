mod schema;

pub use schema::{parse_crc, SessionConfig};

use anyhow::{anyhow, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::conditions::parse_condition;
use crate::session::{Entries, Session};

const CONFIG_ENV_VAR: &str = "CONDITION_INTERPRETER_CONFIG";

pub fn get_config_path() -> Result<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }

    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not find config directory"))?
        .join("condition-interpreter")
        .join("session.json"))
}

pub fn load(path: &Path) -> Result<SessionConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: SessionConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

pub fn save(config: &SessionConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config).context("Failed to serialize config")?;

    fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    Ok(())
}

/// Verify a session file and return a list of problems
pub fn verify(path: &Path) -> Result<Vec<String>> {
    let mut errors = Vec::new();

    if !path.exists() {
        return Err(anyhow!("config file not found: {}", path.display()));
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: SessionConfig = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            return Err(anyhow!("invalid JSON: {}", e));
        }
    };

    for (name, crc) in &config.plugin_crcs {
        if let Err(e) = parse_crc(crc) {
            errors.push(format!("plugin_crcs[{}]: {}", name, e));
        }
    }

    for (i, condition) in config.conditions.iter().enumerate() {
        if let Err(e) = parse_condition(condition) {
            errors.push(format!("conditions[{}]: {}", i, e));
        }
    }

    Ok(errors)
}

impl SessionConfig {
    /// create a session with this config's paths and plugin state
    pub fn into_session(self) -> Result<Session> {
        let crcs = self
            .plugin_crcs
            .iter()
            .map(|(name, crc)| {
                parse_crc(crc)
                    .map(|crc| (name.as_str(), crc))
                    .map_err(|e| anyhow!("plugin_crcs[{}]: {}", name, e))
            })
            .collect::<Result<Vec<_>>>()?;

        let versions: Vec<(&str, &str)> = self
            .plugin_versions
            .iter()
            .map(|(name, version)| (name.as_str(), version.as_str()))
            .collect();

        let session = Session::new(self.game, &self.data_path, &self.local_path)
            .with_additional_data_paths(self.additional_data_paths.clone());

        session
            .set_active_plugins(Entries::from(&self.active_plugins))
            .context("Failed to set active plugins")?;
        session
            .set_plugin_versions(Entries::from(&versions))
            .context("Failed to set plugin versions")?;
        session
            .set_crc_cache(Entries::from(&crcs))
            .context("Failed to set plugin checksums")?;

        Ok(session)
    }
}
