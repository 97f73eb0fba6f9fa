use serde::{Deserialize, Serialize};
use std::fs;

use crate::paths;

/// Root configuration structure for shipper.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ShipperConfig {
    #[serde(default)]
    pub defaults: Defaults,
}

/// All configurable defaults that can be overridden via shipper.json
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Defaults {
    /// Per-step timeout when the pipeline does not set one.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Case-insensitive stderr substrings that turn a non-zero exit into a success.
    #[serde(default = "default_recoverable_patterns")]
    pub recoverable_patterns: Vec<String>,

    /// Maximum characters of stderr shown in a warning line.
    #[serde(default = "default_warning_excerpt_chars")]
    pub warning_excerpt_chars: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            recoverable_patterns: default_recoverable_patterns(),
            warning_excerpt_chars: default_warning_excerpt_chars(),
        }
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_timeout_secs() -> u64 {
    30
}

fn default_recoverable_patterns() -> Vec<String> {
    vec!["nothing to commit".to_string()]
}

fn default_warning_excerpt_chars() -> usize {
    200
}

// =============================================================================
// Loading functions
// =============================================================================

/// Load defaults, merging file config with built-in defaults.
/// If shipper.json is missing or invalid, silently returns built-in defaults.
pub fn load_defaults() -> Defaults {
    load_config().defaults
}

/// Load the full shipper.json config, falling back to defaults on any error.
pub fn load_config() -> ShipperConfig {
    load_config_from_file().unwrap_or_default()
}

/// Attempt to load config from shipper.json file.
fn load_config_from_file() -> crate::Result<ShipperConfig> {
    let path = paths::shipper_json()?;

    if !path.exists() {
        return Err(crate::Error::other("shipper.json not found"));
    }

    let content = fs::read_to_string(&path).map_err(|e| {
        crate::Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    parse_config(&content, &path.display().to_string())
}

fn parse_config(content: &str, path: &str) -> crate::Result<ShipperConfig> {
    serde_json::from_str(content).map_err(|e| crate::Error::config_invalid_json(path, e))
}

/// Save config to shipper.json file (creates if missing).
pub fn save_config(config: &ShipperConfig) -> crate::Result<()> {
    let path = paths::shipper_json()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            crate::Error::internal_io(e.to_string(), Some(format!("create {}", parent.display())))
        })?;
    }

    let content = serde_json::to_string_pretty(config).map_err(|e| {
        crate::Error::internal_json(e.to_string(), Some("serialize shipper.json".to_string()))
    })?;

    fs::write(&path, content).map_err(|e| {
        crate::Error::internal_io(e.to_string(), Some(format!("write {}", path.display())))
    })?;

    Ok(())
}

/// Check if shipper.json file exists
pub fn config_exists() -> bool {
    paths::shipper_json()
        .map(|p| p.exists())
        .unwrap_or(false)
}

/// Delete shipper.json file (reset to defaults)
pub fn reset_config() -> crate::Result<bool> {
    let path = paths::shipper_json()?;

    if path.exists() {
        fs::remove_file(&path).map_err(|e| {
            crate::Error::internal_io(e.to_string(), Some(format!("delete {}", path.display())))
        })?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Get the path to shipper.json (for display purposes)
pub fn config_path() -> crate::Result<String> {
    Ok(paths::shipper_json()?.display().to_string())
}

/// Get built-in defaults (ignoring any file config)
pub fn builtin_defaults() -> Defaults {
    Defaults::default()
}
