// ── Engram: Config Loader ───────────────────────────────────────────────────
//
// Resolves `engram.toml`:
//   1. explicit path (CLI flag or ENGRAM_CONFIG), which must exist
//   2. `<config_dir>/openengram/engram.toml`, used if present
//   3. built-in defaults
//
// Missing sections and keys fall back to defaults. The result is validated
// before it is returned; nothing is auto-corrected.

use crate::atoms::constants::{CONFIG_DIR_NAME, CONFIG_FILE_NAME};
use crate::atoms::engram_types::AppConfig;
use crate::atoms::error::{EngramError, EngramResult};
use std::path::{Path, PathBuf};

/// Platform config location: `~/.config/openengram/engram.toml` on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

pub fn parse_config(content: &str) -> EngramResult<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    config.engram.validate()?;
    Ok(config)
}

pub fn load_config(explicit: Option<&Path>) -> EngramResult<AppConfig> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) if p.is_file() => p,
            _ => {
                log::info!("[engram:config] No engram.toml found, using defaults");
                return Ok(AppConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path).map_err(|e| {
        EngramError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    let config = parse_config(&content)?;
    log::info!("[engram:config] Loaded {}", path.display());
    Ok(config)
}

/// Render a config the way `engram.toml` expects it.
pub fn to_toml(config: &AppConfig) -> EngramResult<String> {
    toml::to_string_pretty(config).map_err(|e| EngramError::Config(e.to_string()))
}
