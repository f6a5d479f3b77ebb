//! Load route refresh settings from XDG `config.toml`, project `.env` and the process
//! environment, with priority **existing env > .env > XDG**.
//!
//! The XDG file uses a `[route_refresh]` table:
//!
//! ```toml
//! [route_refresh]
//! interval_ms = 120000
//! max_retries = 2
//! stale_data_timeout_ms = 30000
//! request_timeout_ms = 120000
//! ```
//!
//! `.env` and the environment use the `ROUTE_REFRESH_*` keys ([`ENV_INTERVAL_MS`] and friends).
//! Values that are absent everywhere stay `None`; callers apply their own defaults.

mod dotenv;
mod xdg_toml;

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

/// Prefix shared by every environment key this crate reads.
pub const ENV_PREFIX: &str = "ROUTE_REFRESH_";
pub const ENV_INTERVAL_MS: &str = "ROUTE_REFRESH_INTERVAL_MS";
pub const ENV_MAX_RETRIES: &str = "ROUTE_REFRESH_MAX_RETRIES";
pub const ENV_STALE_DATA_TIMEOUT_MS: &str = "ROUTE_REFRESH_STALE_DATA_TIMEOUT_MS";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "ROUTE_REFRESH_REQUEST_TIMEOUT_MS";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("xdg config path: {0}")]
    XdgPath(String),
    #[error("read xdg config: {0}")]
    XdgRead(std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    DotenvRead(std::io::Error),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Raw refresh settings. Every field is optional so layers can be merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RefreshSettings {
    pub interval_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub stale_data_timeout_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
}

impl RefreshSettings {
    /// Fields set in `over` replace the ones in `self`.
    pub fn overlay(self, over: RefreshSettings) -> RefreshSettings {
        RefreshSettings {
            interval_ms: over.interval_ms.or(self.interval_ms),
            max_retries: over.max_retries.or(self.max_retries),
            stale_data_timeout_ms: over.stale_data_timeout_ms.or(self.stale_data_timeout_ms),
            request_timeout_ms: over.request_timeout_ms.or(self.request_timeout_ms),
        }
    }

    /// Builds settings from `ROUTE_REFRESH_*` key/value pairs.
    pub fn from_env_map(map: &HashMap<String, String>) -> Result<RefreshSettings, LoadError> {
        Ok(RefreshSettings {
            interval_ms: parse_key(map, ENV_INTERVAL_MS)?,
            max_retries: parse_key(map, ENV_MAX_RETRIES)?,
            stale_data_timeout_ms: parse_key(map, ENV_STALE_DATA_TIMEOUT_MS)?,
            request_timeout_ms: parse_key(map, ENV_REQUEST_TIMEOUT_MS)?,
        })
    }
}

fn parse_key<T: FromStr>(
    map: &HashMap<String, String>,
    key: &'static str,
) -> Result<Option<T>, LoadError> {
    match map.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| LoadError::InvalidValue {
                key,
                value: raw.clone(),
            }),
    }
}

fn process_env_map() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with(ENV_PREFIX))
        .collect()
}

/// Loads settings for `app_name` (XDG path `~/.config/<app_name>/config.toml`).
///
/// * `override_dir`: if `Some`, look for `.env` in this directory instead of the current one.
pub fn load_settings(app_name: &str, override_dir: Option<&Path>) -> Result<RefreshSettings, LoadError> {
    let xdg = xdg_toml::load_settings(app_name)?;
    let dotenv = dotenv::load_env_map(override_dir).map_err(LoadError::DotenvRead)?;
    let dotenv = RefreshSettings::from_env_map(&dotenv)?;
    let env = RefreshSettings::from_env_map(&process_env_map())?;
    Ok(xdg.overlay(dotenv).overlay(env))
}

/// Same as [`load_settings`] but reads an explicit config file instead of the XDG one.
pub fn load_settings_from_file(
    config_file: &Path,
    override_dir: Option<&Path>,
) -> Result<RefreshSettings, LoadError> {
    let file = xdg_toml::load_file(config_file)?;
    let dotenv = dotenv::load_env_map(override_dir).map_err(LoadError::DotenvRead)?;
    let dotenv = RefreshSettings::from_env_map(&dotenv)?;
    let env = RefreshSettings::from_env_map(&process_env_map())?;
    Ok(file.overlay(dotenv).overlay(env))
}
