//! Load the `[route_refresh]` table from `$XDG_CONFIG_HOME/<app>/config.toml`.

use std::path::{Path, PathBuf};

use crate::{LoadError, RefreshSettings};

/// `$XDG_CONFIG_HOME` wins over the platform config dir so tests and containers can redirect it.
fn config_home() -> Result<PathBuf, LoadError> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir().ok_or_else(|| LoadError::XdgPath("no config directory for this platform".into()))
}

fn xdg_config_path(app_name: &str) -> Result<Option<PathBuf>, LoadError> {
    let path = config_home()?.join(app_name).join("config.toml");
    if path.is_file() {
        Ok(Some(path))
    } else {
        Ok(None)
    }
}

#[derive(serde::Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    route_refresh: RefreshSettings,
}

/// Parses `[route_refresh]` out of a config file. A file without the table yields defaults.
pub(crate) fn load_file(path: &Path) -> Result<RefreshSettings, LoadError> {
    let content = std::fs::read_to_string(path).map_err(LoadError::XdgRead)?;
    let config: ConfigFile = toml::from_str(&content)?;
    Ok(config.route_refresh)
}

/// Settings from the XDG config file of `app_name`. Missing file returns defaults.
pub(crate) fn load_settings(app_name: &str) -> Result<RefreshSettings, LoadError> {
    match xdg_config_path(app_name)? {
        Some(path) => load_file(&path),
        None => Ok(RefreshSettings::default()),
    }
}
