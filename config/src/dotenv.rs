//! Read `ROUTE_REFRESH_*` entries from a project `.env` file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::ENV_PREFIX;

/// `override_dir` if given, else the current directory.
fn dotenv_path(override_dir: Option<&Path>) -> Option<PathBuf> {
    let dir = override_dir
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok())?;
    let path = dir.join(".env");
    path.is_file().then_some(path)
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        return value[1..value.len() - 1].replace("\\\"", "\"");
    }
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].to_string();
    }
    value.to_string()
}

/// One `KEY=VALUE` line; `export KEY=VALUE` is accepted. Comments and blanks yield `None`.
fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), unquote(value.trim())))
}

/// Keys outside the `ROUTE_REFRESH_` namespace are ignored.
fn parse_dotenv(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .filter_map(parse_line)
        .filter(|(key, _)| key.starts_with(ENV_PREFIX))
        .collect()
}

/// Missing file returns an empty map.
pub(crate) fn load_env_map(override_dir: Option<&Path>) -> std::io::Result<HashMap<String, String>> {
    match dotenv_path(override_dir) {
        Some(path) => Ok(parse_dotenv(&std::fs::read_to_string(path)?)),
        None => Ok(HashMap::new()),
    }
}
