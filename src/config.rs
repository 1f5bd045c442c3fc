#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_DATA_FILE: &str = "data/videos.json";
pub const DEFAULT_CHANNELS_FILE: &str = "channels.toml";
pub const DEFAULT_YT_DLP: &str = "yt-dlp";
pub const DEFAULT_COOLDOWN_SECS: u64 = 2;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 300;

/// Everything an update run needs besides the channel table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub data_file: PathBuf,
    pub channels_file: PathBuf,
    pub yt_dlp: PathBuf,
    /// Pause between two channel fetches.
    pub cooldown: Duration,
    /// Wall-clock limit for a single fetch.
    pub fetch_timeout: Duration,
    /// Newest N entries per channel; `None` fetches the whole list.
    pub fetch_limit: Option<usize>,
    pub user_agent: Option<String>,
}

/// Command-line values that win over the environment and the `.env` file.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub data_file: Option<PathBuf>,
    pub channels_file: Option<PathBuf>,
    pub cooldown_secs: Option<u64>,
    pub fetch_limit: Option<usize>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_runtime_settings(overrides: RuntimeOverrides) -> Result<RuntimeSettings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    Ok(build_runtime_settings(&file_vars, env_var_string, overrides))
}

fn build_runtime_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> RuntimeSettings {
    let lookup = |key: &str| lookup_value(key, file_vars, &env_lookup);
    let lookup_number = |key: &str| lookup(key).and_then(|value| value.parse::<u64>().ok());

    let data_file = overrides
        .data_file
        .or_else(|| lookup("VIDSHELF_DATA_FILE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE));
    let channels_file = overrides
        .channels_file
        .or_else(|| lookup("VIDSHELF_CHANNELS_FILE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CHANNELS_FILE));
    let yt_dlp = lookup("VIDSHELF_YT_DLP")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_YT_DLP));
    let cooldown_secs = overrides
        .cooldown_secs
        .or_else(|| lookup_number("VIDSHELF_COOLDOWN_SECS"))
        .unwrap_or(DEFAULT_COOLDOWN_SECS);
    let fetch_timeout_secs = lookup_number("VIDSHELF_FETCH_TIMEOUT_SECS")
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);
    let fetch_limit = overrides
        .fetch_limit
        .or_else(|| lookup_number("VIDSHELF_FETCH_LIMIT").map(|limit| limit as usize))
        .filter(|limit| *limit > 0);
    let user_agent = lookup("VIDSHELF_USER_AGENT");

    RuntimeSettings {
        data_file,
        channels_file,
        yt_dlp,
        cooldown: Duration::from_secs(cooldown_secs),
        fetch_timeout: Duration::from_secs(fetch_timeout_secs),
        fetch_limit,
        user_agent,
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(non_blank)
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Process environment first, then the `.env` file. Blank values count as
/// unset in both.
fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned().and_then(non_blank))
}

/// Reads `KEY=value` pairs. Comments, blank lines, `export` prefixes and
/// matching single or double quotes are handled; a missing file is empty.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    Ok(content.lines().filter_map(parse_env_line).collect())
}

fn parse_env_line(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, value_raw) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let value = value_raw.trim();
    let value = ['"', '\'']
        .iter()
        .find_map(|quote| value.strip_prefix(*quote)?.strip_suffix(*quote))
        .unwrap_or(value);
    Some((key.to_string(), value.to_string()))
}
