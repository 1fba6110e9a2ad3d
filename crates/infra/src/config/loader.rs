//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Read `.env` into the process environment (existing variables win)
//! 2. Start from the first config file found, or from defaults when none is
//! 3. Apply `STORESYNC_*` environment overrides on top
//!
//! Every section of [`AppConfig`] is defaulted, so a partial file, a bare
//! environment, or nothing at all still yields a usable configuration.
//!
//! ## Environment Variables
//! - `STORESYNC_CONFIG`: explicit config file path (skips probing)
//! - `STORESYNC_DB_PATH`, `STORESYNC_DB_POOL_SIZE`
//! - `STORESYNC_UPSTREAM_ENABLED`, `STORESYNC_UPSTREAM_BASE_URL`,
//!   `STORESYNC_UPSTREAM_TOKEN`, `STORESYNC_UPSTREAM_PAGE_LIMIT`,
//!   `STORESYNC_UPSTREAM_SINCE_MS`
//! - `STORESYNC_DOWNSTREAM_ENABLED`, `STORESYNC_DOWNSTREAM_BASE_URL`,
//!   `STORESYNC_DOWNSTREAM_API_KEY`, `STORESYNC_DOWNSTREAM_RATE_LIMIT`,
//!   `STORESYNC_DOWNSTREAM_PAGE_SIZE`
//! - `STORESYNC_HTTP_TIMEOUT_SECS`, `STORESYNC_HTTP_RETRIES`,
//!   `STORESYNC_HTTP_RETRY_BACKOFF_MS`
//! - `STORESYNC_CIRCUIT_FAILURE_THRESHOLD`, `STORESYNC_CIRCUIT_OPEN_SECS`
//! - `STORESYNC_RETRY_MAX_ATTEMPTS`, `STORESYNC_RETRY_INTERVAL_SECS`
//! - `STORESYNC_LOG_LEVEL`, `STORESYNC_LOG_JSON`
//!
//! ## File Locations
//! Probed in order, first match wins: `storesync.toml`, `storesync.json`,
//! `config.toml`, `config.json` in the working directory, its parent, and
//! next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use storesync_domain::{AppConfig, Result, StoreSyncError};

const FILE_NAMES: [&str; 4] = ["storesync.toml", "storesync.json", "config.toml", "config.json"];

/// Load configuration from `.env`, an optional file, and the environment.
///
/// # Errors
/// Returns `StoreSyncError::Config` when a config file is present but
/// unreadable or malformed, or an override variable does not parse.
pub fn load() -> Result<AppConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    let explicit = std::env::var("STORESYNC_CONFIG").ok().map(PathBuf::from);
    let mut config = match explicit.or_else(probe_config_paths) {
        Some(path) => load_from_file(&path)?,
        None => {
            tracing::debug!("no config file found; starting from defaults");
            AppConfig::default()
        }
    };

    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Parse a config file; the format follows the extension.
///
/// # Errors
/// Returns `StoreSyncError::Config` if the file is missing, unreadable,
/// or not valid TOML/JSON.
pub fn load_from_file(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Err(StoreSyncError::Config(format!("config file not found: {}", path.display())));
    }
    tracing::info!(path = %path.display(), "loading configuration file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| StoreSyncError::Config(format!("failed to read config file: {e}")))?;
    parse_config(&contents, path)
}

fn parse_config(contents: &str, path: &Path) -> Result<AppConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| StoreSyncError::Config(format!("invalid TOML config: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| StoreSyncError::Config(format!("invalid JSON config: {e}"))),
        other => Err(StoreSyncError::Config(format!("unsupported config format: {other}"))),
    }
}

/// First existing config file among the probed locations.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.join(".."));
        dirs.insert(0, cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Overlay `STORESYNC_*` variables onto `config`.
///
/// # Errors
/// Returns `StoreSyncError::Config` naming the variable that failed to parse.
pub fn apply_env_overrides(config: &mut AppConfig) -> Result<()> {
    override_string("STORESYNC_DB_PATH", &mut config.database.path);
    override_parsed("STORESYNC_DB_POOL_SIZE", &mut config.database.pool_size)?;

    override_bool("STORESYNC_UPSTREAM_ENABLED", &mut config.upstream.enabled);
    override_string("STORESYNC_UPSTREAM_BASE_URL", &mut config.upstream.base_url);
    override_optional("STORESYNC_UPSTREAM_TOKEN", &mut config.upstream.token);
    override_parsed("STORESYNC_UPSTREAM_PAGE_LIMIT", &mut config.upstream.page_limit)?;
    override_parsed("STORESYNC_UPSTREAM_SINCE_MS", &mut config.upstream.since_ms)?;

    override_bool("STORESYNC_DOWNSTREAM_ENABLED", &mut config.downstream.enabled);
    override_string("STORESYNC_DOWNSTREAM_BASE_URL", &mut config.downstream.base_url);
    override_optional("STORESYNC_DOWNSTREAM_API_KEY", &mut config.downstream.api_key);
    override_parsed("STORESYNC_DOWNSTREAM_RATE_LIMIT", &mut config.downstream.rate_limit_per_minute)?;
    override_parsed("STORESYNC_DOWNSTREAM_PAGE_SIZE", &mut config.downstream.page_size)?;

    override_parsed("STORESYNC_HTTP_TIMEOUT_SECS", &mut config.http.timeout_secs)?;
    override_parsed("STORESYNC_HTTP_RETRIES", &mut config.http.retries)?;
    override_parsed("STORESYNC_HTTP_RETRY_BACKOFF_MS", &mut config.http.retry_backoff_ms)?;

    override_parsed("STORESYNC_CIRCUIT_FAILURE_THRESHOLD", &mut config.circuit.failure_threshold)?;
    override_parsed("STORESYNC_CIRCUIT_OPEN_SECS", &mut config.circuit.open_secs)?;

    override_parsed("STORESYNC_RETRY_MAX_ATTEMPTS", &mut config.retry.max_attempts)?;
    override_parsed("STORESYNC_RETRY_INTERVAL_SECS", &mut config.retry.interval_secs)?;

    override_string("STORESYNC_LOG_LEVEL", &mut config.logging.level);
    override_bool("STORESYNC_LOG_JSON", &mut config.logging.json);
    Ok(())
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn override_string(key: &str, target: &mut String) {
    if let Some(value) = env_value(key) {
        *target = value;
    }
}

fn override_optional(key: &str, target: &mut Option<String>) {
    if let Some(value) = env_value(key) {
        *target = Some(value);
    }
}

fn override_parsed<T>(key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(value) = env_value(key) {
        *target = value
            .parse()
            .map_err(|e| StoreSyncError::Config(format!("invalid value for {key}: {e}")))?;
    }
    Ok(())
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
fn override_bool(key: &str, target: &mut bool) {
    if let Some(value) = env_value(key) {
        *target = matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
    }
}
