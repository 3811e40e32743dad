use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::Config;

const CONFIG_PATH_ENV: &str = "GENRE_UPDATER_CONFIG";
const DATABASE_PATH_ENV: &str = "SONGS_DB_PATH";
const CHECKPOINT_PATH_ENV: &str = "GENRE_UPDATER_CHECKPOINT";
const PAUSE_SECS_ENV: &str = "GENRE_UPDATER_PAUSE_SECS";
const CONFIG_FILE_NAME: &str = "genre_updater.toml";

/// Resolves the config file path from the environment or the platform config dir.
pub fn config_file_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Writes a default config file when none exists yet.
pub fn ensure_config_file(path: &Path) -> Result<(), String> {
    if path.exists() {
        return Ok(());
    }
    info!(
        "Config file not found. Creating default config. path={}",
        path.display()
    );
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| {
            format!(
                "failed to create config directory {}: {}",
                parent.display(),
                err
            )
        })?;
    }
    let config_text = toml::to_string(&Config::default())
        .map_err(|err| format!("failed to serialize default config: {err}"))?;
    std::fs::write(path, config_text)
        .map_err(|err| format!("failed to write config to {}: {}", path.display(), err))
}

/// Reads a config file, falling back to defaults when it cannot be parsed.
pub fn load_config_file(path: &Path) -> Config {
    let config_content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!(
                "Failed to read config file {}. Using defaults. error={}",
                path.display(),
                err
            );
            return Config::default();
        }
    };

    match toml::from_str::<Config>(&config_content) {
        Ok(config) => config,
        Err(err) => {
            warn!(
                "Failed to parse config file {}. Using defaults. error={}",
                path.display(),
                err
            );
            Config::default()
        }
    }
}

/// Applies environment overrides using the supplied variable lookup.
pub fn apply_env_overrides<F>(mut config: Config, lookup_var: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup_var(DATABASE_PATH_ENV).filter(|value| !value.trim().is_empty()) {
        config.database.path = PathBuf::from(path);
    }
    if let Some(path) = lookup_var(CHECKPOINT_PATH_ENV).filter(|value| !value.trim().is_empty()) {
        config.enrichment.checkpoint_path = PathBuf::from(path);
    }
    if let Some(raw) = lookup_var(PAUSE_SECS_ENV) {
        match raw.trim().parse::<u64>() {
            Ok(pause_secs) => config.lookup.pause_secs = pause_secs,
            Err(err) => warn!("Ignoring {PAUSE_SECS_ENV}={raw:?}: {err}"),
        }
    }
    config
}

/// Clamps values into usable ranges and dedupes the genre allowlist.
pub fn sanitize_config(mut config: Config) -> Config {
    config.lookup.request_timeout_secs = config.lookup.request_timeout_secs.max(1);
    config.lookup.max_results = config.lookup.max_results.clamp(1, 100);

    let mut seen = HashSet::new();
    config.enrichment.protected_genres = config
        .enrichment
        .protected_genres
        .into_iter()
        .map(|genre| genre.trim().to_string())
        .filter(|genre| !genre.is_empty() && seen.insert(genre.to_lowercase()))
        .collect();
    config
}

/// Creates, loads, overrides and sanitizes the run configuration.
pub fn load_runtime_config(path: &Path) -> Result<Config, String> {
    ensure_config_file(path)?;
    let config = load_config_file(path);
    let config = apply_env_overrides(config, |key| std::env::var(key).ok());
    Ok(sanitize_config(config))
}
