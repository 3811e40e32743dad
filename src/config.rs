//! Persistent run configuration model and defaults.

use std::path::PathBuf;

/// Root configuration persisted to `genre_updater.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Catalogue database location and eligibility filter.
    pub database: DatabaseConfig,
    #[serde(default)]
    /// Lookup service identity and request pacing.
    pub lookup: LookupConfig,
    #[serde(default)]
    /// Genre allowlist, checkpoint file and failure budget.
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Catalogue database settings.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
    /// Value of the `songtype` column that marks a record as a song.
    #[serde(default = "default_song_type")]
    pub song_type: String,
}

/// Lookup service settings.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LookupConfig {
    #[serde(default = "default_lookup_base_url")]
    pub base_url: String,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_app_version")]
    pub app_version: String,
    #[serde(default = "default_contact")]
    pub contact: String,
    /// Fixed pause before every lookup request.
    #[serde(default = "default_pause_secs")]
    pub pause_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

/// Enrichment policy settings.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct EnrichmentConfig {
    /// Only these genres are ever written back to the catalogue.
    #[serde(default = "default_protected_genres")]
    pub protected_genres: Vec<String>,
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,
    /// The run aborts once the write-failure count exceeds this value.
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            song_type: default_song_type(),
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: default_lookup_base_url(),
            app_name: default_app_name(),
            app_version: default_app_version(),
            contact: default_contact(),
            pause_secs: default_pause_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_results: default_max_results(),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            protected_genres: default_protected_genres(),
            checkpoint_path: default_checkpoint_path(),
            error_threshold: default_error_threshold(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LookupConfig {
    /// User-Agent string required by the provider's usage policy.
    pub fn user_agent(&self) -> String {
        format!("{}/{} ( {} )", self.app_name, self.app_version, self.contact)
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("genre_updater").join("songs.db"))
        .unwrap_or_else(|| PathBuf::from("songs.db"))
}

fn default_song_type() -> String {
    "S".to_string()
}

fn default_lookup_base_url() -> String {
    "https://musicbrainz.org/ws/2".to_string()
}

fn default_app_name() -> String {
    "My Music App".to_string()
}

fn default_app_version() -> String {
    "0.1".to_string()
}

fn default_contact() -> String {
    "your@email.com".to_string()
}

fn default_pause_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_results() -> u32 {
    25
}

pub fn default_protected_genres() -> Vec<String> {
    ["Christmas", "art01", "fraser18", "dhr"]
        .iter()
        .map(|genre| genre.to_string())
        .collect()
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("processed.songs")
}

fn default_error_threshold() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::{default_protected_genres, Config};
    use std::path::PathBuf;

    #[test]
    fn test_default_config_has_expected_values() {
        let config = Config::default();

        assert_eq!(config.database.song_type, "S");
        assert!(config.database.path.ends_with("songs.db"));
        assert_eq!(config.lookup.base_url, "https://musicbrainz.org/ws/2");
        assert_eq!(config.lookup.pause_secs, 10);
        assert_eq!(config.lookup.request_timeout_secs, 30);
        assert_eq!(config.lookup.max_results, 25);
        assert_eq!(
            config.enrichment.protected_genres,
            vec!["Christmas", "art01", "fraser18", "dhr"]
        );
        assert_eq!(
            config.enrichment.checkpoint_path,
            PathBuf::from("processed.songs")
        );
        assert_eq!(config.enrichment.error_threshold, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_config_deserialization_fills_defaults() {
        let partial_toml = r#"
[lookup]
app_name = "Catalogue Sweeper"
contact = "ops@example.org"

[enrichment]
error_threshold = 5
"#;

        let parsed: Config = toml::from_str(partial_toml).expect("config should parse");
        assert_eq!(parsed.lookup.app_name, "Catalogue Sweeper");
        assert_eq!(parsed.lookup.app_version, "0.1");
        assert_eq!(parsed.lookup.pause_secs, 10);
        assert_eq!(parsed.enrichment.error_threshold, 5);
        assert_eq!(parsed.enrichment.protected_genres, default_protected_genres());
        assert_eq!(parsed.database.song_type, "S");
    }

    #[test]
    fn test_user_agent_carries_application_identity() {
        let config = Config::default();
        assert_eq!(
            config.lookup.user_agent(),
            "My Music App/0.1 ( your@email.com )"
        );
    }

    #[test]
    fn test_config_serialization_round_trips_through_toml() {
        let config_text =
            toml::to_string(&Config::default()).expect("default config should serialize");

        assert!(config_text.contains("[database]"));
        assert!(config_text.contains("[enrichment]"));
        let parsed: Config = toml::from_str(&config_text).expect("serialized config should parse");
        assert_eq!(parsed, Config::default());
    }
}
