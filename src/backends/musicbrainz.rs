//! MusicBrainz recording-search adapter.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::state::NotKeyed;
use governor::{Quota, RateLimiter};
use log::debug;
use serde_json::Value;

use crate::backends::LookupService;
use crate::config::LookupConfig;

/// Provider policy: at most one request per second per client.
const PROVIDER_MIN_INTERVAL: Duration = Duration::from_secs(1);
const LIMITER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// MusicBrainz adapter backed by `ureq`.
pub struct MusicBrainzClient {
    http_client: ureq::Agent,
    base_url: String,
    user_agent: String,
    max_results: u32,
    limiter: RateLimiter<NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>,
}

impl MusicBrainzClient {
    /// Creates a client carrying the configured application identity.
    pub fn new(config: &LookupConfig) -> Self {
        let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5).min(timeout))
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();

        Self {
            http_client,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            user_agent: config.user_agent(),
            max_results: config.max_results,
            limiter: RateLimiter::direct(
                Quota::with_period(PROVIDER_MIN_INTERVAL)
                    .expect("valid limiter period")
                    .allow_burst(NonZeroU32::new(1).expect("non-zero limiter burst")),
            ),
        }
    }

    fn escape_query_value(value: &str) -> String {
        let mut escaped = String::with_capacity(value.len());
        for ch in value.chars() {
            if ch == '"' || ch == '\\' {
                escaped.push('\\');
            }
            escaped.push(ch);
        }
        escaped
    }

    /// Lucene query matching both the artist and the recording title.
    fn recording_query(artist: &str, title: &str) -> String {
        format!(
            "artist:\"{}\" AND recording:\"{}\"",
            Self::escape_query_value(artist.trim()),
            Self::escape_query_value(title.trim())
        )
    }

    fn recordings_url(&self) -> String {
        format!("{}/recording", self.base_url)
    }

    fn wait_for_rate_limit_slot(&self) {
        while self.limiter.check().is_err() {
            std::thread::sleep(LIMITER_POLL_INTERVAL);
        }
    }

    /// Extracts the `recordings` array; a missing array means no match.
    fn recordings_from_payload(payload: Value) -> Vec<Value> {
        match payload {
            Value::Object(mut map) => match map.remove("recordings") {
                Some(Value::Array(recordings)) => recordings,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }
}

impl LookupService for MusicBrainzClient {
    fn search_recordings(&self, artist: &str, title: &str) -> Result<Vec<Value>, String> {
        self.wait_for_rate_limit_slot();
        let query = Self::recording_query(artist, title);
        debug!("MusicBrainz: searching recordings query={query}");

        let response = self
            .http_client
            .get(&self.recordings_url())
            .set("User-Agent", &self.user_agent)
            .set("Accept", "application/json")
            .query("query", &query)
            .query("fmt", "json")
            .query("limit", &self.max_results.to_string())
            .call()
            .map_err(|err| format!("MusicBrainz request failed: {err}"))?;
        let payload: Value = response
            .into_json()
            .map_err(|err| format!("MusicBrainz response parse failed: {err}"))?;
        Ok(Self::recordings_from_payload(payload))
    }
}
