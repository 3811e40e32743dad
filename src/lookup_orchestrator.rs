//! Per-candidate genre lookup against the external recording service.
//!
//! Every request is preceded by a fixed pause. Service failures, empty
//! matches and tag-less recordings all collapse to "nothing found" and are
//! never propagated to the driver.

use std::time::Duration;

use log::{info, warn};
use serde_json::Value;

use crate::backends::LookupService;
use crate::genre_filter::GenreFilter;
use crate::protocol::LookupOutcome;

const TAGS_KEY: &str = "tags";
const TAG_NAME_KEY: &str = "name";

/// Depth-first search for the first value stored under `key`.
///
/// A mapping's own entry wins over anything nested below it; otherwise
/// children are visited in document order and the first hit is returned.
pub fn find_nested_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key).or_else(|| {
            map.values()
                .find_map(|child| find_nested_value(child, key))
        }),
        Value::Array(items) => items.iter().find_map(|item| find_nested_value(item, key)),
        _ => None,
    }
}

/// First tag collection of each recording, `None` where a recording has none.
pub fn find_tag_collections(recordings: &[Value]) -> Vec<Option<&Value>> {
    recordings
        .iter()
        .map(|recording| find_nested_value(recording, TAGS_KEY))
        .collect()
}

/// Flattens tag collections into tag names, skipping malformed entries.
pub fn collect_tag_names(tag_collections: &[Option<&Value>]) -> Vec<String> {
    tag_collections
        .iter()
        .flatten()
        .filter_map(|collection| collection.as_array())
        .flatten()
        .filter_map(|tag| tag.get(TAG_NAME_KEY).and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Paces requests to the lookup service and filters what comes back.
pub struct LookupOrchestrator<L> {
    service: L,
    filter: GenreFilter,
    pause: Duration,
}

impl<L: LookupService> LookupOrchestrator<L> {
    pub fn new(service: L, filter: GenreFilter, pause: Duration) -> Self {
        Self {
            service,
            filter,
            pause,
        }
    }

    /// Resolves allowlisted genres for one artist/title pair.
    pub fn lookup(&self, artist: &str, title: &str) -> LookupOutcome {
        if !self.pause.is_zero() {
            std::thread::sleep(self.pause);
        }

        let recordings = match self.service.search_recordings(artist, title) {
            Ok(recordings) => recordings,
            Err(err) => {
                warn!("Lookup error: {err}");
                return LookupOutcome::Failed(err);
            }
        };
        if recordings.is_empty() {
            return LookupOutcome::NoMatch;
        }
        info!("-> song found");

        let tag_collections = find_tag_collections(&recordings);
        if tag_collections.iter().all(Option::is_none) {
            return LookupOutcome::NoTags;
        }
        info!("-> tags found");

        let tag_names = collect_tag_names(&tag_collections);
        if tag_names.is_empty() {
            return LookupOutcome::NoTags;
        }

        let genres = self.filter.sterilize(&tag_names);
        if genres.is_empty() {
            return LookupOutcome::NoGenres;
        }
        info!("-> genres found: {genres:?}");
        LookupOutcome::Found(genres)
    }

    /// Genres for one artist/title pair, or `None` when nothing usable was found.
    pub fn lookup_genres(&self, artist: &str, title: &str) -> Option<Vec<String>> {
        self.lookup(artist, title).into_genres()
    }
}
