//! Lookup service abstraction and concrete implementations.

pub mod musicbrainz;

use serde_json::Value;

/// Interface implemented by external recording metadata providers.
///
/// Recordings are returned as untyped JSON trees because tag data nests at
/// different depths depending on the match type.
pub trait LookupService {
    fn search_recordings(&self, artist: &str, title: &str) -> Result<Vec<Value>, String>;
}

impl<T: LookupService + ?Sized> LookupService for &T {
    fn search_recordings(&self, artist: &str, title: &str) -> Result<Vec<Value>, String> {
        (**self).search_recordings(artist, title)
    }
}
