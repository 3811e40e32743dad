/// Case-insensitive allowlist of genre values that may be written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenreFilter {
    protected: Vec<String>,
}

impl GenreFilter {
    pub fn new(protected: Vec<String>) -> Self {
        Self { protected }
    }

    /// Returns the allowlist casing of `tag`, if it is protected.
    pub fn canonical_casing(&self, tag: &str) -> Option<&str> {
        let tag = tag.trim();
        self.protected
            .iter()
            .find(|genre| genre.to_lowercase() == tag.to_lowercase())
            .map(String::as_str)
    }

    /// Reduces free-text tags to the protected genres they name.
    ///
    /// Output follows the input order, uses allowlist casing and holds no duplicates.
    pub fn sterilize<S: AsRef<str>>(&self, tag_names: &[S]) -> Vec<String> {
        let mut genres: Vec<String> = Vec::new();
        for tag in tag_names {
            if let Some(genre) = self.canonical_casing(tag.as_ref()) {
                if !genres.iter().any(|existing| existing == genre) {
                    genres.push(genre.to_string());
                }
            }
        }
        genres
    }
}
