//! Shared data model passed between the enrichment pipeline components.
//!
//! Candidates are read once per run, lookups and writes report explicit
//! outcome values, and the driver folds them into a run summary.

/// Stable catalogue identifier of one record.
pub type RecordId = i64;

/// Separator used by the catalogue's grouping column.
pub const GROUPING_SEPARATOR: &str = ", ";

/// Raw catalogue row as returned by a record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub id: RecordId,
    pub artist: String,
    pub title: String,
    pub grouping: String,
}

/// A catalogue record eligible for genre enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: RecordId,
    pub artist: String,
    pub title: String,
    /// Genres currently stored in the grouping column, in stored order.
    pub current_genres: Vec<String>,
}

impl Candidate {
    /// Builds a candidate from a raw row, splitting the grouping text.
    pub fn from_raw(record: RawRecord) -> Self {
        Self {
            id: record.id,
            artist: record.artist,
            title: record.title,
            current_genres: split_grouping(&record.grouping),
        }
    }
}

/// Splits grouping text into genre names. Trailing empty fields are dropped,
/// so empty text yields no genres.
pub fn split_grouping(grouping: &str) -> Vec<String> {
    let mut genres: Vec<String> = grouping
        .split(GROUPING_SEPARATOR)
        .map(str::to_string)
        .collect();
    while genres.last().is_some_and(|genre| genre.is_empty()) {
        genres.pop();
    }
    genres
}

/// Joins genre names back into grouping text.
pub fn join_grouping(genres: &[String]) -> String {
    genres.join(GROUPING_SEPARATOR)
}

/// Result of looking up one artist/title pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Allowlisted genres were found.
    Found(Vec<String>),
    /// The service returned zero recordings.
    NoMatch,
    /// Recordings were returned but none carried tag data.
    NoTags,
    /// Tags were found but none survived the genre filter.
    NoGenres,
    /// The service call failed. Treated as "nothing found".
    Failed(String),
}

impl LookupOutcome {
    /// Collapses the outcome to the genres found, if any.
    pub fn into_genres(self) -> Option<Vec<String>> {
        match self {
            Self::Found(genres) => Some(genres),
            Self::NoMatch | Self::NoTags | Self::NoGenres | Self::Failed(_) => None,
        }
    }
}

/// Result of applying resolved genres to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Resolved genres equal the stored ones; nothing was written.
    Unchanged,
    /// The grouping column was rewritten.
    Updated,
    /// The write failed and was counted against the error budget.
    Skipped,
}

/// Process-local counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunState {
    pub remaining_count: usize,
    pub error_count: u32,
}

impl RunState {
    pub fn new(candidate_count: usize) -> Self {
        Self {
            remaining_count: candidate_count,
            error_count: 0,
        }
    }
}

/// Aggregate counts reported when a run ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub processed: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub not_enriched: usize,
}

/// Terminal state of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(RunSummary),
    Aborted { reason: String, summary: RunSummary },
}

impl RunOutcome {
    #[cfg(test)]
    pub fn summary(&self) -> &RunSummary {
        match self {
            Self::Completed(summary) | Self::Aborted { summary, .. } => summary,
        }
    }

    #[cfg(test)]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}
