use log::debug;

use crate::checkpoint_store::CheckpointStore;
use crate::db_manager::RecordStore;
use crate::protocol::Candidate;

/// Reads eligible records once and drops the ones already attempted.
///
/// Order follows the record store; nothing is re-sorted.
pub fn select_candidates<S: RecordStore>(
    store: &S,
    song_type: &str,
    checkpoint: &CheckpointStore,
) -> Result<Vec<Candidate>, String> {
    let records = store.fetch_eligible_records(song_type)?;
    let eligible_count = records.len();
    let candidates: Vec<Candidate> = records
        .into_iter()
        .filter(|record| !checkpoint.has_attempted(record.id))
        .map(Candidate::from_raw)
        .collect();
    debug!(
        "Candidates: {} eligible, {} already attempted, {} selected",
        eligible_count,
        eligible_count - candidates.len(),
        candidates.len()
    );
    Ok(candidates)
}
