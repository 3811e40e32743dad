use log::{info, warn};

use crate::db_manager::RecordStore;
use crate::protocol::{join_grouping, ApplyOutcome, RecordId, RunState};

/// Writes resolved genres back and trips once write failures exceed the threshold.
#[derive(Debug, Clone, Copy)]
pub struct UpdateApplier {
    error_threshold: u32,
}

impl UpdateApplier {
    pub fn new(error_threshold: u32) -> Self {
        Self { error_threshold }
    }

    /// Applies `resolved` to record `id`.
    ///
    /// Returns `Err` with the abort reason when this write pushed the failure
    /// count past the threshold; the run must stop immediately.
    pub fn apply<S: RecordStore>(
        &self,
        store: &S,
        state: &mut RunState,
        id: RecordId,
        resolved: &[String],
        existing: &[String],
    ) -> Result<ApplyOutcome, String> {
        if resolved == existing {
            return Ok(ApplyOutcome::Unchanged);
        }

        info!("Updating records");
        match store.update_grouping(id, &join_grouping(resolved)) {
            Ok(()) => Ok(ApplyOutcome::Updated),
            Err(err) => {
                warn!("Skipping {id}: {err}");
                state.error_count = state.error_count.saturating_add(1);
                if state.error_count > self.error_threshold {
                    return Err(format!(
                        "Too many db errors ({} write failures, last: {})",
                        state.error_count, err
                    ));
                }
                Ok(ApplyOutcome::Skipped)
            }
        }
    }
}
