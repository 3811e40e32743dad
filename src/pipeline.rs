//! Single-pass, checkpointed enrichment sweep.
//!
//! Candidates are selected once at startup, then processed strictly in
//! order: checkpoint, lookup, apply. The only early exit between candidates
//! is the write-failure circuit breaker in [`UpdateApplier`].

use std::time::Duration;

use log::{error, info, warn};

use crate::backends::LookupService;
use crate::candidate_selector::select_candidates;
use crate::checkpoint_store::CheckpointStore;
use crate::config::Config;
use crate::db_manager::RecordStore;
use crate::genre_filter::GenreFilter;
use crate::lookup_orchestrator::LookupOrchestrator;
use crate::protocol::{ApplyOutcome, Candidate, RunOutcome, RunState, RunSummary};
use crate::update_applier::UpdateApplier;

/// Owns the collaborators for one run.
pub struct Pipeline<S, L> {
    store: S,
    orchestrator: LookupOrchestrator<L>,
    checkpoint: CheckpointStore,
    applier: UpdateApplier,
    song_type: String,
}

impl<S: RecordStore, L: LookupService> Pipeline<S, L> {
    pub fn new(
        store: S,
        orchestrator: LookupOrchestrator<L>,
        checkpoint: CheckpointStore,
        applier: UpdateApplier,
        song_type: impl Into<String>,
    ) -> Self {
        Self {
            store,
            orchestrator,
            checkpoint,
            applier,
            song_type: song_type.into(),
        }
    }

    /// Wires a pipeline from config. Fails when the checkpoint file is unusable.
    pub fn from_config(config: &Config, store: S, service: L) -> Result<Self, String> {
        let checkpoint = CheckpointStore::open(config.enrichment.checkpoint_path.clone())?;
        let orchestrator = LookupOrchestrator::new(
            service,
            GenreFilter::new(config.enrichment.protected_genres.clone()),
            Duration::from_secs(config.lookup.pause_secs),
        );
        Ok(Self::new(
            store,
            orchestrator,
            checkpoint,
            UpdateApplier::new(config.enrichment.error_threshold),
            config.database.song_type.clone(),
        ))
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    /// Runs the sweep to completion or abort.
    ///
    /// `Err` means the run could not start; no candidate was touched.
    pub fn run(&mut self) -> Result<RunOutcome, String> {
        let candidates = select_candidates(&self.store, &self.song_type, &self.checkpoint)?;
        let mut state = RunState::new(candidates.len());
        let mut summary = RunSummary {
            total: candidates.len(),
            ..RunSummary::default()
        };
        info!("-==[{}]==- songs to go!", state.remaining_count);

        for candidate in &candidates {
            if let Err(reason) = self.process_candidate(candidate, &mut state, &mut summary) {
                error!("{reason}");
                return Ok(RunOutcome::Aborted { reason, summary });
            }
        }

        info!(
            "Run complete: {} processed, {} updated, {} unchanged, {} skipped, {} not enriched",
            summary.processed, summary.updated, summary.unchanged, summary.skipped, summary.not_enriched
        );
        Ok(RunOutcome::Completed(summary))
    }

    fn process_candidate(
        &mut self,
        candidate: &Candidate,
        state: &mut RunState,
        summary: &mut RunSummary,
    ) -> Result<(), String> {
        state.remaining_count = state.remaining_count.saturating_sub(1);
        // Must be durable before the lookup starts.
        self.checkpoint
            .mark_attempted(candidate.id)
            .map_err(|err| format!("Checkpoint unavailable, stopping: {err}"))?;
        summary.processed += 1;

        info!(
            "[{} left] {} - {}...",
            state.remaining_count, candidate.artist, candidate.title
        );
        let genres = match self
            .orchestrator
            .lookup_genres(&candidate.artist, &candidate.title)
        {
            Some(genres) => genres,
            None => {
                summary.not_enriched += 1;
                candidate.current_genres.clone()
            }
        };

        match self.applier.apply(
            &self.store,
            state,
            candidate.id,
            &genres,
            &candidate.current_genres,
        )? {
            ApplyOutcome::Unchanged => summary.unchanged += 1,
            ApplyOutcome::Updated => summary.updated += 1,
            ApplyOutcome::Skipped => {
                warn!("Record {} left unchanged after write failure", candidate.id);
                summary.skipped += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Pipeline;
    use crate::backends::LookupService;
    use crate::checkpoint_store::CheckpointStore;
    use crate::config::{default_protected_genres, Config};
    use crate::db_manager::{DbManager, RecordStore};
    use crate::genre_filter::GenreFilter;
    use crate::lookup_orchestrator::LookupOrchestrator;
    use crate::protocol::{RawRecord, RecordId, RunOutcome};
    use crate::update_applier::UpdateApplier;
    use serde_json::{json, Value};
    use std::cell::{Cell, RefCell};
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    fn unique_temp_checkpoint_path(name: &str) -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be valid")
            .as_nanos();
        std::env::temp_dir().join(format!("genre_updater_pipeline_{name}_{nonce}.songs"))
    }

    struct FixedLookup {
        response: Result<Vec<Value>, String>,
        calls: Cell<usize>,
    }

    impl FixedLookup {
        fn tagged(names: &[&str]) -> Self {
            let tags: Vec<Value> = names.iter().map(|name| json!({ "name": name })).collect();
            Self {
                response: Ok(vec![json!({ "id": "rec", "tags": tags })]),
                calls: Cell::new(0),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                response: Err(message.to_string()),
                calls: Cell::new(0),
            }
        }
    }

    impl LookupService for FixedLookup {
        fn search_recordings(&self, _artist: &str, _title: &str) -> Result<Vec<Value>, String> {
            self.calls.set(self.calls.get() + 1);
            self.response.clone()
        }
    }

    /// Lookup that records whether the checkpoint file already names the id being looked up.
    struct CheckpointObserver {
        checkpoint_path: PathBuf,
        ids_by_title: Vec<(String, RecordId)>,
        observed: RefCell<Vec<(RecordId, bool)>>,
    }

    impl LookupService for CheckpointObserver {
        fn search_recordings(&self, _artist: &str, title: &str) -> Result<Vec<Value>, String> {
            let id = self
                .ids_by_title
                .iter()
                .find(|(known_title, _)| known_title == title)
                .map(|(_, id)| *id)
                .expect("observer should know every title");
            let on_disk = fs::read_to_string(&self.checkpoint_path)
                .expect("checkpoint should be readable during lookup");
            let present = on_disk.lines().any(|line| line.trim() == id.to_string());
            self.observed.borrow_mut().push((id, present));
            Err("service unavailable".to_string())
        }
    }

    #[derive(Default)]
    struct FailingStore {
        records: Vec<RawRecord>,
        write_attempts: Cell<usize>,
    }

    impl RecordStore for FailingStore {
        fn fetch_eligible_records(&self, _song_type: &str) -> Result<Vec<RawRecord>, String> {
            Ok(self.records.clone())
        }

        fn update_grouping(&self, _id: RecordId, _grouping: &str) -> Result<(), String> {
            self.write_attempts.set(self.write_attempts.get() + 1);
            Err("connection refused".to_string())
        }
    }

    fn build_pipeline<S: RecordStore, L: LookupService>(
        store: S,
        service: L,
        checkpoint_path: &Path,
    ) -> Pipeline<S, L> {
        Pipeline::new(
            store,
            LookupOrchestrator::new(
                service,
                GenreFilter::new(default_protected_genres()),
                Duration::ZERO,
            ),
            CheckpointStore::open(checkpoint_path).expect("checkpoint should open"),
            UpdateApplier::new(3),
            "S",
        )
    }

    #[test]
    fn test_end_to_end_updates_record_and_checkpoints_it() {
        let path = unique_temp_checkpoint_path("e2e");
        let store = DbManager::open_in_memory().expect("in-memory catalogue should open");
        store
            .insert_song(7, "Artist", "Song", "Pop, Rock", "S")
            .expect("insert should succeed");
        let lookup = FixedLookup::tagged(&["Christmas", "Pop"]);

        let mut pipeline = build_pipeline(&store, &lookup, &path);
        let outcome = pipeline.run().expect("run should start");

        assert!(!outcome.is_aborted());
        assert_eq!(outcome.summary().updated, 1);
        assert_eq!(store.grouping_for(7).expect("read should succeed"), "Christmas");
        assert!(pipeline.checkpoint().has_attempted(7));
        assert_eq!(fs::read_to_string(&path).expect("file readable"), "7\n");

        fs::remove_file(path).expect("checkpoint fixture should be removable");
    }

    #[test]
    fn test_second_run_skips_already_attempted_records() {
        let path = unique_temp_checkpoint_path("resume");
        let store = DbManager::open_in_memory().expect("in-memory catalogue should open");
        store
            .insert_song(7, "Artist", "Song", "Pop, Rock", "S")
            .expect("insert should succeed");
        let lookup = FixedLookup::tagged(&["Christmas"]);

        build_pipeline(&store, &lookup, &path)
            .run()
            .expect("first run should start");
        let second = build_pipeline(&store, &lookup, &path)
            .run()
            .expect("second run should start");

        assert_eq!(lookup.calls.get(), 1);
        assert_eq!(second, RunOutcome::Completed(Default::default()));

        fs::remove_file(path).expect("checkpoint fixture should be removable");
    }

    #[test]
    fn test_checkpoint_is_durable_before_lookup_even_when_lookup_fails() {
        let path = unique_temp_checkpoint_path("ordering");
        let store = DbManager::open_in_memory().expect("in-memory catalogue should open");
        store
            .insert_song(1, "Artist", "One", "", "S")
            .expect("insert should succeed");
        store
            .insert_song(2, "Artist", "Two", "Pop", "S")
            .expect("insert should succeed");
        let observer = CheckpointObserver {
            checkpoint_path: path.clone(),
            ids_by_title: vec![("One".to_string(), 1), ("Two".to_string(), 2)],
            observed: RefCell::new(Vec::new()),
        };

        let outcome = build_pipeline(&store, &observer, &path)
            .run()
            .expect("run should start");

        assert_eq!(observer.observed.borrow().as_slice(), &[(1, true), (2, true)]);
        let summary = outcome.summary();
        assert_eq!(summary.not_enriched, 2);
        assert_eq!(summary.unchanged, 2);
        assert_eq!(store.grouping_for(2).expect("read should succeed"), "Pop");

        fs::remove_file(path).expect("checkpoint fixture should be removable");
    }

    #[test]
    fn test_threshold_abort_stops_after_fourth_write_failure() {
        let path = unique_temp_checkpoint_path("abort");
        let store = FailingStore {
            records: (1..=6)
                .map(|id| RawRecord {
                    id,
                    artist: format!("Artist {id}"),
                    title: format!("Song {id}"),
                    grouping: "Pop".to_string(),
                })
                .collect(),
            ..FailingStore::default()
        };
        let lookup = FixedLookup::tagged(&["christmas"]);

        let mut pipeline = build_pipeline(&store, &lookup, &path);
        let outcome = pipeline.run().expect("run should start");

        assert!(outcome.is_aborted());
        assert_eq!(store.write_attempts.get(), 4);
        assert_eq!(lookup.calls.get(), 4);
        assert_eq!(outcome.summary().skipped, 3);
        assert!(pipeline.checkpoint().has_attempted(4));
        assert!(!pipeline.checkpoint().has_attempted(5));
        assert!(!pipeline.checkpoint().has_attempted(6));

        fs::remove_file(path).expect("checkpoint fixture should be removable");
    }

    #[test]
    fn test_lookup_failures_do_not_abort_the_run() {
        let path = unique_temp_checkpoint_path("lookup_failures");
        let store = DbManager::open_in_memory().expect("in-memory catalogue should open");
        for id in 1..=5 {
            store
                .insert_song(id, "Artist", &format!("Song {id}"), "Pop", "S")
                .expect("insert should succeed");
        }
        let lookup = FixedLookup::failing("timed out");

        let outcome = build_pipeline(&store, &lookup, &path)
            .run()
            .expect("run should start");

        assert!(!outcome.is_aborted());
        assert_eq!(outcome.summary().processed, 5);
        assert_eq!(outcome.summary().not_enriched, 5);
        assert_eq!(outcome.summary().updated, 0);

        fs::remove_file(path).expect("checkpoint fixture should be removable");
    }

    #[test]
    fn test_from_config_fails_fast_on_unusable_checkpoint() {
        let path = unique_temp_checkpoint_path("unusable");
        fs::create_dir_all(&path).expect("should create directory fixture");
        let mut config = Config::default();
        config.enrichment.checkpoint_path = path.clone();
        let store = DbManager::open_in_memory().expect("in-memory catalogue should open");
        let lookup = FixedLookup::tagged(&[]);

        assert!(Pipeline::from_config(&config, &store, &lookup).is_err());

        fs::remove_dir_all(path).expect("directory fixture should be removable");
    }
}
