//! Durable record of which catalogue records have already been attempted.
//!
//! The backing file holds one record id per line and is only ever appended
//! to. It is read fully on open into an in-memory set; every new id is
//! flushed and synced to disk before `mark_attempted` returns so a crash
//! during the following lookup cannot cause the record to be reprocessed.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::protocol::RecordId;

/// Append-only set of attempted record ids.
pub struct CheckpointStore {
    path: PathBuf,
    file: File,
    attempted: HashSet<RecordId>,
}

impl CheckpointStore {
    /// Opens the checkpoint file, creating it empty if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, String> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                format!(
                    "failed to create checkpoint directory {}: {}",
                    parent.display(),
                    err
                )
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|err| format!("failed to open checkpoint {}: {}", path.display(), err))?;

        let content = std::fs::read_to_string(&path)
            .map_err(|err| format!("failed to read checkpoint {}: {}", path.display(), err))?;
        let attempted = Self::parse_ids(&path, &content);

        // A hand-edited file may lack the final newline; keep appended ids on their own line.
        if !content.is_empty() && !content.ends_with('\n') {
            file.write_all(b"\n")
                .and_then(|_| file.sync_data())
                .map_err(|err| {
                    format!("failed to repair checkpoint {}: {}", path.display(), err)
                })?;
        }

        debug!(
            "Checkpoint: loaded {} attempted ids from {}",
            attempted.len(),
            path.display()
        );
        Ok(Self {
            path,
            file,
            attempted,
        })
    }

    fn parse_ids(path: &Path, content: &str) -> HashSet<RecordId> {
        let mut attempted = HashSet::new();
        for (index, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match trimmed.parse::<RecordId>() {
                Ok(id) => {
                    attempted.insert(id);
                }
                Err(err) => warn!(
                    "Checkpoint: ignoring unparsable line {} in {}: {:?} ({})",
                    index + 1,
                    path.display(),
                    trimmed,
                    err
                ),
            }
        }
        attempted
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.attempted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempted.is_empty()
    }

    pub fn has_attempted(&self, id: RecordId) -> bool {
        self.attempted.contains(&id)
    }

    /// Records an attempt durably. Marking an id twice is a no-op.
    pub fn mark_attempted(&mut self, id: RecordId) -> Result<(), String> {
        if self.attempted.contains(&id) {
            return Ok(());
        }
        writeln!(self.file, "{id}")
            .and_then(|_| self.file.flush())
            .and_then(|_| self.file.sync_data())
            .map_err(|err| {
                format!(
                    "failed to append {} to checkpoint {}: {}",
                    id,
                    self.path.display(),
                    err
                )
            })?;
        self.attempted.insert(id);
        Ok(())
    }
}
