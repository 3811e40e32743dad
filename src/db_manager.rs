//! Catalogue record store: the trait the pipeline depends on and its SQLite backing.

use std::path::Path;

use log::debug;
use rusqlite::{params, Connection, OpenFlags};

use crate::protocol::{RawRecord, RecordId};

/// Read/update surface of the catalogue used by the pipeline.
pub trait RecordStore {
    /// Returns every record whose category equals `song_type`, in store order.
    fn fetch_eligible_records(&self, song_type: &str) -> Result<Vec<RawRecord>, String>;
    /// Rewrites the grouping column of one record.
    fn update_grouping(&self, id: RecordId, grouping: &str) -> Result<(), String>;
}

impl<T: RecordStore + ?Sized> RecordStore for &T {
    fn fetch_eligible_records(&self, song_type: &str) -> Result<Vec<RawRecord>, String> {
        (**self).fetch_eligible_records(song_type)
    }

    fn update_grouping(&self, id: RecordId, grouping: &str) -> Result<(), String> {
        (**self).update_grouping(id, grouping)
    }
}

/// SQLite-backed catalogue holding one long-lived connection for the run.
pub struct DbManager {
    conn: Connection,
}

impl DbManager {
    /// Opens an existing catalogue. A missing file or a file without the
    /// `songlist` table is an error; the catalogue is never created here.
    pub fn open(path: &Path) -> Result<Self, String> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|err| format!("failed to open catalogue {}: {}", path.display(), err))?;
        let db_manager = Self { conn };
        db_manager.verify_schema().map_err(|err| {
            format!("catalogue {} is not usable: {}", path.display(), err)
        })?;
        debug!("Catalogue opened at {}", path.display());
        Ok(db_manager)
    }

    fn verify_schema(&self) -> Result<(), String> {
        let table_count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'songlist'",
                [],
                |row| row.get(0),
            )
            .map_err(|err| format!("failed to inspect schema: {err}"))?;
        if table_count == 0 {
            return Err("missing songlist table".to_string());
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory()
            .map_err(|err| format!("failed to open in-memory catalogue: {err}"))?;
        initialize_schema(&conn)
            .map_err(|err| format!("failed to initialize catalogue schema: {err}"))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn insert_song(
        &self,
        id: RecordId,
        artist: &str,
        title: &str,
        grouping: &str,
        song_type: &str,
    ) -> Result<(), String> {
        self.conn
            .execute(
                "INSERT INTO songlist (ID, title, artist, \"grouping\", songtype) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, title, artist, grouping, song_type],
            )
            .map_err(|err| format!("failed to insert record {id}: {err}"))?;
        Ok(())
    }

    #[cfg(test)]
    pub fn grouping_for(&self, id: RecordId) -> Result<String, String> {
        self.conn
            .query_row(
                "SELECT \"grouping\" FROM songlist WHERE ID = ?1",
                params![id],
                |row| Ok(row.get::<_, Option<String>>(0)?.unwrap_or_default()),
            )
            .map_err(|err| format!("failed to read grouping for record {id}: {err}"))
    }
}

#[cfg(test)]
fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS songlist (
            ID INTEGER PRIMARY KEY,
            title TEXT,
            artist TEXT,
            \"grouping\" TEXT,
            songtype TEXT
        )",
        [],
    )?;
    Ok(())
}

impl RecordStore for DbManager {
    fn fetch_eligible_records(&self, song_type: &str) -> Result<Vec<RawRecord>, String> {
        let mut stmt = self
            .conn
            .prepare("SELECT ID, title, artist, \"grouping\" FROM songlist WHERE songtype = ?1")
            .map_err(|err| format!("failed to prepare candidate query: {err}"))?;
        let record_iter = stmt
            .query_map(params![song_type], |row| {
                Ok(RawRecord {
                    id: row.get(0)?,
                    title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    artist: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    grouping: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                })
            })
            .map_err(|err| format!("failed to query candidates: {err}"))?;

        let mut records = Vec::new();
        for record in record_iter {
            records.push(record.map_err(|err| format!("failed to read candidate row: {err}"))?);
        }
        Ok(records)
    }

    fn update_grouping(&self, id: RecordId, grouping: &str) -> Result<(), String> {
        let changed = self
            .conn
            .execute(
                "UPDATE songlist SET \"grouping\" = ?1 WHERE ID = ?2",
                params![grouping, id],
            )
            .map_err(|err| format!("failed to update record {id}: {err}"))?;
        if changed == 0 {
            return Err(format!("record {id} no longer exists"));
        }
        Ok(())
    }
}
