//! Index store — durable content-hash → provenance multimap
//!
//! One SQLite table holds every provenance record; secondary indexes on
//! `content_hash` and `library` serve the two query shapes (identification
//! lookups and per-library replacement). All row (de)serialization happens
//! here: core logic only ever sees [`ProvenanceRecord`] values, never a
//! generic row.
//!
//! Library names are free text resolved against the catalog at query time;
//! there are deliberately no foreign keys.

use chrono::{DateTime, FixedOffset};
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::IdlibResult;

// ─── Record ────────────────────────────────────────────────────────

/// Provenance of one historical blob: this exact content existed in
/// `library` at `commit_hash` under `path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// Hex SHA-256 of the blob's raw bytes. Many records may share one
    /// hash; that multiplicity is the raw signal the pruner processes.
    pub content_hash: String,
    pub library: String,
    pub commit_hash: String,
    /// Committer time with its original UTC offset.
    pub commit_time: DateTime<FixedOffset>,
    /// Nearest-tag descriptor, or the synthesized `0^…` fallback.
    pub version_descriptor: String,
    /// Repo-relative path at the time of `commit_hash`.
    pub path: String,
    pub size: u64,
}

/// An ambiguous hash: identical content observed under several libraries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbiguousHash {
    pub content_hash: String,
    /// Libraries still claiming the hash, sorted.
    pub libraries: Vec<String>,
    /// One representative path, for the audit log.
    pub sample_path: String,
}

// ─── Store ─────────────────────────────────────────────────────────

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS files (
    content_hash        TEXT NOT NULL,
    library             TEXT NOT NULL,
    commit_hash         TEXT NOT NULL,
    commit_time         TEXT NOT NULL,
    version_descriptor  TEXT NOT NULL,
    path                TEXT NOT NULL,
    size                INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS files_content_hash_index ON files(content_hash);
CREATE INDEX IF NOT EXISTS files_library_index ON files(library);

CREATE TABLE IF NOT EXISTS libraries (
    library     TEXT PRIMARY KEY,
    git_remote  TEXT,
    summary     TEXT
);
";

/// SQLite-backed provenance index.
pub struct IndexStore {
    conn: Connection,
}

impl IndexStore {
    /// Open (creating if necessary) a store at `path`.
    pub fn open(path: &Path) -> IdlibResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.conn.execute_batch(SCHEMA)?;
        Ok(store)
    }

    /// Open an existing store read-only, as the identifier does.
    pub fn open_read_only(path: &Path) -> IdlibResult<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> IdlibResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.conn.execute_batch(SCHEMA)?;
        Ok(store)
    }

    // ─── Writes ────────────────────────────────────────────────────

    /// Replace a library's entire record set in one transaction. Full-mode
    /// indexing uses this to discard stale history atomically.
    pub fn bulk_replace(&mut self, library: &str, records: &[ProvenanceRecord]) -> IdlibResult<usize> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM files WHERE library = ?1", params![library])?;
        let inserted = insert_all(&tx, records)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Upsert records keyed by content hash, last write wins. Sparse-mode
    /// indexing uses this; collisions are redundant recomputation of the
    /// same historical fact, since blob bytes are immutable. Delete and
    /// insert interleave per record so the rule also holds for duplicate
    /// hashes within one batch (a file reverted to earlier bytes, or a
    /// pure rename re-observing the same blob).
    pub fn upsert(&mut self, records: &[ProvenanceRecord]) -> IdlibResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut delete = tx.prepare("DELETE FROM files WHERE content_hash = ?1")?;
            let mut insert = tx.prepare(INSERT_SQL)?;
            for record in records {
                delete.execute(params![record.content_hash])?;
                if execute_insert(&mut insert, record)? {
                    inserted += 1;
                }
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Refresh the informational library metadata table from the catalog.
    pub fn record_library_metadata(
        &mut self,
        library: &str,
        git_remote: Option<&str>,
        summary: Option<&str>,
    ) -> IdlibResult<()> {
        self.conn.execute(
            "INSERT INTO libraries (library, git_remote, summary) VALUES (?1, ?2, ?3)
             ON CONFLICT(library) DO UPDATE SET git_remote = ?2, summary = ?3",
            params![library, git_remote, summary],
        )?;
        Ok(())
    }

    // ─── Queries ───────────────────────────────────────────────────

    /// Every record for one content hash.
    pub fn lookup(&self, content_hash: &str) -> IdlibResult<Vec<ProvenanceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT content_hash, library, commit_hash, commit_time,
                    version_descriptor, path, size
             FROM files WHERE content_hash = ?1
             ORDER BY library ASC, path ASC, commit_hash ASC",
        )?;
        let rows = stmt.query_map(params![content_hash], row_to_record)?;
        collect_records(rows)
    }

    /// Every record for one library, in a stable order.
    pub fn records_for_library(&self, library: &str) -> IdlibResult<Vec<ProvenanceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT content_hash, library, commit_hash, commit_time,
                    version_descriptor, path, size
             FROM files WHERE library = ?1
             ORDER BY content_hash ASC, commit_hash ASC, path ASC",
        )?;
        let rows = stmt.query_map(params![library], row_to_record)?;
        collect_records(rows)
    }

    pub fn record_count(&self) -> IdlibResult<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn count_for_library(&self, library: &str) -> IdlibResult<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM files WHERE library = ?1",
            params![library],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Hashes present under both libraries, with one of `library`'s paths
    /// per hash as a representative. Drives declared-embedding pruning.
    pub fn hashes_shared_with(
        &self,
        library: &str,
        other: &str,
    ) -> IdlibResult<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.content_hash, MIN(a.path)
             FROM files a JOIN files b ON a.content_hash = b.content_hash
             WHERE a.library = ?1 AND b.library = ?2
             GROUP BY a.content_hash
             ORDER BY a.content_hash ASC",
        )?;
        let rows = stmt.query_map(params![library, other], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Hashes still claimed by more than one library. Whatever shows up
    /// here survived declared-embedding resolution and is an undeclared
    /// duplicate.
    pub fn ambiguous_hashes(&self) -> IdlibResult<Vec<AmbiguousHash>> {
        let mut stmt = self.conn.prepare(
            "SELECT content_hash,
                    GROUP_CONCAT(DISTINCT library),
                    MIN(path)
             FROM files
             GROUP BY content_hash
             HAVING COUNT(DISTINCT library) > 1
             ORDER BY content_hash ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (content_hash, libraries, sample_path) = row?;
            let mut libraries: Vec<String> =
                libraries.split(',').map(str::to_string).collect();
            libraries.sort();
            out.push(AmbiguousHash {
                content_hash,
                libraries,
                sample_path,
            });
        }
        Ok(out)
    }

    // ─── Pruner primitives ─────────────────────────────────────────

    /// Delete every zero-length record. Returns the number deleted.
    pub fn delete_zero_size(&mut self) -> IdlibResult<usize> {
        Ok(self.conn.execute("DELETE FROM files WHERE size = 0", [])?)
    }

    /// Delete one library's records for the given hashes, in one
    /// transaction.
    pub fn delete_hashes_in_library(
        &mut self,
        hashes: &[String],
        library: &str,
    ) -> IdlibResult<usize> {
        let tx = self.conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt =
                tx.prepare("DELETE FROM files WHERE content_hash = ?1 AND library = ?2")?;
            for hash in hashes {
                deleted += stmt.execute(params![hash, library])?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    /// Delete the given hashes under every library, in one transaction.
    pub fn delete_hashes_everywhere(&mut self, hashes: &[String]) -> IdlibResult<usize> {
        let tx = self.conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM files WHERE content_hash = ?1")?;
            for hash in hashes {
                deleted += stmt.execute(params![hash])?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    /// Reclaim space after bulk deletions.
    pub fn vacuum(&mut self) -> IdlibResult<()> {
        self.conn.execute_batch("VACUUM;")?;
        Ok(())
    }
}

// ─── Row (de)serialization ─────────────────────────────────────────

const INSERT_SQL: &str = "INSERT INTO files (content_hash, library, commit_hash, commit_time,
                    version_descriptor, path, size)
 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

fn insert_all(conn: &Connection, records: &[ProvenanceRecord]) -> IdlibResult<usize> {
    let mut stmt = conn.prepare(INSERT_SQL)?;
    let mut inserted = 0;
    for record in records {
        if execute_insert(&mut stmt, record)? {
            inserted += 1;
        }
    }
    Ok(inserted)
}

/// Insert one record. Returns `false` (dropping the record, with a log
/// line) on a duplicate-key conflict: two workers derived the same
/// historical fact, and one copy is plenty.
fn execute_insert(
    stmt: &mut rusqlite::Statement<'_>,
    record: &ProvenanceRecord,
) -> IdlibResult<bool> {
    let result = stmt.execute(params![
        record.content_hash,
        record.library,
        record.commit_hash,
        record.commit_time.to_rfc3339(),
        record.version_descriptor,
        record.path,
        record.size as i64,
    ]);
    match result {
        Ok(_) => Ok(true),
        Err(rusqlite::Error::SqliteFailure(e, msg))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            tracing::warn!(
                "integrity conflict inserting {} ({}:{}): {}",
                record.content_hash,
                record.library,
                record.path,
                msg.as_deref().unwrap_or("constraint violation")
            );
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProvenanceRecord> {
    let time_text: String = row.get(3)?;
    let commit_time = DateTime::parse_from_rfc3339(&time_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(ProvenanceRecord {
        content_hash: row.get(0)?,
        library: row.get(1)?,
        commit_hash: row.get(2)?,
        commit_time,
        version_descriptor: row.get(4)?,
        path: row.get(5)?,
        size: row.get::<_, i64>(6)? as u64,
    })
}

fn collect_records<I>(rows: I) -> IdlibResult<Vec<ProvenanceRecord>>
where
    I: Iterator<Item = rusqlite::Result<ProvenanceRecord>>,
{
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
