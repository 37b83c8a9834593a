//! Local datalake partition (C2, spec §4.2) — per-node content storage,
//! scoped by `YYYYMMDD/HH/<bookId>/` directories, backed by an append-only
//! ingestion log.

use crate::splitter::split;
use alexandria_core::error::{Error, Result};
use alexandria_core::hash::hash;
use alexandria_core::types::{BookId, IngestStatus, IngestionLogEntry};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

const LOG_FILE_NAME: &str = "ingestions.log";

/// Per-node content partition rooted at `root`. Cheap to clone-by-reference
/// (wrap in `Arc` at the call site); internally serializes log appends.
pub struct LocalDatalake {
    root: PathBuf,
    append_lock: Mutex<()>,
}

/// Result of an ingest attempt (spec §4.2).
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub status: IngestStatus,
    pub relative_path: String,
}

impl LocalDatalake {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), append_lock: Mutex::new(()) }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE_NAME)
    }

    /// Write `raw`'s three derived files under a freshly computed
    /// `YYYYMMDD/HH/<bookId>/` directory and append one log line. Returns
    /// `Available` with the existing path, with no write, if `bookId` is
    /// already present in the ingestion log.
    pub fn ingest(&self, book_id: BookId, raw: &[u8]) -> Result<IngestOutcome> {
        if let Some(existing) = self.locate(book_id)? {
            debug!(book_id, path = %existing, "book already present, skipping ingest");
            return Ok(IngestOutcome { status: IngestStatus::Available, relative_path: existing });
        }

        let now = Local::now();
        let relative_path = format!("{}/{}/{book_id}", now.format("%Y%m%d"), now.format("%H"));
        let dir = self.root.join(&relative_path);
        std::fs::create_dir_all(&dir)?;

        let split_doc = split(raw);

        std::fs::write(dir.join("raw.txt"), raw)?;
        std::fs::write(dir.join("header.txt"), &split_doc.header)?;
        std::fs::write(dir.join("body.txt"), &split_doc.body)?;

        self.append_log(now.with_timezone(&Utc), book_id, &relative_path, raw.len() as u64)?;

        Ok(IngestOutcome { status: IngestStatus::Downloaded, relative_path })
    }

    /// Write a verified replica received from another node (spec §4.2).
    /// Never triggers onward replication.
    pub fn receive_replica(
        &self,
        book_id: BookId,
        relative_path: &str,
        raw: &[u8],
        header: &[u8],
        body: &[u8],
        expected_hash: &str,
    ) -> Result<()> {
        let actual = hash(raw);
        if actual != expected_hash {
            return Err(Error::HashMismatch { expected: expected_hash.to_string(), actual });
        }

        let dir = self.root.join(relative_path);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("raw.txt"), raw)?;
        std::fs::write(dir.join("header.txt"), header)?;
        std::fs::write(dir.join("body.txt"), body)?;

        self.append_log(Utc::now(), book_id, relative_path, raw.len() as u64)?;
        Ok(())
    }

    /// Streams the ingestion log and returns the path of the first entry
    /// matching `book_id`, if any.
    pub fn locate(&self, book_id: BookId) -> Result<Option<String>> {
        let path = self.log_path();
        if !path.exists() {
            return Ok(None);
        }
        let file = std::fs::File::open(&path)?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if let Some(entry) = parse_log_line(&line) {
                if entry.book_id == book_id {
                    return Ok(Some(entry.relative_path));
                }
            }
        }
        Ok(None)
    }

    /// Deduplicated, sorted set of all book ids known to this partition.
    pub fn list(&self) -> Result<Vec<BookId>> {
        let entries = self.read_log()?;
        let mut ids: Vec<BookId> = entries.iter().map(|e| e.book_id).collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    /// `{bookCount, totalBytes}` — book count is distinct ids, total bytes
    /// is the cumulative sum of bytes across every log entry.
    pub fn stats(&self) -> Result<DatalakeStats> {
        let entries = self.read_log()?;
        let book_count = {
            let mut ids: Vec<BookId> = entries.iter().map(|e| e.book_id).collect();
            ids.sort_unstable();
            ids.dedup();
            ids.len()
        };
        let total_bytes = entries.iter().map(|e| e.bytes).sum();
        Ok(DatalakeStats { book_count, total_bytes })
    }

    fn read_log(&self) -> Result<Vec<IngestionLogEntry>> {
        let path = self.log_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&path)?;
        let mut out = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            match parse_log_line(&line) {
                Some(entry) => out.push(entry),
                None if line.trim().is_empty() => {}
                None => warn!(line = %line, "skipping malformed ingestion log line"),
            }
        }
        Ok(out)
    }

    fn append_log(
        &self,
        timestamp: DateTime<Utc>,
        book_id: BookId,
        relative_path: &str,
        bytes: u64,
    ) -> Result<()> {
        let _guard = self.append_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = OpenOptions::new().create(true).append(true).open(self.log_path())?;
        let local_timestamp = timestamp.with_timezone(&Local).to_rfc3339();
        writeln!(file, "{local_timestamp};book={book_id};path={relative_path};bytes={bytes}")?;
        file.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DatalakeStats {
    pub book_count: usize,
    pub total_bytes: u64,
}

/// Parses one `ingestions.log` line. Returns `None` for anything that
/// doesn't match the grammar — callers skip such lines rather than failing
/// (spec §6c: "Parser skips lines not matching").
fn parse_log_line(line: &str) -> Option<IngestionLogEntry> {
    let mut parts = line.splitn(4, ';');
    let timestamp_str = parts.next()?;
    let book_part = parts.next()?;
    let path_part = parts.next()?;
    let bytes_part = parts.next()?;

    let timestamp = DateTime::parse_from_rfc3339(timestamp_str).ok()?.with_timezone(&Utc);
    let book_id: BookId = book_part.strip_prefix("book=")?.parse().ok()?;
    let relative_path = path_part.strip_prefix("path=")?.to_string();
    let bytes: u64 = bytes_part.strip_prefix("bytes=")?.parse().ok()?;

    Some(IngestionLogEntry { timestamp, book_id, relative_path, bytes })
}
