//! Durable dedup ledger
//!
//! The ledger is a single JSON document mapping canonical URL to the local
//! timestamp at which it was marked seen. It is rewritten in full on every
//! mutation: the new document goes to a sibling temp file, is fsynced and
//! then renamed over the old one, so a crash leaves either the previous or
//! the new ledger on disk, never a torn one.

use chrono::{DateTime, Local, NaiveDateTime};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Timestamp layout written to the ledger
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Errors that can occur while persisting the ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Failed to write ledger {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize ledger: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persistent set of seen URLs with their first-seen timestamps
#[derive(Debug)]
pub struct DedupLedger {
    path: PathBuf,
    entries: BTreeMap<String, NaiveDateTime>,
}

impl DedupLedger {
    /// Loads the ledger at `path`, expiring entries older than `retention`
    ///
    /// A missing or unreadable document yields an empty ledger. If the sweep
    /// removed anything, the swept ledger is written back before returning.
    pub fn load(path: &Path, retention: chrono::Duration) -> Result<Self, LedgerError> {
        Self::load_at(path, retention, Local::now().naive_local())
    }

    /// Same as [`DedupLedger::load`] with an explicit clock reading
    pub fn load_at(
        path: &Path,
        retention: chrono::Duration,
        now: NaiveDateTime,
    ) -> Result<Self, LedgerError> {
        let raw = read_document(path);
        let cutoff = now - retention;
        let total = raw.len();

        let mut entries = BTreeMap::new();
        for (url, stamp) in raw {
            match parse_timestamp(&stamp) {
                Some(seen_at) if seen_at > cutoff => {
                    entries.insert(url, seen_at);
                }
                Some(_) => {}
                None => {
                    tracing::warn!(%url, timestamp = %stamp, "Dropping ledger entry with unparsable timestamp");
                }
            }
        }

        let ledger = Self {
            path: path.to_path_buf(),
            entries,
        };

        let purged = total - ledger.entries.len();
        if purged > 0 {
            tracing::info!(purged, kept = ledger.entries.len(), "Expired ledger entries purged");
            ledger.persist()?;
        }

        Ok(ledger)
    }

    /// Returns true if `url` has been marked seen and not yet expired
    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    /// Returns when `url` was marked seen
    pub fn seen_at(&self, url: &str) -> Option<NaiveDateTime> {
        self.entries.get(url).copied()
    }

    /// Records `url` as seen and durably persists the whole ledger
    ///
    /// When persisting fails the in-memory entry is rolled back, so memory
    /// never claims more than the disk holds.
    pub fn mark_seen(&mut self, url: &str, at: NaiveDateTime) -> Result<(), LedgerError> {
        let previous = self.entries.insert(url.to_string(), at);

        if let Err(e) = self.persist() {
            match previous {
                Some(prev) => {
                    self.entries.insert(url.to_string(), prev);
                }
                None => {
                    self.entries.remove(url);
                }
            }
            return Err(e);
        }

        tracing::debug!(%url, "Marked seen");
        Ok(())
    }

    /// Records `url` as seen now
    pub fn mark_seen_now(&mut self, url: &str) -> Result<(), LedgerError> {
        self.mark_seen(url, Local::now().naive_local())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), LedgerError> {
        let document: BTreeMap<&str, String> = self
            .entries
            .iter()
            .map(|(url, at)| (url.as_str(), at.format(TIMESTAMP_FORMAT).to_string()))
            .collect();
        let json = serde_json::to_string_pretty(&document)?;

        let io_err = |source| LedgerError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let tmp_path = temp_path(&self.path);
        let mut file = fs::File::create(&tmp_path).map_err(io_err)?;
        file.write_all(json.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(io_err)?;
        Ok(())
    }
}

/// Reads the raw url -> timestamp document, failing open
fn read_document(path: &Path) -> BTreeMap<String, String> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "No ledger found, starting empty");
            return BTreeMap::new();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ledger unreadable, starting empty");
            return BTreeMap::new();
        }
    };

    match serde_json::from_str(&content) {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ledger corrupt, starting empty");
            BTreeMap::new()
        }
    }
}

/// Accepts `YYYY-MM-DDTHH:MM:SS[.ffffff]` and RFC 3339 with an offset
fn parse_timestamp(stamp: &str) -> Option<NaiveDateTime> {
    stamp.parse::<NaiveDateTime>().ok().or_else(|| {
        DateTime::parse_from_rfc3339(stamp)
            .ok()
            .map(|dt| dt.with_timezone(&Local).naive_local())
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
