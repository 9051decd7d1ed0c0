//! Append-only per-source, per-day text archives
//!
//! Layout: `<data-dir>/<source>/<source>-<YYYY-MM-DD>.txt`. Each record is
//!
//! ```text
//! --- <title> ---
//!
//! <body>
//!
//! ```

use crate::sources::ExtractedArticle;
use crate::CrawlError;
use chrono::NaiveDate;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes archive records; the single writer of every archive file
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    root: PathBuf,
}

impl ArchiveWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the per-source directories up front
    pub fn prepare<'a>(&self, source_ids: impl IntoIterator<Item = &'a str>) -> Result<(), CrawlError> {
        for id in source_ids {
            let dir = self.root.join(id);
            fs::create_dir_all(&dir).map_err(|source| CrawlError::Archive { path: dir, source })?;
        }
        Ok(())
    }

    /// Returns the archive file for `(source_id, date)`
    pub fn path_for(&self, source_id: &str, date: NaiveDate) -> PathBuf {
        self.root
            .join(source_id)
            .join(format!("{}-{}.txt", source_id, date.format("%Y-%m-%d")))
    }

    /// Appends one record and flushes it to disk before returning
    pub fn append(&self, source_id: &str, article: &ExtractedArticle) -> Result<PathBuf, CrawlError> {
        let path = self.path_for(source_id, article.published_on);
        let record = format_record(&article.title, &article.body);

        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            file.write_all(record.as_bytes())?;
            file.sync_data()
        };

        write().map_err(|source| CrawlError::Archive {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(path = %path.display(), bytes = record.len(), "Archive record appended");
        Ok(path)
    }
}

fn format_record(title: &str, body: &str) -> String {
    format!("--- {} ---\n\n{}\n\n", title, body.trim())
}
