//! Raw-document dumps for offline diagnosis of failed extractions
//!
//! Captures are best effort: a failed write is logged and swallowed.

use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DebugCapture {
    dir: PathBuf,
}

impl DebugCapture {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `document` as `<source>_<class>_<timestamp>.html`
    pub fn capture(&self, source_id: &str, class: &str, url: &str, document: &str) -> Option<PathBuf> {
        let file_name = format!(
            "{}_{}_{}.html",
            source_id,
            class,
            Local::now().format("%Y%m%d_%H%M%S_%3f")
        );
        let path = self.dir.join(file_name);

        let result = fs::create_dir_all(&self.dir).and_then(|_| fs::write(&path, document));
        match result {
            Ok(()) => {
                tracing::info!(%url, path = %path.display(), "Raw document saved for diagnosis");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(%url, path = %path.display(), error = %e, "Failed to save debug capture");
                None
            }
        }
    }
}
