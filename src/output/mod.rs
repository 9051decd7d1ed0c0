//! Output module for everything a cycle writes besides the ledger
//!
//! This module handles:
//! - Appending extracted articles to per-source daily archives
//! - Saving raw documents of failed extractions for diagnosis
//! - Tallying candidate outcomes into per-cycle reports

mod archive;
mod debug;
pub mod stats;

pub use archive::ArchiveWriter;
pub use debug::DebugCapture;
pub use stats::{CycleReport, SourceReport};
