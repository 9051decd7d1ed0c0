//! Storage module for crawl state that outlives a process
//!
//! The only durable crawl state is the dedup ledger: the set of article URLs
//! that were archived or deliberately skipped, with the time they were seen.
//! Archives and debug captures are write-only outputs (see `output`).

mod ledger;

pub use ledger::{DedupLedger, LedgerError};
