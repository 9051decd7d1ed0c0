//! Per-source and per-cycle outcome tallies
//!
//! Counts are derived from the `CandidateOutcome` of every candidate the
//! coordinator handled; they are informational and never persisted.

use crate::state::CandidateOutcome;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::time::Duration;

/// Tally for one source within one cycle
#[derive(Debug, Clone, Default)]
pub struct SourceReport {
    /// Source identifier
    pub source_id: String,

    /// Number of candidates produced by enumeration (after in-cycle dedup)
    pub candidates: u64,

    /// Count of candidates by terminal outcome
    pub outcomes: HashMap<CandidateOutcome, u64>,

    /// Set when the source was abandoned before or during enumeration
    pub aborted: Option<String>,
}

impl SourceReport {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: CandidateOutcome) {
        *self.outcomes.entry(outcome).or_insert(0) += 1;
    }

    pub fn count(&self, outcome: CandidateOutcome) -> u64 {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    pub fn archived(&self) -> u64 {
        self.count(CandidateOutcome::Archived)
    }

    pub fn skipped(&self) -> u64 {
        self.outcomes
            .iter()
            .filter(|(outcome, _)| matches!(outcome, CandidateOutcome::Skipped(_)))
            .map(|(_, count)| count)
            .sum()
    }

    pub fn errors(&self) -> u64 {
        self.outcomes
            .iter()
            .filter(|(outcome, _)| outcome.is_error())
            .map(|(_, count)| count)
            .sum()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }
}

/// Tally for one full pass over all sources
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
    pub sources: Vec<SourceReport>,
}

impl CycleReport {
    pub fn new(started_at: DateTime<Local>) -> Self {
        Self {
            started_at,
            elapsed: Duration::ZERO,
            sources: Vec::new(),
        }
    }

    pub fn source(&self, source_id: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.source_id == source_id)
    }

    pub fn total_archived(&self) -> u64 {
        self.sources.iter().map(SourceReport::archived).sum()
    }

    pub fn total_errors(&self) -> u64 {
        self.sources.iter().map(SourceReport::errors).sum()
    }

    /// Emits one summary line per source plus a cycle total
    pub fn log_summary(&self) {
        for source in &self.sources {
            if let Some(reason) = &source.aborted {
                tracing::warn!(source = %source.source_id, %reason, "Source abandoned this cycle");
                continue;
            }
            tracing::info!(
                source = %source.source_id,
                candidates = source.candidates,
                already_seen = source.count(CandidateOutcome::AlreadySeen),
                archived = source.archived(),
                skipped = source.skipped(),
                errors = source.errors(),
                "Source finished"
            );
        }

        tracing::info!(
            archived = self.total_archived(),
            errors = self.total_errors(),
            elapsed_secs = self.elapsed.as_secs(),
            "Cycle finished"
        );
    }

    /// Prints the cycle summary to stdout in a formatted manner
    pub fn print_summary(&self) {
        println!("=== Cycle Summary ({}) ===\n", self.started_at.format("%Y-%m-%d %H:%M:%S"));

        for source in &self.sources {
            println!("{}:", source.source_id);
            if let Some(reason) = &source.aborted {
                println!("  Abandoned: {}", reason);
                println!();
                continue;
            }
            println!("  Candidates: {}", source.candidates);

            let mut counts: Vec<_> = source.outcomes.iter().collect();
            counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
            for (outcome, count) in counts {
                println!("  {}: {}", outcome, count);
            }
            println!();
        }

        println!(
            "Archived {} article(s) with {} error(s) in {:.1}s",
            self.total_archived(),
            self.total_errors(),
            self.elapsed.as_secs_f64()
        );
    }
}
