//! Timing for the crawler
//!
//! This module handles:
//! - The `Pacer` seam through which every politeness, backoff and
//!   inter-article wait passes
//! - The fixed-interval cycle loop, which never lets two cycles overlap

use super::coordinator::Coordinator;
use crate::CrawlError;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Suspends the crawl for a computed delay
///
/// Production code sleeps on the tokio timer; tests substitute an
/// implementation that records the requested delays instead.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Pacer backed by `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Runs crawl cycles back to back with a fixed pause in between
///
/// The pause is measured from the end of one cycle to the start of the
/// next, so a slow cycle pushes the following one back instead of
/// overlapping with it.
#[derive(Debug, Clone)]
pub struct CycleScheduler {
    interval: Duration,
}

impl CycleScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Loops until `shutdown` resolves or a cycle fails
    ///
    /// The wait between cycles goes through the coordinator's pacer.
    /// A cycle only fails when the ledger or an archive cannot be written;
    /// that error is returned. Shutdown may abandon a cycle midway, which
    /// is safe because every ledger write replaces the file atomically.
    pub async fn run<F>(&self, coordinator: &Coordinator, shutdown: F) -> Result<(), CrawlError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut cycle: u64 = 0;

        loop {
            cycle += 1;
            tracing::info!(cycle, "Starting crawl cycle");

            tokio::select! {
                result = coordinator.run_cycle() => {
                    let report = result?;
                    report.log_summary();
                }
                _ = &mut shutdown => {
                    tracing::info!(cycle, "Shutdown requested, abandoning current cycle");
                    return Ok(());
                }
            }

            tracing::info!(
                minutes = self.interval.as_secs() / 60,
                "Waiting for next cycle"
            );

            tokio::select! {
                _ = coordinator.pacer().pause(self.interval) => {}
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    return Ok(());
                }
            }
        }
    }
}
