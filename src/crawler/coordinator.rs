//! Crawler coordinator - one crawl cycle over every configured source
//!
//! For each source, in configured order:
//! - Enumerate candidates and drop the ones already in the ledger
//! - Start a rendering session if the source needs one
//! - Fetch and extract each remaining candidate, strictly one at a time
//! - Archive articles, capture diagnostics, mark the URL seen
//!
//! Per-candidate and per-source failures are logged and absorbed. Only
//! ledger and archive write failures end the cycle.

use super::fetcher::{build_http_client, uniform, ResilientFetcher, RetryPolicy};
use super::scheduler::{Pacer, TokioPacer};
use crate::config::Config;
use crate::output::{ArchiveWriter, CycleReport, DebugCapture, SourceReport};
use crate::render::{ChromeLauncher, RenderBackend, RenderLauncher};
use crate::sources::{Candidate, CandidateError, Extraction, SourceAdapter};
use crate::state::CandidateOutcome;
use crate::storage::DedupLedger;
use crate::CrawlError;
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Debug capture class for unexpected extraction failures
const ERROR_CAPTURE_CLASS: &str = "Error";

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    adapters: Vec<SourceAdapter>,
    fetcher: ResilientFetcher,
    launcher: Arc<dyn RenderLauncher>,
    pacer: Arc<dyn Pacer>,
    archive: ArchiveWriter,
    debug: DebugCapture,
}

impl Coordinator {
    /// Creates a coordinator that sleeps on the tokio timer and renders
    /// with a locally launched Chrome
    pub fn new(config: Config) -> Result<Self, CrawlError> {
        let launcher = Arc::new(ChromeLauncher::new(&config.renderer, &config.network));
        Self::with_collaborators(config, launcher, Arc::new(TokioPacer))
    }

    /// Creates a coordinator with an explicit renderer and pacer
    pub fn with_collaborators(
        config: Config,
        launcher: Arc<dyn RenderLauncher>,
        pacer: Arc<dyn Pacer>,
    ) -> Result<Self, CrawlError> {
        let adapters = SourceAdapter::all_from_config(&config)?;
        let client = build_http_client(&config.network)?;
        let fetcher = ResilientFetcher::new(
            client,
            RetryPolicy::from_config(&config.retry),
            Arc::clone(&pacer),
        );

        Ok(Self {
            archive: ArchiveWriter::new(&config.output.data_dir),
            debug: DebugCapture::new(&config.output.debug_dir),
            config: Arc::new(config),
            adapters,
            fetcher,
            launcher,
            pacer,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sources(&self) -> &[SourceAdapter] {
        &self.adapters
    }

    /// Clock used for every wait, including the pause between cycles
    pub fn pacer(&self) -> &dyn Pacer {
        self.pacer.as_ref()
    }

    /// Runs one full pass over all sources
    ///
    /// The ledger is reloaded (and swept) at the start of every cycle.
    pub async fn run_cycle(&self) -> Result<CycleReport, CrawlError> {
        let started = Instant::now();
        let mut report = CycleReport::new(Local::now());

        let mut ledger = DedupLedger::load(
            &PathBuf::from(&self.config.output.ledger_path),
            self.config.crawler.retention(),
        )?;
        tracing::info!(entries = ledger.len(), "Ledger loaded");

        for adapter in &self.adapters {
            let source_report = self.run_source(adapter, &mut ledger).await?;
            report.sources.push(source_report);
        }

        report.elapsed = started.elapsed();
        Ok(report)
    }

    async fn run_source(
        &self,
        adapter: &SourceAdapter,
        ledger: &mut DedupLedger,
    ) -> Result<SourceReport, CrawlError> {
        let source = adapter.id();
        let mut report = SourceReport::new(source);
        tracing::info!(source, kind = adapter.kind(), "Processing source");

        let candidates = match adapter.enumerate(&self.fetcher).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!(source, error = %e, "Enumeration failed, abandoning source for this cycle");
                report.aborted = Some(e.to_string());
                return Ok(report);
            }
        };
        report.candidates = candidates.len() as u64;

        let (seen, fresh): (Vec<Candidate>, Vec<Candidate>) =
            candidates.into_iter().partition(|c| ledger.contains(&c.url));
        for _ in &seen {
            report.record(CandidateOutcome::AlreadySeen);
        }
        tracing::info!(source, new = fresh.len(), already_seen = seen.len(), "Candidates enumerated");

        if fresh.is_empty() {
            return Ok(report);
        }

        let mut session = SessionGuard::empty(source);
        if adapter.needs_renderer() {
            match self.launcher.launch().await {
                Ok(backend) => session = SessionGuard::new(source, backend),
                Err(e) => {
                    tracing::error!(source, error = %e, "Renderer unavailable, abandoning source for this cycle");
                    report.aborted = Some(format!("renderer unavailable: {}", e));
                    return Ok(report);
                }
            }
        }

        let result = self
            .process_candidates(adapter, &fresh, ledger, &mut session, &mut report)
            .await;
        session.close().await;

        result.map(|_| report)
    }

    async fn process_candidates(
        &self,
        adapter: &SourceAdapter,
        candidates: &[Candidate],
        ledger: &mut DedupLedger,
        session: &mut SessionGuard,
        report: &mut SourceReport,
    ) -> Result<(), CrawlError> {
        for candidate in candidates {
            tracing::info!(source = adapter.id(), url = %candidate.url, title = %candidate.title, "New candidate");
            let outcome = self
                .process_candidate(adapter, candidate, ledger, session.session_mut())
                .await?;
            report.record(outcome);

            if let Some([low, high]) = adapter.pause_after() {
                self.pacer.pause(uniform(low, high)).await;
            }
        }
        Ok(())
    }

    /// Runs one candidate to its terminal outcome
    ///
    /// The archive append completes before the URL is marked seen, and the
    /// mark is durable before the next candidate starts.
    async fn process_candidate<B>(
        &self,
        adapter: &SourceAdapter,
        candidate: &Candidate,
        ledger: &mut DedupLedger,
        session: Option<&mut B>,
    ) -> Result<CandidateOutcome, CrawlError>
    where
        B: RenderBackend + ?Sized,
    {
        let source = adapter.id();

        let outcome = match adapter.extract(candidate, &self.fetcher, session).await {
            Ok(Extraction::Article(article)) => {
                let path = self.archive.append(source, &article)?;
                tracing::info!(
                    source,
                    url = %candidate.url,
                    path = %path.display(),
                    "Article archived"
                );
                CandidateOutcome::Archived
            }
            Ok(Extraction::Absent { reason, document }) => {
                if reason.wants_capture() {
                    self.debug
                        .capture(source, reason.capture_class(), &candidate.url, &document);
                }
                tracing::info!(source, url = %candidate.url, %reason, "Not an article");
                CandidateOutcome::Skipped(reason)
            }
            Err(CandidateError::Fetch(e)) => {
                tracing::error!(
                    source,
                    url = %candidate.url,
                    error = %e,
                    "Fetch failed, will retry next cycle"
                );
                CandidateOutcome::FetchFailed
            }
            Err(CandidateError::Render { error, document }) => {
                tracing::error!(source, url = %candidate.url, error = %error, "Extraction failed");
                if let Some(document) = document {
                    self.debug
                        .capture(source, ERROR_CAPTURE_CLASS, &candidate.url, &document);
                }
                CandidateOutcome::Failed
            }
        };

        if outcome.marks_seen() {
            ledger.mark_seen_now(&candidate.url)?;
            tracing::debug!(source, url = %candidate.url, %outcome, "Marked seen");
        }
        Ok(outcome)
    }
}

/// Owns a source's rendering session
///
/// Closed explicitly once the source is done. If the cycle future is
/// dropped mid-source, the close is spawned onto the runtime instead.
struct SessionGuard {
    source: String,
    session: Option<Box<dyn RenderBackend>>,
}

impl SessionGuard {
    fn empty(source: &str) -> Self {
        Self {
            source: source.to_string(),
            session: None,
        }
    }

    fn new(source: &str, session: Box<dyn RenderBackend>) -> Self {
        Self {
            source: source.to_string(),
            session: Some(session),
        }
    }

    fn session_mut(&mut self) -> Option<&mut (dyn RenderBackend + 'static)> {
        self.session.as_deref_mut()
    }

    async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close().await {
                tracing::warn!(source = %self.source, error = %e, "Failed to close rendering session");
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        let source = std::mem::take(&mut self.source);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(source = %source, "Closing abandoned rendering session");
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        tracing::warn!(source = %source, error = %e, "Failed to close abandoned rendering session");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(source = %source, "Rendering session dropped outside a runtime");
            }
        }
    }
}
