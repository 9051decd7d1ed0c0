//! Feed sources whose article text only exists in the rendered DOM
//!
//! Extraction drives a browser session: load the page, click away an
//! optional interstitial, wait for the content paragraphs, then classify.
//! Pages with a single paragraph are short notices and are not archived.

use super::feed::FeedList;
use super::{Candidate, CandidateError, Extraction};
use crate::config::{NetworkConfig, RenderedSourceConfig, RendererConfig};
use crate::crawler::{compile_selector, element_text, Pacer, ResilientFetcher};
use crate::render::{Locator, RenderBackend, RenderError};
use crate::state::AbsentReason;
use crate::{ConfigError, CrawlError};
use scraper::{Html, Selector};
use std::time::Duration;

#[derive(Debug)]
pub struct RenderedAdapter {
    id: String,
    feeds: FeedList,
    content_locator: Locator,
    content: Selector,
    dismiss: Option<Locator>,
    dismiss_wait: Duration,
    content_wait: Duration,
    settle: Duration,
    pause_after: Option<[f64; 2]>,
}

impl RenderedAdapter {
    pub fn from_config(
        config: &RenderedSourceConfig,
        network: &NetworkConfig,
        renderer: &RendererConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            id: config.id.clone(),
            feeds: FeedList::new(&config.id, &config.feeds, &config.exclude, network)?,
            content_locator: Locator::Css(config.content_selector.clone()),
            content: compile_selector(&config.content_selector)?,
            dismiss: config.dismiss.clone(),
            dismiss_wait: renderer.dismiss_wait(),
            content_wait: renderer.content_wait(),
            settle: renderer.settle(),
            pause_after: config.pause_after,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pause_after(&self) -> Option<[f64; 2]> {
        self.pause_after
    }

    pub async fn enumerate(&self, fetcher: &ResilientFetcher) -> Result<Vec<Candidate>, CrawlError> {
        self.feeds.enumerate(fetcher, false).await
    }

    /// Renders the candidate page and classifies it
    ///
    /// A failing browser command is reported together with whatever DOM
    /// the session can still return.
    pub async fn extract<B>(
        &self,
        candidate: &Candidate,
        session: &mut B,
        pacer: &dyn Pacer,
    ) -> Result<Extraction, CandidateError>
    where
        B: RenderBackend + ?Sized,
    {
        match self.render(candidate, session, pacer).await {
            Ok(extraction) => Ok(extraction),
            Err(error) => {
                let document = session.current_document().await.ok();
                Err(CandidateError::Render { error, document })
            }
        }
    }

    async fn render<B>(
        &self,
        candidate: &Candidate,
        session: &mut B,
        pacer: &dyn Pacer,
    ) -> Result<Extraction, RenderError>
    where
        B: RenderBackend + ?Sized,
    {
        session.navigate(&candidate.url).await?;

        if let Some(dismiss) = &self.dismiss {
            if session.dismiss(dismiss, self.dismiss_wait).await? {
                pacer.pause(self.settle).await;
            }
        }

        if !session.wait_for(&self.content_locator, self.content_wait).await? {
            tracing::info!(source = %self.id, url = %candidate.url, "No content paragraphs (video or empty page)");
            let document = session.current_document().await?;
            return Ok(Extraction::no_content(&document));
        }

        let document = session.current_document().await?;
        Ok(self.classify(candidate, &document))
    }

    /// Decides article vs. short notice from the rendered DOM
    pub fn classify(&self, candidate: &Candidate, document: &str) -> Extraction {
        let html = Html::parse_document(document);
        let paragraphs: Vec<String> = html
            .select(&self.content)
            .map(|p| element_text(p, None).replace('\n', ""))
            .collect();

        if paragraphs.len() <= 1 {
            tracing::info!(source = %self.id, url = %candidate.url, paragraphs = paragraphs.len(), "Short notice");
            return Extraction::Absent {
                reason: AbsentReason::Brief,
                document: document.to_string(),
            };
        }

        Extraction::checked(
            &candidate.title,
            paragraphs.join("\n"),
            candidate.archive_date(),
            document,
        )
    }
}
