//! Headless rendering backend used by sources whose articles only exist
//! after client-side script execution
//!
//! The coordinator talks to the browser exclusively through
//! [`RenderBackend`]; sessions are created through a [`RenderLauncher`] so
//! tests can substitute a scripted fake. The production implementation
//! launches headless Chrome and drives it over the DevTools protocol.

mod chrome;

pub use chrome::{ChromeLauncher, ChromeSession};

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a rendering session
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to start rendering session: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Browser protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("Rendering session already closed")]
    Closed,
}

/// How to find an element in a rendered document
///
/// In TOML: `dismiss = { xpath = "//button[...]" }` or `{ css = "button.ok" }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Locator {
    Css(String),
    Xpath(String),
}

impl Locator {
    /// Location strategy name, used in logs
    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Css(_) => "css selector",
            Self::Xpath(_) => "xpath",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Css(v) | Self::Xpath(v) => v,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy(), self.value())
    }
}

/// One live browser session
///
/// A session is used by a single task at a time and must be closed once
/// the source that needed it is done, including when processing failed.
#[async_trait]
pub trait RenderBackend: Send {
    /// Loads `url` and waits for the document to finish loading
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError>;

    /// Waits up to `timeout` for an element matching `locator`
    ///
    /// Returns `Ok(false)` when the element never appeared.
    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<bool, RenderError>;

    /// Clicks the element matching `locator` if it appears within `timeout`
    ///
    /// Returns `Ok(false)` when there was nothing to dismiss.
    async fn dismiss(&mut self, locator: &Locator, timeout: Duration) -> Result<bool, RenderError>;

    /// Returns the serialized current DOM
    async fn current_document(&mut self) -> Result<String, RenderError>;

    /// Ends the session; calling it again is a no-op
    async fn close(&mut self) -> Result<(), RenderError>;
}

/// Factory for rendering sessions
#[async_trait]
pub trait RenderLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn RenderBackend>, RenderError>;
}
