//! The browser page seam
//!
//! Everything a test does to the browser goes through [`Page`]. The real
//! implementation is [`crate::playwright::PlaywrightSession`]; tests can
//! supply their own.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::E2eResult;
use crate::locator::Locator;
use crate::url_pattern::UrlPattern;

/// Outcome of a page load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// URL after redirects
    pub url: String,

    /// Main document status, when the browser reported one
    pub status: Option<u16>,
}

impl Navigation {
    pub fn is_http_error(&self) -> bool {
        self.status.map(|s| s >= 400).unwrap_or(false)
    }
}

/// One browser tab inside its own session
#[async_trait]
pub trait Page: Send {
    /// Load `path` relative to the configured base URL
    async fn goto(&mut self, path: &str) -> E2eResult<Navigation>;

    /// Replace the value of an input
    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()>;

    async fn click(&mut self, locator: &Locator) -> E2eResult<()>;

    /// Block until the current URL matches, returning it
    async fn wait_for_url(&mut self, pattern: &UrlPattern) -> E2eResult<String>;

    async fn expect_visible(&mut self, locator: &Locator) -> E2eResult<()>;

    async fn screenshot(&mut self, name: &str) -> E2eResult<PathBuf>;

    async fn current_url(&mut self) -> E2eResult<String>;

    /// Release the session. Safe to call more than once.
    async fn close(&mut self) -> E2eResult<()>;
}

/// Creates fresh, independent sessions
#[async_trait]
pub trait PageLauncher: Send + Sync {
    async fn launch(&self) -> E2eResult<Box<dyn Page>>;
}
