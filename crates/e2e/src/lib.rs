//! Mage-OS admin E2E tests
//!
//! This crate drives a real browser through the Mage-OS admin from Rust:
//! - Probes the target until it answers HTTP
//! - Controls Playwright through a JSON-lines node bridge, one browser per test
//! - Locates elements by accessible role and name
//! - Runs the built-in login test or declarative YAML test specs
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner<L: PageLauncher>                                │
//! │    ├── launcher.launch() -> Box<dyn Page>                   │
//! │    ├── run_attempt(spec) -> TestResult                      │
//! │    └── write_results() -> test-results.json                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Page (PlaywrightSession ── stdin/stdout ── bridge.js)      │
//! │    ├── goto(path)                                           │
//! │    ├── fill(locator, value) / click(locator)                │
//! │    ├── wait_for_url(glob)                                   │
//! │    └── expect_visible(locator)                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  LoginDashboardTest                                         │
//! │    /admin/ → Username * → Password * → Sign in              │
//! │      → admin/admin/dashboard/** → welcome text visible      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod locator;
pub mod login;
pub mod page;
pub mod playwright;
pub mod runner;
pub mod spec;
pub mod target;
pub mod url_pattern;

pub use config::{Credentials, TargetConfig, Timeouts};
pub use error::{E2eError, E2eResult, FailureKind};
pub use locator::{AriaRole, Locator};
pub use login::LoginDashboardTest;
pub use page::{Navigation, Page, PageLauncher};
pub use runner::TestRunner;
pub use spec::{TestSpec, TestStep};
pub use url_pattern::UrlPattern;
