//! Test runner: one fresh browser session per test attempt

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{E2eError, E2eResult, FailureKind};
use crate::login::LoginDashboardTest;
use crate::page::{Page, PageLauncher};
use crate::spec::{TestSpec, TestStep};
use crate::url_pattern::UrlPattern;

/// A file captured during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub sha256: String,
}

/// Result of executing a test step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub failure_kind: Option<FailureKind>,
    pub error: Option<String>,
    pub screenshot: Option<Artifact>,
}

/// Result of running a single test attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub attempt: u32,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub failed_step: Option<String>,
    pub failure_kind: Option<FailureKind>,
    pub error: Option<String>,
}

impl TestResult {
    fn harness_failure(name: &str, attempt: u32, started_at: DateTime<Utc>, err: &E2eError) -> Self {
        Self {
            name: name.to_string(),
            attempt,
            success: false,
            started_at,
            duration_ms: 0,
            steps: vec![],
            failed_step: None,
            failure_kind: Some(err.failure_kind()),
            error: Some(err.to_string()),
        }
    }
}

/// Result of running all tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.total > 0
    }
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub base_url: Url,

    /// Values for `${name}` placeholders in specs
    pub variables: HashMap<String, String>,

    /// YAML specs; the built-in login test runs when this does not exist
    pub specs_dir: PathBuf,

    /// Output directory for results
    pub output_dir: PathBuf,

    /// Runs per test, overriding a spec's own `repeat` when set
    pub repeat: Option<u32>,

    pub screenshot_on_failure: bool,
}

impl RunnerConfig {
    pub fn new(base_url: Url, login: &LoginDashboardTest) -> Self {
        let mut variables = login.variables();
        variables.insert("base_url".to_string(), base_url.to_string());

        Self {
            base_url,
            variables,
            specs_dir: PathBuf::from("specs"),
            output_dir: PathBuf::from("test-results"),
            repeat: None,
            screenshot_on_failure: true,
        }
    }
}

/// Main E2E test runner
pub struct TestRunner<L> {
    launcher: L,
    config: RunnerConfig,
}

impl<L: PageLauncher> TestRunner<L> {
    pub fn new(launcher: L, config: RunnerConfig) -> Self {
        Self { launcher, config }
    }

    /// Specs from the specs directory, or the built-in login test
    pub fn load_specs(&self) -> E2eResult<Vec<TestSpec>> {
        if self.config.specs_dir.is_dir() {
            let specs = TestSpec::load_all(&self.config.specs_dir)?;
            if !specs.is_empty() {
                return Ok(specs);
            }
        }
        debug!(
            "No specs in {}, using built-in {}",
            self.config.specs_dir.display(),
            LoginDashboardTest::NAME
        );
        Ok(vec![LoginDashboardTest::default().to_spec()])
    }

    /// Run tests matching a tag
    pub async fn run_tagged(&self, specs: &[TestSpec], tag: &str) -> TestSuiteResult {
        let filtered: Vec<TestSpec> = TestSpec::filter_by_tag(specs, tag)
            .into_iter()
            .cloned()
            .collect();
        self.run_specs(&filtered).await
    }

    /// Run a specific test by name
    pub async fn run_named(&self, specs: &[TestSpec], name: &str) -> E2eResult<TestSuiteResult> {
        let spec = specs
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::SpecParse(format!("Test not found: {}", name)))?;
        Ok(self.run_specs(std::slice::from_ref(spec)).await)
    }

    /// Run a list of test specs, each attempt on its own session
    pub async fn run_specs(&self, specs: &[TestSpec]) -> TestSuiteResult {
        let start = Instant::now();
        let mut results = Vec::new();

        info!("Running {} test(s)...", specs.len());

        for spec in specs {
            let repeat = self.config.repeat.unwrap_or(spec.repeat).max(1);
            for attempt in 1..=repeat {
                let started_at = Utc::now();
                let result = match self.run_attempt(spec, attempt).await {
                    Ok(result) => result,
                    Err(e) => TestResult::harness_failure(&spec.name, attempt, started_at, &e),
                };

                if result.success {
                    info!("✓ {} #{} ({} ms)", result.name, attempt, result.duration_ms);
                } else {
                    error!(
                        "✗ {} #{} - {}{}",
                        result.name,
                        attempt,
                        result
                            .failed_step
                            .as_deref()
                            .map(|s| format!("{}: ", s))
                            .unwrap_or_default(),
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
                results.push(result);
            }
        }

        let passed = results.iter().filter(|r| r.success).count();
        let failed = results.len() - passed;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Test Results: {} passed, {} failed ({} ms)",
            passed, failed, duration_ms
        );

        TestSuiteResult {
            total: results.len(),
            passed,
            failed,
            duration_ms,
            results,
        }
    }

    /// Run a spec once. The session is closed on every path out.
    pub async fn run_attempt(&self, spec: &TestSpec, attempt: u32) -> E2eResult<TestResult> {
        let start = Instant::now();
        let started_at = Utc::now();
        debug!("Running test: {} (attempt {})", spec.name, attempt);

        let resolved = spec.resolve(&self.config.variables)?;
        let mut page = self.launcher.launch().await?;

        let steps = self
            .execute_steps(page.as_mut(), &resolved, attempt)
            .await;

        if let Err(e) = page.close().await {
            warn!("Failed to close browser session for {}: {}", spec.name, e);
        }

        let failure = steps.iter().find(|s| !s.success);
        Ok(TestResult {
            name: spec.name.clone(),
            attempt,
            success: failure.is_none(),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            failed_step: failure.map(|s| s.step_name.clone()),
            failure_kind: failure.and_then(|s| s.failure_kind),
            error: failure.and_then(|s| s.error.clone()),
            steps,
        })
    }

    /// Execute steps in order, stopping at the first failure
    async fn execute_steps(&self, page: &mut dyn Page, spec: &TestSpec, attempt: u32) -> Vec<StepResult> {
        let mut results = Vec::with_capacity(spec.steps.len());

        for step in &spec.steps {
            let step_start = Instant::now();
            let step_name = step.name();
            debug!("Executing step: {}", step_name);

            let outcome = execute_step(page, step, &self.config.base_url).await;
            let duration_ms = step_start.elapsed().as_millis() as u64;

            match outcome {
                Ok(screenshot) => results.push(StepResult {
                    step_name,
                    success: true,
                    duration_ms,
                    failure_kind: None,
                    error: None,
                    screenshot,
                }),
                Err(e) => {
                    let screenshot = if self.config.screenshot_on_failure {
                        capture(page, &format!("{}-{}-failure", spec.name, attempt)).await
                    } else {
                        None
                    };
                    results.push(StepResult {
                        step_name,
                        success: false,
                        duration_ms,
                        failure_kind: Some(e.failure_kind()),
                        error: Some(e.to_string()),
                        screenshot,
                    });
                    break;
                }
            }
        }

        results
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// Execute one step; relative URL patterns resolve against `base_url`
pub(crate) async fn execute_step(
    page: &mut dyn Page,
    step: &TestStep,
    base_url: &Url,
) -> E2eResult<Option<Artifact>> {
    match step {
        TestStep::Navigate { url } => {
            let navigation = page.goto(url).await?;
            if navigation.is_http_error() {
                warn!("{} answered HTTP {:?}", navigation.url, navigation.status);
            }
        }
        TestStep::Fill { locator, value } => page.fill(locator, value).await?,
        TestStep::Click { locator } => page.click(locator).await?,
        TestStep::WaitForUrl { pattern } => {
            let pattern = UrlPattern::new(pattern, Some(base_url))?;
            let url = page.wait_for_url(&pattern).await?;
            debug!("URL matched: {}", url);
        }
        TestStep::ExpectVisible { locator } => page.expect_visible(locator).await?,
        TestStep::Screenshot { name } => {
            let path = page.screenshot(name).await?;
            return Ok(Some(artifact(path)?));
        }
        TestStep::Log { message } => info!("[TEST LOG] {}", message),
    }
    Ok(None)
}

/// Best-effort diagnostic screenshot; never masks the step's own error
async fn capture(page: &mut dyn Page, name: &str) -> Option<Artifact> {
    match page.screenshot(name).await.and_then(artifact) {
        Ok(artifact) => Some(artifact),
        Err(e) => {
            warn!("Failure screenshot {} not captured: {}", name, e);
            None
        }
    }
}

fn artifact(path: PathBuf) -> E2eResult<Artifact> {
    let sha256 = digest_file(&path)?;
    Ok(Artifact { path, sha256 })
}

fn digest_file(path: &Path) -> E2eResult<String> {
    let bytes = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            digest_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_empty_suite_is_not_success() {
        let suite = TestSuiteResult {
            total: 0,
            passed: 0,
            failed: 0,
            duration_ms: 0,
            results: vec![],
        };
        assert!(!suite.is_success());
    }
}
