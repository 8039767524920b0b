//! Playwright browser automation
//!
//! Rust has no first-class Playwright runtime, so each session runs a small
//! node bridge (`bridge.js`) that owns one browser and one page. Requests and
//! responses are JSON objects, one per line, over the child's stdin/stdout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{TargetConfig, Timeouts};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::page::{Navigation, Page, PageLauncher};
use crate::url_pattern::UrlPattern;

const BRIDGE_SCRIPT: &str = include_str!("bridge.js");
const BRIDGE_CONFIG_ENV: &str = "MAGEOS_E2E_BRIDGE_CONFIG";

/// Extra wait on top of an operation's own timeout before giving up on the bridge
const RESPONSE_GRACE: Duration = Duration::from_secs(5);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> E2eResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::InvalidConfig(format!("unknown browser: {}", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: Url,
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub timeouts: Timeouts,

    /// `node` executable
    pub node_binary: PathBuf,

    /// Directory whose `node_modules` contains `playwright`
    pub node_project_dir: PathBuf,

    pub screenshot_dir: PathBuf,
}

impl PlaywrightConfig {
    pub fn new(target: &TargetConfig) -> Self {
        Self {
            base_url: target.base_url.clone(),
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            timeouts: target.timeouts,
            node_binary: PathBuf::from("node"),
            node_project_dir: PathBuf::from("."),
            screenshot_dir: PathBuf::from("test-results/screenshots"),
        }
    }

    fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            base_url: self.base_url.to_string(),
            browser: self.browser,
            headless: self.headless,
            viewport: Viewport {
                width: self.viewport_width,
                height: self.viewport_height,
            },
            timeouts: BridgeTimeouts {
                navigation_ms: self.timeouts.navigation.as_millis() as u64,
                action_ms: self.timeouts.action.as_millis() as u64,
                expect_ms: self.timeouts.expect.as_millis() as u64,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct BridgeConfig {
    base_url: String,
    browser: Browser,
    headless: bool,
    viewport: Viewport,
    timeouts: BridgeTimeouts,
}

#[derive(Debug, Serialize)]
struct Viewport {
    width: u32,
    height: u32,
}

#[derive(Debug, Serialize)]
struct BridgeTimeouts {
    navigation_ms: u64,
    action_ms: u64,
    expect_ms: u64,
}

/// A request to the bridge
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Goto { url: &'a str },
    Fill { locator: &'a Locator, value: &'a str },
    Click { locator: &'a Locator },
    WaitForUrl { pattern: &'a str },
    ExpectVisible { locator: &'a Locator },
    Screenshot { path: &'a Path },
    Url,
    Close,
}

impl Request<'_> {
    fn op(&self) -> &'static str {
        match self {
            Request::Goto { .. } => "goto",
            Request::Fill { .. } => "fill",
            Request::Click { .. } => "click",
            Request::WaitForUrl { .. } => "wait_for_url",
            Request::ExpectVisible { .. } => "expect_visible",
            Request::Screenshot { .. } => "screenshot",
            Request::Url => "url",
            Request::Close => "close",
        }
    }
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    request: Request<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum WireFailureKind {
    Navigation,
    ElementNotFound,
    Interaction,
    Timeout,
    Assertion,
    Protocol,
}

#[derive(Debug, Clone, Deserialize)]
struct WireFailure {
    kind: WireFailureKind,
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Response {
    id: Option<u64>,
    ok: bool,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    failure: Option<WireFailure>,
}

impl Response {
    /// Turn a failed response into the matching error, naming `subject`
    fn into_result(self, subject: &str) -> E2eResult<Self> {
        if self.ok {
            return Ok(self);
        }
        let failure = self.failure.unwrap_or(WireFailure {
            kind: WireFailureKind::Protocol,
            message: "failed response without details".to_string(),
        });
        Err(classify(failure, subject))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BridgeMessage {
    Event {
        event: String,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        version: Option<String>,
    },
    Response(Response),
}

fn classify(failure: WireFailure, subject: &str) -> E2eError {
    debug!("Playwright failure for {}: {}", subject, failure.message);
    let reason = first_line(&failure.message).to_string();

    match failure.kind {
        WireFailureKind::Navigation => E2eError::Navigation {
            url: subject.to_string(),
            reason,
        },
        WireFailureKind::ElementNotFound => E2eError::ElementNotFound {
            locator: subject.to_string(),
            reason,
        },
        WireFailureKind::Interaction => E2eError::Interaction {
            locator: subject.to_string(),
            reason,
        },
        WireFailureKind::Timeout => E2eError::Timeout(format!("{} ({})", subject, reason)),
        WireFailureKind::Assertion => {
            E2eError::AssertionFailed(format!("expected {} to be visible: {}", subject, reason))
        }
        WireFailureKind::Protocol => E2eError::Bridge(reason),
    }
}

/// Playwright errors carry a multi-line call log after the headline
fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or(message).trim()
}

/// Keep screenshot names to a safe file stem
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// One browser, one context, one page, owned by a node child process
pub struct PlaywrightSession {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    base_url: Url,
    timeouts: Timeouts,
    screenshot_dir: PathBuf,
    next_id: u64,
    closed: bool,

    /// Holds the bridge script on disk for the lifetime of the session
    _script_dir: TempDir,
}

impl PlaywrightSession {
    /// Start a browser and wait until the bridge reports it is ready
    pub async fn launch(config: PlaywrightConfig) -> E2eResult<Self> {
        let project_dir = std::fs::canonicalize(&config.node_project_dir)
            .map_err(|_| E2eError::PlaywrightNotFound)?;
        let node_modules = project_dir.join("node_modules");

        let script_dir = tempfile::tempdir()?;
        Self::check_playwright_installed(&config.node_binary, &node_modules, script_dir.path())
            .await?;

        std::fs::create_dir_all(&config.screenshot_dir)?;
        let screenshot_dir = std::fs::canonicalize(&config.screenshot_dir)?;

        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        let bridge_config = serde_json::to_string(&config.bridge_config())?;

        info!(
            "Launching {} ({}) for {}",
            config.browser.as_str(),
            if config.headless { "headless" } else { "headed" },
            config.base_url
        );

        let mut child = TokioCommand::new(&config.node_binary)
            .arg(&script_path)
            .current_dir(&project_dir)
            .env("NODE_PATH", &node_modules)
            .env(BRIDGE_CONFIG_ENV, bridge_config)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                E2eError::BridgeStartup(format!(
                    "Failed to spawn {}: {}",
                    config.node_binary.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::BridgeStartup("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::BridgeStartup("bridge stdout unavailable".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr));
        }

        let mut session = Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            base_url: config.base_url,
            timeouts: config.timeouts,
            screenshot_dir,
            next_id: 1,
            closed: false,
            _script_dir: script_dir,
        };

        match timeout(config.timeouts.launch, session.wait_for_ready()).await {
            Ok(Ok(())) => Ok(session),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(E2eError::BridgeStartup(format!(
                "browser not ready after {:?}",
                config.timeouts.launch
            ))),
        }
    }

    /// Check that node can resolve the `playwright` package the way the
    /// bridge will: from the script directory, through `NODE_PATH` only
    async fn check_playwright_installed(
        node_binary: &Path,
        node_modules: &Path,
        script_dir: &Path,
    ) -> E2eResult<()> {
        let status = TokioCommand::new(node_binary)
            .args(["-e", "require.resolve('playwright')"])
            .current_dir(script_dir)
            .env("NODE_PATH", node_modules)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// OS process id of the bridge, while it is running
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait_for_ready(&mut self) -> E2eResult<()> {
        loop {
            match self.read_message().await? {
                BridgeMessage::Event { event, version, .. } if event == "ready" => {
                    debug!("Browser ready (version {})", version.as_deref().unwrap_or("unknown"));
                    return Ok(());
                }
                BridgeMessage::Event { event, message, .. } if event == "fatal" => {
                    return Err(E2eError::BridgeStartup(message.unwrap_or_default()));
                }
                other => debug!("Ignoring bridge message before ready: {:?}", other),
            }
        }
    }

    /// Next JSON message from the bridge, skipping stray output
    async fn read_message(&mut self) -> E2eResult<BridgeMessage> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| E2eError::Bridge("bridge process exited".to_string()))?;

            match serde_json::from_str::<BridgeMessage>(&line) {
                Ok(message) => return Ok(message),
                Err(_) => debug!(target: "playwright", "{}", line),
            }
        }
    }

    async fn read_response(&mut self, id: u64) -> E2eResult<Response> {
        loop {
            match self.read_message().await? {
                BridgeMessage::Response(response) if response.id == Some(id) => return Ok(response),
                BridgeMessage::Response(response) if response.id.is_none() => {
                    let message = response
                        .failure
                        .map(|f| f.message)
                        .unwrap_or_else(|| "unsolicited response".to_string());
                    return Err(E2eError::Bridge(message));
                }
                BridgeMessage::Response(response) => {
                    warn!("Dropping stale bridge response {:?}", response.id);
                }
                BridgeMessage::Event { event, message, .. } if event == "fatal" => {
                    return Err(E2eError::Bridge(message.unwrap_or_default()));
                }
                BridgeMessage::Event { event, .. } => debug!("Bridge event: {}", event),
            }
        }
    }

    /// Send one request and wait for its response
    async fn call(&mut self, request: Request<'_>, budget: Duration) -> E2eResult<Response> {
        if self.closed {
            return Err(E2eError::Bridge("session is closed".to_string()));
        }

        let id = self.next_id;
        self.next_id += 1;
        let op = request.op();

        let mut line = serde_json::to_string(&Envelope { id, request })?;
        line.push('\n');

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| E2eError::Bridge("bridge stdin closed".to_string()))?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;

        match timeout(budget + RESPONSE_GRACE, self.read_response(id)).await {
            Ok(result) => result,
            Err(_) => Err(E2eError::Timeout(format!("bridge response to {}", op))),
        }
    }

    /// Terminate the bridge, gracefully first
    async fn terminate(&mut self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                    && timeout(Duration::from_millis(500), self.child.wait()).await.is_ok()
                {
                    return;
                }
            }
        }

        if let Err(e) = self.child.kill().await {
            warn!("Failed to kill Playwright bridge: {}", e);
        }
    }
}

#[async_trait]
impl Page for PlaywrightSession {
    async fn goto(&mut self, path: &str) -> E2eResult<Navigation> {
        let url = self.base_url.join(path)?;
        let url = url.as_str();

        let response = self
            .call(Request::Goto { url }, self.timeouts.navigation)
            .await?
            .into_result(url)?;

        Ok(Navigation {
            url: response.url.unwrap_or_else(|| url.to_string()),
            status: response.status,
        })
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        // Action timeout covers both the attach wait and the fill itself.
        let budget = self.timeouts.action * 2;
        self.call(Request::Fill { locator, value }, budget)
            .await?
            .into_result(&locator.describe())?;
        Ok(())
    }

    async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
        let budget = self.timeouts.action * 2;
        self.call(Request::Click { locator }, budget)
            .await?
            .into_result(&locator.describe())?;
        Ok(())
    }

    async fn wait_for_url(&mut self, pattern: &UrlPattern) -> E2eResult<String> {
        let response = self
            .call(
                Request::WaitForUrl { pattern: pattern.resolved() },
                self.timeouts.navigation,
            )
            .await?
            .into_result(&format!("URL matching {}", pattern))?;

        Ok(response.url.unwrap_or_default())
    }

    async fn expect_visible(&mut self, locator: &Locator) -> E2eResult<()> {
        self.call(Request::ExpectVisible { locator }, self.timeouts.expect)
            .await?
            .into_result(&locator.describe())?;
        Ok(())
    }

    async fn screenshot(&mut self, name: &str) -> E2eResult<PathBuf> {
        let path = self.screenshot_dir.join(format!("{}.png", sanitize_name(name)));
        let response = self
            .call(Request::Screenshot { path: &path }, self.timeouts.action)
            .await?
            .into_result(&format!("screenshot {}", name))?;

        Ok(response.path.unwrap_or(path))
    }

    async fn current_url(&mut self) -> E2eResult<String> {
        let response = self
            .call(Request::Url, self.timeouts.action)
            .await?
            .into_result("current URL")?;
        Ok(response.url.unwrap_or_default())
    }

    async fn close(&mut self) -> E2eResult<()> {
        if self.closed {
            return Ok(());
        }

        if let Err(e) = self.call(Request::Close, CLOSE_TIMEOUT).await {
            debug!("Bridge close request failed: {}", e);
        }
        self.closed = true;

        // EOF on stdin also makes the bridge shut the browser down.
        drop(self.stdin.take());

        match timeout(CLOSE_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => debug!("Playwright bridge exited with {}", status),
            Ok(Err(e)) => warn!("Failed to wait for Playwright bridge: {}", e),
            Err(_) => {
                warn!("Playwright bridge did not exit, terminating");
                self.terminate().await;
            }
        }

        Ok(())
    }
}

impl Drop for PlaywrightSession {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.child.start_kill();
        }
    }
}

async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "playwright", "{}", line);
    }
}

/// Launches a fresh Playwright session per test
#[derive(Debug, Clone)]
pub struct PlaywrightLauncher {
    config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    pub fn new(config: PlaywrightConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PageLauncher for PlaywrightLauncher {
    async fn launch(&self) -> E2eResult<Box<dyn Page>> {
        let session = PlaywrightSession::launch(self.config.clone()).await?;
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::AriaRole;

    #[test]
    fn test_request_wire_format() {
        let locator = Locator::role_named(AriaRole::Textbox, "Username *");
        let envelope = Envelope {
            id: 7,
            request: Request::Fill {
                locator: &locator,
                value: "exampleuser",
            },
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["op"], "fill");
        assert_eq!(json["value"], "exampleuser");
        assert_eq!(json["locator"]["role"], "textbox");

        let close = serde_json::to_value(&Envelope { id: 8, request: Request::Close }).unwrap();
        assert_eq!(close, serde_json::json!({ "id": 8, "op": "close" }));
    }

    #[test]
    fn test_failed_response_classification() {
        let line = r#"{"id":3,"ok":false,"failure":{"kind":"element_not_found","message":"locator.waitFor: Timeout 10000ms exceeded.\nCall log: ..."}}"#;
        let response = match serde_json::from_str::<BridgeMessage>(line).unwrap() {
            BridgeMessage::Response(r) => r,
            other => panic!("expected response, got {:?}", other),
        };
        let err = response.into_result("role=textbox").unwrap_err();
        match err {
            E2eError::ElementNotFound { locator, reason } => {
                assert_eq!(locator, "role=textbox");
                assert_eq!(reason, "locator.waitFor: Timeout 10000ms exceeded.");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_url_wait_timeout_classification() {
        let failure = WireFailure {
            kind: WireFailureKind::Timeout,
            message: "page.waitForURL: Timeout 30000ms exceeded.".to_string(),
        };
        assert!(matches!(classify(failure, "dashboard"), E2eError::Timeout(_)));
    }

    #[test]
    fn test_ready_event_parses() {
        let msg: BridgeMessage =
            serde_json::from_str(r#"{"event":"ready","version":"120.0"}"#).unwrap();
        assert!(matches!(msg, BridgeMessage::Event { ref event, .. } if event == "ready"));
    }

    #[test]
    fn test_browser_from_str() {
        assert_eq!("Firefox".parse::<Browser>().unwrap(), Browser::Firefox);
        assert!("lynx".parse::<Browser>().is_err());
    }

    #[tokio::test]
    async fn test_missing_node_project_is_playwright_not_found() {
        let target = TargetConfig::new("http://127.0.0.1:9/").unwrap();
        let config = PlaywrightConfig {
            node_binary: PathBuf::from("node-that-does-not-exist"),
            node_project_dir: PathBuf::from("no-such-node-project"),
            ..PlaywrightConfig::new(&target)
        };
        assert!(matches!(
            PlaywrightSession::launch(config).await,
            Err(E2eError::PlaywrightNotFound)
        ));
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("admin login/step 3"), "admin_login_step_3");
    }
}
