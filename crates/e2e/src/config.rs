//! Configuration for the system under test

use std::fmt;
use std::time::Duration;
use url::Url;

use crate::error::{E2eError, E2eResult};

pub const DEFAULT_USERNAME: &str = "exampleuser";
pub const DEFAULT_PASSWORD: &str = "examplepassword123";

/// Admin login credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME, DEFAULT_PASSWORD)
    }
}

// Never print the password, results and logs are shared artifacts.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Wait budgets applied by the automation layer
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Page loads and URL waits
    pub navigation: Duration,

    /// Locating and acting on elements
    pub action: Duration,

    /// Visibility assertions
    pub expect: Duration,

    /// Browser launch
    pub launch: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(30),
            action: Duration::from_secs(10),
            expect: Duration::from_secs(5),
            launch: Duration::from_secs(60),
        }
    }
}

impl Timeouts {
    /// Same budget for every wait, used by `MAGEOS_E2E_TIMEOUT_MS`
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            navigation: timeout,
            action: timeout,
            expect: timeout,
            ..Default::default()
        }
    }
}

/// Where the admin lives and how to log into it
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub base_url: Url,
    pub credentials: Credentials,
    pub timeouts: Timeouts,
}

impl TargetConfig {
    pub fn new(base_url: &str) -> E2eResult<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            credentials: Credentials::default(),
            timeouts: Timeouts::default(),
        })
    }

    /// Build from `MAGEOS_*` environment variables
    pub fn from_env() -> E2eResult<Self> {
        let base_url = std::env::var("MAGEOS_BASE_URL").map_err(|_| {
            E2eError::InvalidConfig("MAGEOS_BASE_URL is not set".to_string())
        })?;
        let mut config = Self::new(&base_url)?;

        if let Ok(username) = std::env::var("MAGEOS_ADMIN_USERNAME") {
            config.credentials.username = username;
        }
        if let Ok(password) = std::env::var("MAGEOS_ADMIN_PASSWORD") {
            config.credentials.password = password;
        }
        if let Ok(raw) = std::env::var("MAGEOS_E2E_TIMEOUT_MS") {
            let ms: u64 = raw.parse().map_err(|_| {
                E2eError::InvalidConfig(format!("MAGEOS_E2E_TIMEOUT_MS is not a number: {}", raw))
            })?;
            config.timeouts = Timeouts::uniform(Duration::from_millis(ms));
        }

        Ok(config)
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Resolve a path such as `/admin/` against the base origin
    pub fn resolve(&self, path: &str) -> E2eResult<Url> {
        Ok(self.base_url.join(path)?)
    }
}

/// Parse a base URL, forcing a trailing slash so relative joins keep the
/// last path segment (`https://host/shop` + `admin/` = `https://host/shop/admin/`).
pub fn parse_base_url(raw: &str) -> E2eResult<Url> {
    let mut url = Url::parse(raw)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(E2eError::InvalidConfig(format!(
            "base URL must be http(s): {}",
            raw
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
