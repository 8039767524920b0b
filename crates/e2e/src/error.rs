//! Error types for E2E testing

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Element not found: {locator} ({reason})")]
    ElementNotFound { locator: String, reason: String },

    #[error("Interaction with {locator} failed: {reason}")]
    Interaction { locator: String, reason: String },

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright bridge failed to start: {0}")]
    BridgeStartup(String),

    #[error("Playwright bridge error: {0}")]
    Bridge(String),

    #[error("Target not reachable after {0} attempts")]
    TargetUnreachable(usize),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Test spec parse error: {0}")]
    SpecParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

/// Coarse classification of a failure, recorded in test results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Navigation,
    ElementNotFound,
    Interaction,
    Timeout,
    Assertion,
    Harness,
}

impl E2eError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            E2eError::Navigation { .. } => FailureKind::Navigation,
            E2eError::ElementNotFound { .. } => FailureKind::ElementNotFound,
            E2eError::Interaction { .. } => FailureKind::Interaction,
            E2eError::Timeout(_) => FailureKind::Timeout,
            E2eError::AssertionFailed(_) => FailureKind::Assertion,
            _ => FailureKind::Harness,
        }
    }
}

pub type E2eResult<T> = Result<T, E2eError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_mapping() {
        let err = E2eError::ElementNotFound {
            locator: "role=textbox[name=\"Username *\"]".into(),
            reason: "not attached".into(),
        };
        assert_eq!(err.failure_kind(), FailureKind::ElementNotFound);
        assert_eq!(E2eError::Timeout("url".into()).failure_kind(), FailureKind::Timeout);
        assert_eq!(E2eError::TargetUnreachable(3).failure_kind(), FailureKind::Harness);
    }

    #[test]
    fn test_failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::ElementNotFound).unwrap();
        assert_eq!(json, "\"element_not_found\"");
    }
}
