//! Admin login test
//!
//! Loads the admin, signs in and checks the dashboard greeting. Each step
//! blocks until it completes or fails, and the first failure ends the test.

use std::collections::HashMap;
use tracing::{debug, info};
use url::Url;

use crate::config::Credentials;
use crate::error::E2eResult;
use crate::locator::{AriaRole, Locator};
use crate::page::Page;
use crate::runner::execute_step;
use crate::spec::{TestSpec, TestStep};

pub const ADMIN_PATH: &str = "/admin/";
pub const DASHBOARD_PATTERN: &str = "admin/admin/dashboard/**";
pub const WELCOME_TEXT: &str = "Thank you for choosing Mage-OS.";
pub const USERNAME_LABEL: &str = "Username *";
pub const PASSWORD_LABEL: &str = "Password *";
pub const SIGN_IN_LABEL: &str = "Sign in";

/// Log in on the admin and view the dashboard
#[derive(Debug, Clone)]
pub struct LoginDashboardTest {
    pub admin_path: String,
    pub credentials: Credentials,
    pub dashboard_pattern: String,
    pub welcome_text: String,
}

impl Default for LoginDashboardTest {
    fn default() -> Self {
        Self {
            admin_path: ADMIN_PATH.to_string(),
            credentials: Credentials::default(),
            dashboard_pattern: DASHBOARD_PATTERN.to_string(),
            welcome_text: WELCOME_TEXT.to_string(),
        }
    }
}

impl LoginDashboardTest {
    pub const NAME: &'static str = "admin-login-dashboard";

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            credentials,
            ..Default::default()
        }
    }

    pub fn username_field() -> Locator {
        Locator::role_named(AriaRole::Textbox, USERNAME_LABEL)
    }

    pub fn password_field() -> Locator {
        Locator::role_named(AriaRole::Textbox, PASSWORD_LABEL)
    }

    pub fn sign_in_button() -> Locator {
        Locator::role_named(AriaRole::Button, SIGN_IN_LABEL)
    }

    pub fn welcome_message(&self) -> Locator {
        Locator::text(self.welcome_text.clone())
    }

    /// The test as declarative steps, credentials expanded
    pub fn steps(&self) -> Vec<TestStep> {
        vec![
            TestStep::Navigate {
                url: self.admin_path.clone(),
            },
            TestStep::Fill {
                locator: Self::username_field(),
                value: self.credentials.username.clone(),
            },
            TestStep::Fill {
                locator: Self::password_field(),
                value: self.credentials.password.clone(),
            },
            TestStep::Click {
                locator: Self::sign_in_button(),
            },
            TestStep::WaitForUrl {
                pattern: self.dashboard_pattern.clone(),
            },
            TestStep::ExpectVisible {
                locator: self.welcome_message(),
            },
        ]
    }

    /// The test as a named spec with `${username}`/`${password}` placeholders
    pub fn to_spec(&self) -> TestSpec {
        let steps = self
            .steps()
            .into_iter()
            .map(|step| match step {
                TestStep::Fill { locator, .. } if locator == Self::username_field() => {
                    TestStep::Fill {
                        locator,
                        value: "${username}".to_string(),
                    }
                }
                TestStep::Fill { locator, .. } if locator == Self::password_field() => {
                    TestStep::Fill {
                        locator,
                        value: "${password}".to_string(),
                    }
                }
                other => other,
            })
            .collect();

        TestSpec {
            name: Self::NAME.to_string(),
            description: "We can log in on the admin and view the dashboard".to_string(),
            tags: vec!["auth".to_string(), "smoke".to_string()],
            repeat: 1,
            steps,
        }
    }

    /// Placeholder values for [`Self::to_spec`]
    pub fn variables(&self) -> HashMap<String, String> {
        HashMap::from([
            ("username".to_string(), self.credentials.username.clone()),
            ("password".to_string(), self.credentials.password.clone()),
        ])
    }

    /// Run the login flow on `page`, stopping at the first failed step
    pub async fn run(&self, page: &mut dyn Page, base_url: &Url) -> E2eResult<()> {
        for step in self.steps() {
            debug!("Executing step: {}", step.name());
            execute_step(page, &step, base_url).await?;
        }
        info!("Signed in as {}", self.credentials.username);
        Ok(())
    }
}
