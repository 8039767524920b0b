//! Element locators
//!
//! Locators describe *how* to find an element, not the element itself. They
//! are resolved lazily by the page at the moment an action runs, which is
//! what lets the automation layer poll until the element shows up.

use serde::{Deserialize, Serialize};
use std::fmt;

/// ARIA roles used by the admin pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AriaRole {
    Button,
    Checkbox,
    Heading,
    Link,
    Textbox,
    Combobox,
    Dialog,
    Alert,
    Menuitem,
}

impl AriaRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AriaRole::Button => "button",
            AriaRole::Checkbox => "checkbox",
            AriaRole::Heading => "heading",
            AriaRole::Link => "link",
            AriaRole::Textbox => "textbox",
            AriaRole::Combobox => "combobox",
            AriaRole::Dialog => "dialog",
            AriaRole::Alert => "alert",
            AriaRole::Menuitem => "menuitem",
        }
    }
}

/// How to find an element on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Locator {
    /// Accessible role plus accessible name
    Role {
        role: AriaRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default)]
        exact: bool,
    },

    /// Visible text content
    Text {
        text: String,
        #[serde(default)]
        exact: bool,
    },

    /// Form control by its label
    Label { text: String },

    /// Raw CSS selector
    Css { selector: String },
}

impl Locator {
    pub fn role(role: AriaRole) -> Self {
        Locator::Role {
            role,
            name: None,
            exact: false,
        }
    }

    /// `getByRole(role, { name })`
    pub fn role_named(role: AriaRole, name: impl Into<String>) -> Self {
        Locator::Role {
            role,
            name: Some(name.into()),
            exact: false,
        }
    }

    /// `getByText(text)`
    pub fn text(text: impl Into<String>) -> Self {
        Locator::Text {
            text: text.into(),
            exact: false,
        }
    }

    pub fn label(text: impl Into<String>) -> Self {
        Locator::Label { text: text.into() }
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css {
            selector: selector.into(),
        }
    }

    /// Require the name/text to match exactly instead of as a substring
    pub fn exact(mut self) -> Self {
        match &mut self {
            Locator::Role { exact, .. } | Locator::Text { exact, .. } => *exact = true,
            Locator::Label { .. } | Locator::Css { .. } => {}
        }
        self
    }

    /// Short label used in step names and logs
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Role { role, name: Some(name), exact } => {
                let suffix = if *exact { "s" } else { "i" };
                write!(f, "role={}[name={:?}{}]", role.as_str(), name, suffix)
            }
            Locator::Role { role, name: None, .. } => write!(f, "role={}", role.as_str()),
            Locator::Text { text, exact: true } => write!(f, "text={:?}", text),
            Locator::Text { text, exact: false } => write!(f, "text={}", text),
            Locator::Label { text } => write!(f, "label={}", text),
            Locator::Css { selector } => write!(f, "css={}", selector),
        }
    }
}
