//! Declarative YAML test specification

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;

/// A complete test specification parsed from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSpec {
    /// Unique name for this test
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering tests
    #[serde(default)]
    pub tags: Vec<String>,

    /// How many times to run, each on a fresh session
    #[serde(default = "default_repeat")]
    pub repeat: u32,

    /// Steps to execute in order
    pub steps: Vec<TestStep>,
}

fn default_repeat() -> u32 {
    1
}

/// A single step in a test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a URL (relative to base)
    Navigate { url: String },

    /// Fill an input field
    Fill { locator: Locator, value: String },

    /// Click an element
    Click { locator: Locator },

    /// Wait until the page URL matches a glob
    WaitForUrl { pattern: String },

    /// Assert an element is visible
    ExpectVisible { locator: Locator },

    /// Take a screenshot
    Screenshot { name: String },

    /// Log a message (for debugging)
    Log { message: String },
}

impl TestStep {
    /// Short name used in logs and results
    pub fn name(&self) -> String {
        match self {
            TestStep::Navigate { url } => format!("navigate:{}", url),
            TestStep::Fill { locator, .. } => format!("fill:{}", locator),
            TestStep::Click { locator } => format!("click:{}", locator),
            TestStep::WaitForUrl { pattern } => format!("wait_for_url:{}", pattern),
            TestStep::ExpectVisible { locator } => format!("expect_visible:{}", locator),
            TestStep::Screenshot { name } => format!("screenshot:{}", name),
            TestStep::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
        }
    }

    fn substitute(&self, vars: &HashMap<String, String>) -> E2eResult<Self> {
        let sub = |s: &str| substitute(s, vars);
        Ok(match self {
            TestStep::Navigate { url } => TestStep::Navigate { url: sub(url)? },
            TestStep::Fill { locator, value } => TestStep::Fill {
                locator: substitute_locator(locator, vars)?,
                value: sub(value)?,
            },
            TestStep::Click { locator } => TestStep::Click {
                locator: substitute_locator(locator, vars)?,
            },
            TestStep::WaitForUrl { pattern } => TestStep::WaitForUrl {
                pattern: sub(pattern)?,
            },
            TestStep::ExpectVisible { locator } => TestStep::ExpectVisible {
                locator: substitute_locator(locator, vars)?,
            },
            TestStep::Screenshot { name } => TestStep::Screenshot { name: sub(name)? },
            TestStep::Log { message } => TestStep::Log {
                message: sub(message)?,
            },
        })
    }
}

fn substitute_locator(locator: &Locator, vars: &HashMap<String, String>) -> E2eResult<Locator> {
    Ok(match locator {
        Locator::Role { role, name, exact } => Locator::Role {
            role: *role,
            name: name.as_deref().map(|n| substitute(n, vars)).transpose()?,
            exact: *exact,
        },
        Locator::Text { text, exact } => Locator::Text {
            text: substitute(text, vars)?,
            exact: *exact,
        },
        Locator::Label { text } => Locator::Label {
            text: substitute(text, vars)?,
        },
        Locator::Css { selector } => Locator::Css {
            selector: substitute(selector, vars)?,
        },
    })
}

/// Expand `${name}` placeholders; `$$` is a literal `$`
pub fn substitute(input: &str, vars: &HashMap<String, String>) -> E2eResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(idx) = rest.find('$') {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
        } else if let Some(body) = after.strip_prefix('{') {
            let end = body.find('}').ok_or_else(|| {
                E2eError::SpecParse(format!("unterminated placeholder in {:?}", input))
            })?;
            let key = &body[..end];
            let value = vars.get(key).ok_or_else(|| {
                E2eError::SpecParse(format!("unknown placeholder ${{{}}}", key))
            })?;
            out.push_str(value);
            rest = &body[end + 1..];
        } else {
            out.push('$');
            rest = after;
        }
    }

    out.push_str(rest);
    Ok(out)
}

impl TestSpec {
    /// Parse a test spec from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        if spec.steps.is_empty() {
            return Err(E2eError::SpecParse(format!("{} has no steps", spec.name)));
        }
        if spec.repeat == 0 {
            return Err(E2eError::SpecParse(format!("{} has repeat: 0", spec.name)));
        }
        Ok(spec)
    }

    /// Parse a test spec from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all test specs from a directory, sorted by file path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        paths.iter().map(|p| Self::from_file(p)).collect()
    }

    /// Filter specs by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Copy of this spec with every placeholder expanded
    pub fn resolve(&self, vars: &HashMap<String, String>) -> E2eResult<Self> {
        let steps = self
            .steps
            .iter()
            .map(|step| step.substitute(vars))
            .collect::<E2eResult<Vec<_>>>()?;

        Ok(Self {
            steps,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::AriaRole;

    const LOGIN_YAML: &str = r#"
name: admin-login
description: Log into the admin
tags:
  - auth
  - smoke
steps:
  - action: navigate
    url: /admin/
  - action: fill
    locator: { by: role, role: textbox, name: "Username *" }
    value: ${username}
  - action: fill
    locator: { by: role, role: textbox, name: "Password *" }
    value: ${password}
  - action: click
    locator: { by: role, role: button, name: Sign in }
  - action: wait_for_url
    pattern: admin/admin/dashboard/**
  - action: expect_visible
    locator: { by: text, text: Thank you for choosing Mage-OS. }
"#;

    fn vars() -> HashMap<String, String> {
        HashMap::from([
            ("username".to_string(), "exampleuser".to_string()),
            ("password".to_string(), "examplepassword123".to_string()),
        ])
    }

    #[test]
    fn test_parse_login_spec() {
        let spec = TestSpec::from_yaml(LOGIN_YAML).unwrap();
        assert_eq!(spec.name, "admin-login");
        assert_eq!(spec.repeat, 1);
        assert_eq!(spec.steps.len(), 6);
        assert_eq!(
            spec.steps[3],
            TestStep::Click {
                locator: Locator::role_named(AriaRole::Button, "Sign in")
            }
        );
    }

    #[test]
    fn test_resolve_placeholders() {
        let spec = TestSpec::from_yaml(LOGIN_YAML).unwrap().resolve(&vars()).unwrap();
        match &spec.steps[2] {
            TestStep::Fill { value, .. } => assert_eq!(value, "examplepassword123"),
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_placeholders_in_locators_and_screenshot_names() {
        let yaml = r#"
name: greeting
steps:
  - action: expect_visible
    locator: { by: text, text: "Welcome, ${username}" }
  - action: click
    locator: { by: role, role: link, name: "${username}", exact: true }
  - action: fill
    locator: { by: css, selector: "input[value='${username}']" }
    value: x
  - action: screenshot
    name: dashboard-${username}
"#;
        let spec = TestSpec::from_yaml(yaml).unwrap().resolve(&vars()).unwrap();
        assert_eq!(
            spec.steps,
            vec![
                TestStep::ExpectVisible {
                    locator: Locator::text("Welcome, exampleuser")
                },
                TestStep::Click {
                    locator: Locator::role_named(AriaRole::Link, "exampleuser").exact()
                },
                TestStep::Fill {
                    locator: Locator::css("input[value='exampleuser']"),
                    value: "x".to_string()
                },
                TestStep::Screenshot {
                    name: "dashboard-exampleuser".to_string()
                },
            ]
        );

        let bad = "name: bad\nsteps:\n  - action: click\n    locator: { by: label, text: \"${nope}\" }\n";
        assert!(matches!(
            TestSpec::from_yaml(bad).unwrap().resolve(&vars()),
            Err(E2eError::SpecParse(_))
        ));
    }

    #[test]
    fn test_unknown_placeholder_is_error() {
        let err = substitute("${nope}", &vars()).unwrap_err();
        assert!(matches!(err, E2eError::SpecParse(_)));
    }

    #[test]
    fn test_dollar_escapes() {
        assert_eq!(substitute("a$$b$c", &vars()).unwrap(), "a$b$c");
    }

    #[test]
    fn test_empty_steps_rejected() {
        assert!(TestSpec::from_yaml("name: empty\nsteps: []\n").is_err());
    }

    #[test]
    fn test_load_all_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.yaml"), LOGIN_YAML).unwrap();
        std::fs::write(
            dir.path().join("a.yml"),
            "name: smoke-only\ntags: [smoke]\nsteps:\n  - action: navigate\n    url: /\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let specs = TestSpec::load_all(dir.path()).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "smoke-only");
        assert_eq!(TestSpec::filter_by_tag(&specs, "auth").len(), 1);
        assert_eq!(TestSpec::filter_by_tag(&specs, "smoke").len(), 2);
    }
}
