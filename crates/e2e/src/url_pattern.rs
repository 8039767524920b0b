//! Glob URL patterns, as accepted by `waitForURL`

use regex::Regex;
use std::fmt;
use url::Url;

use crate::error::{E2eError, E2eResult};

/// A glob pattern resolved against a base URL
///
/// `**` matches anything including `/`, `*` matches anything except `/`,
/// `{a,b}` is alternation and every other character is literal. Matching is
/// anchored at both ends.
#[derive(Debug, Clone)]
pub struct UrlPattern {
    glob: String,
    resolved: String,
    regex: Regex,
}

impl UrlPattern {
    /// Compile a glob, resolving it against `base` when it is relative
    pub fn new(glob: &str, base: Option<&Url>) -> E2eResult<Self> {
        let resolved = match base {
            Some(base) => resolve_glob(glob, base),
            None => glob.to_string(),
        };
        let regex = Regex::new(&glob_to_regex(&resolved)?)
            .map_err(|e| E2eError::SpecParse(format!("bad URL pattern {:?}: {}", glob, e)))?;

        Ok(Self {
            glob: glob.to_string(),
            resolved,
            regex,
        })
    }

    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    /// The pattern as written
    pub fn glob(&self) -> &str {
        &self.glob
    }

    /// The pattern after joining with the base URL
    pub fn resolved(&self) -> &str {
        &self.resolved
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resolved)
    }
}

impl PartialEq for UrlPattern {
    fn eq(&self, other: &Self) -> bool {
        self.resolved == other.resolved
    }
}

/// Join a relative glob onto the base URL textually; `Url::join` would
/// percent-encode the glob's braces.
fn resolve_glob(glob: &str, base: &Url) -> String {
    if glob.starts_with('*') || glob.contains("://") {
        return glob.to_string();
    }
    if let Some(rest) = glob.strip_prefix('/') {
        let origin = base.origin().ascii_serialization();
        return format!("{}/{}", origin, rest);
    }
    let mut prefix = base.as_str().to_string();
    if !prefix.ends_with('/') {
        // Drop the last segment, same as a URL join would.
        if let Some(idx) = prefix.rfind('/') {
            prefix.truncate(idx + 1);
        }
    }
    format!("{}{}", prefix, glob)
}

fn glob_to_regex(glob: &str) -> E2eResult<String> {
    let mut out = String::from("^");
    let mut chars = glob.chars().peekable();
    let mut in_group = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => out.push_str(&regex::escape(&escaped.to_string())),
                None => {
                    return Err(E2eError::SpecParse(format!(
                        "URL pattern ends with a lone backslash: {:?}",
                        glob
                    )))
                }
            },
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '{' if !in_group => {
                in_group = true;
                out.push_str("(?:");
            }
            '}' if in_group => {
                in_group = false;
                out.push(')');
            }
            ',' if in_group => out.push('|'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    if in_group {
        return Err(E2eError::SpecParse(format!(
            "unclosed '{{' in URL pattern: {:?}",
            glob
        )));
    }
    out.push('$');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn base() -> Url {
        Url::parse("https://mage.example.test/").unwrap()
    }

    #[test_case("https://mage.example.test/admin/admin/dashboard/", true; "dashboard root")]
    #[test_case("https://mage.example.test/admin/admin/dashboard/index/key/abc123/", true; "dashboard with key")]
    #[test_case("https://mage.example.test/admin/admin/", false; "login page")]
    #[test_case("https://mage.example.test/admin/admin/dashboardx/", false; "similar prefix")]
    #[test_case("https://other.example.test/admin/admin/dashboard/", false; "other host")]
    fn test_dashboard_pattern(url: &str, expected: bool) {
        let pattern = UrlPattern::new("admin/admin/dashboard/**", Some(&base())).unwrap();
        assert_eq!(pattern.matches(url), expected);
    }

    #[test]
    fn test_resolution_against_base() {
        let pattern = UrlPattern::new("admin/admin/dashboard/**", Some(&base())).unwrap();
        assert_eq!(
            pattern.resolved(),
            "https://mage.example.test/admin/admin/dashboard/**"
        );

        let nested = Url::parse("http://localhost:8080/shop/").unwrap();
        let pattern = UrlPattern::new("/admin/**", Some(&nested)).unwrap();
        assert_eq!(pattern.resolved(), "http://localhost:8080/admin/**");
    }

    #[test]
    fn test_single_star_stops_at_slash() {
        let pattern = UrlPattern::new("https://h/*/end", None).unwrap();
        assert!(pattern.matches("https://h/one/end"));
        assert!(!pattern.matches("https://h/one/two/end"));
    }

    #[test]
    fn test_alternation_and_literal_question_mark() {
        let pattern = UrlPattern::new("**/{login,signin}.html?x=1", None).unwrap();
        assert!(pattern.matches("https://h/a/login.html?x=1"));
        assert!(pattern.matches("https://h/signin.html?x=1"));
        assert!(!pattern.matches("https://h/signin.htmlax=1"));
    }

    #[test]
    fn test_unclosed_group_is_rejected() {
        assert!(UrlPattern::new("**/{a,b", None).is_err());
    }
}
