//! Path pattern matching for HTTP selectors
//!
//! Patterns are `/`-separated; a segment starting with `:` is a path
//! parameter and matches exactly one non-empty segment.
//!
//! - `EQUALS`: the whole path must match (a trailing `/` is tolerated)
//! - `STARTS_WITH`: the pattern must match a leading run of whole segments,
//!   so `/api` matches `/api` and `/api/users` but not `/apikeys`
//!
//! Compiled patterns are cached per (pattern, operator) pair.

use dashmap::DashMap;
use flowgate_core::Operator;
use regex::Regex;

/// Matches request paths against selector patterns
#[derive(Debug, Default)]
pub struct PathMatcher {
    /// `None` marks a pattern that failed to compile
    compiled: DashMap<(String, Operator), Option<Regex>>,
}

impl PathMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `path` satisfies `pattern` under `operator`
    ///
    /// Invalid patterns never match.
    pub fn matches(&self, pattern: &str, operator: Operator, path: &str) -> bool {
        let key = (pattern.to_string(), operator);
        if let Some(entry) = self.compiled.get(&key) {
            return entry.as_ref().is_some_and(|regex| regex.is_match(path));
        }

        let compiled = match compile(pattern, operator) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::warn!(
                    "Invalid path pattern '{}' in flow selector: {}",
                    pattern,
                    e
                );
                None
            }
        };
        let matched = compiled.as_ref().is_some_and(|regex| regex.is_match(path));
        self.compiled.insert(key, compiled);
        matched
    }

    /// Number of cached patterns
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

fn compile(pattern: &str, operator: Operator) -> Result<Regex, regex::Error> {
    let trimmed = pattern.trim_end_matches('/');
    let mut expression = String::with_capacity(trimmed.len() + 16);
    expression.push('^');

    for (i, segment) in trimmed.split('/').enumerate() {
        if i > 0 {
            expression.push('/');
        }
        if segment.len() > 1 && segment.starts_with(':') {
            expression.push_str("[^/]+");
        } else {
            expression.push_str(&regex::escape(segment));
        }
    }

    match operator {
        Operator::Equals => expression.push_str("/?$"),
        Operator::StartsWith => expression.push_str("(?:/.*)?$"),
    }

    Regex::new(&expression)
}
