//! Path ignore rules.
//!
//! A rule is `"[METHOD ]/path/glob"`. Glob segments are literals, `*` (one
//! segment), `**` (any number of segments), or `{param}` (one segment). A
//! rule without a method applies to every method.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::urls::{normalize_method, normalize_path};

static RE_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:([A-Za-z]+)\s+)?(/\S*)\s*$").unwrap());

#[derive(Debug, Clone)]
pub struct IgnoreRule {
    raw: String,
    method: Option<String>,
    path: Regex,
}

impl IgnoreRule {
    /// Compiles a rule string; returns `None` when it is not a valid rule.
    pub fn parse(rule: &str) -> Option<Self> {
        let caps = RE_RULE.captures(rule)?;
        let method = caps.get(1).map(|m| normalize_method(m.as_str()));
        let glob = normalize_path(caps.get(2)?.as_str());
        let path = Regex::new(&glob_to_regex(&glob)).ok()?;
        Some(Self {
            raw: rule.to_string(),
            method,
            path,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str, method: &str) -> bool {
        if let Some(rule_method) = &self.method {
            if *rule_method != normalize_method(method) {
                return false;
            }
        }
        let normalized = normalize_path(path);
        let candidate = if normalized == "/" { "" } else { normalized.as_str() };
        self.path.is_match(candidate)
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    for segment in glob.split('/').filter(|s| !s.is_empty()) {
        match segment {
            "**" => out.push_str("(?:/[^/]+)*"),
            "*" => out.push_str("/[^/]+"),
            s if s.len() > 2 && s.starts_with('{') && s.ends_with('}') => out.push_str("/[^/]+"),
            s => {
                out.push('/');
                out.push_str(&regex::escape(s));
            }
        }
    }
    out.push('$');
    out
}

/// Compiles every valid rule, skipping (and logging) invalid ones.
pub fn compile_rules<'a>(rules: impl IntoIterator<Item = &'a String>) -> Vec<IgnoreRule> {
    rules
        .into_iter()
        .filter_map(|raw| {
            let compiled = IgnoreRule::parse(raw);
            if compiled.is_none() {
                tracing::debug!(rule = %raw, "Skipping unparsable ignore rule");
            }
            compiled
        })
        .collect()
}

pub fn is_ignored(rules: &[IgnoreRule], path: &str, method: &str) -> bool {
    rules.iter().any(|rule| rule.matches(path, method))
}
