//! Tag matching and tag-based filtering.

use std::collections::{BTreeSet, HashSet};

use regex::Regex;

use super::identity::{Script, Tag};
use crate::error::Error;

/// Compile a path glob into an anchored regex.
///
/// `**` matches any sequence including `/`, `*` any sequence without `/`,
/// `?` a single character other than `/`. Everything else is literal.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, Error> {
    let normalized = pattern.replace('\\', "/");
    let mut regex = String::with_capacity(normalized.len() * 2 + 2);
    regex.push('^');

    let mut chars = normalized.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // `**/` also matches zero directories
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        regex.push_str("(?:.*/)?");
                    } else {
                        regex.push_str(".*");
                    }
                } else {
                    regex.push_str("[^/]*");
                }
            }
            '?' => regex.push_str("[^/]"),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');

    Regex::new(&regex).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Associates a tag with path globs.
#[derive(Debug, Clone)]
pub struct TagMatcher {
    tag: Tag,
    patterns: Vec<String>,
    compiled: Vec<Regex>,
}

impl TagMatcher {
    /// Create a matcher; fails if a pattern does not compile.
    pub fn new(
        tag: Tag,
        patterns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, Error> {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let compiled = patterns
            .iter()
            .map(|p| glob_to_regex(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            tag,
            patterns,
            compiled,
        })
    }

    /// The tag attached on match.
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// The configured globs.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Check whether a `/`-separated path satisfies any glob.
    pub fn matches(&self, path: &str) -> bool {
        self.compiled.iter().any(|re| re.is_match(path))
    }

    /// Tags from all matchers accepting any of the candidate paths.
    pub fn tags_for(matchers: &[TagMatcher], candidates: &[&str]) -> BTreeSet<Tag> {
        matchers
            .iter()
            .filter(|m| candidates.iter().any(|path| m.matches(path)))
            .map(|m| m.tag.clone())
            .collect()
    }
}

/// Include/exclude predicate over script tags.
#[derive(Debug, Clone, Default)]
pub struct TagFilter {
    whitelist: HashSet<Tag>,
    blacklist: HashSet<Tag>,
}

impl TagFilter {
    /// Create a filter. An empty whitelist accepts every script.
    pub fn new(
        whitelist: impl IntoIterator<Item = Tag>,
        blacklist: impl IntoIterator<Item = Tag>,
    ) -> Self {
        Self {
            whitelist: whitelist.into_iter().collect(),
            blacklist: blacklist.into_iter().collect(),
        }
    }

    /// Whether the script survives filtering. The blacklist wins.
    pub fn accepts(&self, script: &Script) -> bool {
        if script.has_any_tag(&self.blacklist) {
            return false;
        }
        self.whitelist.is_empty() || script.has_any_tag(&self.whitelist)
    }

    /// Keep the accepted scripts, preserving order.
    pub fn apply(&self, scripts: Vec<Script>) -> Vec<Script> {
        let before = scripts.len();
        let kept: Vec<Script> = scripts.into_iter().filter(|s| self.accepts(s)).collect();
        if kept.len() != before {
            tracing::debug!(
                kept = kept.len(),
                dropped = before - kept.len(),
                "tag filter applied"
            );
        }
        kept
    }
}
