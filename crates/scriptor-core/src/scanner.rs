//! Script discovery.
//!
//! Walks the configured root, reads every regular file as a script, derives
//! its ordering key from the file name and attaches tags.

use std::collections::BTreeSet;
use std::path::Path;

use regex::Regex;
use walkdir::WalkDir;

use crate::config::ScannerConfig;
use crate::error::Error;
use crate::script::identity::normalize_path;
use crate::script::{OrderingKey, Script, Tag, TagMatcher};

/// Discovers scripts under a root directory.
#[derive(Debug)]
pub struct Scanner<'a> {
    config: &'a ScannerConfig,
    identifier: Regex,
}

impl<'a> Scanner<'a> {
    /// Create a scanner; fails if the identifier regex does not compile.
    pub fn new(config: &'a ScannerConfig) -> Result<Self, Error> {
        let identifier = Regex::new(&config.identifier_regex).map_err(|e| Error::InvalidPattern {
            pattern: config.identifier_regex.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { config, identifier })
    }

    /// Discover all scripts, sorted in execution order.
    ///
    /// Any unreadable entry aborts discovery. Two scripts whose ordering keys
    /// are identical yield [`Error::DuplicateOrderingKey`].
    pub fn scan(&self) -> Result<Vec<Script>, Error> {
        let root = &self.config.path;
        if !root.is_dir() {
            return Err(Error::Discovery {
                path: root.clone(),
                reason: "not a directory".to_string(),
            });
        }

        let mut scripts = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Discovery {
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone()),
                reason: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            scripts.push(self.load(entry.path())?);
        }

        scripts.sort_by(|a, b| a.execution_order(b));
        check_unique_keys(&scripts)?;

        tracing::info!(
            root = %root.display(),
            count = scripts.len(),
            "scripts discovered"
        );
        Ok(scripts)
    }

    /// Read a single script file.
    pub fn load(&self, path: &Path) -> Result<Script, Error> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Discovery {
                path: path.to_path_buf(),
                reason: "no file name".to_string(),
            })?;

        let bytes = std::fs::read(path).map_err(|e| Error::Discovery {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let content = String::from_utf8(bytes).map_err(|e| Error::Discovery {
            path: path.to_path_buf(),
            reason: format!("content is not valid UTF-8: {e}"),
        })?;

        let ordering_key = self.ordering_key(&name)?;
        let tags = self.tags(path);

        Ok(Script::new(name, path, ordering_key, content).with_tags(tags))
    }

    fn ordering_key(&self, name: &str) -> Result<OrderingKey, Error> {
        let captures = self
            .identifier
            .captures(name)
            .ok_or_else(|| Error::InvalidIdentifier {
                name: name.to_string(),
                pattern: self.config.identifier_regex.clone(),
            })?;
        let key = captures
            .get(1)
            .or_else(|| captures.get(0))
            .map(|m| m.as_str())
            .unwrap_or(name);
        Ok(OrderingKey::parse(key))
    }

    fn tags(&self, path: &Path) -> BTreeSet<Tag> {
        let full = normalize_path(path);
        let relative = path
            .strip_prefix(&self.config.path)
            .map(normalize_path)
            .unwrap_or_else(|_| full.clone());

        let mut tags = TagMatcher::tags_for(
            &self.config.tag_matchers,
            &[full.as_str(), relative.as_str()],
        );

        if self.config.tags_from_folder {
            tags.extend(folder_tags(&self.config.path, path));
        }
        tags
    }
}

fn folder_tags(root: &Path, path: &Path) -> Vec<Tag> {
    let Ok(relative) = path.strip_prefix(root) else {
        return Vec::new();
    };
    relative
        .parent()
        .map(|parent| {
            parent
                .components()
                .map(|c| Tag::new(c.as_os_str().to_string_lossy()))
                .collect()
        })
        .unwrap_or_default()
}

fn check_unique_keys(sorted: &[Script]) -> Result<(), Error> {
    for pair in sorted.windows(2) {
        if pair[0].ordering_key == pair[1].ordering_key {
            return Err(Error::DuplicateOrderingKey {
                key: pair[0].ordering_key.to_string(),
                first: pair[0].name.clone(),
                second: pair[1].name.clone(),
            });
        }
    }
    Ok(())
}

/// Discover scripts with the given configuration.
pub fn scan(config: &ScannerConfig) -> Result<Vec<Script>, Error> {
    Scanner::new(config)?.scan()
}
