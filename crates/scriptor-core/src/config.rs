//! Engine configuration.
//!
//! All configuration is carried by a [`ScriptorConfig`] value passed to
//! [`Scriptor::new`](crate::Scriptor::new); nothing is read from globals.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::driver::DriverConfig;
use crate::notifier::NotifierConfig;
use crate::script::{Tag, TagFilter, TagMatcher};

/// Default identifier pattern: the whole file name is the ordering key.
pub const DEFAULT_IDENTIFIER_REGEX: &str = "(.*)";

/// Default bound on each monitoring call.
pub const DEFAULT_NOTIFIER_TIMEOUT: Duration = Duration::from_secs(5);

/// How scripts are discovered.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Root directory scanned recursively.
    pub path: PathBuf,
    /// Regex applied to file names; the first capture group is the ordering key.
    pub identifier_regex: String,
    /// Path-glob tag rules.
    pub tag_matchers: Vec<TagMatcher>,
    /// Tag every script with the names of its parent folders below the root.
    pub tags_from_folder: bool,
}

impl ScannerConfig {
    /// Scan the given root with default settings.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            identifier_regex: DEFAULT_IDENTIFIER_REGEX.to_string(),
            tag_matchers: Vec::new(),
            tags_from_folder: false,
        }
    }

    /// Set the identifier regex.
    pub fn with_identifier_regex(mut self, regex: impl Into<String>) -> Self {
        self.identifier_regex = regex.into();
        self
    }

    /// Add a tag matcher.
    pub fn with_tag_matcher(mut self, matcher: TagMatcher) -> Self {
        self.tag_matchers.push(matcher);
        self
    }

    /// Enable or disable folder tags.
    pub fn with_tags_from_folder(mut self, enabled: bool) -> Self {
        self.tags_from_folder = enabled;
        self
    }
}

/// Tag-based selection of scripts.
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    /// If non-empty, only scripts carrying one of these tags are considered.
    pub whitelisted_tags: Vec<Tag>,
    /// Scripts carrying one of these tags are ignored.
    pub blacklisted_tags: Vec<Tag>,
    /// Already executed scripts carrying one of these tags run again.
    pub tags_to_play_again: Vec<Tag>,
}

impl FilterConfig {
    /// Build the include/exclude predicate.
    pub fn tag_filter(&self) -> TagFilter {
        TagFilter::new(
            self.whitelisted_tags.iter().cloned(),
            self.blacklisted_tags.iter().cloned(),
        )
    }
}

/// What the executor does with scheduled scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Execute, mark or override as reconciled.
    #[default]
    Normal,
    /// Reconcile only; nothing reaches the driver or the notifier.
    Dry,
    /// Record every new script as executed without running it.
    ForceMarkAsExecuted,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Normal => write!(f, "normal"),
            ExecutionMode::Dry => write!(f, "dry"),
            ExecutionMode::ForceMarkAsExecuted => write!(f, "force_mark_as_executed"),
        }
    }
}

/// Handling of executed scripts whose checksum changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriftPolicy {
    /// Abort before executing anything.
    #[default]
    Fail,
    /// Accept the new checksum through `override_script`.
    Override,
}

/// Executor behaviour.
#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    /// Execution mode.
    pub mode: ExecutionMode,
    /// Record KO scripts and keep going instead of halting.
    pub continue_on_failure: bool,
    /// Changed-script policy.
    pub drift_policy: DriftPolicy,
    /// Globs of scripts to record as executed without running.
    pub mark_as_executed: Vec<String>,
    /// Globs of scripts whose record is replaced with the current checksum.
    pub override_executed: Vec<String>,
}

impl ExecutorConfig {
    /// Set the execution mode.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Keep executing after a KO script.
    pub fn with_continue_on_failure(mut self, enabled: bool) -> Self {
        self.continue_on_failure = enabled;
        self
    }

    /// Set the drift policy.
    pub fn with_drift_policy(mut self, policy: DriftPolicy) -> Self {
        self.drift_policy = policy;
        self
    }

    /// Add a mark-as-executed glob.
    pub fn mark_path(mut self, glob: impl Into<String>) -> Self {
        self.mark_as_executed.push(glob.into());
        self
    }

    /// Add an override glob.
    pub fn override_path(mut self, glob: impl Into<String>) -> Self {
        self.override_executed.push(glob.into());
        self
    }
}

/// Complete configuration for one [`Scriptor`](crate::Scriptor).
#[derive(Clone)]
pub struct ScriptorConfig {
    /// Script discovery.
    pub scanner: ScannerConfig,
    /// Tag-based selection.
    pub filter: FilterConfig,
    /// Executor behaviour.
    pub executor: ExecutorConfig,
    /// Backend selection.
    pub driver: Arc<dyn DriverConfig>,
    /// Optional monitoring endpoint.
    pub monitoring: Option<Arc<dyn NotifierConfig>>,
}

impl ScriptorConfig {
    /// Configuration with default filtering and execution.
    pub fn new(scanner: ScannerConfig, driver: Arc<dyn DriverConfig>) -> Self {
        Self {
            scanner,
            filter: FilterConfig::default(),
            executor: ExecutorConfig::default(),
            driver,
            monitoring: None,
        }
    }

    /// Set tag filtering.
    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    /// Set executor behaviour.
    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    /// Report progress to a monitoring endpoint.
    pub fn with_monitoring(mut self, monitoring: Arc<dyn NotifierConfig>) -> Self {
        self.monitoring = Some(monitoring);
        self
    }

    /// Log the effective configuration.
    pub fn log(&self) {
        tracing::info!(
            path = %self.scanner.path.display(),
            identifier_regex = %self.scanner.identifier_regex,
            tag_matchers = self.scanner.tag_matchers.len(),
            tags_from_folder = self.scanner.tags_from_folder,
            "scanner configuration"
        );
        tracing::info!(
            whitelisted = ?self.filter.whitelisted_tags,
            blacklisted = ?self.filter.blacklisted_tags,
            play_again = ?self.filter.tags_to_play_again,
            "filter configuration"
        );
        tracing::info!(
            mode = %self.executor.mode,
            continue_on_failure = self.executor.continue_on_failure,
            drift_policy = ?self.executor.drift_policy,
            mark = ?self.executor.mark_as_executed,
            overrides = ?self.executor.override_executed,
            monitoring = self.monitoring.is_some(),
            "executor configuration"
        );
        self.driver.log();
    }
}

impl fmt::Debug for ScriptorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptorConfig")
            .field("scanner", &self.scanner)
            .field("filter", &self.filter)
            .field("executor", &self.executor)
            .field("monitoring", &self.monitoring.is_some())
            .finish_non_exhaustive()
    }
}
