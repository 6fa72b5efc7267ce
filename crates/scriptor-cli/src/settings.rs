//! Merges the configuration file with command-line flags.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use scriptor_core::{
    DriftPolicy, ExecutionMode, ExecutorConfig, FilterConfig, ScannerConfig, ScriptorConfig, Tag,
    TagMatcher,
};
use scriptor_driver_shell::ShellDriverConfig;
use scriptor_monitor::MonitoringConfig;

use crate::error::CliError;
use crate::{Args, Command, ModeArg, UpdateArgs};

/// Contents of the `--config` TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub path: Option<PathBuf>,
    pub identifier_regex: Option<String>,
    pub tags_from_folder: bool,
    /// Tag name to path globs.
    pub tags: BTreeMap<String, Vec<String>>,
    pub whitelisted_tags: Vec<String>,
    pub blacklisted_tags: Vec<String>,
    pub tags_to_play_again: Vec<String>,
    pub mode: Option<FileMode>,
    pub continue_on_failure: bool,
    pub drift_policy: Option<FileDriftPolicy>,
    pub mark_as_executed: Vec<String>,
    pub override_executed: Vec<String>,
    pub driver: FileDriverConfig,
    pub monitoring: Option<FileMonitoringConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileMode {
    Normal,
    Dry,
    ForceMarkAsExecuted,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileDriftPolicy {
    Fail,
    Override,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileDriverConfig {
    pub client_path: Option<PathBuf>,
    pub client_args: Vec<String>,
    pub history_path: Option<PathBuf>,
    pub tmp_file_path: Option<PathBuf>,
    pub print_output: bool,
    pub save_output: bool,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileMonitoringConfig {
    pub base_url: String,
    pub timeout_ms: Option<u64>,
}

impl FileConfig {
    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self, CliError> {
        toml::from_str(text).map_err(|source| CliError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Build the engine configuration from the file (if any) and the flags.
pub fn resolve(args: &Args) -> Result<ScriptorConfig, CliError> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    merge(args, file)
}

fn merge(args: &Args, file: FileConfig) -> Result<ScriptorConfig, CliError> {
    let default_update = UpdateArgs::default();
    let update = match &args.command {
        Command::UpdateDb(update) => update,
        _ => &default_update,
    };

    let scanner = scanner_config(args, update, &file)?;
    let filter = FilterConfig {
        whitelisted_tags: tags(&update.whitelisted_tags, &file.whitelisted_tags),
        blacklisted_tags: tags(&update.blacklisted_tags, &file.blacklisted_tags),
        tags_to_play_again: tags(&update.tags_to_play_again, &file.tags_to_play_again),
    };
    let executor = executor_config(update, &file);
    let driver = driver_config(args, &file)?;

    let mut config = ScriptorConfig::new(scanner, Arc::new(driver))
        .with_filter(filter)
        .with_executor(executor);

    let monitoring_url = args
        .monitoring
        .monitoring_url
        .clone()
        .or_else(|| file.monitoring.as_ref().map(|m| m.base_url.clone()));
    if let Some(url) = monitoring_url {
        let mut monitoring = MonitoringConfig::new(url);
        let timeout_ms = args
            .monitoring
            .monitoring_timeout_ms
            .or_else(|| file.monitoring.as_ref().and_then(|m| m.timeout_ms));
        if let Some(ms) = timeout_ms {
            monitoring = monitoring.with_timeout(Duration::from_millis(ms));
        }
        config = config.with_monitoring(Arc::new(monitoring));
    }

    Ok(config)
}

fn scanner_config(
    args: &Args,
    update: &UpdateArgs,
    file: &FileConfig,
) -> Result<ScannerConfig, CliError> {
    let path = update
        .path
        .clone()
        .or_else(|| file.path.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    let mut scanner = ScannerConfig::new(path)
        .with_tags_from_folder(update.tags_from_folder || file.tags_from_folder);
    if let Some(regex) = args.identifier_regex.clone().or_else(|| file.identifier_regex.clone()) {
        scanner = scanner.with_identifier_regex(regex);
    }

    let mut rules = file.tags.clone();
    if !update.tags.is_empty() {
        rules.clear();
        for rule in &update.tags {
            let (name, glob) = rule
                .split_once('=')
                .ok_or_else(|| CliError::Invalid(format!("tag rule {rule:?} is not NAME=GLOB")))?;
            rules
                .entry(name.to_string())
                .or_default()
                .push(glob.to_string());
        }
    }
    for (name, globs) in rules {
        scanner = scanner.with_tag_matcher(TagMatcher::new(Tag::new(name), globs)?);
    }
    Ok(scanner)
}

fn executor_config(update: &UpdateArgs, file: &FileConfig) -> ExecutorConfig {
    let mode = match (update.mode, file.mode) {
        (Some(ModeArg::Dry), _) | (None, Some(FileMode::Dry)) => ExecutionMode::Dry,
        (Some(ModeArg::ForceMarkAsExecuted), _) | (None, Some(FileMode::ForceMarkAsExecuted)) => {
            ExecutionMode::ForceMarkAsExecuted
        }
        _ => ExecutionMode::Normal,
    };
    let drift_policy = if update.override_changed {
        DriftPolicy::Override
    } else {
        match file.drift_policy {
            Some(FileDriftPolicy::Override) => DriftPolicy::Override,
            _ => DriftPolicy::Fail,
        }
    };

    let mut executor = ExecutorConfig::default()
        .with_mode(mode)
        .with_continue_on_failure(update.continue_on_failure || file.continue_on_failure)
        .with_drift_policy(drift_policy);
    for glob in prefer(&update.mark_as_executed, &file.mark_as_executed) {
        executor = executor.mark_path(glob.clone());
    }
    for glob in prefer(&update.override_executed, &file.override_executed) {
        executor = executor.override_path(glob.clone());
    }
    executor
}

fn driver_config(args: &Args, file: &FileConfig) -> Result<ShellDriverConfig, CliError> {
    let flags = &args.driver;
    let client_path = flags
        .client_path
        .clone()
        .or_else(|| file.driver.client_path.clone())
        .ok_or(CliError::Missing("client path (--client-path or driver.client_path)"))?;
    let history_path = flags
        .history_path
        .clone()
        .or_else(|| file.driver.history_path.clone())
        .unwrap_or_else(|| PathBuf::from(".scriptor"));

    let mut driver = ShellDriverConfig::new(client_path, history_path)
        .with_args(prefer(&flags.client_args, &file.driver.client_args).iter().cloned())
        .with_print_output(flags.print_output || file.driver.print_output)
        .with_save_output(flags.save_output || file.driver.save_output);
    if let Some(tmp) = flags.tmp_file_path.clone().or_else(|| file.driver.tmp_file_path.clone()) {
        driver = driver.with_tmp_file_path(tmp);
    }
    if let Some(secs) = flags.client_timeout.or(file.driver.timeout_secs) {
        driver = driver.with_timeout(Duration::from_secs(secs));
    }
    Ok(driver)
}

/// Flag values when given, file values otherwise.
fn prefer<'a>(flags: &'a [String], file: &'a [String]) -> &'a [String] {
    if flags.is_empty() {
        file
    } else {
        flags
    }
}

fn tags(flags: &[String], file: &[String]) -> Vec<Tag> {
    prefer(flags, file).iter().map(|t| Tag::new(t.as_str())).collect()
}
