//! CLI configuration errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read config file {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing setting: {0}")]
    Missing(&'static str),

    #[error("invalid setting: {0}")]
    Invalid(String),

    #[error(transparent)]
    Core(#[from] scriptor_core::Error),
}
