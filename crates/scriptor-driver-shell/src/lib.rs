//! Scriptor shell driver.
//!
//! Runs every script through an external client (`psql`, `mongosh`, `sqlite3`,
//! ...) and keeps the execution history in a local sled database.

pub mod config;
pub mod driver;
pub mod history;

pub use config::{ShellDriverConfig, DEFAULT_TMP_FILE_PATH, FILE_PLACEHOLDER};
pub use driver::ShellDriver;
pub use history::ShellHistory;
