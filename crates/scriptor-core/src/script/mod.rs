//! Change-script model.
//!
//! A [`Script`] is what discovery produces: name, ordering key, exact content,
//! tags and a content checksum. An [`ExecutedScript`] is the persisted
//! outcome of processing one.

pub mod checksum;
pub mod executed;
pub mod identity;
pub mod tag;

pub use checksum::checksum;
pub use executed::{Execution, ExecutedScript, ExecutionStatus, ScriptAction};
pub use identity::{OrderingKey, Script, Tag};
pub use tag::{glob_to_regex, TagFilter, TagMatcher};
