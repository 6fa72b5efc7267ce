//! Execution history persisted in a sled tree.

use std::path::Path;

use scriptor_core::{DriverError, ExecutedScript};

/// One JSON record per script name.
///
/// Writing a record replaces any previous record for the same name, which
/// keeps a single authoritative entry per script.
#[derive(Debug, Clone)]
pub struct ShellHistory {
    db: sled::Db,
    tree: sled::Tree,
}

impl ShellHistory {
    /// Tree holding the records.
    pub const TREE_NAME: &'static str = "executed_scripts";

    /// Open or create the history database at `path`.
    pub fn open(path: &Path) -> Result<Self, DriverError> {
        let db = sled::open(path).map_err(storage)?;
        let tree = db.open_tree(Self::TREE_NAME).map_err(storage)?;
        Ok(Self { db, tree })
    }

    /// Every stored record.
    pub fn list(&self) -> Result<Vec<ExecutedScript>, DriverError> {
        let mut records = Vec::new();
        for entry in self.tree.iter() {
            let (_, value) = entry.map_err(storage)?;
            let record: ExecutedScript = serde_json::from_slice(&value)
                .map_err(|e| DriverError::Serialization(e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }

    /// The record for a script, if any.
    pub fn get(&self, name: &str) -> Result<Option<ExecutedScript>, DriverError> {
        match self.tree.get(name.as_bytes()).map_err(storage)? {
            Some(value) => serde_json::from_slice(&value)
                .map(Some)
                .map_err(|e| DriverError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    /// Store a record and flush it to disk.
    pub fn put(&self, record: &ExecutedScript) -> Result<(), DriverError> {
        let value =
            serde_json::to_vec(record).map_err(|e| DriverError::Serialization(e.to_string()))?;
        self.tree
            .insert(record.name.as_bytes(), value)
            .map_err(storage)?;
        self.db.flush().map_err(storage)?;
        Ok(())
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

fn storage(err: sled::Error) -> DriverError {
    DriverError::History(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptor_core::{OrderingKey, Script, ScriptAction};

    fn record(name: &str, content: &str, action: ScriptAction) -> ExecutedScript {
        let script = Script::new(name, name, OrderingKey::parse(name), content);
        ExecutedScript::without_execution(&script, action)
    }

    #[test]
    fn test_put_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let history = ShellHistory::open(&dir.path().join("history")).unwrap();
        assert!(history.is_empty());

        history.put(&record("01_a.sql", "a", ScriptAction::Execute)).unwrap();
        history.put(&record("02_b.sql", "b", ScriptAction::MarkAsExecuted)).unwrap();

        let records = history.list().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            history.get("02_b.sql").unwrap().map(|r| r.action),
            Some(ScriptAction::MarkAsExecuted)
        );
    }

    #[test]
    fn test_put_replaces_same_name() {
        let dir = tempfile::tempdir().unwrap();
        let history = ShellHistory::open(&dir.path().join("history")).unwrap();

        history.put(&record("01_a.sql", "a", ScriptAction::Execute)).unwrap();
        history.put(&record("01_a.sql", "a2", ScriptAction::OverrideExecuted)).unwrap();

        assert_eq!(history.len(), 1);
        let stored = history.get("01_a.sql").unwrap().unwrap();
        assert_eq!(stored.action, ScriptAction::OverrideExecuted);
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");
        {
            let history = ShellHistory::open(&path).unwrap();
            history.put(&record("01_a.sql", "a", ScriptAction::Execute)).unwrap();
        }
        let history = ShellHistory::open(&path).unwrap();
        assert_eq!(history.list().unwrap().len(), 1);
    }
}
