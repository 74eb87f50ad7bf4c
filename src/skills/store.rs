use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::errors::{PilotError, PilotResult};
use crate::skills::types::PersistedProcedure;

pub type SkillRecords = BTreeMap<String, PersistedProcedure>;

/// File-backed key/value record of procedure statistics (one JSON object).
///
/// Every update is a read-modify-write-persist transaction serialized by an
/// instance lock; share one store through `Arc` when several loops write to
/// the same file. Separate processes must not share a file.
pub struct SkillStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SkillStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means no history yet.
    pub fn load(&self) -> PilotResult<SkillRecords> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(SkillRecords::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SkillRecords::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Merges one record into the file, keeping every other entry.
    pub fn update(&self, name: &str, record: PersistedProcedure) -> PilotResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| PilotError::Skills("skill store lock poisoned".into()))?;
        let mut records = self.load()?;
        records.insert(name.to_string(), record);
        self.write_atomic(&records)?;
        tracing::debug!(path = %self.path.display(), procedure = name, "skill record persisted");
        Ok(())
    }

    fn write_atomic(&self, records: &SkillRecords) -> PilotResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(records)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::types::ProcedureStatus;

    fn record(successes: u32) -> PersistedProcedure {
        PersistedProcedure {
            runs: successes,
            successes,
            failures: 0,
            status: ProcedureStatus::Trial,
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SkillStore::new(dir.path().join("skills.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn update_preserves_other_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = SkillStore::new(dir.path().join("nested").join("skills.json"));
        store.update("a", record(1)).unwrap();
        store.update("b", record(2)).unwrap();
        store.update("a", record(3)).unwrap();
        let records = store.load().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records["a"].successes, 3);
        assert_eq!(records["b"].successes, 2);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skills.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(SkillStore::new(path).load().is_err());
    }
}
