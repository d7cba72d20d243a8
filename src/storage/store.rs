//! Persisted results and digests (`{"results": [...], "hashes": {...}}`).

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StoreError;
use crate::runner::TaskResult;

/// Store path meaning "standard output, no prior store".
pub const STDOUT_PATH: &str = "-";

/// Results of all verified tasks plus the digests they were verified at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedStore {
    /// One entry per task name, in first-seen order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<TaskResult>,
    /// Task name to `h1:` digest.
    #[serde(default, deserialize_with = "null_as_default")]
    pub hashes: BTreeMap<String, String>,
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl PersistedStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the store at `path`.
    ///
    /// A missing file, or the stdout marker `-`, yields an empty store.
    /// Unreadable or corrupt files are errors.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if is_stdout(path) || !path.exists() {
            debug!(path = %path.display(), "No prior store, starting empty");
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Folds a task result into the store.
    ///
    /// Replaces the entry with the same name or appends a new one. The digest
    /// is only updated when one was computed for the task during this run.
    pub fn merge(&mut self, result: TaskResult, digest: Option<&str>) {
        if let Some(digest) = digest {
            self.record_digest(&result.name, digest);
        }

        match self.results.iter_mut().find(|r| r.name == result.name) {
            Some(existing) => *existing = result,
            None => self.results.push(result),
        }
    }

    /// Records `digest` as the baseline for `name` without touching results.
    pub fn record_digest(&mut self, name: &str, digest: &str) {
        self.hashes.insert(name.to_string(), digest.to_string());
    }

    /// Looks up the stored result of a task.
    pub fn result(&self, name: &str) -> Option<&TaskResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Serializes the store as pretty JSON.
    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the store to `path` atomically, or to stdout for `-`.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = self.to_json()?;

        if is_stdout(path) {
            println!("{}", json);
            return Ok(());
        }

        let write_err = |source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };

        let dir = parent_dir(path);
        let mut tmp = NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.write_all(b"\n").map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;

        debug!(path = %path.display(), tasks = self.results.len(), "Saved store");
        Ok(())
    }
}

/// Whether `path` is the stdout marker.
pub fn is_stdout(path: &Path) -> bool {
    path.as_os_str() == STDOUT_PATH
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::SolutionResult;
    use tempfile::TempDir;

    fn result(name: &str, solutions: &[(&str, bool)]) -> TaskResult {
        TaskResult {
            name: name.to_string(),
            solutions: solutions
                .iter()
                .map(|(n, r)| SolutionResult::new(*n, *r))
                .collect(),
        }
    }

    #[test]
    fn test_load_missing_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = PersistedStore::load(&temp.path().join("verify.json")).unwrap();
        assert_eq!(store, PersistedStore::new());
    }

    #[test]
    fn test_load_stdout_marker_is_empty() {
        let store = PersistedStore::load(Path::new("-")).unwrap();
        assert!(store.results.is_empty());
    }

    #[test]
    fn test_load_corrupt_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("verify.json");
        fs::write(&path, "{not json").unwrap();

        let err = PersistedStore::load(&path).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn test_load_accepts_nulls() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("verify.json");
        fs::write(
            &path,
            r#"{"results":[{"name":"A","solutions":null}],"hashes":null}"#,
        )
        .unwrap();

        let store = PersistedStore::load(&path).unwrap();
        assert_eq!(store.results, vec![result("A", &[])]);
        assert!(store.hashes.is_empty());
    }

    #[test]
    fn test_merge_replaces_and_appends() {
        let mut store = PersistedStore::new();
        store.merge(result("A", &[("s1", false)]), Some("h1:a"));
        store.merge(result("B", &[("s1", true)]), Some("h1:b"));
        store.merge(result("A", &[("s1", true), ("s2", false)]), Some("h1:a2"));

        assert_eq!(store.results.len(), 2);
        assert_eq!(store.results[0], result("A", &[("s1", true), ("s2", false)]));
        assert_eq!(store.results[1], result("B", &[("s1", true)]));
        assert_eq!(store.hashes["A"], "h1:a2");
        assert_eq!(store.hashes["B"], "h1:b");
    }

    #[test]
    fn test_merge_without_digest_keeps_hash() {
        let mut store = PersistedStore::new();
        store.merge(result("A", &[]), Some("h1:a"));
        store.merge(result("A", &[("s1", true)]), None);

        assert_eq!(store.hashes["A"], "h1:a");
        assert_eq!(store.result("A").unwrap().solutions.len(), 1);
    }

    #[test]
    fn test_merge_preserves_unrelated_entries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("verify.json");

        let mut store = PersistedStore::new();
        store.merge(result("A", &[("s1", false)]), Some("h1:a"));
        store.merge(result("B", &[("s1", true), ("s2", false)]), Some("h1:b"));
        store.save(&path).unwrap();

        let mut reloaded = PersistedStore::load(&path).unwrap();
        let b_before = serde_json::to_string(reloaded.result("B").unwrap()).unwrap();
        reloaded.merge(result("A", &[("s1", true)]), Some("h1:a2"));
        reloaded.save(&path).unwrap();

        let after = PersistedStore::load(&path).unwrap();
        let b_after = serde_json::to_string(after.result("B").unwrap()).unwrap();
        assert_eq!(b_before, b_after);
        assert_eq!(after.hashes["B"], "h1:b");
        assert_eq!(after.hashes["A"], "h1:a2");
    }

    #[test]
    fn test_save_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("verify.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();

        let mut store = PersistedStore::new();
        store.merge(result("Echo", &[("sol1", true)]), Some("h1:e"));
        store.save(&path).unwrap();

        assert_eq!(PersistedStore::load(&path).unwrap(), store);
    }

    #[test]
    fn test_json_shape() {
        let mut store = PersistedStore::new();
        store.merge(result("Echo", &[("sol1", true)]), Some("h1:e"));

        let value: serde_json::Value = serde_json::from_str(&store.to_json().unwrap()).unwrap();
        assert_eq!(value["results"][0]["name"], "Echo");
        assert_eq!(value["results"][0]["solutions"][0]["name"], "sol1");
        assert_eq!(value["results"][0]["solutions"][0]["result"], true);
        assert_eq!(value["hashes"]["Echo"], "h1:e");
    }

    #[test]
    fn test_parent_dir_of_bare_file_name() {
        assert_eq!(parent_dir(Path::new("verify.json")), PathBuf::from("."));
        assert_eq!(parent_dir(Path::new("out/v.json")), PathBuf::from("out"));
    }
}
