//! File-backed resource store
//!
//! Records live in a single JSON document keyed by `type/name`. The file is
//! the system of record, so secret parameters are written in the clear and
//! the file should be protected accordingly.
//!
//! Several processes may deploy against the same file. Every operation
//! re-reads the document while holding a lock on the sidecar
//! `<store>.json.lock` file, shared for lookups and exclusive for writes.

use declarative::{Error, ParamValue, Params, ResourceId, ResourceStore, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    resources: BTreeMap<String, Map<String, Value>>,
}

/// JSON-file [`ResourceStore`]
///
/// Every mutation rewrites the whole document through a temporary file, so a
/// crash never leaves a half-written store behind.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

/// Held file lock, released on drop
struct LockGuard(File);

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

impl FileStore {
    /// Open the store, starting empty if the file does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let lock_path = path.with_extension("json.lock");
        let store = Self { path, lock_path };

        let records = store.read(&store.shared()?)?.resources.len();
        log::debug!("Opened store {} with {records} records", store.path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read(&self.shared()?)?.resources.len())
    }

    /// Stored parameters of a record, as written
    #[cfg(test)]
    pub fn get(&self, id: &ResourceId) -> Option<Map<String, Value>> {
        let held = self.shared().ok()?;
        self.read(&held).ok()?.resources.remove(&id.to_string())
    }

    fn lock_file(&self) -> Result<File> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
        }
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?)
    }

    fn shared(&self) -> Result<LockGuard> {
        let file = self.lock_file()?;
        FileExt::lock_shared(&file)?;
        Ok(LockGuard(file))
    }

    fn exclusive(&self) -> Result<LockGuard> {
        let file = self.lock_file()?;
        FileExt::lock_exclusive(&file)?;
        Ok(LockGuard(file))
    }

    /// Read the current document. The caller must hold a lock.
    fn read(&self, _held: &LockGuard) -> Result<Document> {
        if !self.path.exists() {
            return Ok(Document::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Document::default());
        }
        serde_json::from_str(&content)
            .map_err(|e| Error::Other(format!("corrupt store {}: {e}", self.path.display())))
    }

    /// Replace the document. The caller must hold the exclusive lock.
    fn write(&self, doc: &Document, id: &ResourceId) -> Result<()> {
        let store_error = |message: String| Error::Store {
            id: id.to_string(),
            message,
        };

        let content = serde_json::to_string_pretty(doc).map_err(|e| store_error(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)
            .map_err(|e| store_error(format!("write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| store_error(format!("replace {}: {e}", self.path.display())))
    }
}

fn to_json(params: &Params) -> Map<String, Value> {
    params
        .iter()
        .map(|(key, value)| {
            let json = match value {
                ParamValue::Text(s) => Value::String(s.clone()),
                ParamValue::Integer(i) => Value::from(*i),
                ParamValue::Float(x) => Value::from(*x),
                ParamValue::Bool(b) => Value::Bool(*b),
                ParamValue::Secret(secret) => Value::String(secret.expose().to_string()),
            };
            (key.clone(), json)
        })
        .collect()
}

impl ResourceStore for FileStore {
    fn exists(&self, id: &ResourceId) -> Result<bool> {
        let held = self.shared()?;
        Ok(self.read(&held)?.resources.contains_key(&id.to_string()))
    }

    fn create(&self, id: &ResourceId, params: &Params) -> Result<()> {
        let held = self.exclusive()?;
        let mut doc = self.read(&held)?;
        let key = id.to_string();
        if doc.resources.contains_key(&key) {
            return Err(Error::AlreadyExists { id: key });
        }

        doc.resources.insert(key, to_json(params));
        self.write(&doc, id)
    }

    fn update(&self, id: &ResourceId, params: &Params) -> Result<()> {
        let held = self.exclusive()?;
        let mut doc = self.read(&held)?;
        let key = id.to_string();
        if !doc.resources.contains_key(&key) {
            return Err(Error::Store {
                id: key,
                message: "cannot update a resource that does not exist".to_string(),
            });
        }

        doc.resources.insert(key, to_json(params));
        self.write(&doc, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{SecretValue, WriteOutcome};
    use tempfile::TempDir;

    fn id(s: &str) -> ResourceId {
        s.parse().unwrap()
    }

    fn params(pairs: &[(&str, ParamValue)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn secret(value: &str) -> Params {
        params(&[("value", ParamValue::Secret(SecretValue::supplied(value)))])
    }

    #[test]
    fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("store.json")).unwrap();
        assert_eq!(store.len().unwrap(), 0);
        assert!(!store.exists(&id("vault/kv")).unwrap());
    }

    #[test]
    fn test_create_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = FileStore::open(&path).unwrap();
        store.create(&id("secret/s"), &secret("hunter2")).unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert!(reopened.exists(&id("secret/s")).unwrap());
        assert_eq!(
            reopened.get(&id("secret/s")).unwrap()["value"],
            Value::String("hunter2".to_string())
        );
    }

    #[test]
    fn test_duplicate_create_is_already_exists() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("store.json")).unwrap();
        store.create(&id("vault/kv"), &Params::new()).unwrap();

        let err = store.create(&id("vault/kv"), &Params::new()).unwrap_err();
        assert!(err.is_ignorable());
    }

    #[test]
    fn test_two_handles_on_one_file_see_each_other() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let run_a = FileStore::open(&path).unwrap();
        let run_b = FileStore::open(&path).unwrap();
        let s = id("secret/api-key");

        assert!(!run_a.exists(&s).unwrap());
        assert!(!run_b.exists(&s).unwrap());

        run_a.create(&s, &secret("v1")).unwrap();
        run_a.create(&id("vault/kv"), &Params::new()).unwrap();

        let err = run_b.create(&s, &secret("v2")).unwrap_err();
        assert!(err.is_ignorable());
        assert!(run_b.exists(&s).unwrap());

        run_b.create(&id("secret/other"), &secret("x")).unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get(&s).unwrap()["value"], Value::String("v1".into()));
        assert_eq!(reopened.len().unwrap(), 3);
    }

    #[test]
    fn test_concurrent_creates_admit_exactly_one() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let s = id("secret/race");

        let results: Vec<Result<()>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let path = &path;
                    let s = &s;
                    scope.spawn(move || {
                        let store = FileStore::open(path).unwrap();
                        store.create(s, &secret(&format!("v{i}")))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(Error::is_ignorable)
        );
    }

    #[test]
    fn test_create_or_update() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("store.json")).unwrap();
        let kv = id("vault/kv");

        let first = params(&[("sku", ParamValue::Text("standard".into()))]);
        let second = params(&[("sku", ParamValue::Text("premium".into()))]);

        assert_eq!(store.create_or_update(&kv, &first).unwrap(), WriteOutcome::Created);
        assert_eq!(store.create_or_update(&kv, &second).unwrap(), WriteOutcome::Updated);
        assert_eq!(store.get(&kv).unwrap()["sku"], Value::String("premium".into()));
    }

    #[test]
    fn test_update_missing_fails() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("store.json")).unwrap();
        assert!(store.update(&id("vault/kv"), &Params::new()).is_err());
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn test_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(FileStore::open(&path).is_err());
    }
}
