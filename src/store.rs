//! Flat JSON document stores.
//!
//! Each store is one pretty-printed JSON array on disk. Writes go through a
//! temp file in the same directory followed by a rename, and every
//! read-modify-write cycle runs under the store's mutex.

use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, UacError};
use crate::model::{NetworkProfile, PhysicalPort, VpnPeer};

/// A record addressable by a string key.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for PhysicalPort {
    fn key(&self) -> &str {
        &self.name
    }
}

impl Keyed for NetworkProfile {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for VpnPeer {
    fn key(&self) -> &str {
        &self.name
    }
}

/// Keyed collection with an atomic read-modify-write primitive.
///
/// `update` must run the closure and persist its result without another
/// `update` on the same repository interleaving.
pub trait Repository<T: Keyed + Clone> {
    fn list(&self) -> Result<Vec<T>>;

    fn update<R>(&self, f: impl FnOnce(&mut Vec<T>) -> Result<R>) -> Result<R>;

    fn get(&self, key: &str) -> Result<Option<T>> {
        Ok(self.list()?.into_iter().find(|r| r.key() == key))
    }

    /// Replace the record with the same key in place, or append.
    fn put(&self, record: T) -> Result<T> {
        self.update(|records| {
            match records.iter_mut().find(|r| r.key() == record.key()) {
                Some(existing) => *existing = record.clone(),
                None => records.push(record.clone()),
            }
            Ok(record)
        })
    }

    /// Remove every record with `key`. Returns whether anything was removed.
    fn delete(&self, key: &str) -> Result<bool> {
        self.update(|records| {
            let before = records.len();
            records.retain(|r| r.key() != key);
            Ok(records.len() != before)
        })
    }
}

/// `Repository` backed by a JSON file.
pub struct JsonFileStore<T> {
    path: PathBuf,
    lock: Mutex<()>,
    /// Treat an unparseable document as empty instead of failing.
    lenient: bool,
    _records: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T>
where
    T: Keyed + Clone + Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            lenient: false,
            _records: PhantomData,
        }
    }

    /// A store whose contents are a cache that can be rebuilt, e.g. the
    /// port snapshot. Corrupt documents are logged and read as empty.
    pub fn lenient(path: impl Into<PathBuf>) -> Self {
        Self {
            lenient: true,
            ..Self::new(path)
        }
    }

    fn read(&self) -> Result<Vec<T>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(UacError::io_at(&self.path, e)),
        };
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str(&contents) {
            Ok(records) => Ok(records),
            Err(e) if self.lenient => {
                tracing::warn!(path = %self.path.display(), error = %e, "discarding unreadable snapshot");
                Ok(Vec::new())
            }
            Err(e) => Err(UacError::Parse {
                path: self.path.clone(),
                message: e.to_string(),
            }),
        }
    }

    fn write(&self, records: &[T]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        write_atomic(&self.path, json.as_bytes())
    }
}

impl<T> Repository<T> for JsonFileStore<T>
where
    T: Keyed + Clone + Serialize + DeserializeOwned,
{
    fn list(&self) -> Result<Vec<T>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read()
    }

    fn update<R>(&self, f: impl FnOnce(&mut Vec<T>) -> Result<R>) -> Result<R> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut records = self.read()?;
        let out = f(&mut records)?;
        self.write(&records)?;
        Ok(out)
    }
}

/// Write `data` to `path` via a sibling temp file and rename.
/// Creates parent directories as needed.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    write_atomic_with_mode(path, data, None)
}

/// Like [`write_atomic`], setting unix permission bits on the temp file
/// before it is renamed into place.
pub fn write_atomic_with_mode(path: &Path, data: &[u8], mode: Option<u32>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| UacError::io_at(parent, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&tmp, data).map_err(|e| UacError::io_at(path, e))?;

    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(&tmp, fs::Permissions::from_mode(mode)) {
            let _ = fs::remove_file(&tmp);
            return Err(UacError::io_at(path, e));
        }
    }
    #[cfg(not(unix))]
    let _ = mode;

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(UacError::io_at(path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn profile(id: &str, vlan_id: Option<u16>) -> NetworkProfile {
        NetworkProfile {
            id: id.into(),
            name: id.to_uppercase(),
            vlan_id,
            ip_cidr: None,
            dhcp_server_enabled: false,
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store: JsonFileStore<NetworkProfile> = JsonFileStore::new(dir.path().join("p.json"));
        assert!(store.list().unwrap().is_empty());
        assert!(store.get("guest").unwrap().is_none());
    }

    #[test]
    fn test_put_replaces_by_key_and_keeps_order() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("state/p.json"));

        store.put(profile("corp", None)).unwrap();
        store.put(profile("guest", Some(30))).unwrap();
        store.put(profile("corp", Some(10))).unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "corp");
        assert_eq!(all[0].vlan_id, Some(10));
        assert_eq!(all[1].id, "guest");
    }

    #[test]
    fn test_delete_reports_removal() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("p.json"));
        store.put(profile("corp", None)).unwrap();

        assert!(store.delete("corp").unwrap());
        assert!(!store.delete("corp").unwrap());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_failed_update_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("p.json"));
        store.put(profile("corp", None)).unwrap();

        let result: Result<()> = store.update(|records| {
            records.clear();
            Err(UacError::conflict("profile", "corp"))
        });
        assert!(result.is_err());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.json");
        fs::write(&path, "[{\"id\": ").unwrap();
        let store: JsonFileStore<NetworkProfile> = JsonFileStore::new(&path);
        assert!(matches!(store.list(), Err(UacError::Parse { .. })));

        let lenient: JsonFileStore<NetworkProfile> = JsonFileStore::lenient(&path);
        assert!(lenient.list().unwrap().is_empty());
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out.conf");
        write_atomic(&path, b"hello\n").unwrap();
        write_atomic(&path, b"bye\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "bye\n");
        let names: Vec<_> = fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("out.conf")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_with_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wg0.conf");
        write_atomic_with_mode(&path, b"[Interface]\n", Some(0o600)).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
