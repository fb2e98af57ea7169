//! Connector storing one file per key in a shared directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::BenchResult;

use super::{Connector, Key};

#[derive(Debug, Clone)]
pub struct FileConnector {
    store_dir: PathBuf,
    clear_on_close: bool,
}

impl FileConnector {
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        FileConnector {
            store_dir: store_dir.into(),
            clear_on_close: true,
        }
    }

    /// Keep the directory and its objects when the store closes.
    pub fn keep_on_close(mut self) -> Self {
        self.clear_on_close = false;
        self
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    fn path(&self, key: &Key) -> PathBuf {
        self.store_dir.join(key.as_str())
    }
}

impl Connector for FileConnector {
    fn name(&self) -> &str {
        "file"
    }

    fn open(&self) -> BenchResult<()> {
        std::fs::create_dir_all(&self.store_dir)?;
        Ok(())
    }

    fn close(&self) -> BenchResult<()> {
        if self.clear_on_close {
            match std::fs::remove_dir_all(&self.store_dir) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(dir = %self.store_dir.display(), "failed to clear file store: {e}");
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    fn get(&self, key: &Key) -> BenchResult<Option<Vec<u8>>> {
        match std::fs::read(self.path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &Key, data: &[u8]) -> BenchResult<()> {
        // Write then rename so pollers never observe a partial object.
        let path = self.path(key);
        let tmp = self.store_dir.join(format!(".{}.tmp", key.as_str()));
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn exists(&self, key: &Key) -> BenchResult<bool> {
        Ok(self.path(key).exists())
    }

    fn evict(&self, key: &Key) -> BenchResult<()> {
        match std::fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn test_file_store_roundtrip_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let store_dir = dir.path().join("objects");
        let store = Store::new("file", FileConnector::new(&store_dir));
        store.open().unwrap();
        assert!(store_dir.is_dir());

        let key = store.put(b"abc").unwrap();
        assert!(store.exists(&key).unwrap());
        assert_eq!(store.get(&key).unwrap().unwrap(), b"abc");
        assert_eq!(std::fs::read_dir(&store_dir).unwrap().count(), 1);

        store.evict(&key).unwrap();
        assert!(!store.exists(&key).unwrap());
        assert!(store.get(&key).unwrap().is_none());

        store.close().unwrap();
        assert!(!store_dir.exists());
    }

    #[test]
    fn test_keep_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let store_dir = dir.path().join("objects");
        let store = Store::new("file", FileConnector::new(&store_dir).keep_on_close());
        store.open().unwrap();
        store.put(b"abc").unwrap();
        store.close().unwrap();
        assert!(store_dir.is_dir());
    }
}
