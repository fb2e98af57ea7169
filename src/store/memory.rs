//! In-process connector backed by a hash map.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::BenchResult;
use crate::utils::lock;

use super::{Connector, Key};

/// Connector that keeps objects in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    objects: Mutex<HashMap<Key, Vec<u8>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Connector for MemoryConnector {
    fn name(&self) -> &str {
        "memory"
    }

    fn open(&self) -> BenchResult<()> {
        Ok(())
    }

    fn close(&self) -> BenchResult<()> {
        lock(&self.objects).clear();
        Ok(())
    }

    fn get(&self, key: &Key) -> BenchResult<Option<Vec<u8>>> {
        Ok(lock(&self.objects).get(key).cloned())
    }

    fn set(&self, key: &Key, data: &[u8]) -> BenchResult<()> {
        lock(&self.objects).insert(key.clone(), data.to_vec());
        Ok(())
    }

    fn exists(&self, key: &Key) -> BenchResult<bool> {
        Ok(lock(&self.objects).contains_key(key))
    }

    fn evict(&self, key: &Key) -> BenchResult<()> {
        lock(&self.objects).remove(key);
        Ok(())
    }
}
