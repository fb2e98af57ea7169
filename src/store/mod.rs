//! Object stores.
//!
//! A [`Store`] wraps a [`Connector`] (the byte-level backend) and adds the
//! higher-level pieces the benchmarks need: lazily resolved [`Proxy`]
//! handles and promise-style [`StoreFuture`]s.

pub mod file;
pub mod memory;
pub mod redis;

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{BenchError, BenchResult};

pub use file::FileConnector;
pub use memory::MemoryConnector;
pub use self::redis::RedisConnector;

/// Opaque key of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key(String);

impl Key {
    pub fn new() -> Self {
        Key(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Key {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key(s.to_string())
    }
}

/// Byte-level storage backend.
pub trait Connector: Send + Sync {
    /// Kind label (e.g. "file").
    fn name(&self) -> &str;

    /// Prepare the backend (create directories, check connectivity).
    fn open(&self) -> BenchResult<()>;

    /// Release backend resources.
    fn close(&self) -> BenchResult<()>;

    fn get(&self, key: &Key) -> BenchResult<Option<Vec<u8>>>;

    fn set(&self, key: &Key, data: &[u8]) -> BenchResult<()>;

    fn exists(&self, key: &Key) -> BenchResult<bool>;

    /// Remove `key`. Evicting a missing key is not an error.
    fn evict(&self, key: &Key) -> BenchResult<()>;
}

const CREATED: u8 = 0;
const OPEN: u8 = 1;
const CLOSED: u8 = 2;

/// Shared handle to an opened connector.
#[derive(Clone)]
pub struct Store {
    name: Arc<str>,
    connector: Arc<dyn Connector>,
    state: Arc<AtomicU8>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("connector", &self.connector.name())
            .finish()
    }
}

impl Store {
    pub fn new(name: impl Into<String>, connector: impl Connector + 'static) -> Self {
        Store {
            name: Arc::from(name.into()),
            connector: Arc::new(connector),
            state: Arc::new(AtomicU8::new(CREATED)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind of the underlying connector.
    pub fn connector_name(&self) -> &str {
        self.connector.name()
    }

    pub fn open(&self) -> BenchResult<()> {
        self.state
            .compare_exchange(CREATED, OPEN, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| BenchError::lifecycle(format!("store '{}' was already opened", self.name)))?;
        if let Err(e) = self.connector.open() {
            self.state.store(CLOSED, Ordering::SeqCst);
            return Err(BenchError::acquire(format!("store '{}'", self.name), e));
        }
        debug!(store = %self.name, connector = self.connector.name(), "store opened");
        Ok(())
    }

    /// Close the store. Closing twice is a no-op.
    pub fn close(&self) -> BenchResult<()> {
        if self.state.swap(CLOSED, Ordering::SeqCst) == OPEN {
            self.connector.close()?;
            debug!(store = %self.name, "store closed");
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.state.load(Ordering::SeqCst) == OPEN
    }

    fn ensure_open(&self) -> BenchResult<()> {
        match self.state.load(Ordering::SeqCst) {
            OPEN => Ok(()),
            CREATED => Err(BenchError::lifecycle(format!("store '{}' is not open", self.name))),
            _ => Err(BenchError::lifecycle(format!("store '{}' is closed", self.name))),
        }
    }

    pub fn put(&self, data: &[u8]) -> BenchResult<Key> {
        let key = Key::new();
        self.put_with_key(&key, data)?;
        Ok(key)
    }

    pub fn put_with_key(&self, key: &Key, data: &[u8]) -> BenchResult<()> {
        self.ensure_open()?;
        self.connector.set(key, data)
    }

    pub fn get(&self, key: &Key) -> BenchResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        self.connector.get(key)
    }

    pub fn exists(&self, key: &Key) -> BenchResult<bool> {
        self.ensure_open()?;
        self.connector.exists(key)
    }

    pub fn evict(&self, key: &Key) -> BenchResult<()> {
        self.ensure_open()?;
        self.connector.evict(key)
    }

    /// Store `data` and return a proxy that resolves it.
    pub fn proxy(&self, data: &[u8]) -> BenchResult<Proxy> {
        let key = self.put(data)?;
        Ok(Proxy::new(self.clone(), key, None))
    }

    /// Allocate a promise: a key whose value will be set later.
    pub fn future(&self, polling_interval: Duration, timeout: Duration) -> BenchResult<StoreFuture> {
        self.ensure_open()?;
        if polling_interval.is_zero() {
            return Err(BenchError::config("store future polling interval must be positive"));
        }
        Ok(StoreFuture {
            store: self.clone(),
            key: Key::new(),
            polling_interval,
            timeout,
        })
    }
}

/// How a proxy obtains its bytes.
#[derive(Debug, Clone, Copy)]
struct Polling {
    interval: Duration,
    timeout: Duration,
}

/// Lazily resolved reference to a stored object.
///
/// Cloning a proxy shares the resolved bytes.
#[derive(Debug, Clone)]
pub struct Proxy {
    store: Store,
    key: Key,
    polling: Option<Polling>,
    target: Arc<OnceLock<Arc<Vec<u8>>>>,
}

impl Proxy {
    fn new(store: Store, key: Key, polling: Option<Polling>) -> Self {
        Proxy {
            store,
            key,
            polling,
            target: Arc::new(OnceLock::new()),
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Store the target lives in.
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn is_resolved(&self) -> bool {
        self.target.get().is_some()
    }

    /// Fetch the bytes on first use; later calls return the cached value.
    pub fn resolve(&self) -> BenchResult<Arc<Vec<u8>>> {
        if let Some(bytes) = self.target.get() {
            return Ok(Arc::clone(bytes));
        }
        let bytes = match self.polling {
            Some(polling) => poll_get(&self.store, &self.key, polling.interval, polling.timeout)?,
            None => self.store.get(&self.key)?.ok_or_else(|| {
                BenchError::Message(format!("proxy target {} does not exist", self.key))
            })?,
        };
        Ok(Arc::clone(self.target.get_or_init(|| Arc::new(bytes))))
    }
}

/// A promise backed by a store key.
///
/// The fulfilling side calls [`StoreFuture::set_result`] once; readers call
/// [`StoreFuture::result`], which polls until the bytes appear or the timeout
/// elapses.
#[derive(Debug, Clone)]
pub struct StoreFuture {
    store: Store,
    key: Key,
    polling_interval: Duration,
    timeout: Duration,
}

impl StoreFuture {
    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn done(&self) -> BenchResult<bool> {
        self.store.exists(&self.key)
    }

    pub fn set_result(&self, data: &[u8]) -> BenchResult<()> {
        if self.store.exists(&self.key)? {
            return Err(BenchError::Message(format!(
                "result for future {} was already set",
                self.key
            )));
        }
        self.store.put_with_key(&self.key, data)
    }

    pub fn result(&self) -> BenchResult<Vec<u8>> {
        poll_get(&self.store, &self.key, self.polling_interval, self.timeout)
    }

    /// Proxy that resolves through this future's polling wait.
    pub fn proxy(&self) -> Proxy {
        Proxy::new(
            self.store.clone(),
            self.key.clone(),
            Some(Polling {
                interval: self.polling_interval,
                timeout: self.timeout,
            }),
        )
    }
}

fn poll_get(store: &Store, key: &Key, interval: Duration, timeout: Duration) -> BenchResult<Vec<u8>> {
    // A timeout past the end of the clock never expires.
    let deadline = Instant::now().checked_add(timeout);
    loop {
        if let Some(bytes) = store.get(key)? {
            return Ok(bytes);
        }
        let now = Instant::now();
        let pause = match deadline {
            Some(deadline) if now >= deadline => {
                return Err(BenchError::Timeout(format!(
                    "future {key} was not fulfilled within {timeout:?}"
                )));
            }
            Some(deadline) => interval.min(deadline - now),
            None => interval,
        };
        std::thread::sleep(pause);
    }
}
