//! Connector backed by a Redis server.

use std::sync::Mutex;

use ::redis::{Client, Commands, Connection, RedisError, RedisResult};

use crate::utils::lock;
use crate::{BenchError, BenchResult};

use super::{Connector, Key};

/// Redis connector with a small pool of synchronous connections.
///
/// A connection is checked out for the duration of one command, so no lock
/// is held while waiting on the network.
pub struct RedisConnector {
    address: String,
    client: Client,
    pool: Mutex<Vec<Connection>>,
}

impl RedisConnector {
    pub fn new(host: &str, port: u16) -> BenchResult<Self> {
        let address = format!("{host}:{port}");
        let client = Client::open(format!("redis://{address}/"))
            .map_err(|e| BenchError::acquire(format!("redis store at {address}"), e))?;
        Ok(RedisConnector {
            address,
            client,
            pool: Mutex::new(Vec::new()),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> RedisResult<T>) -> BenchResult<T> {
        let pooled = lock(&self.pool).pop();
        let mut conn = match pooled {
            Some(conn) => conn,
            None => self
                .client
                .get_connection()
                .map_err(|e| redis_error(&self.address, e))?,
        };
        let result = f(&mut conn).map_err(|e| redis_error(&self.address, e));
        // Broken connections are dropped rather than returned to the pool.
        if result.is_ok() {
            lock(&self.pool).push(conn);
        }
        result
    }
}

fn redis_error(address: &str, e: RedisError) -> BenchError {
    BenchError::Message(format!("redis at {address}: {e}"))
}

impl Connector for RedisConnector {
    fn name(&self) -> &str {
        "redis"
    }

    fn open(&self) -> BenchResult<()> {
        self.with_connection(|conn| ::redis::cmd("PING").query::<String>(conn))?;
        Ok(())
    }

    fn close(&self) -> BenchResult<()> {
        lock(&self.pool).clear();
        Ok(())
    }

    fn get(&self, key: &Key) -> BenchResult<Option<Vec<u8>>> {
        self.with_connection(|conn| conn.get::<_, Option<Vec<u8>>>(key.as_str()))
    }

    fn set(&self, key: &Key, data: &[u8]) -> BenchResult<()> {
        self.with_connection(|conn| conn.set::<_, _, ()>(key.as_str(), data))
    }

    fn exists(&self, key: &Key) -> BenchResult<bool> {
        self.with_connection(|conn| conn.exists::<_, bool>(key.as_str()))
    }

    fn evict(&self, key: &Key) -> BenchResult<()> {
        self.with_connection(|conn| conn.del::<_, ()>(key.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn test_connector_metadata() {
        let connector = RedisConnector::new("localhost", 6379).unwrap();
        assert_eq!(connector.name(), "redis");
        assert_eq!(connector.address(), "localhost:6379");
    }

    #[test]
    fn test_open_fails_without_server() {
        // Port 1 is reserved and never runs redis.
        let store = Store::new("redis", RedisConnector::new("127.0.0.1", 1).unwrap());
        let err = store.open().unwrap_err();
        assert!(matches!(err, BenchError::ResourceAcquire { .. }));
        assert!(!store.is_open());
    }
}
