//! Redis list-backed stream (RPUSH / BLPOP on the topic key).
//!
//! Clients are built unconnected; the connection is made in `open`.

use std::time::Duration;

use ::redis::{Client, Commands, Connection};

use crate::{BenchError, BenchResult};

use super::{Publisher, Subscriber};

fn server_url(server: &str) -> String {
    if server.starts_with("redis://") {
        server.to_string()
    } else {
        format!("redis://{server}/")
    }
}

fn connect(url: &str) -> BenchResult<Connection> {
    Client::open(url)
        .and_then(|client| client.get_connection())
        .map_err(|e| BenchError::acquire(format!("redis stream at {url}"), e))
}

pub struct RedisQueuePublisher {
    url: String,
    topic: String,
    conn: Option<Connection>,
}

impl RedisQueuePublisher {
    pub fn new(server: &str, topic: impl Into<String>) -> Self {
        RedisQueuePublisher {
            url: server_url(server),
            topic: topic.into(),
            conn: None,
        }
    }
}

impl Publisher for RedisQueuePublisher {
    fn open(&mut self) -> BenchResult<()> {
        if self.conn.is_none() {
            self.conn = Some(connect(&self.url)?);
        }
        Ok(())
    }

    fn send(&mut self, message: &[u8]) -> BenchResult<()> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| BenchError::lifecycle("publisher is not connected"))?;
        conn.rpush::<_, _, ()>(&self.topic, message)
            .map_err(|e| BenchError::Message(format!("redis publish to {}: {e}", self.topic)))
    }

    fn close(&mut self) -> BenchResult<()> {
        self.conn.take();
        Ok(())
    }
}

pub struct RedisQueueSubscriber {
    url: String,
    topic: String,
    conn: Option<Connection>,
}

impl RedisQueueSubscriber {
    pub fn new(server: &str, topic: impl Into<String>) -> Self {
        RedisQueueSubscriber {
            url: server_url(server),
            topic: topic.into(),
            conn: None,
        }
    }
}

impl Subscriber for RedisQueueSubscriber {
    fn open(&mut self) -> BenchResult<()> {
        if self.conn.is_none() {
            self.conn = Some(connect(&self.url)?);
        }
        Ok(())
    }

    fn next_message(&mut self, timeout: Duration) -> BenchResult<Option<Vec<u8>>> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| BenchError::lifecycle("subscriber is not connected"))?;
        // BLPOP treats 0 as "block forever"; keep the wait bounded.
        let seconds = timeout.as_secs_f64().max(0.01);
        let popped: Option<(String, Vec<u8>)> = conn
            .blpop(&self.topic, seconds)
            .map_err(|e| BenchError::Message(format!("redis receive on {}: {e}", self.topic)))?;
        Ok(popped.map(|(_, message)| message))
    }

    fn close(&mut self) -> BenchResult<()> {
        self.conn.take();
        Ok(())
    }
}
