//! Message streams: a publisher and a subscriber bound to one topic.

pub mod redis;

use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use tracing::debug;

use crate::{BenchError, BenchResult};

pub use self::redis::{RedisQueuePublisher, RedisQueueSubscriber};

pub trait Publisher: Send {
    /// Connect to the broker. Called once when the benchmark is entered.
    fn open(&mut self) -> BenchResult<()> {
        Ok(())
    }

    fn send(&mut self, message: &[u8]) -> BenchResult<()>;

    fn close(&mut self) -> BenchResult<()>;
}

pub trait Subscriber: Send {
    fn open(&mut self) -> BenchResult<()> {
        Ok(())
    }

    /// Next message in FIFO order, or `None` if none arrived within `timeout`.
    fn next_message(&mut self, timeout: Duration) -> BenchResult<Option<Vec<u8>>>;

    fn close(&mut self) -> BenchResult<()>;
}

/// Publisher and subscriber for one topic.
pub struct StreamPair {
    pub kind: String,
    pub topic: String,
    pub publisher: Box<dyn Publisher>,
    pub subscriber: Box<dyn Subscriber>,
}

impl StreamPair {
    /// Connect both ends. If the subscriber fails the publisher is closed
    /// again before the error is returned.
    pub fn open(&mut self) -> BenchResult<()> {
        self.publisher.open()?;
        if let Err(e) = self.subscriber.open() {
            let _ = self.publisher.close();
            return Err(e);
        }
        debug!(stream = %self.kind, topic = %self.topic, "stream connected");
        Ok(())
    }

    /// Close both ends, reporting the first failure.
    pub fn close(&mut self) -> BenchResult<()> {
        let published = self.publisher.close();
        let subscribed = self.subscriber.close();
        published.and(subscribed)
    }
}

struct ChannelPublisher {
    tx: Option<mpsc::Sender<Vec<u8>>>,
}

impl Publisher for ChannelPublisher {
    fn send(&mut self, message: &[u8]) -> BenchResult<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| BenchError::lifecycle("publisher is closed"))?;
        tx.send(message.to_vec())
            .map_err(|_| BenchError::Message("subscriber hung up".into()))
    }

    fn close(&mut self) -> BenchResult<()> {
        self.tx.take();
        Ok(())
    }
}

struct ChannelSubscriber {
    rx: mpsc::Receiver<Vec<u8>>,
    closed: bool,
}

impl Subscriber for ChannelSubscriber {
    fn next_message(&mut self, timeout: Duration) -> BenchResult<Option<Vec<u8>>> {
        if self.closed {
            return Err(BenchError::lifecycle("subscriber is closed"));
        }
        match self.rx.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    fn close(&mut self) -> BenchResult<()> {
        self.closed = true;
        Ok(())
    }
}

/// In-process stream backed by a channel.
pub fn local_stream(topic: impl Into<String>) -> StreamPair {
    let (tx, rx) = mpsc::channel();
    StreamPair {
        kind: "local".into(),
        topic: topic.into(),
        publisher: Box::new(ChannelPublisher { tx: Some(tx) }),
        subscriber: Box::new(ChannelSubscriber { rx, closed: false }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_stream_is_fifo() {
        let mut pair = local_stream("topic");
        for i in 0u8..5 {
            pair.publisher.send(&[i]).unwrap();
        }
        for i in 0u8..5 {
            let msg = pair
                .subscriber
                .next_message(Duration::from_millis(100))
                .unwrap();
            assert_eq!(msg, Some(vec![i]));
        }
        assert_eq!(
            pair.subscriber.next_message(Duration::from_millis(5)).unwrap(),
            None
        );
    }

    struct Refusing;

    impl Subscriber for Refusing {
        fn open(&mut self) -> BenchResult<()> {
            Err(BenchError::acquire("stream", "refused"))
        }
        fn next_message(&mut self, _: Duration) -> BenchResult<Option<Vec<u8>>> {
            Ok(None)
        }
        fn close(&mut self) -> BenchResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_subscriber_open_closes_publisher() {
        let local = local_stream("topic");
        let mut pair = StreamPair {
            subscriber: Box::new(Refusing),
            ..local
        };
        assert!(matches!(pair.open(), Err(BenchError::ResourceAcquire { .. })));
        assert!(matches!(pair.publisher.send(b"x"), Err(BenchError::Lifecycle(_))));
    }

    #[test]
    fn test_closed_ends_fail() {
        let mut pair = local_stream("topic");
        pair.close().unwrap();
        assert!(pair.publisher.send(b"x").is_err());
        assert!(pair.subscriber.next_message(Duration::ZERO).is_err());
    }
}
