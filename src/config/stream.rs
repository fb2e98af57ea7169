//! Stream broker selection.

use std::fmt;
use std::str::FromStr;

use clap::{Arg, ArgMatches, Command};
use tracing::debug;

use super::{ConfigGroup, get_many, get_one, preparse_value};
use crate::stream::{RedisQueuePublisher, RedisQueueSubscriber, StreamPair};
use crate::{BenchError, BenchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Kafka,
    Redis,
}

impl StreamKind {
    pub const NAMES: [&'static str; 2] = ["kafka", "redis"];
}

impl FromStr for StreamKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kafka" => Ok(StreamKind::Kafka),
            "redis" => Ok(StreamKind::Redis),
            _ => Err(BenchError::config(format!(
                "unknown stream '{s}', expected one of {}",
                Self::NAMES.join(", ")
            ))),
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StreamKind::Kafka => "kafka",
            StreamKind::Redis => "redis",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTarget {
    pub kind: StreamKind,
    pub topic: String,
    /// Bootstrap servers, `host:port`.
    pub servers: Vec<String>,
}

/// Stream options; `target` is `None` when no `--stream` was given.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamConfig {
    pub target: Option<StreamTarget>,
}

impl StreamConfig {
    /// Build a publisher and subscriber for the topic. Nothing connects
    /// until the owning benchmark is entered.
    pub fn get_resource(&self) -> BenchResult<Option<StreamPair>> {
        let Some(target) = &self.target else {
            return Ok(None);
        };
        match target.kind {
            StreamKind::Redis => {
                // Producer and consumer both talk to the first server.
                let server = target
                    .servers
                    .first()
                    .ok_or_else(|| BenchError::config("--stream-servers needs at least one address"))?;
                debug!(stream = "redis", topic = %target.topic, "stream materialized");
                Ok(Some(StreamPair {
                    kind: target.kind.to_string(),
                    topic: target.topic.clone(),
                    publisher: Box::new(RedisQueuePublisher::new(server, &target.topic)),
                    subscriber: Box::new(RedisQueueSubscriber::new(server, &target.topic)),
                }))
            }
            StreamKind::Kafka => Err(BenchError::acquire(
                format!("kafka stream '{}'", target.topic),
                "no kafka client in this build",
            )),
        }
    }
}

impl ConfigGroup for StreamConfig {
    fn add_args(cmd: Command, required: bool, argv: &[String]) -> Command {
        let selected = preparse_value(argv, "--stream").is_some_and(|s| s.parse::<StreamKind>().is_ok());

        cmd.next_help_heading("Stream")
            .arg(
                Arg::new("stream")
                    .long("stream")
                    .value_parser(StreamKind::NAMES)
                    .required(required)
                    .help("Stream broker (omit for no stream)"),
            )
            .arg(
                Arg::new("stream-topic")
                    .long("stream-topic")
                    .required(selected)
                    .help("Topic to publish and subscribe on"),
            )
            .arg(
                Arg::new("stream-servers")
                    .long("stream-servers")
                    .num_args(1..)
                    .required(selected)
                    .help("Bootstrap servers (host:port)"),
            )
    }

    fn from_matches(matches: &ArgMatches) -> BenchResult<Self> {
        let Some(kind) = get_one::<String>(matches, "stream") else {
            return Ok(StreamConfig::default());
        };
        let kind: StreamKind = kind.parse()?;
        let topic = get_one::<String>(matches, "stream-topic")
            .ok_or_else(|| BenchError::config(format!("--stream-topic is required for --stream {kind}")))?;
        let servers = get_many::<String>(matches, "stream-servers")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| BenchError::config(format!("--stream-servers is required for --stream {kind}")))?;
        Ok(StreamConfig {
            target: Some(StreamTarget { kind, topic, servers }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::parse_group;

    #[test]
    fn test_no_stream() {
        let matches = parse_group::<StreamConfig>(false, &[]).unwrap();
        let config = StreamConfig::from_matches(&matches).unwrap();
        assert!(config.get_resource().unwrap().is_none());
    }

    #[test]
    fn test_topic_and_servers_required_when_selected() {
        assert!(parse_group::<StreamConfig>(false, &["--stream", "redis"]).is_err());
        assert!(parse_group::<StreamConfig>(false, &["--stream", "redis", "--stream-topic", "t"]).is_err());
        let matches = parse_group::<StreamConfig>(
            false,
            &["--stream", "kafka", "--stream-topic", "t", "--stream-servers", "a:1", "b:2"],
        )
        .unwrap();
        let config = StreamConfig::from_matches(&matches).unwrap();
        let target = config.target.clone().unwrap();
        assert_eq!(target.kind, StreamKind::Kafka);
        assert_eq!(target.servers, vec!["a:1", "b:2"]);
        assert!(matches!(
            config.get_resource(),
            Err(BenchError::ResourceAcquire { .. })
        ));
    }

    #[test]
    fn test_redis_stream_connects_on_open() {
        let config = StreamConfig {
            target: Some(StreamTarget {
                kind: StreamKind::Redis,
                topic: "t".into(),
                servers: vec!["127.0.0.1:1".into()],
            }),
        };
        let mut pair = config.get_resource().unwrap().unwrap();
        assert_eq!(pair.kind, "redis");
        assert!(matches!(pair.open(), Err(BenchError::ResourceAcquire { .. })));
    }

    #[test]
    fn test_unknown_stream() {
        assert!(parse_group::<StreamConfig>(false, &["--stream", "nats"]).is_err());
    }
}
