//! Object store selection.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Arg, ArgGroup, ArgMatches, Command, value_parser};
use tracing::debug;

use super::{ConfigGroup, get_many, get_one, preparse_value};
use crate::store::{FileConnector, RedisConnector, Store};
use crate::{BenchError, BenchResult};

/// Name given to the store handed to benchmarks.
pub const STORE_NAME: &str = "psbench-store";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorKind {
    File,
    Redis,
    Globus,
    Endpoint,
    Margo,
    Ucx,
    Zmq,
    Daos,
}

impl ConnectorKind {
    pub const NAMES: [&'static str; 8] = ["file", "redis", "globus", "endpoint", "margo", "ucx", "zmq", "daos"];

    fn is_dim(self) -> bool {
        matches!(self, ConnectorKind::Margo | ConnectorKind::Ucx | ConnectorKind::Zmq)
    }
}

impl FromStr for ConnectorKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(ConnectorKind::File),
            "redis" => Ok(ConnectorKind::Redis),
            "globus" => Ok(ConnectorKind::Globus),
            "endpoint" => Ok(ConnectorKind::Endpoint),
            "margo" => Ok(ConnectorKind::Margo),
            "ucx" => Ok(ConnectorKind::Ucx),
            "zmq" => Ok(ConnectorKind::Zmq),
            "daos" => Ok(ConnectorKind::Daos),
            _ => Err(BenchError::config(format!(
                "unknown connector '{s}', expected one of {}",
                Self::NAMES.join(", ")
            ))),
        }
    }
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectorKind::File => "file",
            ConnectorKind::Redis => "redis",
            ConnectorKind::Globus => "globus",
            ConnectorKind::Endpoint => "endpoint",
            ConnectorKind::Margo => "margo",
            ConnectorKind::Ucx => "ucx",
            ConnectorKind::Zmq => "zmq",
            ConnectorKind::Daos => "daos",
        };
        f.write_str(name)
    }
}

/// Where a distributed-memory connector listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimHost {
    Address(String),
    Interface(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorConfig {
    File {
        dir: PathBuf,
    },
    Redis {
        host: String,
        port: u16,
    },
    Globus {
        config: PathBuf,
    },
    Endpoint {
        endpoints: Vec<String>,
    },
    Margo {
        host: DimHost,
        port: u16,
        protocol: String,
    },
    Ucx {
        host: DimHost,
        port: u16,
    },
    Zmq {
        host: DimHost,
        port: u16,
    },
    Daos {
        pool: String,
        container: String,
        namespace: String,
    },
}

impl ConnectorConfig {
    pub fn kind(&self) -> ConnectorKind {
        match self {
            ConnectorConfig::File { .. } => ConnectorKind::File,
            ConnectorConfig::Redis { .. } => ConnectorKind::Redis,
            ConnectorConfig::Globus { .. } => ConnectorKind::Globus,
            ConnectorConfig::Endpoint { .. } => ConnectorKind::Endpoint,
            ConnectorConfig::Margo { .. } => ConnectorKind::Margo,
            ConnectorConfig::Ucx { .. } => ConnectorKind::Ucx,
            ConnectorConfig::Zmq { .. } => ConnectorKind::Zmq,
            ConnectorConfig::Daos { .. } => ConnectorKind::Daos,
        }
    }
}

/// Store options; `connector` is `None` when no `--ps-connector` was given.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreConfig {
    pub connector: Option<ConnectorConfig>,
}

impl StoreConfig {
    /// Build the store, unopened. No connector means no store.
    pub fn get_resource(&self) -> BenchResult<Option<Store>> {
        let Some(connector) = &self.connector else {
            return Ok(None);
        };
        let store = match connector {
            ConnectorConfig::File { dir } => Store::new(STORE_NAME, FileConnector::new(dir)),
            ConnectorConfig::Redis { host, port } => Store::new(STORE_NAME, RedisConnector::new(host, *port)?),
            other => {
                return Err(BenchError::acquire(
                    format!("{} connector", other.kind()),
                    "no client for this connector in this build",
                ));
            }
        };
        debug!(connector = %connector.kind(), "store materialized");
        Ok(Some(store))
    }
}

impl ConfigGroup for StoreConfig {
    fn add_args(cmd: Command, required: bool, argv: &[String]) -> Command {
        let selected = preparse_value(argv, "--ps-connector").and_then(|s| s.parse::<ConnectorKind>().ok());
        let is = |kind: ConnectorKind| selected == Some(kind);
        let dim = selected.is_some_and(ConnectorKind::is_dim);

        cmd.next_help_heading("Store")
            .arg(
                Arg::new("ps-connector")
                    .long("ps-connector")
                    .value_parser(ConnectorKind::NAMES)
                    .required(required)
                    .help("Connector of the object store (omit for no store)"),
            )
            .arg(
                Arg::new("ps-file-dir")
                    .long("ps-file-dir")
                    .value_parser(value_parser!(PathBuf))
                    .required(is(ConnectorKind::File))
                    .help("Directory of the file connector"),
            )
            .arg(
                Arg::new("ps-host")
                    .long("ps-host")
                    .required(is(ConnectorKind::Redis))
                    .help("Redis server host"),
            )
            .arg(
                Arg::new("ps-port")
                    .long("ps-port")
                    .value_parser(value_parser!(u16))
                    .required(is(ConnectorKind::Redis) || dim)
                    .help("Redis server or DIM connector port"),
            )
            .arg(
                Arg::new("ps-globus-config")
                    .long("ps-globus-config")
                    .value_parser(value_parser!(PathBuf))
                    .required(is(ConnectorKind::Globus))
                    .help("Globus Transfer endpoint configuration file"),
            )
            .arg(
                Arg::new("ps-endpoints")
                    .long("ps-endpoints")
                    .num_args(1..)
                    .required(is(ConnectorKind::Endpoint))
                    .help("ProxyStore endpoint UUIDs"),
            )
            .arg(
                Arg::new("ps-address")
                    .long("ps-address")
                    .help("Listen address of a DIM connector"),
            )
            .arg(
                Arg::new("ps-interface")
                    .long("ps-interface")
                    .help("Network interface of a DIM connector"),
            )
            .group(
                ArgGroup::new("ps-dim-host")
                    .args(["ps-address", "ps-interface"])
                    .multiple(false)
                    .required(dim),
            )
            .arg(
                Arg::new("ps-margo-protocol")
                    .long("ps-margo-protocol")
                    .default_value("tcp")
                    .help("Margo transport protocol"),
            )
            .arg(
                Arg::new("ps-daos-pool")
                    .long("ps-daos-pool")
                    .required(is(ConnectorKind::Daos))
                    .help("DAOS pool label"),
            )
            .arg(
                Arg::new("ps-daos-container")
                    .long("ps-daos-container")
                    .required(is(ConnectorKind::Daos))
                    .help("DAOS container label"),
            )
            .arg(
                Arg::new("ps-daos-namespace")
                    .long("ps-daos-namespace")
                    .required(is(ConnectorKind::Daos))
                    .help("DAOS dictionary namespace"),
            )
    }

    fn from_matches(matches: &ArgMatches) -> BenchResult<Self> {
        let Some(kind) = get_one::<String>(matches, "ps-connector") else {
            return Ok(StoreConfig { connector: None });
        };
        let kind: ConnectorKind = kind.parse()?;
        let missing = |flag: &str| BenchError::config(format!("--{flag} is required for --ps-connector {kind}"));
        let port = || get_one::<u16>(matches, "ps-port").ok_or_else(|| missing("ps-port"));
        let dim_host = || match (
            get_one::<String>(matches, "ps-address"),
            get_one::<String>(matches, "ps-interface"),
        ) {
            (Some(address), None) => Ok(DimHost::Address(address)),
            (None, Some(interface)) => Ok(DimHost::Interface(interface)),
            (Some(_), Some(_)) => Err(BenchError::config(
                "--ps-address and --ps-interface are mutually exclusive",
            )),
            (None, None) => Err(missing("ps-address or --ps-interface")),
        };

        let connector = match kind {
            ConnectorKind::File => ConnectorConfig::File {
                dir: get_one(matches, "ps-file-dir").ok_or_else(|| missing("ps-file-dir"))?,
            },
            ConnectorKind::Redis => ConnectorConfig::Redis {
                host: get_one(matches, "ps-host").ok_or_else(|| missing("ps-host"))?,
                port: port()?,
            },
            ConnectorKind::Globus => ConnectorConfig::Globus {
                config: get_one(matches, "ps-globus-config").ok_or_else(|| missing("ps-globus-config"))?,
            },
            ConnectorKind::Endpoint => ConnectorConfig::Endpoint {
                endpoints: get_many(matches, "ps-endpoints")
                    .filter(|e: &Vec<String>| !e.is_empty())
                    .ok_or_else(|| missing("ps-endpoints"))?,
            },
            ConnectorKind::Margo => ConnectorConfig::Margo {
                host: dim_host()?,
                port: port()?,
                protocol: get_one(matches, "ps-margo-protocol").unwrap_or_else(|| "tcp".to_string()),
            },
            ConnectorKind::Ucx => ConnectorConfig::Ucx {
                host: dim_host()?,
                port: port()?,
            },
            ConnectorKind::Zmq => ConnectorConfig::Zmq {
                host: dim_host()?,
                port: port()?,
            },
            ConnectorKind::Daos => ConnectorConfig::Daos {
                pool: get_one(matches, "ps-daos-pool").ok_or_else(|| missing("ps-daos-pool"))?,
                container: get_one(matches, "ps-daos-container").ok_or_else(|| missing("ps-daos-container"))?,
                namespace: get_one(matches, "ps-daos-namespace").ok_or_else(|| missing("ps-daos-namespace"))?,
            },
        };
        Ok(StoreConfig {
            connector: Some(connector),
        })
    }
}
