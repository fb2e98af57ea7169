//! CLI configuration groups.
//!
//! Every group declares its options on a [`clap::Command`], builds itself
//! from the parsed [`ArgMatches`], and (where it describes a live resource)
//! materializes that resource with `get_resource`.
//!
//! Options that only matter for one kind (say `--ps-host` for the redis
//! connector) are always declared but only marked required when the
//! selector flag carries that kind. The selector is found by
//! [`preparse_value`] on the caller's argv before the real parse.

pub mod executor;
pub mod general;
pub mod ipfs;
pub mod store;
pub mod stream;

use clap::{ArgMatches, Command};

use crate::BenchResult;

pub use executor::{DaskTopology, ExecutorConfig, ExecutorKind, ParslTopology};
pub use general::GeneralConfig;
pub use ipfs::IpfsConfig;
pub use store::{ConnectorConfig, ConnectorKind, DimHost, StoreConfig};
pub use stream::{StreamConfig, StreamKind, StreamTarget};

/// A titled group of CLI options that builds one configuration object.
pub trait ConfigGroup: Sized {
    /// Add this group's options to `cmd`.
    ///
    /// `required` makes the group's selector mandatory; `argv` is the
    /// argument list that will be parsed and decides which kind-specific
    /// options become required.
    fn add_args(cmd: Command, required: bool, argv: &[String]) -> Command;

    /// Build from parsed matches. Options that were never declared are
    /// treated as absent.
    fn from_matches(matches: &ArgMatches) -> BenchResult<Self>;
}

/// Value of the last `--flag value` or `--flag=value` before any `--`.
///
/// Only whole tokens are matched, so a flag name appearing inside another
/// option's value is not mistaken for the selector.
pub fn preparse_value(argv: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    let mut found = None;
    let mut iter = argv.iter();
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }
        if arg == flag {
            found = iter.next().cloned();
        } else if let Some(value) = arg.strip_prefix(&prefix) {
            found = Some(value.to_string());
        }
    }
    found
}

/// Whether the boolean `flag` is present before any `--`.
pub fn preparse_flag(argv: &[String], flag: &str) -> bool {
    argv.iter().take_while(|a| *a != "--").any(|a| a == flag)
}

pub(crate) fn get_one<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> Option<T> {
    matches.try_get_one::<T>(id).ok().flatten().cloned()
}

pub(crate) fn get_many<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> Option<Vec<T>> {
    matches
        .try_get_many::<T>(id)
        .ok()
        .flatten()
        .map(|values| values.cloned().collect())
}

pub(crate) fn get_flag(matches: &ArgMatches, id: &str) -> bool {
    get_one::<bool>(matches, id).unwrap_or(false)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    /// Declare `G` on a bare command and parse `args` with it.
    pub(crate) fn parse_group<G: ConfigGroup>(required: bool, args: &[&str]) -> Result<ArgMatches, clap::Error> {
        let args = argv(args);
        let cmd = G::add_args(Command::new("test"), required, &args);
        cmd.try_get_matches_from(std::iter::once("test".to_string()).chain(args))
    }

    #[test]
    fn test_preparse_value_forms() {
        let args = argv(&["--ps-connector", "redis", "--x"]);
        assert_eq!(preparse_value(&args, "--ps-connector").as_deref(), Some("redis"));
        let args = argv(&["--ps-connector=file"]);
        assert_eq!(preparse_value(&args, "--ps-connector").as_deref(), Some("file"));
        let args = argv(&["--ps-connector"]);
        assert_eq!(preparse_value(&args, "--ps-connector"), None);
    }

    #[test]
    fn test_preparse_ignores_substrings_and_trailing_args() {
        // "redis" inside another value must not select the redis connector.
        let args = argv(&["--stream-topic", "--ps-connector-redis", "--ps-file-dir", "redis"]);
        assert_eq!(preparse_value(&args, "--ps-connector"), None);
        let args = argv(&["--", "--ps-connector", "redis"]);
        assert_eq!(preparse_value(&args, "--ps-connector"), None);
        assert!(!preparse_flag(&args, "--ps-connector"));
    }

    #[test]
    fn test_last_selector_wins() {
        let args = argv(&["--stream", "kafka", "--stream=redis"]);
        assert_eq!(preparse_value(&args, "--stream").as_deref(), Some("redis"));
    }

    #[test]
    fn test_getters_tolerate_undeclared_args() {
        let matches = Command::new("t").try_get_matches_from(["t"]).unwrap();
        assert_eq!(get_one::<String>(&matches, "nope"), None);
        assert_eq!(get_many::<String>(&matches, "nope"), None);
        assert!(!get_flag(&matches, "nope"));
    }
}
