//! IPFS data transfer options.

use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};

use super::{ConfigGroup, get_flag, get_one, preparse_flag};
use crate::ipfs::IpfsTransfer;
use crate::{BenchError, BenchResult};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IpfsConfig {
    pub use_ipfs: bool,
    pub local_dir: Option<PathBuf>,
    pub remote_dir: Option<PathBuf>,
}

impl IpfsConfig {
    /// Transfer handle, or `None` when IPFS is disabled.
    pub fn get_resource(&self) -> BenchResult<Option<IpfsTransfer>> {
        if !self.use_ipfs {
            return Ok(None);
        }
        match (&self.local_dir, &self.remote_dir) {
            (Some(local), Some(remote)) => Ok(Some(IpfsTransfer::new(local, remote))),
            _ => Err(BenchError::config(
                "--ipfs-local-dir and --ipfs-remote-dir are required with --use-ipfs",
            )),
        }
    }
}

impl ConfigGroup for IpfsConfig {
    fn add_args(cmd: Command, _required: bool, argv: &[String]) -> Command {
        let enabled = preparse_flag(argv, "--use-ipfs");
        cmd.next_help_heading("IPFS")
            .arg(
                Arg::new("use-ipfs")
                    .long("use-ipfs")
                    .action(ArgAction::SetTrue)
                    .help("Move task data through IPFS"),
            )
            .arg(
                Arg::new("ipfs-local-dir")
                    .long("ipfs-local-dir")
                    .value_parser(value_parser!(PathBuf))
                    .required(enabled)
                    .help("Staging directory for objects added to IPFS"),
            )
            .arg(
                Arg::new("ipfs-remote-dir")
                    .long("ipfs-remote-dir")
                    .value_parser(value_parser!(PathBuf))
                    .required(enabled)
                    .help("Directory objects are fetched into"),
            )
    }

    fn from_matches(matches: &ArgMatches) -> BenchResult<Self> {
        let config = IpfsConfig {
            use_ipfs: get_flag(matches, "use-ipfs"),
            local_dir: get_one(matches, "ipfs-local-dir"),
            remote_dir: get_one(matches, "ipfs-remote-dir"),
        };
        if config.use_ipfs {
            config.get_resource()?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::parse_group;

    #[test]
    fn test_disabled_by_default() {
        let matches = parse_group::<IpfsConfig>(false, &[]).unwrap();
        let config = IpfsConfig::from_matches(&matches).unwrap();
        assert!(!config.use_ipfs);
        assert!(config.get_resource().unwrap().is_none());
    }

    #[test]
    fn test_dirs_required_with_use_ipfs() {
        assert!(parse_group::<IpfsConfig>(false, &["--use-ipfs"]).is_err());
        let matches = parse_group::<IpfsConfig>(
            false,
            &["--use-ipfs", "--ipfs-local-dir", "/tmp/l", "--ipfs-remote-dir", "/tmp/r"],
        )
        .unwrap();
        let config = IpfsConfig::from_matches(&matches).unwrap();
        let transfer = config.get_resource().unwrap().unwrap();
        assert_eq!(transfer.local_dir, PathBuf::from("/tmp/l"));
        assert_eq!(transfer.remote_dir, PathBuf::from("/tmp/r"));
    }

    #[test]
    fn test_dirs_alone_do_not_enable() {
        let matches = parse_group::<IpfsConfig>(false, &["--ipfs-local-dir", "/tmp/l"]).unwrap();
        let config = IpfsConfig::from_matches(&matches).unwrap();
        assert!(!config.use_ipfs);
    }
}
