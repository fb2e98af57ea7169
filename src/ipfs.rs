//! Moving task data through IPFS by shelling out to the `ipfs` CLI.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::{BenchError, BenchResult};

/// Handle to an `ipfs` binary.
#[derive(Debug, Clone)]
pub struct IpfsClient {
    binary: PathBuf,
}

impl Default for IpfsClient {
    fn default() -> Self {
        IpfsClient {
            binary: PathBuf::from("ipfs"),
        }
    }
}

impl IpfsClient {
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        IpfsClient {
            binary: binary.into(),
        }
    }

    fn run(&self, args: &[&std::ffi::OsStr]) -> BenchResult<String> {
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                BenchError::Message(format!("failed to run {}: {e}", self.binary.display()))
            })?;
        if !output.status.success() {
            return Err(BenchError::Message(format!(
                "{} {:?} failed. stderr=\n{}",
                self.binary.display(),
                args,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Write `data` under `local_dir` and add it to IPFS, returning the CID.
    pub fn add(&self, local_dir: &Path, data: &[u8]) -> BenchResult<String> {
        std::fs::create_dir_all(local_dir)?;
        let path = local_dir.join(uuid::Uuid::new_v4().simple().to_string());
        std::fs::write(&path, data)?;
        let cid = self.run(&["add".as_ref(), "-q".as_ref(), path.as_os_str()])?;
        let cid = parse_cid(&cid)?;
        debug!(%cid, bytes = data.len(), "added object to ipfs");
        Ok(cid)
    }

    /// Fetch `cid` into `remote_dir` and return its bytes.
    pub fn get(&self, cid: &str, remote_dir: &Path) -> BenchResult<Vec<u8>> {
        std::fs::create_dir_all(remote_dir)?;
        let path = remote_dir.join(cid);
        self.run(&["get".as_ref(), cid.as_ref(), "-o".as_ref(), path.as_os_str()])?;
        let data = std::fs::read(&path)?;
        let _ = std::fs::remove_file(&path);
        Ok(data)
    }
}

/// An IPFS client bound to the directories objects are staged in.
#[derive(Debug, Clone)]
pub struct IpfsTransfer {
    pub client: IpfsClient,
    pub local_dir: PathBuf,
    pub remote_dir: PathBuf,
}

impl IpfsTransfer {
    pub fn new(local_dir: impl Into<PathBuf>, remote_dir: impl Into<PathBuf>) -> Self {
        IpfsTransfer {
            client: IpfsClient::default(),
            local_dir: local_dir.into(),
            remote_dir: remote_dir.into(),
        }
    }

    pub fn with_client(mut self, client: IpfsClient) -> Self {
        self.client = client;
        self
    }

    pub fn put(&self, data: &[u8]) -> BenchResult<String> {
        self.client.add(&self.local_dir, data)
    }

    pub fn fetch(&self, cid: &str) -> BenchResult<Vec<u8>> {
        self.client.get(cid, &self.remote_dir)
    }
}

/// `ipfs add -q` prints one CID per added path; the last line is the root.
fn parse_cid(stdout: &str) -> BenchResult<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .map(str::to_string)
        .ok_or_else(|| BenchError::Message("ipfs add printed no CID".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cid() {
        assert_eq!(parse_cid("QmAbc\n").unwrap(), "QmAbc");
        assert_eq!(parse_cid("QmChunk\nQmRoot\n").unwrap(), "QmRoot");
        assert!(parse_cid("  \n").is_err());
    }

    #[test]
    fn test_missing_binary_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let client = IpfsClient::with_binary(dir.path().join("no-such-ipfs"));
        let err = client.add(dir.path(), b"data").unwrap_err();
        assert!(err.to_string().contains("failed to run"));
    }

    #[cfg(unix)]
    #[test]
    fn test_add_and_get_with_fake_binary() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        // Fake ipfs: `add -q PATH` prints a fixed CID and stashes the file,
        // `get CID -o OUT` copies the stash to OUT.
        let stash = dir.path().join("stash");
        let script = format!(
            "#!/bin/sh\nif [ \"$1\" = add ]; then cp \"$3\" {stash}; echo QmFake; else cp {stash} \"$4\"; fi\n",
            stash = stash.display()
        );
        let binary = dir.path().join("ipfs");
        std::fs::write(&binary, script).unwrap();
        let mut perms = std::fs::metadata(&binary).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&binary, perms).unwrap();

        let transfer = IpfsTransfer::new(dir.path().join("local"), dir.path().join("remote"))
            .with_client(IpfsClient::with_binary(&binary));
        let cid = transfer.put(b"hello ipfs").unwrap();
        assert_eq!(cid, "QmFake");
        let data = transfer.fetch(&cid).unwrap();
        assert_eq!(data, b"hello ipfs");
    }
}
