//! Supervises the ephemeral L1 node backing a local devnet bundle (§4.14).
//! The node binary itself is an external collaborator: this module only
//! spawns it, waits for its IPC socket to appear, and tears it down.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::errors::DevnetError;

const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(500);
const SOCKET_WAIT_TIMEOUT: Duration = Duration::from_secs(30);
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Binary and working-directory layout for one ephemeral L1 node. Every
/// field under `working_dir` is unique per deployment so concurrent devnets
/// never share an IPC path.
pub struct L1NodeConfig {
    pub binary: String,
    pub working_dir: PathBuf,
    pub chain_id: u64,
}

impl L1NodeConfig {
    pub fn new(working_dir: PathBuf, chain_id: u64) -> Self {
        Self { binary: "anvil".to_string(), working_dir, chain_id }
    }

    pub fn ipc_socket_path(&self) -> PathBuf {
        self.working_dir.join("l1.ipc")
    }

    pub fn state_dump_path(&self) -> PathBuf {
        self.working_dir.join("l1-state.json")
    }
}

/// A running L1 node. Dropping this without calling [`Self::shutdown`]
/// leaves the child process running; callers are expected to always shut
/// it down, successful deployment or not.
pub struct L1NodeHandle {
    child: Child,
    socket_path: PathBuf,
    config: L1NodeConfig,
}

impl L1NodeHandle {
    pub async fn spawn(config: L1NodeConfig) -> Result<Self, DevnetError> {
        tokio::fs::create_dir_all(&config.working_dir).await?;
        let socket_path = config.ipc_socket_path();

        let mut command = Command::new(&config.binary);
        command
            .arg("--chain-id")
            .arg(config.chain_id.to_string())
            .arg("--ipc")
            .arg(&socket_path)
            .arg("--dump-state")
            .arg(config.state_dump_path())
            .arg("--silent")
            .current_dir(&config.working_dir);

        Self::spawn_command(command, config).await
    }

    async fn spawn_command(mut command: Command, config: L1NodeConfig) -> Result<Self, DevnetError> {
        let socket_path = config.ipc_socket_path();
        let child = command.kill_on_drop(true).spawn().map_err(DevnetError::Spawn)?;
        let handle = Self { child, socket_path, config };
        handle.wait_for_socket().await?;
        Ok(handle)
    }

    async fn wait_for_socket(&self) -> Result<(), DevnetError> {
        poll_until_exists(&self.socket_path, SOCKET_POLL_INTERVAL, SOCKET_WAIT_TIMEOUT).await
    }

    pub fn ipc_socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Sends `SIGTERM`, waits up to five seconds, then force-kills. Takes
    /// `&mut self` rather than consuming the handle so callers can still
    /// read [`Self::dump_state`] afterwards — the node only finishes
    /// writing its state dump on exit.
    pub async fn shutdown(&mut self) -> Result<(), DevnetError> {
        if let Some(pid) = self.child.id() {
            // SAFETY: `pid` is a plain integer read from the child handle;
            // `kill` with SIGTERM on a still-running child has no memory
            // safety implications.
            #[cfg(unix)]
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
        }

        match timeout(SHUTDOWN_GRACE_PERIOD, self.child.wait()).await {
            Ok(status) => {
                info!(?status, "l1 node exited after sigterm");
            }
            Err(_) => {
                warn!("l1 node did not exit within the grace period, force-killing");
                self.child.start_kill()?;
                self.child.wait().await?;
            }
        }
        Ok(())
    }

    pub async fn dump_state(&self) -> Result<Vec<u8>, DevnetError> {
        Ok(tokio::fs::read(self.config.state_dump_path()).await?)
    }
}

async fn poll_until_exists(path: &Path, interval: Duration, wait_timeout: Duration) -> Result<(), DevnetError> {
    let result = timeout(wait_timeout, async {
        loop {
            if path.exists() {
                return;
            }
            sleep(interval).await;
        }
    })
    .await;
    result.map_err(|_| DevnetError::NodeStartupTimeout)
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tempfile::tempdir;
    use tokio::process::Command;

    use super::*;

    #[test]
    fn node_config_derives_paths_under_working_dir() {
        let config = L1NodeConfig::new(PathBuf::from("/tmp/devnet-d1"), 31337);
        assert_eq!(config.ipc_socket_path(), PathBuf::from("/tmp/devnet-d1/l1.ipc"));
        assert_eq!(config.state_dump_path(), PathBuf::from("/tmp/devnet-d1/l1-state.json"));
    }

    #[tokio::test]
    async fn poll_until_exists_times_out_when_file_never_appears() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("never.sock");
        let err = poll_until_exists(&missing, Duration::from_millis(10), Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, DevnetError::NodeStartupTimeout));
    }

    #[tokio::test]
    async fn poll_until_exists_succeeds_once_file_appears() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ready.sock");
        std::fs::write(&path, b"").unwrap();
        poll_until_exists(&path, Duration::from_millis(10), Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_terminates_a_running_child_within_the_grace_period() {
        let dir = tempdir().unwrap();
        let config = L1NodeConfig::new(dir.path().to_path_buf(), 31337);
        std::fs::write(config.ipc_socket_path(), b"").unwrap();

        let mut command = Command::new("sleep");
        command.arg("30");
        let mut handle = L1NodeHandle::spawn_command(command, config).await.unwrap();
        handle.shutdown().await.unwrap();
    }
}
