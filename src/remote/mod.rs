//! Remote command-execution channel.
//!
//! The engine only ever talks to hosts through [`RemoteChannel`] and
//! [`Session`]; [`ssh::SshChannel`] is the production implementation and
//! tests substitute a scripted channel.

pub mod ssh;

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::throughput::FailureKind;

/// Password-style credentials. The password is wiped from memory on drop and
/// never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: Zeroizing<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Output of one remote command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    /// True if `needle` appears on either stream.
    pub fn mentions(&self, needle: &str) -> bool {
        self.stdout.contains(needle) || self.stderr.contains(needle)
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("authentication failed for {user}@{host}")]
    Auth { host: String, user: String },

    #[error("cannot connect to {host}: {reason}")]
    Connect { host: String, reason: String },

    #[error("command on {host} timed out after {timeout_secs}s")]
    Timeout { host: String, timeout_secs: u64 },

    #[error("failed to launch remote command: {0}")]
    Spawn(#[from] std::io::Error),
}

impl ChannelError {
    /// Map a transport failure onto the engine's failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            ChannelError::Auth { .. } => FailureKind::AuthFailure,
            ChannelError::Connect { .. } | ChannelError::Spawn(_) => FailureKind::ConnectFailure,
            ChannelError::Timeout { .. } => FailureKind::Timeout,
        }
    }
}

/// Opens sessions to hosts.
#[async_trait::async_trait]
pub trait RemoteChannel: Send + Sync {
    /// Establish a session to `address`, failing with `Auth` or `Connect`
    /// (or `Timeout` if `timeout` elapses first).
    async fn connect(
        &self,
        address: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Box<dyn Session>, ChannelError>;
}

/// An authenticated session on one host.
#[async_trait::async_trait]
pub trait Session: Send + Sync {
    /// Run `command`, bounded by `timeout`.
    async fn execute(&self, command: &str, timeout: Duration) -> Result<CommandOutput, ChannelError>;
}
