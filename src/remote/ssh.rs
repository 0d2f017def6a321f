//! SSH implementation of the remote command channel.
//!
//! Uses the system `ssh` client through `tokio::process::Command`, with the
//! password supplied via `sshpass -e` so no interactive prompt or key exchange
//! is needed. Every command is its own connection, closed when the command
//! finishes.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use super::{ChannelError, CommandOutput, Credentials, RemoteChannel, Session};

/// `sshpass` exit status for a rejected password. Only meaningful for the
/// handshake: afterwards `ssh` passes the remote exit status through, and 5 is
/// also Windows' ERROR_ACCESS_DENIED.
const SSHPASS_BAD_PASSWORD: i32 = 5;

/// `ssh` exit status for its own (transport) errors.
const SSH_TRANSPORT_ERROR: i32 = 255;

#[derive(Debug, Clone)]
pub struct SshChannel {
    port: u16,
}

impl SshChannel {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

impl Default for SshChannel {
    fn default() -> Self {
        Self::new(22)
    }
}

#[async_trait::async_trait]
impl RemoteChannel for SshChannel {
    async fn connect(
        &self,
        address: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Box<dyn Session>, ChannelError> {
        let session = SshSession {
            host: address.to_string(),
            port: self.port,
            credentials: credentials.clone(),
            connect_timeout: timeout,
        };
        // Surface auth/connect failures before the caller issues real work.
        session.run("exit", timeout, Stage::Handshake).await?;
        debug!(host = %address, "ssh session established");
        Ok(Box::new(session))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Handshake,
    Command,
}

struct SshSession {
    host: String,
    port: u16,
    credentials: Credentials,
    connect_timeout: Duration,
}

impl SshSession {
    fn build_command(&self, remote_command: &str) -> Command {
        let mut cmd = Command::new("sshpass");
        cmd.arg("-e")
            .arg("ssh")
            .arg("-p")
            .arg(self.port.to_string())
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)))
            .arg("-o")
            .arg("PubkeyAuthentication=no")
            .arg("-o")
            .arg("PreferredAuthentications=password,keyboard-interactive")
            .arg("-o")
            .arg("NumberOfPasswordPrompts=1")
            .arg("-o")
            .arg("StrictHostKeyChecking=accept-new")
            .arg(format!("{}@{}", self.credentials.username, self.host))
            .arg(remote_command)
            .env("SSHPASS", self.credentials.password())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, command: &str, timeout: Duration, stage: Stage) -> Result<CommandOutput, ChannelError> {
        debug!(host = %self.host, %command, timeout_secs = timeout.as_secs(), "remote exec");

        let output = match tokio::time::timeout(timeout, self.build_command(command).output()).await {
            Ok(res) => res?,
            Err(_) => {
                return Err(ChannelError::Timeout {
                    host: self.host.clone(),
                    timeout_secs: timeout.as_secs(),
                })
            }
        };

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        };

        match classify_transport_failure(&self.host, &self.credentials.username, &result, stage) {
            Some(err) => Err(err),
            None => Ok(result),
        }
    }
}

#[async_trait::async_trait]
impl Session for SshSession {
    async fn execute(&self, command: &str, timeout: Duration) -> Result<CommandOutput, ChannelError> {
        self.run(command, timeout, Stage::Command).await
    }
}

/// Decide whether a finished `sshpass`/`ssh` invocation failed at the
/// transport layer rather than in the remote command itself.
fn classify_transport_failure(
    host: &str,
    user: &str,
    out: &CommandOutput,
    stage: Stage,
) -> Option<ChannelError> {
    let stderr = out.stderr.to_lowercase();
    let rejected = stage == Stage::Handshake && out.exit_code == SSHPASS_BAD_PASSWORD;

    if rejected || stderr.contains("permission denied (") {
        return Some(ChannelError::Auth {
            host: host.to_string(),
            user: user.to_string(),
        });
    }

    if out.exit_code != SSH_TRANSPORT_ERROR {
        return None;
    }

    let transport = [
        "connection refused",
        "connection timed out",
        "no route to host",
        "network is unreachable",
        "could not resolve hostname",
        "connection closed",
        "host key verification failed",
    ];
    if let Some(reason) = transport.iter().find(|needle| stderr.contains(*needle)) {
        return Some(ChannelError::Connect {
            host: host.to_string(),
            reason: (*reason).to_string(),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn out(exit_code: i32, stderr: &str) -> CommandOutput {
        CommandOutput {
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_code,
        }
    }

    #[test]
    fn bad_password_is_auth_failure() {
        let err = classify_transport_failure("10.0.0.5", "ops", &out(5, ""), Stage::Handshake).unwrap();
        assert!(matches!(err, ChannelError::Auth { .. }));

        let err = classify_transport_failure(
            "10.0.0.5",
            "ops",
            &out(255, "ops@10.0.0.5: Permission denied (password,keyboard-interactive)."),
            Stage::Command,
        )
        .unwrap();
        assert!(matches!(err, ChannelError::Auth { .. }));
    }

    #[test]
    fn unreachable_host_is_connect_failure() {
        let err = classify_transport_failure(
            "10.0.0.5",
            "ops",
            &out(255, "ssh: connect to host 10.0.0.5 port 22: Connection refused"),
            Stage::Handshake,
        )
        .unwrap();
        match err {
            ChannelError::Connect { reason, .. } => assert_eq!(reason, "connection refused"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn remote_command_failure_is_not_transport() {
        // iperf3 printing "Connection refused" with its own exit code is the
        // probe's business, not the channel's.
        assert!(classify_transport_failure(
            "10.0.0.5",
            "ops",
            &out(1, "iperf3: error - unable to connect to server: Connection refused"),
            Stage::Command,
        )
        .is_none());
        assert!(classify_transport_failure("10.0.0.5", "ops", &out(0, ""), Stage::Command).is_none());
    }

    #[test]
    fn remote_access_denied_is_not_auth() {
        // Exit 5 from a remote Windows command is ERROR_ACCESS_DENIED.
        assert!(classify_transport_failure("10.0.0.5", "ops", &out(5, "Access is denied."), Stage::Command).is_none());
    }
}
