//! Shared helpers for integration tests: a scripted in-memory remote channel
//! and fixture loading.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fleetperf::inventory::Device;
use fleetperf::remote::{ChannelError, CommandOutput, Credentials, RemoteChannel, Session};

pub fn fixture(rel: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(rel);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("fixture {}: {}", path.display(), e))
}

pub fn device(name: &str, address: &str) -> Device {
    Device::new(name, address, Some("1Gbps"), "Test rack")
}

pub fn creds() -> Credentials {
    Credentials::new("ops", "secret")
}

#[derive(Clone)]
enum Reply {
    Output(CommandOutput),
    Timeout,
}

#[derive(Clone, Copy)]
pub enum ConnectFailure {
    Auth,
    Refused,
}

#[derive(Default)]
struct Host {
    connect_failure: Option<ConnectFailure>,
    /// First rule whose needle appears in the command wins.
    rules: Vec<(String, Reply)>,
}

/// In-memory [`RemoteChannel`]. Commands are answered from per-host rules
/// matched by substring; unmatched commands succeed with empty output.
#[derive(Clone, Default)]
pub struct ScriptedChannel {
    hosts: Arc<Mutex<HashMap<String, Host>>>,
    log: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_connect(&self, address: &str, failure: ConnectFailure) -> &Self {
        self.hosts
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_default()
            .connect_failure = Some(failure);
        self
    }

    fn push(&self, address: &str, needle: &str, reply: Reply) -> &Self {
        self.hosts
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_default()
            .rules
            .push((needle.to_string(), reply));
        self
    }

    pub fn stdout(&self, address: &str, needle: &str, stdout: &str) -> &Self {
        self.push(
            address,
            needle,
            Reply::Output(CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: 0,
            }),
        )
    }

    pub fn stderr(&self, address: &str, needle: &str, stderr: &str) -> &Self {
        self.exit_with(address, needle, 1, stderr)
    }

    pub fn exit_with(&self, address: &str, needle: &str, exit_code: i32, stderr: &str) -> &Self {
        self.push(
            address,
            needle,
            Reply::Output(CommandOutput {
                stdout: String::new(),
                stderr: stderr.to_string(),
                exit_code,
            }),
        )
    }

    pub fn time_out(&self, address: &str, needle: &str) -> &Self {
        self.push(address, needle, Reply::Timeout)
    }

    /// Commands executed so far, as `(address, command)`.
    pub fn executed(&self) -> Vec<(String, String)> {
        self.log.lock().unwrap().clone()
    }

    pub fn executed_on(&self, address: &str, needle: &str) -> usize {
        self.executed()
            .iter()
            .filter(|(a, c)| a == address && c.contains(needle))
            .count()
    }
}

#[async_trait::async_trait]
impl RemoteChannel for ScriptedChannel {
    async fn connect(
        &self,
        address: &str,
        credentials: &Credentials,
        _timeout: Duration,
    ) -> Result<Box<dyn Session>, ChannelError> {
        let failure = self
            .hosts
            .lock()
            .unwrap()
            .get(address)
            .and_then(|h| h.connect_failure);
        match failure {
            Some(ConnectFailure::Auth) => Err(ChannelError::Auth {
                host: address.to_string(),
                user: credentials.username.clone(),
            }),
            Some(ConnectFailure::Refused) => Err(ChannelError::Connect {
                host: address.to_string(),
                reason: "Connection refused".to_string(),
            }),
            None => Ok(Box::new(ScriptedSession {
                address: address.to_string(),
                channel: self.clone(),
            })),
        }
    }
}

struct ScriptedSession {
    address: String,
    channel: ScriptedChannel,
}

#[async_trait::async_trait]
impl Session for ScriptedSession {
    async fn execute(&self, command: &str, timeout: Duration) -> Result<CommandOutput, ChannelError> {
        self.channel
            .log
            .lock()
            .unwrap()
            .push((self.address.clone(), command.to_string()));

        let reply = self
            .channel
            .hosts
            .lock()
            .unwrap()
            .get(&self.address)
            .and_then(|h| {
                h.rules
                    .iter()
                    .find(|(needle, _)| command.contains(needle.as_str()))
                    .map(|(_, r)| r.clone())
            });

        match reply {
            Some(Reply::Output(out)) => Ok(out),
            Some(Reply::Timeout) => Err(ChannelError::Timeout {
                host: self.address.clone(),
                timeout_secs: timeout.as_secs(),
            }),
            None => Ok(CommandOutput::default()),
        }
    }
}
