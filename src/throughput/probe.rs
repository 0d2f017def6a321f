//! Remote iperf3 adapter: runs one test between two devices over the remote
//! command channel.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::{validate_target, FailureKind, ProbeOutcome, Protocol, TestSpec};
use crate::config::ProbeConfig;
use crate::inventory::Device;
use crate::remote::{CommandOutput, Credentials, RemoteChannel, Session};

/// Boundary the orchestrator drives.
#[async_trait::async_trait]
pub trait ProbeAdapter: Send + Sync {
    /// Whether `device` is accepting iperf3 connections. Never errors: any
    /// failure to find out counts as "not listening".
    async fn verify_listening(&self, device: &Device) -> bool;

    /// Run `spec` from `client` to `server`.
    async fn run_test(&self, client: &Device, server: &Device, spec: &TestSpec) -> ProbeOutcome;
}

/// [`ProbeAdapter`] backed by a [`RemoteChannel`] to Windows hosts.
pub struct RemoteProbe {
    channel: Arc<dyn RemoteChannel>,
    credentials: Credentials,
    config: ProbeConfig,
    connect_timeout: Duration,
}

impl RemoteProbe {
    pub fn new(
        channel: Arc<dyn RemoteChannel>,
        credentials: Credentials,
        config: ProbeConfig,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            channel,
            credentials,
            config,
            connect_timeout,
        }
    }

    async fn open(&self, device: &Device) -> Result<Box<dyn Session>, FailureKind> {
        self.channel
            .connect(&device.address, &self.credentials, self.connect_timeout)
            .await
            .map_err(|e| {
                debug!(device = %device.name, error = %e, "connect failed");
                e.kind()
            })
    }

    /// First configured iperf3 path that exists and actually runs, else the
    /// first candidate.
    async fn locate_binary(&self, session: &dyn Session) -> Option<String> {
        let timeout = self.config.check_timeout();
        for path in &self.config.binary_paths {
            let exists = session
                .execute(&format!("if exist \"{}\" echo FOUND", path), timeout)
                .await;
            if !matches!(&exists, Ok(out) if out.stdout.contains("FOUND")) {
                continue;
            }
            if let Ok(out) = session.execute(&format!("\"{}\" --version 2>&1", path), timeout).await {
                let text = format!("{}{}", out.stdout, out.stderr).to_lowercase();
                if text.contains("iperf") && !text.contains("denied") {
                    return Some(path.clone());
                }
            }
        }
        self.config.binary_paths.first().cloned()
    }
}

/// Build the iperf3 client command line for `spec` against `server_address`.
pub fn build_command(binary: &str, server_address: &str, port: u16, spec: &TestSpec) -> String {
    let mut parts = vec![
        format!("\"{}\"", binary),
        format!("-c {}", server_address),
        format!("-p {}", port),
        format!("-t {}", spec.duration_s),
        "-J".to_string(),
    ];

    if let Some(n) = spec.parallel_streams {
        parts.push(format!("-P {}", n));
    }
    if spec.protocol == Protocol::Udp {
        parts.push("-u".to_string());
        let rate = spec.target_bandwidth_mbps.unwrap_or(100);
        parts.push(format!("-b {}M", rate));
        if let Some(len) = spec.packet_length_bytes {
            parts.push(format!("-l {}", len));
        }
    }
    if spec.reverse {
        parts.push("-R".to_string());
    }
    if let Some(window) = &spec.window_size {
        parts.push(format!("-w {}", window));
    }
    if let Some(mss) = spec.mss {
        parts.push(format!("-M {}", mss));
    }

    parts.join(" ")
}

/// Recognize iperf3 / Windows failure messages in a finished run.
pub fn classify_probe_failure(out: &CommandOutput) -> Option<FailureKind> {
    if out.mentions("Connection refused") {
        Some(FailureKind::ServerNotListening)
    } else if out.stderr.contains("Access is denied") {
        Some(FailureKind::PermissionDenied)
    } else if out.stderr.contains("cannot be found") || out.stderr.contains("not recognized") {
        Some(FailureKind::ProbeNotFound)
    } else {
        None
    }
}

/// `netstat -an` shows the probe port in LISTENING state.
pub fn port_is_listening(netstat_output: &str, port: u16) -> bool {
    let needle = format!(":{}", port);
    netstat_output.lines().any(|line| {
        line.contains("LISTENING")
            && line.match_indices(&needle).any(|(i, _)| {
                !line[i + needle.len()..]
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_digit())
            })
    })
}

#[async_trait::async_trait]
impl ProbeAdapter for RemoteProbe {
    async fn verify_listening(&self, device: &Device) -> bool {
        let session = match self.open(device).await {
            Ok(s) => s,
            Err(kind) => {
                warn!(device = %device.name, %kind, "cannot check iperf3 server");
                return false;
            }
        };

        let cmd = format!("netstat -an | findstr :{}", self.config.port);
        match session.execute(&cmd, self.config.check_timeout()).await {
            Ok(out) => {
                let listening = port_is_listening(&out.stdout, self.config.port);
                debug!(device = %device.name, listening, "iperf3 listener check");
                listening
            }
            Err(e) => {
                warn!(device = %device.name, kind = %e.kind(), "iperf3 listener check failed");
                false
            }
        }
    }

    async fn run_test(&self, client: &Device, server: &Device, spec: &TestSpec) -> ProbeOutcome {
        if !validate_target(&server.address) {
            warn!(device = %server.name, address = %server.address, "refusing unsafe server address");
            return ProbeOutcome::Failure {
                kind: FailureKind::ConnectFailure,
            };
        }

        let session = match self.open(client).await {
            Ok(s) => s,
            Err(kind) => return ProbeOutcome::Failure { kind },
        };

        let Some(binary) = self.locate_binary(session.as_ref()).await else {
            return ProbeOutcome::Failure {
                kind: FailureKind::ProbeNotFound,
            };
        };

        let cmd = build_command(&binary, &server.address, self.config.port, spec);
        let timeout = Duration::from_secs(u64::from(spec.duration_s) + self.config.timeout_slack_secs);
        debug!(client = %client.name, server = %server.name, %cmd, "running iperf3");

        let out = match session.execute(&cmd, timeout).await {
            Ok(out) => out,
            Err(e) => return ProbeOutcome::Failure { kind: e.kind() },
        };

        if let Some(kind) = classify_probe_failure(&out) {
            return ProbeOutcome::Failure { kind };
        }

        ProbeOutcome::from_payload(&out.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_command_line() {
        let spec = TestSpec::tcp(5);
        let cmd = build_command(r"C:\iperf3\iperf3.exe", "10.0.0.2", 5201, &spec);
        assert_eq!(cmd, r#""C:\iperf3\iperf3.exe" -c 10.0.0.2 -p 5201 -t 5 -J"#);
    }

    #[test]
    fn udp_command_line_with_options() {
        let mut spec = TestSpec::udp(5, 900, 1400);
        spec.reverse = true;
        spec.mss = Some(1400);
        spec.window_size = Some("256K".to_string());
        spec.parallel_streams = Some(2);
        let cmd = build_command("iperf3", "10.0.0.2", 5201, &spec);
        assert_eq!(
            cmd,
            "\"iperf3\" -c 10.0.0.2 -p 5201 -t 5 -J -P 2 -u -b 900M -l 1400 -R -w 256K -M 1400"
        );
    }

    #[test]
    fn failure_classification() {
        let refused = CommandOutput {
            stdout: r#"{"error": "unable to connect to server: Connection refused"}"#.into(),
            stderr: String::new(),
            exit_code: 1,
        };
        assert_eq!(classify_probe_failure(&refused), Some(FailureKind::ServerNotListening));

        let denied = CommandOutput {
            stdout: String::new(),
            stderr: "Access is denied.".into(),
            exit_code: 1,
        };
        assert_eq!(classify_probe_failure(&denied), Some(FailureKind::PermissionDenied));

        let missing = CommandOutput {
            stdout: String::new(),
            stderr: "'iperf3' is not recognized as an internal or external command".into(),
            exit_code: 1,
        };
        assert_eq!(classify_probe_failure(&missing), Some(FailureKind::ProbeNotFound));

        let ok = CommandOutput {
            stdout: "{}".into(),
            stderr: String::new(),
            exit_code: 0,
        };
        assert_eq!(classify_probe_failure(&ok), None);
    }

    #[test]
    fn netstat_listening_detection() {
        let out = "  TCP    0.0.0.0:5201           0.0.0.0:0              LISTENING\n";
        assert!(port_is_listening(out, 5201));

        let established = "  TCP    10.0.0.2:5201          10.0.0.1:50412         ESTABLISHED\n";
        assert!(!port_is_listening(established, 5201));

        let other = "  TCP    0.0.0.0:52010          0.0.0.0:0              LISTENING\n";
        assert!(!port_is_listening(other, 5201));
        assert!(!port_is_listening("", 5201));
    }
}
