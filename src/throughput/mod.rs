//! Throughput testing engine: test plans, the remote iperf3 adapter, output
//! parsing and the normalized metric model.

pub mod iperf;
pub mod metrics;
pub mod plan;
pub mod probe;
pub mod report;

use serde::Serialize;
use thiserror::Error;

/// Why a directional test, connection or adapter query did not produce a result.
///
/// Every kind is recovered locally: the failing unit is marked and the run
/// continues.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    #[error("authentication failed")]
    AuthFailure,

    #[error("connection failed")]
    ConnectFailure,

    #[error("timed out")]
    Timeout,

    #[error("iperf3 server not listening")]
    ServerNotListening,

    #[error("iperf3 not found")]
    ProbeNotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("could not parse probe output")]
    OutputParseFailure,

    #[error("insufficient privilege")]
    InsufficientPrivilege,
}

/// Transport protocol of a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
        }
    }
}

/// Parameters of one iperf3 run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestSpec {
    pub protocol: Protocol,
    pub duration_s: u32,
    pub parallel_streams: Option<u32>,
    pub target_bandwidth_mbps: Option<u64>,
    pub packet_length_bytes: Option<u32>,
    /// Ask the server to send (`-R`) instead of swapping endpoints.
    pub reverse: bool,
    pub window_size: Option<String>,
    pub mss: Option<u32>,
}

impl TestSpec {
    pub fn tcp(duration_s: u32) -> Self {
        Self {
            protocol: Protocol::Tcp,
            duration_s,
            parallel_streams: None,
            target_bandwidth_mbps: None,
            packet_length_bytes: None,
            reverse: false,
            window_size: None,
            mss: None,
        }
    }

    pub fn udp(duration_s: u32, target_bandwidth_mbps: u64, packet_length_bytes: u32) -> Self {
        Self {
            protocol: Protocol::Udp,
            target_bandwidth_mbps: Some(target_bandwidth_mbps),
            packet_length_bytes: Some(packet_length_bytes),
            ..Self::tcp(duration_s)
        }
    }
}

/// Shape of a successful probe payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PayloadFormat {
    /// iperf3 `-J` JSON document.
    Structured,
    /// Human-readable iperf3 output.
    Text,
}

/// Raw result of one probe invocation, consumed by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Success {
        raw_payload: String,
        format: PayloadFormat,
    },
    Failure {
        kind: FailureKind,
    },
}

impl ProbeOutcome {
    /// Wrap raw probe stdout, detecting its format. Empty output is a parse
    /// failure.
    pub fn from_payload(raw: &str) -> Self {
        match raw.trim_start().chars().next() {
            None => ProbeOutcome::Failure {
                kind: FailureKind::OutputParseFailure,
            },
            Some('{') => ProbeOutcome::Success {
                raw_payload: raw.to_string(),
                format: PayloadFormat::Structured,
            },
            Some(_) => ProbeOutcome::Success {
                raw_payload: raw.to_string(),
                format: PayloadFormat::Text,
            },
        }
    }
}

/// Reject device addresses that could smuggle extra arguments or shell syntax
/// into a remote command line.
pub fn validate_target(target: &str) -> bool {
    !target.is_empty()
        && !target.starts_with('-')
        && target
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == ':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_format_detection() {
        assert_eq!(
            ProbeOutcome::from_payload("  \n{\"end\": {}}"),
            ProbeOutcome::Success {
                raw_payload: "  \n{\"end\": {}}".to_string(),
                format: PayloadFormat::Structured,
            }
        );
        assert!(matches!(
            ProbeOutcome::from_payload("Connecting to host 10.0.0.2, port 5201"),
            ProbeOutcome::Success {
                format: PayloadFormat::Text,
                ..
            }
        ));
        assert_eq!(
            ProbeOutcome::from_payload("   \r\n"),
            ProbeOutcome::Failure {
                kind: FailureKind::OutputParseFailure
            }
        );
    }

    #[test]
    fn target_validation() {
        assert!(validate_target("10.0.0.12"));
        assert!(validate_target("stage-left.local"));
        assert!(validate_target("fe80::1"));
        assert!(!validate_target(""));
        assert!(!validate_target("-R"));
        assert!(!validate_target("10.0.0.1 & del C:\\x"));
        assert!(!validate_target("host;reboot"));
    }

    #[test]
    fn udp_spec_carries_rate_and_length() {
        let spec = TestSpec::udp(5, 900, 1400);
        assert_eq!(spec.protocol, Protocol::Udp);
        assert_eq!(spec.target_bandwidth_mbps, Some(900));
        assert_eq!(spec.packet_length_bytes, Some(1400));
        assert!(!spec.reverse);
    }
}
