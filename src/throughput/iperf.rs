//! iperf3 output parsing: `-J` JSON documents with a text fallback.

use serde::Deserialize;
use tracing::debug;

use super::metrics::MetricSnapshot;
use super::{FailureKind, PayloadFormat, Protocol};

/// Parsed iperf3 JSON result (subset of fields we care about).
///
/// Every field is optional: iperf3 omits sections depending on protocol,
/// version and platform, and a missing field must stay missing.
#[derive(Debug, Deserialize)]
pub struct Iperf3Result {
    #[serde(default)]
    pub start: Option<Iperf3Start>,
    #[serde(default)]
    pub end: Option<Iperf3End>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Iperf3Start {
    #[serde(default)]
    pub connected: Vec<Iperf3Connected>,
}

#[derive(Debug, Deserialize)]
pub struct Iperf3Connected {
    #[serde(default)]
    pub mss: Option<u32>,
    #[serde(default)]
    pub pmtu: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Iperf3End {
    /// UDP aggregate.
    #[serde(default)]
    pub sum: Option<Iperf3Sum>,
    #[serde(default)]
    pub sum_sent: Option<Iperf3Sum>,
    #[serde(default)]
    pub sum_received: Option<Iperf3Sum>,
    #[serde(default)]
    pub streams: Vec<Iperf3Stream>,
    #[serde(default)]
    pub cpu_utilization_percent: Option<Iperf3Cpu>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Iperf3Sum {
    #[serde(default)]
    pub bits_per_second: Option<f64>,
    #[serde(default)]
    pub retransmits: Option<u64>,
    #[serde(default)]
    pub jitter_ms: Option<f64>,
    #[serde(default)]
    pub lost_percent: Option<f64>,
    #[serde(default)]
    pub packets: Option<u64>,
    #[serde(default)]
    pub lost_packets: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Iperf3Stream {
    #[serde(default)]
    pub sender: Option<Iperf3StreamSender>,
}

/// Per-stream sender record. RTTs are in microseconds, cwnd in bytes.
#[derive(Debug, Deserialize)]
pub struct Iperf3StreamSender {
    #[serde(default)]
    pub mean_rtt: Option<f64>,
    #[serde(default)]
    pub min_rtt: Option<f64>,
    #[serde(default)]
    pub max_rtt: Option<f64>,
    #[serde(default)]
    pub max_snd_cwnd: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct Iperf3Cpu {
    #[serde(default)]
    pub host_total: Option<f64>,
    #[serde(default)]
    pub remote_total: Option<f64>,
}

/// Parse an iperf3 JSON output string into the raw document.
pub fn parse_output(json_str: &str) -> Result<Iperf3Result, FailureKind> {
    serde_json::from_str(json_str).map_err(|e| {
        debug!(error = %e, "iperf3 JSON did not deserialize");
        FailureKind::OutputParseFailure
    })
}

/// Parse a successful probe payload of either format into a snapshot.
pub fn parse(raw: &str, format: PayloadFormat, protocol: Protocol) -> Result<MetricSnapshot, FailureKind> {
    let snapshot = match format {
        PayloadFormat::Structured => normalize(&parse_output(raw)?, protocol)?,
        PayloadFormat::Text => parse_text(raw)?,
    };
    Ok(snapshot.normalized())
}

fn bits_to_mbps(bps: f64) -> f64 {
    bps / 1_000_000.0
}

/// Map a decoded iperf3 document onto a [`MetricSnapshot`].
pub fn normalize(doc: &Iperf3Result, protocol: Protocol) -> Result<MetricSnapshot, FailureKind> {
    let Some(end) = doc.end.as_ref() else {
        return Err(FailureKind::OutputParseFailure);
    };

    match protocol {
        Protocol::Udp => normalize_udp(end),
        Protocol::Tcp => normalize_tcp(doc, end),
    }
    .ok_or_else(|| {
        if let Some(err) = &doc.error {
            debug!(error = %err, "iperf3 reported an error instead of results");
        }
        FailureKind::OutputParseFailure
    })
}

fn normalize_udp(end: &Iperf3End) -> Option<MetricSnapshot> {
    let sum = end.sum.as_ref()?;
    Some(MetricSnapshot {
        bandwidth_mbps: bits_to_mbps(sum.bits_per_second?),
        jitter_ms: sum.jitter_ms,
        packet_loss_pct: sum.lost_percent,
        packets_sent: sum.packets,
        packets_lost: sum.lost_packets,
        ..MetricSnapshot::default()
    })
}

fn normalize_tcp(doc: &Iperf3Result, end: &Iperf3End) -> Option<MetricSnapshot> {
    // Receiver side is more accurate under loss.
    let bps = end
        .sum_received
        .as_ref()
        .and_then(|s| s.bits_per_second)
        .or_else(|| end.sum_sent.as_ref().and_then(|s| s.bits_per_second))?;

    let mut snap = MetricSnapshot {
        bandwidth_mbps: bits_to_mbps(bps),
        retransmits: end.sum_sent.as_ref().and_then(|s| s.retransmits),
        cpu_local_pct: end.cpu_utilization_percent.as_ref().and_then(|c| c.host_total),
        cpu_remote_pct: end.cpu_utilization_percent.as_ref().and_then(|c| c.remote_total),
        ..MetricSnapshot::default()
    };

    if let Some(sender) = end.streams.first().and_then(|s| s.sender.as_ref()) {
        snap.rtt_mean_ms = sender.mean_rtt.map(|us| us / 1000.0);
        snap.rtt_min_ms = sender.min_rtt.map(|us| us / 1000.0);
        snap.rtt_max_ms = sender.max_rtt.map(|us| us / 1000.0);
        snap.congestion_window_kb = sender.max_snd_cwnd.map(|bytes| bytes / 1024.0);
    }

    if let Some(conn) = doc.start.as_ref().and_then(|s| s.connected.first()) {
        snap.mss = conn.mss;
        snap.pmtu = conn.pmtu;
    }

    Some(snap)
}

/// Scan human-readable iperf3 output for a rate such as `938 Mbits/sec`.
///
/// Lines mentioning "sender" or "receiver" are skipped so the per-stream
/// summary block is not double counted. With `-P` the only aggregate line can
/// itself be a `[SUM] ... sender` line, in which case this falls back to the
/// last interval line (or fails if there is none). That exclusion is kept
/// as-is until iperf3's multi-stream text layout is pinned down.
pub fn parse_text(output: &str) -> Result<MetricSnapshot, FailureKind> {
    let mut bandwidth = None;

    for line in output.lines() {
        let lower = line.to_lowercase();
        if lower.contains("sender") || lower.contains("receiver") {
            continue;
        }
        if let Some(mbps) = rate_in_line(line) {
            bandwidth = Some(mbps);
        }
    }

    bandwidth
        .map(MetricSnapshot::with_bandwidth)
        .ok_or(FailureKind::OutputParseFailure)
}

/// First `<value> <unit>bits/sec` pair on a line, in Mbps.
fn rate_in_line(line: &str) -> Option<f64> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    for (i, tok) in tokens.iter().enumerate() {
        if !tok.contains("bits/sec") || i == 0 {
            continue;
        }
        let Ok(value) = tokens[i - 1].parse::<f64>() else {
            continue;
        };
        let mbps = if tok.starts_with("Gbits") {
            value * 1000.0
        } else if tok.starts_with("Mbits") {
            value
        } else if tok.starts_with("Kbits") {
            value / 1000.0
        } else {
            value / 1_000_000.0
        };
        return Some(mbps);
    }
    None
}
