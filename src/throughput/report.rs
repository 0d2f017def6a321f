//! Throughput result formatting.

use super::metrics::ConnectionResult;
use super::FailureKind;

/// Human-readable bandwidth.
pub fn format_speed(mbps: f64) -> String {
    if mbps >= 1000.0 {
        format!("{:.2} Gbps", mbps / 1000.0)
    } else {
        format!("{:.1} Mbps", mbps)
    }
}

/// Format one measurement as a human-readable summary.
pub fn format_summary(result: &ConnectionResult) -> String {
    let m = &result.metrics;
    let mut summary = format!(
        "{} {}: {} ({:.1}% of {})",
        result.label(),
        result.protocol,
        format_speed(m.bandwidth_mbps),
        result.utilization_pct,
        format_speed(result.theoretical_max_mbps),
    );

    if let Some(jitter) = m.jitter_ms {
        summary.push_str(&format!(", jitter: {:.2}ms", jitter));
    }
    if let Some(loss) = m.packet_loss_pct {
        summary.push_str(&format!(", loss: {:.2}%", loss));
    }
    if let Some(retrans) = m.retransmits {
        summary.push_str(&format!(", retransmits: {}", retrans));
    }
    if let Some(rtt) = m.rtt_mean_ms {
        summary.push_str(&format!(", rtt: {:.2}ms", rtt));
    }

    summary
}

/// One compact row per connection: TCP bandwidth/utilization and
/// retransmits, UDP bandwidth/utilization with jitter and loss, then the
/// extended metrics of whichever result is available (TCP preferred).
pub fn format_connection_row(
    connection: &str,
    tcp: Option<&ConnectionResult>,
    udp: Option<&ConnectionResult>,
) -> String {
    let mut row = format!("  {:<28} ", connection);

    match tcp {
        Some(r) => {
            row.push_str(&format!(
                "T:{:4.0}M/{:3.0}%",
                r.metrics.bandwidth_mbps, r.utilization_pct
            ));
            if let Some(retrans) = r.metrics.retransmits.filter(|n| *n > 0) {
                row.push_str(&format!("(R{})", retrans));
            }
            row.push(' ');
        }
        None => row.push_str("T:----/---%     "),
    }

    match udp {
        Some(r) => {
            let jitter = r.metrics.jitter_ms.unwrap_or(0.0);
            let loss = r.metrics.packet_loss_pct.unwrap_or(0.0);
            row.push_str(&format!(
                "U:{:4.0}M/{:3.0}% J:{:4.2}ms ",
                r.metrics.bandwidth_mbps, r.utilization_pct, jitter
            ));
            if loss > 1.0 {
                row.push_str(&format!("L:{:.1}%", loss));
            } else {
                row.push_str(&format!("L:{:.2}%", loss));
            }
        }
        None => row.push_str("U:----/---% J:----ms L:---%"),
    }

    if let Some(m) = tcp.or(udp).map(|r| &r.metrics) {
        if let Some(rtt) = m.rtt_mean_ms {
            row.push_str(&format!(" RTT:{:.1}ms", rtt));
        }
        if let Some(local) = m.cpu_local_pct {
            row.push_str(&format!(
                " CPU:{:.0}%/{:.0}%",
                local,
                m.cpu_remote_pct.unwrap_or(0.0)
            ));
        }
        if let Some(cwnd) = m.congestion_window_kb {
            row.push_str(&format!(" CW:{:.0}KB", cwnd));
        }
        if let Some(mss) = m.mss {
            row.push_str(&format!(" MSS:{}", mss));
        }
    }

    row
}

/// Row for a directional test that produced no result.
pub fn format_failure(connection: &str, test: &str, kind: FailureKind) -> String {
    format!("  {:<28} {} failed: {}", connection, test, kind)
}
