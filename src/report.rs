//! Fleet report: the typed result of one run plus its plain-text rendering.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::analysis::quality::Rating;
use crate::audit::{AdapterRecord, AuditReport, DeviceAudit, JumboSetting, SettingStatus, WirelessStatus};
use crate::scheduler::BandwidthReport;
use crate::throughput::report::{format_connection_row, format_failure, format_speed, format_summary};

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct FleetReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub audit: Option<AuditReport>,
    pub bandwidth: Option<BandwidthReport>,
}

impl FleetReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: started_at,
            audit: None,
            bandwidth: None,
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }
}

/// Render the whole report as text.
pub fn render(report: &FleetReport) -> String {
    let mut out = format!(
        "Fleet network report {} ({})\n",
        report.run_id,
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(audit) = &report.audit {
        out.push('\n');
        out.push_str(&render_audit(audit));
    }
    if let Some(bw) = &report.bandwidth {
        out.push('\n');
        out.push_str(&render_bandwidth(bw));
    }
    let elapsed = report.finished_at - report.started_at;
    out.push_str(&format!("\nCompleted in {}s\n", elapsed.num_seconds()));
    out
}

pub fn render_bandwidth(report: &BandwidthReport) -> String {
    let mut out = String::from("=== Bandwidth Tests ===\n");
    out.push_str("Legend: T=TCP U=UDP | BW/% | J=Jitter L=Loss R=Retrans | RTT=Latency CPU=Local/Remote CW=CongestionWindow MSS=MaxSegSize\n");

    for pair in &report.pairs {
        out.push_str(&format!(
            "\n{} <-> {} (max {})\n",
            pair.device_a,
            pair.device_b,
            format_speed(pair.theoretical_max_mbps)
        ));
        for conn in pair.connections() {
            out.push_str(&format_connection_row(
                &conn.connection,
                conn.tcp.as_ref(),
                conn.udp.as_ref(),
            ));
            out.push('\n');
            for (result, quality) in [(&conn.tcp, &conn.tcp_quality), (&conn.udp, &conn.udp_quality)] {
                if let (Some(r), Some(q)) = (result, quality) {
                    if q.worst_rating() == Some(Rating::Concerning) {
                        out.push_str(&format!("    ! {}\n", format_summary(r)));
                    }
                }
            }
            for (test, kind) in &conn.failures {
                out.push_str(&format_failure(&conn.connection, test, *kind));
                out.push('\n');
            }
        }
    }

    out.push_str(&format!(
        "\n{} directional tests: {} completed, {} failed\n",
        report.attempted(),
        report.completed(),
        report.failed()
    ));
    out
}

fn setting_label(status: SettingStatus) -> &'static str {
    match status {
        SettingStatus::Enabled => "Enabled",
        SettingStatus::Disabled | SettingStatus::NotSupported => "Disabled",
        SettingStatus::Unknown => "Unknown",
        SettingStatus::NotApplicable => "-",
    }
}

fn jumbo_label(jumbo: &JumboSetting) -> String {
    match jumbo {
        JumboSetting::Value(_) if !jumbo.is_enabled() => "Disabled".to_string(),
        JumboSetting::Value(v) => v.chars().take(9).collect(),
        JumboSetting::Unknown | JumboSetting::NotApplicable => "-".to_string(),
    }
}

fn adapter_status(audit: &DeviceAudit, record: &AdapterRecord) -> &'static str {
    match record.wireless_status {
        Some(WirelessStatus::Up) => "WiFi ENABLED!",
        Some(_) => "WiFi disabled",
        None if audit.warnings.is_empty() => "OK",
        None => "! Check settings",
    }
}

/// One table row per adapter.
pub fn format_adapter_row(audit: &DeviceAudit, record: &AdapterRecord) -> String {
    format!(
        "{:<20} {:<25} {:<15} {:<12} {:<12} {:<10} {}",
        audit.device,
        record.adapter_name.chars().take(24).collect::<String>(),
        record.reported_link,
        setting_label(record.power_mgmt),
        setting_label(record.eee_status),
        jumbo_label(&record.jumbo_frames),
        adapter_status(audit, record)
    )
}

pub fn render_audit(report: &AuditReport) -> String {
    let mut out = String::from("=== Network Adapter Configuration ===\n");
    out.push_str(&format!(
        "{:<20} {:<25} {:<15} {:<12} {:<12} {:<10} Status\n",
        "Computer", "Adapter", "Link", "Power Mgmt", "EEE/Green", "Jumbo"
    ));

    for audit in &report.devices {
        if !audit.reachable {
            let reason = audit
                .failure
                .map(|k| k.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            out.push_str(&format!("{:<20} Connection failed ({})\n", audit.device, reason));
            continue;
        }
        if audit.adapters.is_empty() {
            out.push_str(&format!("{:<20} No active adapters found\n", audit.device));
        }
        for record in &audit.adapters {
            out.push_str(&format_adapter_row(audit, record));
            out.push('\n');
        }
    }

    out.push_str("\n=== Configuration Summary ===\n");
    if report.warnings.is_empty() {
        out.push_str("[OK] All network adapters are optimally configured\n");
        return out;
    }
    out.push_str("[!] Issues found:\n");
    for warning in &report.warnings {
        out.push_str(&format!("  - {}\n", warning));
    }
    out.push_str("\nRecommendations:\n");
    for (i, rec) in report.recommendations.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", i + 1, rec));
    }
    out
}
