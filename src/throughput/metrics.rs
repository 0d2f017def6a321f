//! Normalized measurement model.

use serde::Serialize;

use super::Protocol;
use crate::inventory::Device;

/// Outcome of one test, normalized across payload formats.
///
/// Only `bandwidth_mbps` is always present. Everything else is `None` when the
/// payload did not report it; zero is a real measurement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricSnapshot {
    pub bandwidth_mbps: f64,
    pub jitter_ms: Option<f64>,
    pub packet_loss_pct: Option<f64>,
    pub retransmits: Option<u64>,
    pub rtt_mean_ms: Option<f64>,
    pub rtt_min_ms: Option<f64>,
    pub rtt_max_ms: Option<f64>,
    pub congestion_window_kb: Option<f64>,
    pub mss: Option<u32>,
    pub pmtu: Option<u32>,
    pub cpu_local_pct: Option<f64>,
    pub cpu_remote_pct: Option<f64>,
    pub packets_sent: Option<u64>,
    pub packets_lost: Option<u64>,
}

impl MetricSnapshot {
    pub fn with_bandwidth(bandwidth_mbps: f64) -> Self {
        Self {
            bandwidth_mbps,
            ..Self::default()
        }
        .normalized()
    }

    /// Enforce `bandwidth >= 0` and `0 <= loss <= 100`.
    pub fn normalized(mut self) -> Self {
        if !self.bandwidth_mbps.is_finite() || self.bandwidth_mbps < 0.0 {
            self.bandwidth_mbps = 0.0;
        }
        self.packet_loss_pct = self
            .packet_loss_pct
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(0.0, 100.0));
        self
    }
}

/// Lesser of the two endpoints' rated link capacities.
pub fn theoretical_max_mbps(a: &Device, b: &Device) -> f64 {
    a.rated_link_mbps.min(b.rated_link_mbps)
}

/// Measured bandwidth as a percentage of `theoretical_max_mbps`; 0 when the
/// maximum is not positive.
pub fn utilization_pct(bandwidth_mbps: f64, theoretical_max_mbps: f64) -> f64 {
    if theoretical_max_mbps > 0.0 {
        bandwidth_mbps / theoretical_max_mbps * 100.0
    } else {
        0.0
    }
}

/// One successful directional measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionResult {
    pub from_device: String,
    pub to_device: String,
    pub protocol: Protocol,
    pub metrics: MetricSnapshot,
    pub theoretical_max_mbps: f64,
    pub utilization_pct: f64,
}

impl ConnectionResult {
    pub fn new(from: &Device, to: &Device, protocol: Protocol, metrics: MetricSnapshot) -> Self {
        let theoretical_max_mbps = theoretical_max_mbps(from, to);
        Self {
            from_device: from.name.clone(),
            to_device: to.name.clone(),
            protocol,
            utilization_pct: utilization_pct(metrics.bandwidth_mbps, theoretical_max_mbps),
            metrics,
            theoretical_max_mbps,
        }
    }

    /// "A -> B" label used to group results per connection.
    pub fn label(&self) -> String {
        format!("{} -> {}", self.from_device, self.to_device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, mbps: f64) -> Device {
        Device {
            name: name.to_string(),
            address: "10.0.0.1".to_string(),
            rated_link_mbps: mbps,
            location: "Rack".to_string(),
        }
    }

    #[test]
    fn theoretical_max_is_symmetric_min() {
        let fast = device("a", 10_000.0);
        let slow = device("b", 1_000.0);
        assert_eq!(theoretical_max_mbps(&fast, &slow), 1_000.0);
        assert_eq!(theoretical_max_mbps(&slow, &fast), 1_000.0);
    }

    #[test]
    fn utilization_is_monotonic_and_zero_safe() {
        let mut last = -1.0;
        for bw in [0.0, 10.0, 500.0, 899.9, 900.0, 1200.0] {
            let u = utilization_pct(bw, 1000.0);
            assert!(u > last);
            last = u;
        }
        assert_eq!(utilization_pct(938.0, 0.0), 0.0);
        assert_eq!(utilization_pct(938.0, -5.0), 0.0);
        assert!(!utilization_pct(0.0, 0.0).is_nan());
    }

    #[test]
    fn normalization_clamps_ranges() {
        let snap = MetricSnapshot {
            bandwidth_mbps: -3.0,
            packet_loss_pct: Some(140.0),
            ..MetricSnapshot::default()
        }
        .normalized();
        assert_eq!(snap.bandwidth_mbps, 0.0);
        assert_eq!(snap.packet_loss_pct, Some(100.0));

        let snap = MetricSnapshot {
            bandwidth_mbps: 10.0,
            packet_loss_pct: Some(0.0),
            ..MetricSnapshot::default()
        }
        .normalized();
        assert_eq!(snap.packet_loss_pct, Some(0.0));
    }

    #[test]
    fn connection_result_uses_pair_minimum() {
        let a = device("stage", 10_000.0);
        let b = device("foh", 1_000.0);
        let res = ConnectionResult::new(&a, &b, Protocol::Tcp, MetricSnapshot::with_bandwidth(900.0));
        assert_eq!(res.theoretical_max_mbps, 1_000.0);
        assert!((res.utilization_pct - 90.0).abs() < 1e-9);
        assert_eq!(res.label(), "stage -> foh");
    }
}
