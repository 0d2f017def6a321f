//! Canonical test plan for a device pair.

use serde::Serialize;

use super::{Protocol, TestSpec};

/// Default duration of every planned test. Long enough for TCP window
/// ramp-up and UDP loss sampling while keeping O(n²) pair runs bounded.
pub const DEFAULT_DURATION_SECS: u32 = 5;

/// UDP stress load as a fraction of the pair's theoretical maximum.
pub const UDP_TARGET_FRACTION: f64 = 0.9;

/// UDP datagram size, below a standard 1500 byte MTU.
pub const UDP_PACKET_LENGTH: u32 = 1400;

/// Caller-tunable knobs applied on top of the canonical plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanOptions {
    pub duration_s: u32,
    /// Parallel TCP streams (`-P`); `None` leaves iperf3's default of one.
    pub parallel_streams: Option<u32>,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            duration_s: DEFAULT_DURATION_SECS,
            parallel_streams: None,
        }
    }
}

/// One entry of a plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedTest {
    pub name: &'static str,
    pub spec: TestSpec,
    /// Run again with client and server swapped.
    pub bidirectional: bool,
}

/// Build the ordered plan for a pair whose slower link is
/// `theoretical_max_mbps`: TCP bandwidth, then UDP jitter/loss at 90 % load.
pub fn generate(theoretical_max_mbps: f64, opts: &PlanOptions) -> Vec<PlannedTest> {
    let duration = opts.duration_s.max(1);

    let mut tcp = TestSpec::tcp(duration);
    tcp.parallel_streams = opts.parallel_streams.filter(|&n| n > 1);

    vec![
        PlannedTest {
            name: "TCP Bandwidth",
            spec: tcp,
            bidirectional: true,
        },
        PlannedTest {
            name: "UDP Jitter/Loss",
            spec: TestSpec::udp(duration, udp_target_mbps(theoretical_max_mbps), UDP_PACKET_LENGTH),
            bidirectional: true,
        },
    ]
}

/// 90 % of the theoretical maximum, truncated to whole Mbps and never below 1.
pub fn udp_target_mbps(theoretical_max_mbps: f64) -> u64 {
    let target = (theoretical_max_mbps.max(0.0) * UDP_TARGET_FRACTION).floor();
    // Clamped above, so the cast cannot wrap.
    (target as u64).max(1)
}

/// Count of directional attempts a plan produces for one pair.
pub fn directional_attempts(plan: &[PlannedTest]) -> usize {
    plan.iter().map(|t| if t.bidirectional { 2 } else { 1 }).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_plan_shape() {
        let plan = generate(1000.0, &PlanOptions::default());
        assert_eq!(plan.len(), 2);

        let tcp = &plan[0];
        assert_eq!(tcp.spec.protocol, Protocol::Tcp);
        assert_eq!(tcp.spec.duration_s, 5);
        assert!(tcp.bidirectional);
        assert_eq!(tcp.spec.parallel_streams, None);

        let udp = &plan[1];
        assert_eq!(udp.spec.protocol, Protocol::Udp);
        assert_eq!(udp.spec.duration_s, 5);
        assert_eq!(udp.spec.target_bandwidth_mbps, Some(900));
        assert_eq!(udp.spec.packet_length_bytes, Some(1400));
        assert!(udp.bidirectional);

        assert_eq!(directional_attempts(&plan), 4);
    }

    #[test]
    fn udp_target_truncates() {
        assert_eq!(udp_target_mbps(10_000.0), 9_000);
        assert_eq!(udp_target_mbps(2_500.0), 2_250);
        assert_eq!(udp_target_mbps(100.0), 90);
        assert_eq!(udp_target_mbps(1.0), 1);
        assert_eq!(udp_target_mbps(0.0), 1);
    }

    #[test]
    fn options_override_duration_and_streams() {
        let opts = PlanOptions {
            duration_s: 10,
            parallel_streams: Some(4),
        };
        let plan = generate(1000.0, &opts);
        assert_eq!(plan[0].spec.duration_s, 10);
        assert_eq!(plan[0].spec.parallel_streams, Some(4));
        assert_eq!(plan[1].spec.duration_s, 10);
        assert_eq!(plan[1].spec.parallel_streams, None);
    }
}
