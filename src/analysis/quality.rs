//! Qualitative tiers for measured metrics. Reporting only; never feeds back
//! into control flow.

use serde::Serialize;

use crate::throughput::metrics::{ConnectionResult, MetricSnapshot};

/// Link utilization tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UtilizationTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

/// Tier for jitter, loss, retransmits, RTT and CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Rating {
    Excellent,
    Acceptable,
    Concerning,
}

impl std::fmt::Display for UtilizationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UtilizationTier::Excellent => write!(f, "EXCELLENT"),
            UtilizationTier::Good => write!(f, "GOOD"),
            UtilizationTier::Fair => write!(f, "FAIR"),
            UtilizationTier::Poor => write!(f, "POOR"),
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rating::Excellent => write!(f, "ok"),
            Rating::Acceptable => write!(f, "fair"),
            Rating::Concerning => write!(f, "BAD"),
        }
    }
}

pub fn classify_utilization(pct: f64) -> UtilizationTier {
    match pct {
        p if p >= 90.0 => UtilizationTier::Excellent,
        p if p >= 70.0 => UtilizationTier::Good,
        p if p >= 50.0 => UtilizationTier::Fair,
        _ => UtilizationTier::Poor,
    }
}

pub fn classify_jitter(ms: f64) -> Rating {
    match ms {
        j if j < 1.0 => Rating::Excellent,
        j if j < 5.0 => Rating::Acceptable,
        _ => Rating::Concerning,
    }
}

pub fn classify_loss(pct: f64) -> Rating {
    match pct {
        l if l <= 0.01 => Rating::Excellent,
        l if l <= 1.0 => Rating::Acceptable,
        _ => Rating::Concerning,
    }
}

pub fn classify_retransmits(count: u64) -> Rating {
    match count {
        0..=9 => Rating::Excellent,
        10..=99 => Rating::Acceptable,
        _ => Rating::Concerning,
    }
}

pub fn classify_rtt(ms: f64) -> Rating {
    match ms {
        r if r < 1.0 => Rating::Excellent,
        r if r < 10.0 => Rating::Acceptable,
        _ => Rating::Concerning,
    }
}

pub fn classify_cpu(pct: f64) -> Rating {
    match pct {
        c if c < 50.0 => Rating::Excellent,
        c if c < 80.0 => Rating::Acceptable,
        _ => Rating::Concerning,
    }
}

/// Every applicable rating for one connection result. Metrics the payload did
/// not report have no rating.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityAssessment {
    pub utilization: UtilizationTier,
    pub jitter: Option<Rating>,
    pub packet_loss: Option<Rating>,
    pub retransmits: Option<Rating>,
    pub rtt: Option<Rating>,
    pub cpu: Option<Rating>,
}

impl QualityAssessment {
    /// Worst of the per-metric ratings, if any were reported.
    pub fn worst_rating(&self) -> Option<Rating> {
        [self.jitter, self.packet_loss, self.retransmits, self.rtt, self.cpu]
            .into_iter()
            .flatten()
            .max_by_key(|r| match r {
                Rating::Excellent => 0,
                Rating::Acceptable => 1,
                Rating::Concerning => 2,
            })
    }
}

pub fn assess_metrics(metrics: &MetricSnapshot, utilization_pct: f64) -> QualityAssessment {
    QualityAssessment {
        utilization: classify_utilization(utilization_pct),
        jitter: metrics.jitter_ms.map(classify_jitter),
        packet_loss: metrics.packet_loss_pct.map(classify_loss),
        retransmits: metrics.retransmits.map(classify_retransmits),
        rtt: metrics.rtt_mean_ms.map(classify_rtt),
        cpu: metrics.cpu_local_pct.map(classify_cpu),
    }
}

pub fn assess(result: &ConnectionResult) -> QualityAssessment {
    assess_metrics(&result.metrics, result.utilization_pct)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utilization_boundaries() {
        assert_eq!(classify_utilization(90.0), UtilizationTier::Excellent);
        assert_eq!(classify_utilization(89.9), UtilizationTier::Good);
        assert_eq!(classify_utilization(70.0), UtilizationTier::Good);
        assert_eq!(classify_utilization(50.0), UtilizationTier::Fair);
        assert_eq!(classify_utilization(49.9), UtilizationTier::Poor);
        assert_eq!(classify_utilization(0.0), UtilizationTier::Poor);
        assert_eq!(classify_utilization(140.0), UtilizationTier::Excellent);
    }

    #[test]
    fn jitter_boundaries() {
        assert_eq!(classify_jitter(0.99), Rating::Excellent);
        assert_eq!(classify_jitter(1.0), Rating::Acceptable);
        assert_eq!(classify_jitter(4.99), Rating::Acceptable);
        assert_eq!(classify_jitter(5.0), Rating::Concerning);
    }

    #[test]
    fn loss_boundaries() {
        assert_eq!(classify_loss(0.0), Rating::Excellent);
        assert_eq!(classify_loss(0.01), Rating::Excellent);
        assert_eq!(classify_loss(0.02), Rating::Acceptable);
        assert_eq!(classify_loss(1.0), Rating::Acceptable);
        assert_eq!(classify_loss(1.01), Rating::Concerning);
    }

    #[test]
    fn retransmit_boundaries() {
        assert_eq!(classify_retransmits(0), Rating::Excellent);
        assert_eq!(classify_retransmits(9), Rating::Excellent);
        assert_eq!(classify_retransmits(10), Rating::Acceptable);
        assert_eq!(classify_retransmits(99), Rating::Acceptable);
        assert_eq!(classify_retransmits(100), Rating::Concerning);
    }

    #[test]
    fn unreported_metrics_have_no_rating() {
        let snap = MetricSnapshot {
            bandwidth_mbps: 930.0,
            retransmits: Some(150),
            rtt_mean_ms: Some(0.4),
            ..MetricSnapshot::default()
        };
        let q = assess_metrics(&snap, 93.0);
        assert_eq!(q.utilization, UtilizationTier::Excellent);
        assert_eq!(q.jitter, None);
        assert_eq!(q.packet_loss, None);
        assert_eq!(q.retransmits, Some(Rating::Concerning));
        assert_eq!(q.rtt, Some(Rating::Excellent));
        assert_eq!(q.worst_rating(), Some(Rating::Concerning));

        let bare = assess_metrics(&MetricSnapshot::with_bandwidth(10.0), 1.0);
        assert_eq!(bare.worst_rating(), None);
    }
}
