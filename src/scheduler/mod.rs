//! Test orchestration: pair enumeration, directional test state machine and
//! per-connection aggregation.

pub mod engine;
pub mod locks;

pub use self::engine::Orchestrator;

use serde::Serialize;
use thiserror::Error;

use crate::analysis::quality::{self, QualityAssessment};
use crate::throughput::metrics::ConnectionResult;
use crate::throughput::{FailureKind, Protocol};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("need at least 2 measurable devices, found {found}")]
    TooFewDevices { found: usize },
}

/// Every unordered pair `(i, j)` with `i < j`, in inventory order.
pub fn enumerate_pairs(n: usize) -> Vec<(usize, usize)> {
    (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .collect()
}

/// Lifecycle of one directional test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TestPhase {
    PendingServerCheck,
    ServerVerified,
    Running,
    Completed,
    Failed(FailureKind),
}

impl TestPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, TestPhase::Completed | TestPhase::Failed(_))
    }

    fn can_advance_to(self, next: TestPhase) -> bool {
        matches!(
            (self, next),
            (TestPhase::PendingServerCheck, TestPhase::ServerVerified)
                | (TestPhase::PendingServerCheck, TestPhase::Failed(FailureKind::ServerNotListening))
                | (TestPhase::ServerVerified, TestPhase::Running)
                | (TestPhase::Running, TestPhase::Completed)
                | (TestPhase::Running, TestPhase::Failed(_))
        )
    }
}

/// Transition log of one directional test.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseTrace {
    phases: Vec<TestPhase>,
}

impl PhaseTrace {
    pub fn new() -> Self {
        Self {
            phases: vec![TestPhase::PendingServerCheck],
        }
    }

    pub fn current(&self) -> TestPhase {
        // Never empty: constructed with the initial phase.
        self.phases.last().copied().unwrap_or(TestPhase::PendingServerCheck)
    }

    /// Record a transition. Illegal transitions are ignored.
    pub fn advance(&mut self, next: TestPhase) -> bool {
        let ok = self.current().can_advance_to(next);
        debug_assert!(ok, "illegal transition {:?} -> {:?}", self.current(), next);
        if ok {
            self.phases.push(next);
        }
        ok
    }

    pub fn phases(&self) -> &[TestPhase] {
        &self.phases
    }

    pub fn entered(&self, phase: TestPhase) -> bool {
        self.phases.contains(&phase)
    }
}

impl Default for PhaseTrace {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal record of one directional test.
#[derive(Debug, Clone, Serialize)]
pub struct DirectionalOutcome {
    pub test: &'static str,
    pub protocol: Protocol,
    pub client: String,
    pub server: String,
    pub trace: PhaseTrace,
    pub result: Option<ConnectionResult>,
}

impl DirectionalOutcome {
    pub fn phase(&self) -> TestPhase {
        self.trace.current()
    }

    pub fn failure(&self) -> Option<FailureKind> {
        match self.phase() {
            TestPhase::Failed(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn label(&self) -> String {
        format!("{} -> {}", self.client, self.server)
    }
}

/// All results for one direction of a pair, with their ratings.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSummary {
    pub connection: String,
    pub tcp: Option<ConnectionResult>,
    pub tcp_quality: Option<QualityAssessment>,
    pub udp: Option<ConnectionResult>,
    pub udp_quality: Option<QualityAssessment>,
    pub failures: Vec<(String, FailureKind)>,
}

/// Everything measured for one unordered pair.
#[derive(Debug, Clone, Serialize)]
pub struct PairReport {
    pub device_a: String,
    pub device_b: String,
    pub theoretical_max_mbps: f64,
    pub outcomes: Vec<DirectionalOutcome>,
}

impl PairReport {
    /// Group outcomes by direction ("A -> B" first, then "B -> A").
    pub fn connections(&self) -> Vec<ConnectionSummary> {
        let mut summaries: Vec<ConnectionSummary> = Vec::new();

        for outcome in &self.outcomes {
            let label = outcome.label();
            let idx = match summaries.iter().position(|s| s.connection == label) {
                Some(i) => i,
                None => {
                    summaries.push(ConnectionSummary {
                        connection: label,
                        tcp: None,
                        tcp_quality: None,
                        udp: None,
                        udp_quality: None,
                        failures: Vec::new(),
                    });
                    summaries.len() - 1
                }
            };
            let summary = &mut summaries[idx];

            if let Some(kind) = outcome.failure() {
                summary.failures.push((outcome.test.to_string(), kind));
            }
            if let Some(result) = &outcome.result {
                let q = quality::assess(result);
                match result.protocol {
                    Protocol::Tcp => {
                        summary.tcp = Some(result.clone());
                        summary.tcp_quality = Some(q);
                    }
                    Protocol::Udp => {
                        summary.udp = Some(result.clone());
                        summary.udp_quality = Some(q);
                    }
                }
            }
        }

        summaries
    }
}

/// Result of a full bandwidth run.
#[derive(Debug, Clone, Serialize)]
pub struct BandwidthReport {
    pub pairs: Vec<PairReport>,
}

impl BandwidthReport {
    pub fn outcomes(&self) -> impl Iterator<Item = &DirectionalOutcome> {
        self.pairs.iter().flat_map(|p| p.outcomes.iter())
    }

    pub fn attempted(&self) -> usize {
        self.outcomes().count()
    }

    pub fn completed(&self) -> usize {
        self.outcomes()
            .filter(|o| o.phase() == TestPhase::Completed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.completed()
    }
}
