//! Bandwidth test engine.
//!
//! Every unordered device pair gets its own task; within a pair the plan runs
//! in order, forward then reverse for each entry. Each directional test locks
//! both of its devices and takes a slot from the bounded worker pool, so
//! disjoint pairs run in parallel while a device never serves two tests at
//! once.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::locks::DeviceLocks;
use super::{enumerate_pairs, BandwidthReport, DirectionalOutcome, OrchestratorError, PairReport, PhaseTrace, TestPhase};
use crate::inventory::Device;
use crate::throughput::metrics::{theoretical_max_mbps, ConnectionResult};
use crate::throughput::plan::{self, PlanOptions, PlannedTest};
use crate::throughput::probe::ProbeAdapter;
use crate::throughput::{iperf, FailureKind, ProbeOutcome};

/// Runs the test plan across every device pair.
pub struct Orchestrator {
    devices: Arc<Vec<Device>>,
    probe: Arc<dyn ProbeAdapter>,
    plan: PlanOptions,
    max_concurrency: usize,
}

struct Shared {
    devices: Arc<Vec<Device>>,
    probe: Arc<dyn ProbeAdapter>,
    locks: DeviceLocks,
    pool: Semaphore,
}

impl Orchestrator {
    pub fn new(
        devices: Arc<Vec<Device>>,
        probe: Arc<dyn ProbeAdapter>,
        plan: PlanOptions,
        max_concurrency: usize,
    ) -> Self {
        Self {
            devices,
            probe,
            plan,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Run all pairs. Fails only when there are fewer than two devices;
    /// individual test failures are recorded in the report.
    pub async fn run(&self) -> Result<BandwidthReport, OrchestratorError> {
        let n = self.devices.len();
        if n < 2 {
            return Err(OrchestratorError::TooFewDevices { found: n });
        }

        let pairs = enumerate_pairs(n);
        info!(
            devices = n,
            pairs = pairs.len(),
            concurrency = self.max_concurrency,
            "starting bandwidth tests"
        );

        let shared = Arc::new(Shared {
            devices: self.devices.clone(),
            probe: self.probe.clone(),
            locks: DeviceLocks::new(n),
            pool: Semaphore::new(self.max_concurrency),
        });

        let mut tasks = JoinSet::new();
        for (pair_idx, (a, b)) in pairs.iter().copied().enumerate() {
            let shared = shared.clone();
            let opts = self.plan.clone();
            tasks.spawn(async move { (pair_idx, run_pair(&shared, a, b, &opts).await) });
        }

        let mut slots: Vec<Option<PairReport>> = (0..pairs.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, report)) => slots[idx] = Some(report),
                Err(e) => error!(error = %e, "pair task aborted"),
            }
        }

        let report = BandwidthReport {
            pairs: slots.into_iter().flatten().collect(),
        };
        info!(
            attempted = report.attempted(),
            completed = report.completed(),
            failed = report.failed(),
            "bandwidth tests finished"
        );
        Ok(report)
    }
}

async fn run_pair(shared: &Shared, a: usize, b: usize, opts: &PlanOptions) -> PairReport {
    let (dev_a, dev_b) = (&shared.devices[a], &shared.devices[b]);
    let max_mbps = theoretical_max_mbps(dev_a, dev_b);
    let plan = plan::generate(max_mbps, opts);
    info!(a = %dev_a.name, b = %dev_b.name, theoretical_max_mbps = max_mbps, "testing pair");

    let mut outcomes = Vec::with_capacity(plan::directional_attempts(&plan));
    for test in &plan {
        outcomes.push(run_directional(shared, a, b, test).await);
        // The reverse direction runs whatever happened going forward.
        if test.bidirectional {
            outcomes.push(run_directional(shared, b, a, test).await);
        }
    }

    PairReport {
        device_a: dev_a.name.clone(),
        device_b: dev_b.name.clone(),
        theoretical_max_mbps: max_mbps,
        outcomes,
    }
}

async fn run_directional(
    shared: &Shared,
    client_idx: usize,
    server_idx: usize,
    test: &PlannedTest,
) -> DirectionalOutcome {
    let client = &shared.devices[client_idx];
    let server = &shared.devices[server_idx];
    let protocol = test.spec.protocol;

    let _guard = shared.locks.lock_pair(client_idx, server_idx).await;
    // The pool is never closed, so this only fails if it already has been;
    // then the test simply runs unbounded.
    let _permit = shared.pool.acquire().await.ok();

    let mut trace = PhaseTrace::new();
    let mut result = None;

    if shared.probe.verify_listening(server).await {
        trace.advance(TestPhase::ServerVerified);
        trace.advance(TestPhase::Running);

        let parsed = match shared.probe.run_test(client, server, &test.spec).await {
            ProbeOutcome::Success { raw_payload, format } => iperf::parse(&raw_payload, format, protocol),
            ProbeOutcome::Failure { kind } => Err(kind),
        };

        match parsed {
            Ok(metrics) => {
                info!(
                    client = %client.name,
                    server = %server.name,
                    test = test.name,
                    mbps = metrics.bandwidth_mbps,
                    "directional test complete"
                );
                trace.advance(TestPhase::Completed);
                result = Some(ConnectionResult::new(client, server, protocol, metrics));
            }
            Err(kind) => {
                warn!(client = %client.name, server = %server.name, test = test.name, %kind, "directional test failed");
                trace.advance(TestPhase::Failed(kind));
            }
        }
    } else {
        let kind = FailureKind::ServerNotListening;
        warn!(client = %client.name, server = %server.name, test = test.name, %kind, "skipping directional test");
        trace.advance(TestPhase::Failed(kind));
    }

    DirectionalOutcome {
        test: test.name,
        protocol,
        client: client.name.clone(),
        server: server.name.clone(),
        trace,
        result,
    }
}
