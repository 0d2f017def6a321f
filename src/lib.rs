//! fleetperf -- pairwise throughput testing and network adapter auditing for
//! a fleet of hosts.
//!
//! This crate provides the core library: device inventory, the remote command
//! channel, the iperf3 test engine and orchestrator, quality classification,
//! the adapter configuration audit and the fleet report.

pub mod analysis;
pub mod audit;
pub mod config;
pub mod inventory;
pub mod remote;
pub mod report;
pub mod scheduler;
pub mod throughput;

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::audit::Auditor;
use crate::config::FleetConfig;
use crate::inventory::Device;
use crate::remote::{Credentials, RemoteChannel};
use crate::report::FleetReport;
use crate::scheduler::{Orchestrator, OrchestratorError};
use crate::throughput::plan::PlanOptions;
use crate::throughput::probe::RemoteProbe;

/// Which pipelines a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Adapter audit, then bandwidth tests.
    Full,
    AuditOnly,
    BandwidthOnly,
}

impl RunMode {
    pub fn audits(self) -> bool {
        matches!(self, RunMode::Full | RunMode::AuditOnly)
    }

    pub fn measures(self) -> bool {
        matches!(self, RunMode::Full | RunMode::BandwidthOnly)
    }
}

/// Per-invocation options layered over [`FleetConfig`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: RunMode,
    pub plan: PlanOptions,
}

/// Execute one run against `devices` over `channel`.
///
/// Fewer than two devices is fatal for bandwidth runs and is checked before
/// any remote work starts. Every other failure is recorded in the report.
pub async fn run(
    devices: Vec<Device>,
    config: &FleetConfig,
    credentials: Credentials,
    channel: Arc<dyn RemoteChannel>,
    options: &RunOptions,
) -> Result<FleetReport> {
    if options.mode.measures() && devices.len() < 2 {
        return Err(OrchestratorError::TooFewDevices {
            found: devices.len(),
        }
        .into());
    }

    let devices = Arc::new(devices);
    let mut report = FleetReport::new(Utc::now());
    info!(run_id = %report.run_id, devices = devices.len(), mode = ?options.mode, "starting run");

    if options.mode.audits() {
        let auditor = Arc::new(Auditor::new(
            channel.clone(),
            credentials.clone(),
            config.audit.clone(),
            config.ssh.connect_timeout(),
            config.scheduler.max_concurrency,
        ));
        report.audit = Some(auditor.audit_all(devices.clone()).await);
    }

    if options.mode.measures() {
        let probe = Arc::new(RemoteProbe::new(
            channel,
            credentials,
            config.probe.clone(),
            config.ssh.connect_timeout(),
        ));
        let orchestrator = Orchestrator::new(
            devices,
            probe,
            options.plan.clone(),
            config.scheduler.max_concurrency,
        );
        report.bandwidth = Some(orchestrator.run().await?);
    }

    let report = report.finish();
    info!(run_id = %report.run_id, "run finished");
    Ok(report)
}
