//! Adapter configuration audit.
//!
//! Each device is inspected over the remote channel with the PowerShell
//! NetAdapter cmdlets. Settings known to hurt latency-sensitive traffic
//! (wireless enabled, power saving, energy-efficient ethernet) raise
//! warnings. Devices are audited independently; a failure on one device or
//! one query never aborts the rest.

pub mod adapter;
pub mod warnings;

pub use self::adapter::{AdapterRecord, JumboSetting, SettingStatus, WirelessStatus};
pub use self::warnings::WarningSet;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use self::adapter::{AdvancedProperty, NetAdapter, PowerManagement};
use crate::config::AuditConfig;
use crate::inventory::Device;
use crate::remote::{Credentials, RemoteChannel, Session};
use crate::throughput::FailureKind;

/// Fixed advice printed whenever any warning was raised.
pub const RECOMMENDATIONS: [&str; 5] = [
    "Disable all WiFi adapters on the production network",
    "Disable 'Allow the computer to turn off this device to save power'",
    "Disable Energy Efficient Ethernet (EEE/Green Ethernet)",
    "Disable Jumbo Frames unless every hop is configured for them",
    "Ensure all adapters negotiate 1 Gbps Full Duplex or higher",
];

const LIST_ADAPTERS: &str = "powershell -NoProfile -ExecutionPolicy Bypass -Command \"Get-NetAdapter | Select-Object Name, InterfaceDescription, Status, LinkSpeed, FullDuplex, MediaType, PhysicalMediaType | ConvertTo-Json\"";

/// PowerShell single-quoted literal.
fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn powershell(script: &str) -> String {
    format!(
        "powershell -NoProfile -ExecutionPolicy Bypass -Command \"{}\"",
        script
    )
}

pub fn power_query(adapter: &str) -> String {
    powershell(&format!(
        "Get-NetAdapterPowerManagement -Name {} | Select-Object AllowComputerToTurnOffDevice | ConvertTo-Json",
        ps_quote(adapter)
    ))
}

pub fn eee_query(adapter: &str) -> String {
    powershell(&format!(
        "Get-NetAdapterAdvancedProperty -Name {} | Where-Object {{$_.DisplayName -like '*Energy*' -or $_.DisplayName -like '*EEE*' -or $_.DisplayName -like '*Green*'}} | Select-Object DisplayName, DisplayValue | ConvertTo-Json",
        ps_quote(adapter)
    ))
}

pub fn jumbo_query(adapter: &str) -> String {
    powershell(&format!(
        "Get-NetAdapterAdvancedProperty -Name {} | Where-Object {{$_.DisplayName -like '*Jumbo*' -or $_.DisplayName -like '*MTU*'}} | Select-Object DisplayName, DisplayValue | ConvertTo-Json",
        ps_quote(adapter)
    ))
}

/// Audit result for one device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceAudit {
    pub device: String,
    pub address: String,
    pub reachable: bool,
    pub failure: Option<FailureKind>,
    pub adapters: Vec<AdapterRecord>,
    pub warnings: WarningSet,
}

impl DeviceAudit {
    fn new(device: &Device) -> Self {
        Self {
            device: device.name.clone(),
            address: device.address.clone(),
            reachable: true,
            failure: None,
            adapters: Vec::new(),
            warnings: WarningSet::new(),
        }
    }

    fn unreachable(device: &Device, kind: FailureKind) -> Self {
        Self {
            reachable: false,
            failure: Some(kind),
            ..Self::new(device)
        }
    }

    fn limited_access(&mut self) {
        self.failure = Some(FailureKind::InsufficientPrivilege);
        self.warnings.insert(adapter::LIMITED_ACCESS_WARNING);
        self.adapters.push(AdapterRecord::placeholder(&self.device));
    }
}

/// Fleet-wide audit summary.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub devices: Vec<DeviceAudit>,
    /// Every device warning, prefixed with the device name.
    pub warnings: WarningSet,
    pub recommendations: Vec<String>,
}

impl AuditReport {
    pub fn from_devices(devices: Vec<DeviceAudit>) -> Self {
        let mut warnings = WarningSet::new();
        for audit in &devices {
            warnings.extend(audit.warnings.iter().map(|w| format!("{}: {}", audit.device, w)));
        }
        let recommendations = if warnings.is_empty() {
            Vec::new()
        } else {
            RECOMMENDATIONS.iter().map(|r| r.to_string()).collect()
        };
        Self {
            devices,
            warnings,
            recommendations,
        }
    }

    pub fn unreachable(&self) -> impl Iterator<Item = &DeviceAudit> {
        self.devices.iter().filter(|d| !d.reachable)
    }
}

/// Why a settings query produced nothing usable.
enum QueryError {
    Privilege,
    Failed,
}

/// Runs adapter audits over the remote channel.
pub struct Auditor {
    channel: Arc<dyn RemoteChannel>,
    credentials: Credentials,
    config: AuditConfig,
    connect_timeout: Duration,
    max_concurrency: usize,
}

impl Auditor {
    pub fn new(
        channel: Arc<dyn RemoteChannel>,
        credentials: Credentials,
        config: AuditConfig,
        connect_timeout: Duration,
        max_concurrency: usize,
    ) -> Self {
        Self {
            channel,
            credentials,
            config,
            connect_timeout,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Audit every device, at most `max_concurrency` at a time. Results keep
    /// inventory order.
    pub async fn audit_all(self: Arc<Self>, devices: Arc<Vec<Device>>) -> AuditReport {
        info!(devices = devices.len(), "auditing network adapters");
        let pool = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for idx in 0..devices.len() {
            let auditor = self.clone();
            let devices = devices.clone();
            let pool = pool.clone();
            tasks.spawn(async move {
                let _permit = pool.acquire().await.ok();
                (idx, auditor.audit_device(&devices[idx]).await)
            });
        }

        let mut slots: Vec<Option<DeviceAudit>> = (0..devices.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, audit)) => slots[idx] = Some(audit),
                Err(e) => error!(error = %e, "audit task aborted"),
            }
        }

        let report = AuditReport::from_devices(slots.into_iter().flatten().collect());
        info!(
            devices = report.devices.len(),
            warnings = report.warnings.len(),
            "adapter audit finished"
        );
        report
    }

    /// Inspect the adapters of one device.
    pub async fn audit_device(&self, device: &Device) -> DeviceAudit {
        let session = match self
            .channel
            .connect(&device.address, &self.credentials, self.connect_timeout)
            .await
        {
            Ok(s) => s,
            Err(e) => {
                let kind = e.kind();
                warn!(device = %device.name, %kind, error = %e, "cannot audit device");
                return DeviceAudit::unreachable(device, kind);
            }
        };

        let mut audit = DeviceAudit::new(device);
        let timeout = self.config.query_timeout();

        let out = match session.execute(LIST_ADAPTERS, timeout).await {
            Ok(out) => out,
            Err(e) => {
                let kind = e.kind();
                warn!(device = %device.name, %kind, "adapter list query failed");
                audit.failure = Some(kind);
                return audit;
            }
        };

        if adapter::is_privilege_failure(&out) || out.stdout.trim().is_empty() {
            warn!(device = %device.name, kind = %FailureKind::InsufficientPrivilege, "limited access to adapter settings");
            audit.limited_access();
            return audit;
        }

        let adapters: Vec<NetAdapter> = match adapter::parse_rows(&out.stdout) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(device = %device.name, kind = %FailureKind::OutputParseFailure, error = %e, "unreadable adapter list");
                audit.failure = Some(FailureKind::OutputParseFailure);
                return audit;
            }
        };

        for nic in &adapters {
            if nic.is_wireless() {
                let record = AdapterRecord::wireless(&device.name, nic);
                if record.wireless_status == Some(WirelessStatus::Up) {
                    audit.warnings.insert(adapter::wifi_enabled_warning(nic.name()));
                }
                audit.adapters.push(record);
                continue;
            }
            if !nic.is_up() {
                debug!(device = %device.name, adapter = nic.name(), status = nic.status(), "skipping inactive adapter");
                continue;
            }

            let record = self.inspect_wired(session.as_ref(), device, nic, &mut audit.warnings).await;
            audit.adapters.push(record);
        }

        info!(
            device = %device.name,
            adapters = audit.adapters.len(),
            warnings = audit.warnings.len(),
            "device audited"
        );
        audit
    }

    async fn inspect_wired(
        &self,
        session: &dyn Session,
        device: &Device,
        nic: &NetAdapter,
        warnings: &mut WarningSet,
    ) -> AdapterRecord {
        let mut record = AdapterRecord::wired(&device.name, nic);
        let name = nic.name();

        match self.query::<PowerManagement>(session, device, &power_query(name)).await {
            Ok(rows) => {
                record.power_mgmt = adapter::classify_power(rows.first().and_then(|r| r.allow_turn_off.as_ref()));
                if record.power_mgmt == SettingStatus::Enabled {
                    warnings.insert(adapter::power_saving_warning(name));
                }
            }
            Err(QueryError::Privilege) => {
                warnings.insert(adapter::LIMITED_ACCESS_WARNING);
            }
            Err(QueryError::Failed) => {}
        }

        match self.query::<AdvancedProperty>(session, device, &eee_query(name)).await {
            Ok(rows) => {
                let (status, enabled) = adapter::classify_eee(&rows);
                record.eee_status = status;
                for (property, value) in enabled {
                    warnings.insert(adapter::eee_warning(name, &property, &value));
                }
            }
            Err(QueryError::Privilege) => {
                warnings.insert(adapter::LIMITED_ACCESS_WARNING);
            }
            Err(QueryError::Failed) => {}
        }

        match self.query::<AdvancedProperty>(session, device, &jumbo_query(name)).await {
            Ok(rows) => record.jumbo_frames = adapter::classify_jumbo(&rows),
            Err(QueryError::Privilege) => {
                warnings.insert(adapter::LIMITED_ACCESS_WARNING);
            }
            Err(QueryError::Failed) => {}
        }

        record
    }

    /// Run one settings query. Empty output is an empty row set.
    async fn query<T: DeserializeOwned>(
        &self,
        session: &dyn Session,
        device: &Device,
        command: &str,
    ) -> Result<Vec<T>, QueryError> {
        debug!(device = %device.name, %command, "adapter query");
        let out = session
            .execute(command, self.config.query_timeout())
            .await
            .map_err(|e| {
                let kind = e.kind();
                warn!(device = %device.name, %kind, "adapter settings query failed");
                QueryError::Failed
            })?;

        if adapter::is_privilege_failure(&out) {
            warn!(device = %device.name, kind = %FailureKind::InsufficientPrivilege, "adapter settings query denied");
            return Err(QueryError::Privilege);
        }

        adapter::parse_rows(&out.stdout).map_err(|e| {
            warn!(device = %device.name, kind = %FailureKind::OutputParseFailure, error = %e, "unreadable adapter settings");
            QueryError::Failed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_names_are_quoted_for_powershell() {
        assert_eq!(ps_quote("Ethernet 2"), "'Ethernet 2'");
        assert_eq!(ps_quote("Bob's NIC"), "'Bob''s NIC'");
        assert!(power_query("Ethernet").contains("Get-NetAdapterPowerManagement -Name 'Ethernet'"));
        assert!(eee_query("Ethernet").contains("-like '*Green*'"));
        assert!(jumbo_query("Ethernet").contains("-like '*Jumbo*'"));
    }

    #[test]
    fn fleet_warnings_are_prefixed_and_trigger_recommendations() {
        let mut a = DeviceAudit::new(&Device::new("foh", "10.0.0.1", None, ""));
        a.warnings.insert(adapter::power_saving_warning("Ethernet"));
        let mut b = DeviceAudit::new(&Device::new("stage", "10.0.0.2", None, ""));
        b.warnings.insert(adapter::power_saving_warning("Ethernet"));

        let report = AuditReport::from_devices(vec![a, b]);
        assert_eq!(report.warnings.len(), 2);
        assert!(report
            .warnings
            .contains("foh: Ethernet: Power saving enabled (can cause dropouts)"));
        assert_eq!(report.recommendations.len(), RECOMMENDATIONS.len());
    }

    #[test]
    fn clean_fleet_has_no_recommendations() {
        let a = DeviceAudit::new(&Device::new("foh", "10.0.0.1", None, ""));
        let report = AuditReport::from_devices(vec![a]);
        assert!(report.warnings.is_empty());
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn limited_access_adds_placeholder() {
        let mut a = DeviceAudit::new(&Device::new("foh", "10.0.0.1", None, ""));
        a.limited_access();
        assert_eq!(a.failure, Some(FailureKind::InsufficientPrivilege));
        assert_eq!(a.warnings.len(), 1);
        assert_eq!(a.adapters[0].power_mgmt, SettingStatus::Unknown);
        assert_eq!(a.adapters[0].jumbo_frames, JumboSetting::Unknown);
    }
}
