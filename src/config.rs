//! TOML configuration for fleetperf.
//!
//! Every section is optional and falls back to compiled-in defaults. The file
//! is resolved from an explicit path, then the `FLEETPERF_CONFIG` environment
//! variable, then the standard system location.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Environment variable naming an alternate config file.
pub const CONFIG_ENV: &str = "FLEETPERF_CONFIG";

/// Standard system location for the config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/fleetperf/fleetperf.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration, passed by value into each component at construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetConfig {
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

impl FleetConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded fleetperf configuration");
        Ok(config)
    }

    /// Resolve configuration in order:
    /// 1. `explicit` (from `--config`); a failure here is an error.
    /// 2. The path in `FLEETPERF_CONFIG`.
    /// 3. `/etc/fleetperf/fleetperf.toml`.
    /// 4. Compiled-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "FLEETPERF_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }
}

// ---------------------------------------------------------------------------
// SSH
// ---------------------------------------------------------------------------

/// Remote command channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Username used when none is given on the command line.
    pub username: Option<String>,
    /// Ceiling for establishing a connection (seconds).
    pub connect_timeout_secs: u64,
    /// Remote port of the SSH daemon.
    pub port: u16,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            username: None,
            connect_timeout_secs: 10,
            port: 22,
        }
    }
}

impl SshConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

/// iperf3 invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Port the iperf3 server listens on.
    pub port: u16,
    /// Candidate iperf3 binary locations on the remote hosts, tried in order.
    pub binary_paths: Vec<String>,
    /// Added to the test duration to form the execution timeout.
    pub timeout_slack_secs: u64,
    /// Duration of each test in the plan (seconds).
    pub default_duration_secs: u32,
    /// Timeout for the cheap listener / binary discovery commands.
    pub check_timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            port: 5201,
            binary_paths: vec![
                r"C:\iperf3\iperf3.19.1_64\iperf3.exe".to_string(),
                r"C:\iperf3_new\iperf3.exe".to_string(),
                r"C:\iperf3_fresh\iperf3.19.1_64\iperf3.exe".to_string(),
                r"C:\iperf3_manual\iperf3.19.1_64\iperf3.exe".to_string(),
                r"C:\iperf3\iperf3.exe".to_string(),
            ],
            timeout_slack_secs: 10,
            default_duration_secs: 5,
            check_timeout_secs: 10,
        }
    }
}

impl ProbeConfig {
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Worker pool sizing for directional tests and audits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of units of work in flight. `1` runs everything
    /// sequentially.
    pub max_concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

/// Adapter audit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Ceiling for each adapter inspection query (seconds).
    pub query_timeout_secs: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            query_timeout_secs: 30,
        }
    }
}

impl AuditConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}
