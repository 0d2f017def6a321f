//! Device inventory: the static list of measurable hosts.
//!
//! The inventory file is JSON of the form
//! `{"devices": [{"name": "...", "ip": "...", "type": "computer", "link_speed": "10Gbps", "location": "..."}]}`.
//! Only records of type `computer` are measurable endpoints; switches and
//! other device types are ignored.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Rated link capacity assumed when the inventory omits it or it cannot be parsed.
pub const DEFAULT_LINK_MBPS: f64 = 1000.0;

/// Device type flagging a measurable endpoint.
const MEASURABLE_TYPE: &str = "computer";

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("inventory has no \"devices\" list")]
    MissingDevices,

    #[error("device #{index} has no {field}")]
    EmptyField { index: usize, field: &'static str },
}

/// A measurable host. Immutable after load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub name: String,
    pub address: String,
    pub rated_link_mbps: f64,
    pub location: String,
}

impl Device {
    pub fn new(name: &str, address: &str, link_speed: Option<&str>, location: &str) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
            rated_link_mbps: link_speed.map_or(DEFAULT_LINK_MBPS, parse_link_speed),
            location: location.to_string(),
        }
    }
}

/// Raw inventory document as it appears on disk.
#[derive(Debug, Deserialize)]
struct InventoryFile {
    devices: Option<Vec<DeviceRecord>>,
}

#[derive(Debug, Deserialize)]
struct DeviceRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    ip: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    link_speed: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

/// Parse a unit-tagged link speed ("10Gbps", "2.5Gbps", "100Mbps") into Mbps.
///
/// Anything unrecognized falls back to [`DEFAULT_LINK_MBPS`].
pub fn parse_link_speed(raw: &str) -> f64 {
    let s = raw.trim();
    let parsed = if let Some(num) = s.strip_suffix("Gbps") {
        num.trim().parse::<f64>().ok().map(|g| g * 1000.0)
    } else if let Some(num) = s.strip_suffix("Mbps") {
        num.trim().parse::<f64>().ok()
    } else {
        None
    };

    match parsed {
        Some(mbps) if mbps.is_finite() && mbps >= 0.0 => mbps,
        _ => {
            debug!(link_speed = %raw, "unrecognized link speed, assuming 1 Gbps");
            DEFAULT_LINK_MBPS
        }
    }
}

/// Parse inventory JSON and keep only measurable endpoints, in file order.
pub fn parse_inventory(json: &str) -> Result<Vec<Device>> {
    let file: InventoryFile = serde_json::from_str(json).context("inventory is not valid JSON")?;
    let records = file.devices.ok_or(InventoryError::MissingDevices)?;

    let mut devices = Vec::new();
    for (index, rec) in records.into_iter().enumerate() {
        if rec.kind != MEASURABLE_TYPE {
            continue;
        }
        let name = required(rec.name.as_deref(), index, "name")?;
        let ip = required(rec.ip.as_deref(), index, "ip")?;
        devices.push(Device::new(
            name,
            ip,
            rec.link_speed.as_deref(),
            rec.location.as_deref().unwrap_or("Unknown"),
        ));
    }
    Ok(devices)
}

fn required<'a>(value: Option<&'a str>, index: usize, field: &'static str) -> Result<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(InventoryError::EmptyField { index, field }.into()),
    }
}

/// Load the inventory file at `path`.
pub fn load(path: &Path) -> Result<Vec<Device>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read inventory: {}", path.display()))?;
    let devices = parse_inventory(&content)
        .with_context(|| format!("failed to parse inventory: {}", path.display()))?;
    info!(path = %path.display(), count = devices.len(), "loaded device inventory");
    Ok(devices)
}
