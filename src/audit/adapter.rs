//! Network adapter records and the rules that classify their settings.
//!
//! Inputs are the JSON documents produced by the PowerShell `Get-NetAdapter`,
//! `Get-NetAdapterPowerManagement` and `Get-NetAdapterAdvancedProperty`
//! cmdlets piped through `ConvertTo-Json`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::remote::CommandOutput;

/// State of an on/off adapter setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SettingStatus {
    Enabled,
    Disabled,
    NotSupported,
    Unknown,
    NotApplicable,
}

/// Jumbo frame setting as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum JumboSetting {
    Value(String),
    Unknown,
    NotApplicable,
}

impl JumboSetting {
    /// A reported value other than "Disabled".
    pub fn is_enabled(&self) -> bool {
        matches!(self, JumboSetting::Value(v) if !v.to_lowercase().contains("disabled"))
    }
}

/// Administrative state of a wireless adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WirelessStatus {
    Up,
    Disconnected,
    NotPresent,
}

impl WirelessStatus {
    pub fn from_status(status: &str) -> Self {
        match status {
            "Up" => WirelessStatus::Up,
            "Not Present" => WirelessStatus::NotPresent,
            _ => WirelessStatus::Disconnected,
        }
    }
}

/// One audited adapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdapterRecord {
    pub device: String,
    pub adapter_name: String,
    pub description: String,
    pub reported_link: String,
    pub is_wireless: bool,
    pub duplex_full: bool,
    pub power_mgmt: SettingStatus,
    pub eee_status: SettingStatus,
    pub jumbo_frames: JumboSetting,
    pub wireless_status: Option<WirelessStatus>,
}

impl AdapterRecord {
    /// Stand-in when the adapter list itself could not be read.
    pub fn placeholder(device: &str) -> Self {
        Self {
            device: device.to_string(),
            adapter_name: "Unknown".to_string(),
            description: "Access Denied".to_string(),
            reported_link: "Unknown".to_string(),
            is_wireless: false,
            duplex_full: true,
            power_mgmt: SettingStatus::Unknown,
            eee_status: SettingStatus::Unknown,
            jumbo_frames: JumboSetting::Unknown,
            wireless_status: None,
        }
    }

    /// Record for a wireless adapter; wired-only settings do not apply.
    pub fn wireless(device: &str, adapter: &NetAdapter) -> Self {
        let status = WirelessStatus::from_status(adapter.status());
        Self {
            device: device.to_string(),
            adapter_name: adapter.name().to_string(),
            description: adapter.description().to_string(),
            reported_link: if status == WirelessStatus::Up {
                "WiFi - ENABLED".to_string()
            } else {
                "WiFi - Disabled".to_string()
            },
            is_wireless: true,
            duplex_full: true,
            power_mgmt: SettingStatus::NotApplicable,
            eee_status: SettingStatus::NotApplicable,
            jumbo_frames: JumboSetting::NotApplicable,
            wireless_status: Some(status),
        }
    }

    /// Record for an active wired adapter, settings not yet queried.
    pub fn wired(device: &str, adapter: &NetAdapter) -> Self {
        Self {
            device: device.to_string(),
            adapter_name: adapter.name().to_string(),
            description: adapter.description().to_string(),
            reported_link: adapter
                .link_speed
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            is_wireless: false,
            duplex_full: adapter.full_duplex.unwrap_or(true),
            power_mgmt: SettingStatus::Unknown,
            eee_status: SettingStatus::Unknown,
            jumbo_frames: JumboSetting::Unknown,
            wireless_status: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw cmdlet output
// ---------------------------------------------------------------------------

/// `Get-NetAdapter` row.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetAdapter {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub interface_description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub link_speed: Option<String>,
    #[serde(default)]
    pub full_duplex: Option<bool>,
    #[serde(default)]
    pub media_type: Option<Value>,
    #[serde(default)]
    pub physical_media_type: Option<Value>,
}

impl NetAdapter {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }

    pub fn description(&self) -> &str {
        self.interface_description.as_deref().unwrap_or("")
    }

    pub fn status(&self) -> &str {
        self.status.as_deref().unwrap_or("")
    }

    pub fn is_up(&self) -> bool {
        self.status() == "Up"
    }

    /// Wireless by name, description or physical media type.
    pub fn is_wireless(&self) -> bool {
        let name = self.name();
        let desc = self.description();
        if name.contains("Wi-Fi") || name.contains("WiFi") || desc.contains("Wireless") || desc.contains("Wi-Fi") {
            return true;
        }
        [&self.physical_media_type, &self.media_type].into_iter().any(|field| {
            let media = field.as_ref().and_then(Value::as_str).unwrap_or("").to_lowercase();
            media.contains("wireless") || media.contains("802.11")
        })
    }
}

/// `Get-NetAdapterPowerManagement` row.
#[derive(Debug, Clone, Deserialize)]
pub struct PowerManagement {
    #[serde(rename = "AllowComputerToTurnOffDevice", default)]
    pub allow_turn_off: Option<Value>,
}

/// `Get-NetAdapterAdvancedProperty` row.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdvancedProperty {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub display_value: Option<Value>,
}

impl AdvancedProperty {
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or("")
    }

    pub fn value(&self) -> String {
        match &self.display_value {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

/// `ConvertTo-Json` emits a bare object for one row and an array for many.
pub fn parse_rows<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(raw)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items.into_iter().map(serde_json::from_value).collect(),
        single => Ok(vec![serde_json::from_value(single)?]),
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

const TRUTHY: [&str; 4] = ["enabled", "on", "yes", "true"];
const FALSY: [&str; 4] = ["disabled", "off", "no", "false"];

/// The adapter cmdlets were blocked for lack of privilege.
pub fn is_privilege_failure(out: &CommandOutput) -> bool {
    out.stderr.contains("Access denied")
        || out.stderr.contains("Access is denied")
        || out.stderr.contains("cannot be loaded")
}

/// "Allow the computer to turn off this device to save power".
pub fn classify_power(value: Option<&Value>) -> SettingStatus {
    match value {
        Some(Value::Bool(true)) => SettingStatus::Enabled,
        Some(Value::Bool(false)) => SettingStatus::Disabled,
        Some(Value::String(s)) => match s.as_str() {
            "Enabled" => SettingStatus::Enabled,
            "Disabled" => SettingStatus::Disabled,
            "NotSupported" | "Unsupported" => SettingStatus::NotSupported,
            _ => SettingStatus::Unknown,
        },
        _ => SettingStatus::Unknown,
    }
}

/// Classify energy-efficient-ethernet properties. Returns the status and the
/// properties that are switched on.
pub fn classify_eee(props: &[AdvancedProperty]) -> (SettingStatus, Vec<(String, String)>) {
    let relevant: Vec<&AdvancedProperty> = props
        .iter()
        .filter(|p| {
            let name = p.name().to_lowercase();
            name.contains("energy") || name.contains("eee") || name.contains("green")
        })
        .collect();

    if relevant.is_empty() {
        return (SettingStatus::NotSupported, Vec::new());
    }

    let enabled: Vec<(String, String)> = relevant
        .iter()
        .filter(|p| TRUTHY.contains(&p.value().to_lowercase().as_str()))
        .map(|p| (p.name().to_string(), p.value()))
        .collect();

    let status = if !enabled.is_empty() {
        SettingStatus::Enabled
    } else if relevant
        .iter()
        .any(|p| FALSY.contains(&p.value().to_lowercase().as_str()))
    {
        SettingStatus::Disabled
    } else {
        SettingStatus::Unknown
    };

    (status, enabled)
}

/// First jumbo-frame property's value.
pub fn classify_jumbo(props: &[AdvancedProperty]) -> JumboSetting {
    props
        .iter()
        .find(|p| p.name().to_lowercase().contains("jumbo"))
        .map(|p| {
            let v = p.value();
            if v.is_empty() {
                JumboSetting::Unknown
            } else {
                JumboSetting::Value(v)
            }
        })
        .unwrap_or(JumboSetting::Unknown)
}

pub fn wifi_enabled_warning(adapter: &str) -> String {
    format!(
        "{}: WiFi adapter is ENABLED (should be disabled for latency-sensitive networks)",
        adapter
    )
}

pub fn power_saving_warning(adapter: &str) -> String {
    format!("{}: Power saving enabled (can cause dropouts)", adapter)
}

pub fn eee_warning(adapter: &str, property: &str, value: &str) -> String {
    format!(
        "{}: {} is {} (incompatible with latency-sensitive streaming)",
        adapter, property, value
    )
}

pub const LIMITED_ACCESS_WARNING: &str =
    "Limited access - cannot check adapter settings (requires elevated permissions)";
