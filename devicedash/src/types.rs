//! Types that mirror the API's GraphQL schema.
//! Field names follow the wire format (camelCase); keep this module the single
//! source of truth for device and user shapes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    Online,
    Offline,
    Error,
    Maintenance,
    #[default]
    #[serde(other)]
    Unknown,
}

impl DeviceStatus {
    pub const ALL: [DeviceStatus; 5] = [
        DeviceStatus::Online,
        DeviceStatus::Offline,
        DeviceStatus::Error,
        DeviceStatus::Maintenance,
        DeviceStatus::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceStatus::Unknown => "UNKNOWN",
            DeviceStatus::Online => "ONLINE",
            DeviceStatus::Offline => "OFFLINE",
            DeviceStatus::Error => "ERROR",
            DeviceStatus::Maintenance => "MAINTENANCE",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DeviceStatus::Unknown => "Unknown",
            DeviceStatus::Online => "Online",
            DeviceStatus::Offline => "Offline",
            DeviceStatus::Error => "Error",
            DeviceStatus::Maintenance => "Maintenance",
        }
    }

    /// Next status in `ALL` order, wrapping around.
    pub fn next(self) -> DeviceStatus {
        let idx = Self::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown device status '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub key: String,
    pub value: String,
}

impl MetadataEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub status: DeviceStatus,
    pub created_at: i64,
    pub last_seen: i64,
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
}

impl Device {
    /// Case-insensitive substring match on name or type. A blank term matches everything.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        term.is_empty()
            || self.name.to_lowercase().contains(&term)
            || self.kind.to_lowercase().contains(&term)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConnection {
    pub devices: Vec<Device>,
    pub total: u32,
    pub page: u32,
    pub page_size: u32,
}

impl DeviceConnection {
    pub fn page_count(&self) -> u32 {
        if self.page_size == 0 {
            return 1;
        }
        self.total.div_ceil(self.page_size).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_devices: u32,
    pub online_devices: u32,
    pub offline_devices: u32,
    pub error_devices: u32,
}

impl Stats {
    // Client-side rollup for code paths that already hold the device list
    pub fn from_devices(devices: &[Device]) -> Self {
        let count = |st: DeviceStatus| devices.iter().filter(|d| d.status == st).count() as u32;
        Self {
            total_devices: devices.len() as u32,
            online_devices: count(DeviceStatus::Online),
            offline_devices: count(DeviceStatus::Offline),
            error_devices: count(DeviceStatus::Error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub created_at: i64,
    pub last_login: Option<i64>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    pub success: bool,
    pub message: String,
}

// ---------- Inputs ----------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDeviceInput {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<MetadataEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDeviceInput {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DeviceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Vec<MetadataEntry>>,
}

/// Variables for the paged device listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFilter {
    pub page: u32,
    pub page_size: u32,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DeviceStatus>,
}

pub const DEFAULT_PAGE_SIZE: u32 = 20;

impl Default for DeviceFilter {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            kind: None,
            status: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_matches_name_or_type_ignoring_case() {
        let d = Device {
            id: "dev-9".into(),
            name: "Boiler Room Gateway".into(),
            kind: "Gateway".into(),
            status: DeviceStatus::Online,
            created_at: 0,
            last_seen: 0,
            metadata: vec![],
        };
        assert!(d.matches_search("boiler"));
        assert!(d.matches_search("GATEWAY"));
        assert!(d.matches_search("  "));
        assert!(!d.matches_search("dev-9"));
        assert!(!d.matches_search("sensor"));
    }

    #[test]
    fn device_decodes_from_wire_shape() {
        let js = r#"{
            "id": "dev-1", "name": "Gateway", "type": "gateway", "status": "ONLINE",
            "createdAt": 1700000000, "lastSeen": 1700000100,
            "metadata": [{"key": "cpu_percent", "value": "12.5"}]
        }"#;
        let d: Device = serde_json::from_str(js).unwrap();
        assert_eq!(d.kind, "gateway");
        assert_eq!(d.status, DeviceStatus::Online);
        assert_eq!(d.metadata[0], MetadataEntry::new("cpu_percent", "12.5"));
    }

    #[test]
    fn unrecognized_status_decodes_as_unknown() {
        let st: DeviceStatus = serde_json::from_str("\"REBOOTING\"").unwrap();
        assert_eq!(st, DeviceStatus::Unknown);
        let st: DeviceStatus = serde_json::from_str("\"MAINTENANCE\"").unwrap();
        assert_eq!(st, DeviceStatus::Maintenance);
        assert_eq!(serde_json::to_value(DeviceStatus::Unknown).unwrap(), "UNKNOWN");
        assert_eq!(DeviceStatus::default(), DeviceStatus::Unknown);
    }

    #[test]
    fn filter_omits_unset_fields() {
        let v = serde_json::to_value(DeviceFilter::default()).unwrap();
        assert_eq!(v, serde_json::json!({"page": 1, "pageSize": 20}));

        let v = serde_json::to_value(DeviceFilter {
            status: Some(DeviceStatus::Error),
            kind: Some("sensor".into()),
            ..DeviceFilter::default()
        })
        .unwrap();
        assert_eq!(v["status"], "ERROR");
        assert_eq!(v["type"], "sensor");
    }

    #[test]
    fn stats_rollup_counts_by_status() {
        let mk = |id: &str, st| Device {
            id: id.into(),
            name: id.into(),
            kind: "sensor".into(),
            status: st,
            created_at: 0,
            last_seen: 0,
            metadata: vec![],
        };
        let devices = vec![
            mk("a", DeviceStatus::Online),
            mk("b", DeviceStatus::Online),
            mk("c", DeviceStatus::Error),
            mk("d", DeviceStatus::Maintenance),
        ];
        let s = Stats::from_devices(&devices);
        assert_eq!(s.total_devices, 4);
        assert_eq!(s.online_devices, 2);
        assert_eq!(s.offline_devices, 0);
        assert_eq!(s.error_devices, 1);
    }

    #[test]
    fn page_count_rounds_up() {
        let c = DeviceConnection {
            devices: vec![],
            total: 41,
            page: 1,
            page_size: 20,
        };
        assert_eq!(c.page_count(), 3);
        let empty = DeviceConnection { total: 0, ..c };
        assert_eq!(empty.page_count(), 1);
    }
}
