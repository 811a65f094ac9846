//! Recover typed device metrics from free-form metadata entries.
//!
//! Devices report telemetry as string key/value pairs. Only a fixed set of keys
//! is recognized; a field is set only when its value parses to a finite number.

use crate::types::MetadataEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricField {
    CpuPercent,
    MemoryUsedGb,
    DiskUsedGb,
    NetworkUpMb,
    NetworkDownMb,
    BatteryLevel,
    ProcessCount,
}

impl MetricField {
    /// Display order for the detail view.
    pub const ALL: [MetricField; 7] = [
        MetricField::CpuPercent,
        MetricField::MemoryUsedGb,
        MetricField::DiskUsedGb,
        MetricField::BatteryLevel,
        MetricField::NetworkUpMb,
        MetricField::NetworkDownMb,
        MetricField::ProcessCount,
    ];

    /// Map a metadata key to the field it reports, if recognized.
    pub fn from_key(key: &str) -> Option<MetricField> {
        match key {
            "cpu_percent" => Some(MetricField::CpuPercent),
            "memory_used_gb" | "memory_gb" => Some(MetricField::MemoryUsedGb),
            "disk_used_gb" | "disk_gb" => Some(MetricField::DiskUsedGb),
            "network_up_mb" => Some(MetricField::NetworkUpMb),
            "network_down_mb" => Some(MetricField::NetworkDownMb),
            "battery_level" => Some(MetricField::BatteryLevel),
            "process_count" => Some(MetricField::ProcessCount),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MetricField::CpuPercent => "CPU Usage",
            MetricField::MemoryUsedGb => "Memory Used",
            MetricField::DiskUsedGb => "Disk Used",
            MetricField::NetworkUpMb => "Network Upload",
            MetricField::NetworkDownMb => "Network Download",
            MetricField::BatteryLevel => "Battery",
            MetricField::ProcessCount => "Active Processes",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            MetricField::CpuPercent | MetricField::BatteryLevel => "%",
            MetricField::MemoryUsedGb | MetricField::DiskUsedGb => "GB",
            MetricField::NetworkUpMb | MetricField::NetworkDownMb => "MB",
            MetricField::ProcessCount => "",
        }
    }

    /// Human-facing value with the precision each metric is shown at.
    pub fn format_value(self, v: f64) -> String {
        match self {
            MetricField::CpuPercent => format!("{v:.1}"),
            MetricField::BatteryLevel | MetricField::ProcessCount => format!("{v}"),
            _ => format!("{v:.2}"),
        }
    }
}

/// Sparse metric record; `None` means "not reported", never zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeviceMetrics {
    pub cpu_percent: Option<f64>,
    pub memory_used_gb: Option<f64>,
    pub disk_used_gb: Option<f64>,
    pub network_up_mb: Option<f64>,
    pub network_down_mb: Option<f64>,
    pub battery_level: Option<f64>,
    pub process_count: Option<f64>,
}

impl DeviceMetrics {
    pub fn get(&self, field: MetricField) -> Option<f64> {
        match field {
            MetricField::CpuPercent => self.cpu_percent,
            MetricField::MemoryUsedGb => self.memory_used_gb,
            MetricField::DiskUsedGb => self.disk_used_gb,
            MetricField::NetworkUpMb => self.network_up_mb,
            MetricField::NetworkDownMb => self.network_down_mb,
            MetricField::BatteryLevel => self.battery_level,
            MetricField::ProcessCount => self.process_count,
        }
    }

    fn slot(&mut self, field: MetricField) -> &mut Option<f64> {
        match field {
            MetricField::CpuPercent => &mut self.cpu_percent,
            MetricField::MemoryUsedGb => &mut self.memory_used_gb,
            MetricField::DiskUsedGb => &mut self.disk_used_gb,
            MetricField::NetworkUpMb => &mut self.network_up_mb,
            MetricField::NetworkDownMb => &mut self.network_down_mb,
            MetricField::BatteryLevel => &mut self.battery_level,
            MetricField::ProcessCount => &mut self.process_count,
        }
    }

    /// Reported fields in display order.
    pub fn present(&self) -> impl Iterator<Item = (MetricField, f64)> + '_ {
        MetricField::ALL
            .into_iter()
            .filter_map(|f| self.get(f).map(|v| (f, v)))
    }

    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }
}

fn parse_finite(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Scan metadata in order; a later entry for the same field overwrites an earlier one.
pub fn parse_metadata(metadata: &[MetadataEntry]) -> DeviceMetrics {
    let mut out = DeviceMetrics::default();
    for entry in metadata {
        let Some(field) = MetricField::from_key(&entry.key) else {
            continue;
        };
        if let Some(v) = parse_finite(&entry.value) {
            *out.slot(field) = Some(v);
        }
    }
    out
}
