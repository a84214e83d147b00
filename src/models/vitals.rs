// CPU tick counters, memory readings and the vitals wire model

use serde::{Deserialize, Serialize};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Cumulative CPU tick counters as read from the vitals provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTicks {
    pub idle: u64,
    pub total: u64,
}

/// Live memory totals in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryReading {
    pub total: u64,
    pub free: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RamUsage {
    pub used_gb: f64,
    pub free_gb: f64,
    pub total_gb: f64,
}

impl From<MemoryReading> for RamUsage {
    fn from(m: MemoryReading) -> Self {
        let free = m.free.min(m.total);
        let used = m.total - free;
        Self {
            used_gb: bytes_to_gb(used),
            free_gb: bytes_to_gb(free),
            total_gb: bytes_to_gb(m.total),
        }
    }
}

/// Payload of `vitals-update`. `temp` is a mocked reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsSnapshot {
    #[serde(rename = "cpu")]
    pub cpu_percent: u8,
    pub ram: RamUsage,
    #[serde(rename = "temp")]
    pub temp_c: f64,
}

/// Bytes to GiB, rounded to two decimals.
pub fn bytes_to_gb(bytes: u64) -> f64 {
    ((bytes as f64 / BYTES_PER_GB) * 100.0).round() / 100.0
}
