// Host descriptor: local counters merged with the external system query

use serde::{Deserialize, Serialize};

const UNKNOWN: &str = "Unknown";

/// Facts read locally through sysinfo and /sys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalHostFacts {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub processor: String,
    pub cores: u32,
    pub arch: String,
    pub platform: String,
    pub ram_gb: f64,
    pub ssd_total_gb: f64,
    pub ssd_used_gb: f64,
    pub ip: Option<String>,
    pub uptime_secs: u64,
}

/// Output of the external system-query action. Every field is optional; the query
/// tool may only know part of the picture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemQuery {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub gpu: Option<String>,
    pub vram: Option<String>,
}

/// Payload of `pc-info-data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PcInfoSnapshot {
    pub manufacturer: String,
    pub model: String,
    pub processor: String,
    pub cores: u32,
    pub arch: String,
    pub platform: String,
    pub ram_gb: f64,
    pub gpu: String,
    pub vram: String,
    pub ssd_total_gb: f64,
    pub ssd_used_gb: f64,
    pub ip: String,
    pub uptime_secs: u64,
}

fn non_empty(v: Option<&String>) -> Option<String> {
    v.map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Query values win over local ones; anything neither source knows becomes "Unknown".
pub fn merge_pc_info(local: &LocalHostFacts, query: Option<&SystemQuery>) -> PcInfoSnapshot {
    let q = query.cloned().unwrap_or_default();
    let pick = |remote: Option<&String>, local: Option<&String>| {
        non_empty(remote)
            .or_else(|| non_empty(local))
            .unwrap_or_else(|| UNKNOWN.into())
    };
    PcInfoSnapshot {
        manufacturer: pick(q.manufacturer.as_ref(), local.manufacturer.as_ref()),
        model: pick(q.model.as_ref(), local.model.as_ref()),
        processor: non_empty(Some(&local.processor)).unwrap_or_else(|| UNKNOWN.into()),
        cores: local.cores,
        arch: local.arch.clone(),
        platform: local.platform.clone(),
        ram_gb: local.ram_gb,
        gpu: pick(q.gpu.as_ref(), None),
        vram: pick(q.vram.as_ref(), None),
        ssd_total_gb: local.ssd_total_gb,
        ssd_used_gb: local.ssd_used_gb,
        ip: pick(None, local.ip.as_ref()),
        uptime_secs: local.uptime_secs,
    }
}
