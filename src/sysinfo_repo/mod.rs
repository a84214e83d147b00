// Host counters and facts via sysinfo (plus /proc and DMI on Linux)

mod linux;

use crate::models::{CpuTicks, LocalHostFacts, MemoryReading, bytes_to_gb};
use crate::vitals::CounterSource;
use std::sync::{Arc, Mutex};
use sysinfo::{Disks, Networks, System};
use tracing::instrument;

/// Synthetic ticks per sample when /proc/stat is unavailable.
const SYNTHETIC_TICKS_PER_SAMPLE: u64 = 1000;

pub struct SysinfoRepo {
    sys: Arc<Mutex<System>>,
    disks: Arc<Mutex<Disks>>,
    networks: Arc<Mutex<Networks>>,
    synthetic_ticks: Mutex<CpuTicks>,
}

impl Default for SysinfoRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoRepo {
    pub fn new() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        let disks = Disks::new_with_refreshed_list();
        let networks = Networks::new_with_refreshed_list();
        Self {
            sys: Arc::new(Mutex::new(sys)),
            disks: Arc::new(Mutex::new(disks)),
            networks: Arc::new(Mutex::new(networks)),
            synthetic_ticks: Mutex::new(CpuTicks::default()),
        }
    }

    /// Accumulates ticks from sysinfo's global usage so the sampler sees the same
    /// idle/total shape as /proc/stat.
    fn synthesize_ticks(&self) -> anyhow::Result<CpuTicks> {
        let usage = {
            let mut sys = self
                .sys
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
            sys.refresh_cpu_all();
            f64::from(sys.global_cpu_usage()).clamp(0.0, 100.0)
        };
        let mut ticks = self
            .synthetic_ticks
            .lock()
            .map_err(|e| anyhow::anyhow!("synthetic ticks lock poisoned: {}", e))?;
        let idle_share = ((100.0 - usage) / 100.0 * SYNTHETIC_TICKS_PER_SAMPLE as f64) as u64;
        ticks.idle += idle_share;
        ticks.total += SYNTHETIC_TICKS_PER_SAMPLE;
        Ok(*ticks)
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "local_facts"))]
    pub async fn local_facts(&self) -> anyhow::Result<LocalHostFacts> {
        let sys = self.sys.clone();
        let disks = self.disks.clone();
        let networks = self.networks.clone();
        tokio::task::spawn_blocking(move || {
            let (processor, cores, ram_total) = {
                let mut sys = sys
                    .lock()
                    .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
                sys.refresh_memory();
                let processor = linux::read_cpu_model_linux()
                    .or_else(|| {
                        sys.cpus()
                            .first()
                            .map(|c| c.brand().trim().to_string())
                            .filter(|s| !s.is_empty() && s != "cpu0")
                    })
                    .unwrap_or_default();
                let cores = System::physical_core_count().unwrap_or(sys.cpus().len()) as u32;
                (processor, cores, sys.total_memory())
            };

            let (ssd_total, ssd_used) = {
                let mut disks = disks
                    .lock()
                    .map_err(|e| anyhow::anyhow!("sysinfo disks lock poisoned: {}", e))?;
                disks.refresh(false);
                disks.list().iter().fold((0u64, 0u64), |(t, u), d| {
                    let total = d.total_space();
                    let used = total.saturating_sub(d.available_space());
                    (t + total, u + used)
                })
            };

            let ip = {
                let mut networks = networks
                    .lock()
                    .map_err(|e| anyhow::anyhow!("sysinfo networks lock poisoned: {}", e))?;
                networks.refresh(true);
                networks
                    .list()
                    .iter()
                    .flat_map(|(_, data)| data.ip_networks().iter())
                    .map(|n| n.addr)
                    .find(|a| a.is_ipv4() && !a.is_loopback())
                    .map(|a| a.to_string())
            };

            let platform = match (System::name(), System::os_version()) {
                (Some(n), Some(v)) => format!("{} {}", n, v),
                (Some(n), None) => n,
                _ => std::env::consts::OS.to_string(),
            };

            Ok(LocalHostFacts {
                manufacturer: linux::read_sys_vendor_linux(),
                model: linux::read_product_name_linux().or_else(System::host_name),
                processor,
                cores,
                arch: std::env::consts::ARCH.to_string(),
                platform,
                ram_gb: bytes_to_gb(ram_total),
                ssd_total_gb: bytes_to_gb(ssd_total),
                ssd_used_gb: bytes_to_gb(ssd_used),
                ip,
                uptime_secs: System::uptime(),
            })
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }
}

impl CounterSource for SysinfoRepo {
    fn cpu_ticks(&self) -> anyhow::Result<CpuTicks> {
        match linux::read_proc_stat_ticks() {
            Some(t) => Ok(t),
            None => self.synthesize_ticks(),
        }
    }

    fn memory(&self) -> anyhow::Result<MemoryReading> {
        let mut sys = self
            .sys
            .lock()
            .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
        sys.refresh_memory();
        Ok(MemoryReading {
            total: sys.total_memory(),
            free: sys.available_memory(),
        })
    }
}
