// Vitals sampler: CPU utilisation from a one-deep tick window, RAM from live totals.

use crate::error::DiagError;
use crate::models::{CpuTicks, MemoryReading, RamUsage, VitalsSnapshot};
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

/// Raw OS counters. Calls may block briefly; the sampler runs them on the blocking pool.
pub trait CounterSource: Send + Sync + 'static {
    fn cpu_ticks(&self) -> anyhow::Result<CpuTicks>;
    fn memory(&self) -> anyhow::Result<MemoryReading>;
}

/// `100 - floor(100 * idleDelta / totalDelta)`, clamped to 0..=100.
/// A window with no ticks (or counters that went backwards) is an error.
pub fn cpu_percent(prev: CpuTicks, now: CpuTicks) -> Result<u8, DiagError> {
    let total_delta = now.total.saturating_sub(prev.total);
    if total_delta == 0 {
        return Err(DiagError::ZeroTickWindow);
    }
    let idle_delta = now.idle.saturating_sub(prev.idle).min(total_delta);
    let idle_pct = (idle_delta as u128 * 100 / total_delta as u128) as u64;
    Ok(100u64.saturating_sub(idle_pct).min(100) as u8)
}

/// Mocked temperature: rises a quarter degree per CPU percent above the base.
pub fn mock_temperature(base_c: f64, cpu_percent: u8) -> f64 {
    ((base_c + f64::from(cpu_percent) * 0.25) * 10.0).round() / 10.0
}

struct TickWindow {
    prev: CpuTicks,
    last_percent: u8,
}

/// Owns the CPU baseline. The window lock is held across read + compute, so
/// concurrent samples are serialized.
pub struct VitalsSampler {
    source: Arc<dyn CounterSource>,
    window: Arc<Mutex<TickWindow>>,
    temperature_base_c: f64,
}

impl VitalsSampler {
    /// Captures the baseline immediately.
    pub fn new(source: Arc<dyn CounterSource>, temperature_base_c: f64) -> anyhow::Result<Self> {
        let prev = source.cpu_ticks()?;
        Ok(Self {
            source,
            window: Arc::new(Mutex::new(TickWindow {
                prev,
                last_percent: 0,
            })),
            temperature_base_c,
        })
    }

    #[instrument(skip(self), fields(operation = "sample_vitals"))]
    pub async fn sample(&self) -> anyhow::Result<VitalsSnapshot> {
        let source = self.source.clone();
        let window = self.window.clone();
        let base = self.temperature_base_c;
        tokio::task::spawn_blocking(move || {
            let mut window = window
                .lock()
                .map_err(|e| anyhow::anyhow!("tick window lock poisoned: {}", e))?;
            let now = source.cpu_ticks()?;
            let memory = source.memory()?;
            let cpu = match cpu_percent(window.prev, now) {
                Ok(p) => p,
                Err(e) => {
                    debug!(error = %e, reused = window.last_percent, "reusing previous cpu percent");
                    window.last_percent
                }
            };
            window.prev = now;
            window.last_percent = cpu;
            Ok(VitalsSnapshot {
                cpu_percent: cpu,
                ram: RamUsage::from(memory),
                temp_c: mock_temperature(base, cpu),
            })
        })
        .await
        .map_err(|e| anyhow::anyhow!("vitals task join: {}", e))?
    }
}
