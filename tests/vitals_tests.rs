// Vitals sampler over scripted counters

mod common;

use common::{GB, ScriptedCounters};
use pcmedic::models::MemoryReading;
use pcmedic::vitals::{CounterSource, VitalsSampler};
use std::sync::Arc;

fn memory(total: u64, free: u64) -> MemoryReading {
    MemoryReading { total, free }
}

fn sampler(ticks: &[(u64, u64)], mem: MemoryReading) -> VitalsSampler {
    VitalsSampler::new(Arc::new(ScriptedCounters::new(ticks, mem)), 38.0).unwrap()
}

#[tokio::test]
async fn test_cpu_percent_from_consecutive_windows() {
    // Baseline, then +100 ticks with 25 idle, then +200 ticks with 150 idle.
    let s = sampler(
        &[(0, 0), (25, 100), (175, 300)],
        memory(16 * GB, 8 * GB),
    );
    assert_eq!(s.sample().await.unwrap().cpu_percent, 75);
    assert_eq!(s.sample().await.unwrap().cpu_percent, 25);
}

#[tokio::test]
async fn test_first_sample_without_new_ticks_reports_zero() {
    let s = sampler(&[(10, 100)], memory(16 * GB, 8 * GB));
    let snap = s.sample().await.unwrap();
    assert_eq!(snap.cpu_percent, 0);
}

#[tokio::test]
async fn test_zero_delta_reuses_previous_value() {
    let s = sampler(&[(0, 0), (40, 100)], memory(16 * GB, 8 * GB));
    assert_eq!(s.sample().await.unwrap().cpu_percent, 60);
    // Script exhausted: the same reading repeats, so the window is empty.
    assert_eq!(s.sample().await.unwrap().cpu_percent, 60);
    assert_eq!(s.sample().await.unwrap().cpu_percent, 60);
}

#[tokio::test]
async fn test_failed_memory_read_keeps_cpu_baseline() {
    let counters = ScriptedCounters::new(
        &[(0, 0), (25, 100), (175, 300)],
        memory(16 * GB, 8 * GB),
    )
    .failing_memory(1);
    let s = VitalsSampler::new(Arc::new(counters), 38.0).unwrap();
    assert!(s.sample().await.is_err());
    // Measured from the (0, 0) baseline: 175 idle of 300 ticks.
    assert_eq!(s.sample().await.unwrap().cpu_percent, 42);
}

#[tokio::test]
async fn test_cpu_percent_stays_in_range() {
    let s = sampler(
        &[(0, 0), (0, 50), (500, 100), (500, 100), (600, 10_100)],
        memory(8 * GB, 2 * GB),
    );
    for _ in 0..4 {
        let cpu = s.sample().await.unwrap().cpu_percent;
        assert!(cpu <= 100, "cpu {} out of range", cpu);
    }
}

#[tokio::test]
async fn test_ram_used_plus_free_equals_total() {
    for (total, free) in [
        (16 * GB, 6 * GB),
        (8 * GB, 3 * GB / 7),
        (17_179_869_184, 1_234_567_890),
        (4 * GB, 0),
    ] {
        let s = sampler(&[(0, 0), (10, 100)], memory(total, free));
        let ram = s.sample().await.unwrap().ram;
        assert!(
            (ram.used_gb + ram.free_gb - ram.total_gb).abs() <= 0.011,
            "used {} + free {} != total {}",
            ram.used_gb,
            ram.free_gb,
            ram.total_gb
        );
        assert!(ram.used_gb >= 0.0 && ram.free_gb >= 0.0);
    }
}

#[tokio::test]
async fn test_free_larger_than_total_is_clamped() {
    let s = sampler(&[(0, 0), (10, 100)], memory(4 * GB, 6 * GB));
    let ram = s.sample().await.unwrap().ram;
    assert_eq!(ram.used_gb, 0.0);
    assert_eq!(ram.free_gb, ram.total_gb);
}

#[tokio::test]
async fn test_snapshot_serializes_with_wire_names() {
    let s = sampler(&[(0, 0), (50, 100)], memory(16 * GB, 8 * GB));
    let v = serde_json::to_value(s.sample().await.unwrap()).unwrap();
    assert_eq!(v["cpu"], 50);
    assert_eq!(v["ram"]["totalGb"], 16.0);
    assert_eq!(v["ram"]["usedGb"], 8.0);
    assert_eq!(v["ram"]["freeGb"], 8.0);
    assert!(v["temp"].as_f64().unwrap() > 38.0);
}

#[tokio::test]
async fn test_concurrent_samples_are_serialized() {
    let ticks: Vec<(u64, u64)> = (0..=20).map(|i| (i * 50, i * 100)).collect();
    let s = Arc::new(sampler(&ticks, memory(16 * GB, 8 * GB)));
    let mut handles = Vec::new();
    for _ in 0..20 {
        let s = s.clone();
        handles.push(tokio::spawn(async move { s.sample().await.unwrap() }));
    }
    for h in handles {
        // Every window is +100 total, +50 idle; interleaving would break that.
        assert_eq!(h.await.unwrap().cpu_percent, 50);
    }
}

struct FailingCounters;

impl CounterSource for FailingCounters {
    fn cpu_ticks(&self) -> anyhow::Result<pcmedic::models::CpuTicks> {
        anyhow::bail!("counters unavailable")
    }

    fn memory(&self) -> anyhow::Result<MemoryReading> {
        anyhow::bail!("counters unavailable")
    }
}

#[test]
fn test_sampler_requires_a_baseline() {
    assert!(VitalsSampler::new(Arc::new(FailingCounters), 38.0).is_err());
}
