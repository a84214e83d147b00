// Shared test helpers
#![allow(dead_code)]

use pcmedic::channel::{CoreEvent, Dispatcher, DispatcherDeps, EventSink};
use pcmedic::executor::{RepairExecutor, SimulatedExecutor};
use pcmedic::models::{CpuTicks, MemoryReading};
use pcmedic::notifier::Notifier;
use pcmedic::pc_info::PcInfoAssembler;
use pcmedic::pipeline::RepairPipeline;
use pcmedic::secrets::KeyStore;
use pcmedic::sysinfo_repo::SysinfoRepo;
use pcmedic::vitals::{CounterSource, VitalsSampler};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

pub const GB: u64 = 1024 * 1024 * 1024;

/// Replays scripted tick readings; the last one repeats once the script runs out.
pub struct ScriptedCounters {
    ticks: Mutex<VecDeque<CpuTicks>>,
    last: Mutex<CpuTicks>,
    memory: MemoryReading,
    memory_failures: Mutex<usize>,
}

impl ScriptedCounters {
    pub fn new(ticks: &[(u64, u64)], memory: MemoryReading) -> Self {
        Self {
            ticks: Mutex::new(
                ticks
                    .iter()
                    .map(|&(idle, total)| CpuTicks { idle, total })
                    .collect(),
            ),
            last: Mutex::new(CpuTicks::default()),
            memory,
            memory_failures: Mutex::new(0),
        }
    }

    /// The next `n` memory reads fail.
    pub fn failing_memory(self, n: usize) -> Self {
        *self.memory_failures.lock().unwrap() = n;
        self
    }

    pub fn flat() -> Self {
        Self::new(
            &[(0, 0)],
            MemoryReading {
                total: 16 * GB,
                free: 6 * GB,
            },
        )
    }
}

impl CounterSource for ScriptedCounters {
    fn cpu_ticks(&self) -> anyhow::Result<CpuTicks> {
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.ticks.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(*last)
    }

    fn memory(&self) -> anyhow::Result<MemoryReading> {
        let mut failures = self.memory_failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            anyhow::bail!("memory counters unavailable");
        }
        Ok(self.memory)
    }
}

pub fn dispatcher_with(executor: Arc<dyn RepairExecutor>, strict_order: bool) -> Dispatcher {
    let sampler = VitalsSampler::new(Arc::new(ScriptedCounters::flat()), 38.0).unwrap();
    Dispatcher::new(DispatcherDeps {
        sampler: Arc::new(sampler),
        pc_info: Arc::new(PcInfoAssembler::new(
            Arc::new(SysinfoRepo::new()),
            executor.clone(),
        )),
        pipeline: RepairPipeline::new(executor.clone(), strict_order),
        executor,
        notifier: Arc::new(Notifier::Disabled),
        keys: KeyStore::new(Some("test-key".into())),
    })
}

pub fn default_dispatcher() -> Dispatcher {
    dispatcher_with(Arc::new(SimulatedExecutor::new()), true)
}

pub fn sink() -> (EventSink, mpsc::Receiver<CoreEvent>) {
    EventSink::channel(64)
}

pub async fn next_event(rx: &mut mpsc::Receiver<CoreEvent>) -> CoreEvent {
    timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Asserts nothing else arrives within a short grace period.
pub async fn assert_quiet(rx: &mut mpsc::Receiver<CoreEvent>) {
    if let Ok(Some(ev)) = timeout(Duration::from_millis(100), rx.recv()).await {
        panic!("unexpected extra event: {:?}", ev);
    }
}

pub fn names(events: &[CoreEvent]) -> Vec<&'static str> {
    events.iter().map(CoreEvent::name).collect()
}

pub const TEST_ORIGIN: &str = "http://localhost:5173";

pub const TEST_CONFIG: &str = r#"
[server]
port = 8081
host = "127.0.0.1"

[channel]
event_buffer = 16
ping_interval_secs = 30
send_timeout_secs = 5
allowed_origins = ["http://localhost:5173"]

[executor]
mode = "simulated"
"#;
