// Scripted executor for demo mode and tests: fixed outcomes, no OS side effects.

use super::{
    ActionKind, ActionPayload, OutcomeSender, OutcomeStream, RepairAction, RepairExecutor,
};
use crate::config::SimulatedConfig;
use crate::models::{ScanReport, ThreatRecord, UpdateRecord};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct SimulatedExecutor {
    step_delay: Duration,
    threat: Option<ThreatRecord>,
    updates: Vec<UpdateRecord>,
    failing: HashSet<ActionKind>,
    invocations: Arc<Mutex<Vec<RepairAction>>>,
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

pub fn default_updates() -> Vec<UpdateRecord> {
    vec![
        UpdateRecord {
            id: "KB5031455".into(),
            title: "2023-10 Cumulative Update Preview for Windows 11".into(),
        },
        UpdateRecord {
            id: "INTEL-SYS".into(),
            title: "Intel Corporation - System - 10.1.19444.8378".into(),
        },
        UpdateRecord {
            id: "KB5032541".into(),
            title: "Security Intelligence Update for Microsoft Defender Antivirus".into(),
        },
    ]
}

impl SimulatedExecutor {
    /// Clean scan, the three default updates, no delay, nothing failing.
    pub fn new() -> Self {
        Self {
            step_delay: Duration::ZERO,
            threat: None,
            updates: default_updates(),
            failing: HashSet::new(),
            invocations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn from_config(config: &SimulatedConfig) -> Self {
        let mut exec = Self::new().with_step_delay(Duration::from_millis(config.step_delay_ms));
        exec.threat = config.threat.clone();
        if let Some(updates) = &config.updates {
            exec.updates = updates.clone();
        }
        exec.failing = config.failing.iter().copied().collect();
        exec
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn with_threat(mut self, threat: ThreatRecord) -> Self {
        self.threat = Some(threat);
        self
    }

    pub fn with_updates(mut self, updates: Vec<UpdateRecord>) -> Self {
        self.updates = updates;
        self
    }

    pub fn failing(mut self, kind: ActionKind) -> Self {
        self.failing.insert(kind);
        self
    }

    /// Actions executed so far, in call order.
    pub fn invocations(&self) -> Vec<RepairAction> {
        self.invocations
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    fn payload_for(&self, action: &RepairAction) -> ActionPayload {
        match action {
            RepairAction::QuickScan => ActionPayload::Scan(match &self.threat {
                Some(t) => ScanReport::ThreatFound(t.clone()),
                None => ScanReport::Clean,
            }),
            RepairAction::ScanUpdates => ActionPayload::Updates(self.updates.clone()),
            RepairAction::ReadSystemLogs => ActionPayload::Text(
                [
                    "[Information] Service Control Manager: The Windows Update service entered the running state.",
                    "[Warning] DNS Client Events: Name resolution for wpad timed out.",
                    "[Information] Kernel-Power: The system is entering sleep.",
                ]
                .join("\n"),
            ),
            RepairAction::QuerySystem => ActionPayload::Text(
                serde_json::json!({
                    "manufacturer": "Simulated Systems",
                    "model": "Virtual Workstation",
                    "gpu": "Simulated Graphics Adapter",
                    "vram": "4 GB",
                })
                .to_string(),
            ),
            _ => ActionPayload::None,
        }
    }
}

fn progress_lines(kind: ActionKind) -> &'static [&'static str] {
    match kind {
        ActionKind::FlushDns => &["Successfully flushed the DNS Resolver Cache."],
        ActionKind::ResetNetworkStack => &["Resetting Winsock catalog", "Winsock reset completed."],
        ActionKind::RestartAudioService => &["Stopping Windows Audio", "Starting Windows Audio"],
        ActionKind::QuickScan => &["Scanning memory", "Scanning startup locations"],
        ActionKind::RemoveThreat => &["Quarantining item"],
        ActionKind::ScanUpdates => &["Searching for updates"],
        ActionKind::InstallUpdates => &["Downloading", "Installing"],
        ActionKind::ReadSystemLogs | ActionKind::QuerySystem => &[],
    }
}

async fn run(
    tx: OutcomeSender,
    kind: ActionKind,
    delay: Duration,
    fail: bool,
    payload: ActionPayload,
) {
    for line in progress_lines(kind) {
        tx.progress(*line).await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    if fail {
        tx.failure(format!("simulated {} failure", kind)).await;
    } else {
        tx.success(payload).await;
    }
}

impl RepairExecutor for SimulatedExecutor {
    fn execute(&self, action: RepairAction) -> OutcomeStream {
        let kind = action.kind();
        let payload = self.payload_for(&action);
        if let Ok(mut log) = self.invocations.lock() {
            log.push(action);
        }
        let (tx, stream) = OutcomeStream::channel(kind);
        tokio::spawn(run(
            tx,
            kind,
            self.step_delay,
            self.failing.contains(&kind),
            payload,
        ));
        stream
    }
}
