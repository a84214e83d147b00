// Repair executor: the external capability that performs one OS-level action.
// Every call returns immediately; outcomes arrive on an OutcomeStream.

mod command;
mod simulated;

pub use command::CommandExecutor;
pub use simulated::SimulatedExecutor;

use crate::error::DiagError;
use crate::models::{ScanReport, ThreatRecord, UpdateRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

const OUTCOME_BUFFER: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairAction {
    FlushDns,
    ResetNetworkStack,
    RestartAudioService,
    QuickScan,
    RemoveThreat(ThreatRecord),
    ScanUpdates,
    InstallUpdates(Vec<String>),
    ReadSystemLogs,
    QuerySystem,
}

/// Payload-free discriminant of a RepairAction (config keys, logging, errors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    FlushDns,
    ResetNetworkStack,
    RestartAudioService,
    QuickScan,
    RemoveThreat,
    ScanUpdates,
    InstallUpdates,
    ReadSystemLogs,
    QuerySystem,
}

impl RepairAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            RepairAction::FlushDns => ActionKind::FlushDns,
            RepairAction::ResetNetworkStack => ActionKind::ResetNetworkStack,
            RepairAction::RestartAudioService => ActionKind::RestartAudioService,
            RepairAction::QuickScan => ActionKind::QuickScan,
            RepairAction::RemoveThreat(_) => ActionKind::RemoveThreat,
            RepairAction::ScanUpdates => ActionKind::ScanUpdates,
            RepairAction::InstallUpdates(_) => ActionKind::InstallUpdates,
            RepairAction::ReadSystemLogs => ActionKind::ReadSystemLogs,
            RepairAction::QuerySystem => ActionKind::QuerySystem,
        }
    }
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::FlushDns => "flush_dns",
            ActionKind::ResetNetworkStack => "reset_network_stack",
            ActionKind::RestartAudioService => "restart_audio_service",
            ActionKind::QuickScan => "quick_scan",
            ActionKind::RemoveThreat => "remove_threat",
            ActionKind::ScanUpdates => "scan_updates",
            ActionKind::InstallUpdates => "install_updates",
            ActionKind::ReadSystemLogs => "read_system_logs",
            ActionKind::QuerySystem => "query_system",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionPayload {
    None,
    Scan(ScanReport),
    Updates(Vec<UpdateRecord>),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Progress(String),
    Success(ActionPayload),
    Failure(String),
}

pub trait RepairExecutor: Send + Sync {
    /// Starts `action` and returns without waiting for it.
    fn execute(&self, action: RepairAction) -> OutcomeStream;
}

/// Executor side of an outcome stream.
pub struct OutcomeSender {
    tx: mpsc::Sender<ActionOutcome>,
}

impl OutcomeSender {
    pub async fn progress(&self, message: impl Into<String>) {
        let _ = self.tx.send(ActionOutcome::Progress(message.into())).await;
    }

    pub async fn success(self, payload: ActionPayload) {
        let _ = self.tx.send(ActionOutcome::Success(payload)).await;
    }

    pub async fn failure(self, reason: impl Into<String>) {
        let _ = self.tx.send(ActionOutcome::Failure(reason.into())).await;
    }
}

/// Caller side: zero or more Progress followed by one terminal outcome.
pub struct OutcomeStream {
    kind: ActionKind,
    rx: mpsc::Receiver<ActionOutcome>,
}

impl OutcomeStream {
    pub fn channel(kind: ActionKind) -> (OutcomeSender, OutcomeStream) {
        let (tx, rx) = mpsc::channel(OUTCOME_BUFFER);
        (OutcomeSender { tx }, OutcomeStream { kind, rx })
    }

    /// A stream that is already terminated with `reason`.
    pub fn failed(kind: ActionKind, reason: impl Into<String>) -> OutcomeStream {
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.try_send(ActionOutcome::Failure(reason.into()));
        OutcomeStream { kind, rx }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub async fn next(&mut self) -> Option<ActionOutcome> {
        self.rx.recv().await
    }

    /// Drains progress into `on_progress` until the terminal outcome. A stream that
    /// closes without one counts as a failure.
    pub async fn finish(
        mut self,
        mut on_progress: impl FnMut(&str),
    ) -> Result<ActionPayload, DiagError> {
        while let Some(outcome) = self.rx.recv().await {
            match outcome {
                ActionOutcome::Progress(message) => on_progress(&message),
                ActionOutcome::Success(payload) => return Ok(payload),
                ActionOutcome::Failure(reason) => {
                    return Err(DiagError::executor(self.kind, reason));
                }
            }
        }
        Err(DiagError::executor(
            self.kind,
            "executor ended without an outcome",
        ))
    }
}
