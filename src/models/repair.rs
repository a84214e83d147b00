// Repair pipeline stages, stage states and stage payloads

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStage {
    NetworkFix,
    ThreatScan,
    ThreatResolve,
    UpdateScan,
    UpdateInstall,
}

impl RepairStage {
    pub const ALL: [RepairStage; 5] = [
        RepairStage::NetworkFix,
        RepairStage::ThreatScan,
        RepairStage::ThreatResolve,
        RepairStage::UpdateScan,
        RepairStage::UpdateInstall,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for RepairStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepairStage::NetworkFix => "stage 1 (network fix)",
            RepairStage::ThreatScan => "stage 2 (threat scan)",
            RepairStage::ThreatResolve => "stage 2 (threat resolve)",
            RepairStage::UpdateScan => "stage 3 (update scan)",
            RepairStage::UpdateInstall => "stage 3 (update install)",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    #[default]
    Idle,
    Running,
    ProgressReported,
    Completed,
    /// Finished, but one or more best-effort steps failed and were swallowed.
    CompletedWithWarnings,
    Failed,
}

impl StageState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StageState::Completed | StageState::CompletedWithWarnings | StageState::Failed
        )
    }

    pub fn is_active(self) -> bool {
        matches!(self, StageState::Running | StageState::ProgressReported)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatRecord {
    pub name: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub id: String,
    pub title: String,
}

/// Output contract of the quick malware scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanReport {
    Clean,
    ThreatFound(ThreatRecord),
}

/// What a finished stage task reports back to whoever spawned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: RepairStage,
    pub state: StageState,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportTicket {
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}
