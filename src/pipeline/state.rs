// Stage table and ordering rules. Every check-and-set happens under one lock.

use crate::error::DiagError;
use crate::models::{RepairStage, StageState, ThreatRecord, UpdateRecord};

/// Threat waiting for `resolve-threat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingThreat {
    pub(crate) record: ThreatRecord,
    /// Synthetic record standing in for a failed scan engine; nothing to remove.
    pub(crate) engine_error: bool,
}

#[derive(Debug, Default)]
pub(crate) struct PipelineState {
    stages: [StageState; 5],
    running: Option<RepairStage>,
    pub(crate) pending_threat: Option<PendingThreat>,
    /// Most recent update scan; `None` until one has run.
    pub(crate) last_updates: Option<Vec<UpdateRecord>>,
}

impl PipelineState {
    pub(crate) fn state(&self, stage: RepairStage) -> StageState {
        self.stages[stage.index()]
    }

    pub(crate) fn running(&self) -> Option<RepairStage> {
        self.running
    }

    fn reset_from(&mut self, stage: RepairStage) {
        for s in RepairStage::ALL.into_iter().filter(|s| *s >= stage) {
            self.stages[s.index()] = StageState::Idle;
        }
    }

    /// Threat scan has a terminal result and nothing is left to resolve.
    fn threat_decided(&self) -> bool {
        self.state(RepairStage::ThreatScan).is_terminal() && self.pending_threat.is_none()
    }

    /// Validates ordering and marks `stage` Running.
    pub(crate) fn begin(&mut self, stage: RepairStage, strict: bool) -> Result<(), DiagError> {
        if let Some(running) = self.running {
            return Err(DiagError::StageBusy {
                requested: stage,
                running,
            });
        }
        let out_of_order = |reason| DiagError::StageOutOfOrder {
            requested: stage,
            reason,
        };
        match stage {
            RepairStage::NetworkFix => {
                *self = PipelineState::default();
            }
            RepairStage::ThreatScan => {
                if strict && !self.state(RepairStage::NetworkFix).is_terminal() {
                    return Err(out_of_order("stage 1 has not completed"));
                }
                self.pending_threat = None;
                self.last_updates = None;
                self.reset_from(RepairStage::ThreatScan);
            }
            RepairStage::ThreatResolve => {
                if !self.state(RepairStage::ThreatScan).is_terminal() {
                    return Err(out_of_order("no threat scan has run"));
                }
            }
            RepairStage::UpdateScan => {
                if strict && !self.threat_decided() {
                    return Err(out_of_order("stage 2 has not been resolved"));
                }
                self.last_updates = None;
                self.reset_from(RepairStage::UpdateScan);
            }
            RepairStage::UpdateInstall => {
                if self.last_updates.is_none() {
                    return Err(out_of_order("no update scan result"));
                }
            }
        }
        self.stages[stage.index()] = StageState::Running;
        self.running = Some(stage);
        Ok(())
    }

    pub(crate) fn mark_progress(&mut self, stage: RepairStage) {
        if self.state(stage).is_active() {
            self.stages[stage.index()] = StageState::ProgressReported;
        }
    }

    pub(crate) fn finish(&mut self, stage: RepairStage, state: StageState) {
        self.stages[stage.index()] = state;
        if self.running == Some(stage) {
            self.running = None;
        }
    }
}
