// Staged repair pipeline.
// Stage 1 -> 2 scan -> [2 resolve] -> 3 scan -> [3 install]. The caller drives each
// transition with one command; every started stage emits exactly one terminal event.

mod state;

use crate::channel::{CoreEvent, EventSink};
use crate::error::DiagError;
use crate::executor::{ActionPayload, RepairAction, RepairExecutor};
use crate::models::{RepairStage, ScanReport, StageReport, StageState, ThreatRecord, UpdateRecord};
use state::{PendingThreat, PipelineState};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};

pub const ENGINE_ERROR_THREAT: &str = "Scan Engine Error";

const NETWORK_FIX_STEPS: [(&str, RepairAction); 3] = [
    ("Flushing DNS cache...", RepairAction::FlushDns),
    ("Resetting network stack...", RepairAction::ResetNetworkStack),
    ("Restarting audio service...", RepairAction::RestartAudioService),
];

/// Stage-bound commands, already stripped of transport concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageCommand {
    StartNetworkFix,
    StartThreatScan,
    ResolveThreat,
    StartUpdateScan,
    InstallUpdates(Vec<String>),
}

impl StageCommand {
    pub fn stage(&self) -> RepairStage {
        match self {
            StageCommand::StartNetworkFix => RepairStage::NetworkFix,
            StageCommand::StartThreatScan => RepairStage::ThreatScan,
            StageCommand::ResolveThreat => RepairStage::ThreatResolve,
            StageCommand::StartUpdateScan => RepairStage::UpdateScan,
            StageCommand::InstallUpdates(_) => RepairStage::UpdateInstall,
        }
    }
}

#[derive(Clone)]
pub struct RepairPipeline {
    executor: Arc<dyn RepairExecutor>,
    state: Arc<Mutex<PipelineState>>,
    strict_order: bool,
}

/// Everything a running stage needs; moved into the stage task.
struct StageRun {
    executor: Arc<dyn RepairExecutor>,
    state: Arc<Mutex<PipelineState>>,
    events: EventSink,
    stage: RepairStage,
    warnings: Vec<String>,
}

impl RepairPipeline {
    pub fn new(executor: Arc<dyn RepairExecutor>, strict_order: bool) -> Self {
        Self {
            executor,
            state: Arc::new(Mutex::new(PipelineState::default())),
            strict_order,
        }
    }

    /// Checks ordering, marks the stage Running and spawns it. The stage's events go
    /// to `events`; the returned handle resolves once the terminal event was emitted.
    pub fn start(
        &self,
        command: StageCommand,
        events: EventSink,
    ) -> Result<JoinHandle<StageReport>, DiagError> {
        let stage = command.stage();
        lock(&self.state).begin(stage, self.strict_order)?;
        info!(stage = %stage, "stage started");

        let run = StageRun {
            executor: self.executor.clone(),
            state: self.state.clone(),
            events,
            stage,
            warnings: Vec::new(),
        };
        let span = info_span!("stage", stage = ?stage);
        Ok(tokio::spawn(
            async move {
                match command {
                    StageCommand::StartNetworkFix => run.network_fix().await,
                    StageCommand::StartThreatScan => run.threat_scan().await,
                    StageCommand::ResolveThreat => run.resolve_threat().await,
                    StageCommand::StartUpdateScan => run.update_scan().await,
                    StageCommand::InstallUpdates(ids) => run.install_updates(ids).await,
                }
            }
            .instrument(span),
        ))
    }

    pub fn stage_state(&self, stage: RepairStage) -> StageState {
        lock(&self.state).state(stage)
    }

    pub fn running_stage(&self) -> Option<RepairStage> {
        lock(&self.state).running()
    }
}

/// The table holds plain data and every critical section is panic-free, so a
/// poisoned lock still guards a consistent value.
fn lock(state: &Mutex<PipelineState>) -> MutexGuard<'_, PipelineState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl StageRun {
    fn state(&self) -> MutexGuard<'_, PipelineState> {
        lock(&self.state)
    }

    async fn run_action(&self, action: RepairAction) -> Result<ActionPayload, DiagError> {
        let kind = action.kind();
        let stage = self.stage;
        let state = self.state.clone();
        self.executor
            .execute(action)
            .finish(|message| {
                debug!(action = %kind, progress = message, "executor progress");
                lock(&state).mark_progress(stage);
            })
            .await
    }

    fn warn(&mut self, error: &DiagError) {
        warn!(error = %error, "best-effort step failed; continuing");
        self.warnings.push(error.to_string());
    }

    /// Records the terminal state, then emits the terminal event.
    async fn finish(self, state: StageState, event: CoreEvent) -> StageReport {
        let state = match state {
            StageState::Completed if !self.warnings.is_empty() => StageState::CompletedWithWarnings,
            other => other,
        };
        self.state().finish(self.stage, state);
        info!(?state, warnings = self.warnings.len(), event = event.name(), "stage finished");
        self.events.emit(event).await;
        StageReport {
            stage: self.stage,
            state,
            warnings: self.warnings,
        }
    }

    async fn network_fix(mut self) -> StageReport {
        for (label, action) in NETWORK_FIX_STEPS {
            self.state().mark_progress(self.stage);
            self.events
                .emit(CoreEvent::Stage1Progress(label.to_string()))
                .await;
            if let Err(e) = self.run_action(action).await {
                self.warn(&e);
            }
        }
        self.finish(StageState::Completed, CoreEvent::Stage1Complete)
            .await
    }

    async fn threat_scan(mut self) -> StageReport {
        let result = self.run_action(RepairAction::QuickScan).await;
        let result = match result {
            Ok(ActionPayload::Scan(report)) => Ok(report),
            Ok(other) => Err(DiagError::parse(
                "scan report",
                format!("unexpected payload {:?}", other),
            )),
            Err(e) => Err(e),
        };
        match result {
            Ok(ScanReport::Clean) => {
                self.state().pending_threat = None;
                self.finish(StageState::Completed, CoreEvent::Scan2Clean)
                    .await
            }
            Ok(ScanReport::ThreatFound(record)) => {
                info!(threat = %record.name, location = %record.location, "threat detected");
                self.state().pending_threat = Some(PendingThreat {
                    record: record.clone(),
                    engine_error: false,
                });
                self.finish(StageState::Completed, threat_detected(&record))
                    .await
            }
            Err(e) => {
                warn!(error = %e, "scan engine failed; reporting engine error");
                let record = ThreatRecord {
                    name: ENGINE_ERROR_THREAT.into(),
                    location: e.to_string(),
                };
                self.state().pending_threat = Some(PendingThreat {
                    record: record.clone(),
                    engine_error: true,
                });
                self.warnings.push(e.to_string());
                self.finish(StageState::Failed, threat_detected(&record))
                    .await
            }
        }
    }

    async fn resolve_threat(mut self) -> StageReport {
        let pending = self.state().pending_threat.clone();
        match pending {
            None => debug!("no pending threat; acknowledging"),
            Some(p) if p.engine_error => debug!("engine error acknowledged; nothing to remove"),
            Some(p) => {
                if let Err(e) = self.run_action(RepairAction::RemoveThreat(p.record)).await {
                    self.warn(&e);
                }
            }
        }
        self.state().pending_threat = None;
        self.finish(StageState::Completed, CoreEvent::ThreatResolved)
            .await
    }

    async fn update_scan(mut self) -> StageReport {
        let result = match self.run_action(RepairAction::ScanUpdates).await {
            Ok(ActionPayload::Updates(updates)) => Ok(dedup_updates(updates)),
            Ok(other) => Err(DiagError::parse(
                "update list",
                format!("unexpected payload {:?}", other),
            )),
            Err(e) => Err(e),
        };
        match result {
            Ok(updates) if updates.is_empty() => {
                self.state().last_updates = Some(Vec::new());
                self.finish(StageState::Completed, CoreEvent::UpdatesResolved)
                    .await
            }
            Ok(updates) => {
                info!(count = updates.len(), "updates found");
                self.state().last_updates = Some(updates.clone());
                self.finish(StageState::Completed, CoreEvent::UpdatesFound(updates))
                    .await
            }
            Err(e) => {
                warn!(error = %e, "update scan failed; nothing to install");
                self.state().last_updates = Some(Vec::new());
                self.warnings.push(e.to_string());
                self.finish(StageState::Failed, CoreEvent::UpdatesResolved)
                    .await
            }
        }
    }

    async fn install_updates(mut self, selected: Vec<String>) -> StageReport {
        let known = self.state().last_updates.clone().unwrap_or_default();
        let ids = select_known_ids(&known, &selected);
        if ids.len() < selected.len() {
            warn!(
                selected = selected.len(),
                accepted = ids.len(),
                "dropping update ids not in the last scan"
            );
        }
        if !ids.is_empty() {
            match self.run_action(RepairAction::InstallUpdates(ids.clone())).await {
                Ok(_) => {
                    info!(count = ids.len(), "updates installed");
                    // Failed ids stay in the scan so a retry can select them again.
                    if let Some(list) = self.state().last_updates.as_mut() {
                        list.retain(|u| !ids.contains(&u.id));
                    }
                }
                Err(e) => self.warn(&e),
            }
        }
        self.finish(StageState::Completed, CoreEvent::UpdatesResolved)
            .await
    }
}

fn threat_detected(record: &ThreatRecord) -> CoreEvent {
    CoreEvent::ThreatDetected {
        threat_name: record.name.clone(),
        threat_location: record.location.clone(),
    }
}

/// Keeps the first record for each id.
fn dedup_updates(updates: Vec<UpdateRecord>) -> Vec<UpdateRecord> {
    let mut seen = HashSet::new();
    let before = updates.len();
    let out: Vec<UpdateRecord> = updates
        .into_iter()
        .filter(|u| seen.insert(u.id.clone()))
        .collect();
    if out.len() < before {
        warn!(duplicates = before - out.len(), "update scan returned duplicate ids");
    }
    out
}

/// Selected ids present in the scan, in scan order, each once.
fn select_known_ids(known: &[UpdateRecord], selected: &[String]) -> Vec<String> {
    let wanted: HashSet<&str> = selected.iter().map(String::as_str).collect();
    known
        .iter()
        .filter(|u| wanted.contains(u.id.as_str()))
        .map(|u| u.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str) -> UpdateRecord {
        UpdateRecord {
            id: id.into(),
            title: format!("title {}", id),
        }
    }

    #[test]
    fn select_known_ids_filters_and_orders_by_scan() {
        let known = vec![rec("A"), rec("B"), rec("C")];
        let selected = vec!["C".to_string(), "X".to_string(), "A".to_string(), "A".to_string()];
        assert_eq!(select_known_ids(&known, &selected), vec!["A", "C"]);
        assert!(select_known_ids(&known, &[]).is_empty());
    }

    #[test]
    fn dedup_updates_keeps_first() {
        let mut second = rec("A");
        second.title = "other".into();
        let out = dedup_updates(vec![rec("A"), rec("B"), second]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "title A");
    }
}
