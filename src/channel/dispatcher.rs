// Routes decoded commands to their handlers. Every command is answered on its own
// task and produces exactly one terminal event on the session's sink.

use super::{Command, CoreEvent, EventSink};
use crate::executor::{ActionPayload, RepairAction, RepairExecutor};
use crate::notifier::Notifier;
use crate::pc_info::PcInfoAssembler;
use crate::pipeline::{RepairPipeline, StageCommand};
use crate::secrets::KeyStore;
use crate::vitals::VitalsSampler;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct DispatcherDeps {
    pub sampler: Arc<VitalsSampler>,
    pub pc_info: Arc<PcInfoAssembler>,
    pub pipeline: RepairPipeline,
    pub executor: Arc<dyn RepairExecutor>,
    pub notifier: Arc<Notifier>,
    pub keys: KeyStore,
}

#[derive(Clone)]
pub struct Dispatcher {
    deps: Arc<DispatcherDeps>,
}

impl Dispatcher {
    pub fn new(deps: DispatcherDeps) -> Self {
        Self {
            deps: Arc::new(deps),
        }
    }

    pub fn pipeline(&self) -> &RepairPipeline {
        &self.deps.pipeline
    }

    /// Never blocks: stage ordering is checked inline, the work itself is spawned.
    pub fn handle(&self, command: Command, events: EventSink) {
        let name = command.name();
        debug!(command = name, "command received");
        match command {
            Command::StartStage1 => self.start_stage(name, StageCommand::StartNetworkFix, events),
            Command::StartStage2Scan => {
                self.start_stage(name, StageCommand::StartThreatScan, events)
            }
            Command::ResolveThreat => self.start_stage(name, StageCommand::ResolveThreat, events),
            Command::StartStage3Scan => {
                self.start_stage(name, StageCommand::StartUpdateScan, events)
            }
            Command::ResolveUpdates(ids) => {
                self.start_stage(name, StageCommand::InstallUpdates(ids), events)
            }
            Command::RequestVitals => {
                let sampler = self.deps.sampler.clone();
                tokio::spawn(async move {
                    let event = match sampler.sample().await {
                        Ok(snapshot) => CoreEvent::VitalsUpdate(snapshot),
                        Err(e) => {
                            warn!(error = %e, operation = "sample_vitals", "vitals sample failed");
                            CoreEvent::rejected(name, e)
                        }
                    };
                    events.emit(event).await;
                });
            }
            Command::RequestPcInfo => {
                let pc_info = self.deps.pc_info.clone();
                tokio::spawn(async move {
                    let info = pc_info.collect().await;
                    events.emit(CoreEvent::PcInfoData(info)).await;
                });
            }
            Command::RequestSystemLogs => {
                let executor = self.deps.executor.clone();
                tokio::spawn(async move {
                    let text = match executor
                        .execute(RepairAction::ReadSystemLogs)
                        .finish(|_| {})
                        .await
                    {
                        Ok(ActionPayload::Text(text)) => text,
                        Ok(other) => {
                            warn!(payload = ?other, "system logs returned no text");
                            "No system logs available.".to_string()
                        }
                        Err(e) => {
                            warn!(error = %e, operation = "read_system_logs", "system logs failed");
                            format!("Unable to read system logs: {}", e)
                        }
                    };
                    events.emit(CoreEvent::SystemLogsData(text)).await;
                });
            }
            Command::GetApiKey => {
                let key = self.deps.keys.api_key().to_string();
                tokio::spawn(async move {
                    events.emit(CoreEvent::ApiKey { key }).await;
                });
            }
            Command::SubmitTicket(ticket) => {
                let notifier = self.deps.notifier.clone();
                tokio::spawn(async move {
                    let event = match notifier.submit(&ticket).await {
                        Ok(()) => CoreEvent::TicketSubmitted,
                        Err(e) => {
                            warn!(error = %e, operation = "submit_ticket", "ticket submission failed");
                            CoreEvent::TicketFailed {
                                reason: e.to_string(),
                            }
                        }
                    };
                    events.emit(event).await;
                });
            }
        }
    }

    /// Rejects a frame that never became a command.
    pub fn reject(&self, command: &str, reason: impl ToString, events: EventSink) {
        let event = CoreEvent::rejected(command, reason);
        tokio::spawn(async move {
            events.emit(event).await;
        });
    }

    fn start_stage(&self, name: &'static str, command: StageCommand, events: EventSink) {
        let rejection_sink = events.clone();
        if let Err(e) = self.deps.pipeline.start(command, events) {
            warn!(command = name, error = %e, "stage command rejected");
            self.reject(name, e, rejection_sink);
        }
    }
}
