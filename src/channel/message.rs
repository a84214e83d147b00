// Wire messages across the trust boundary.
// Caller -> core: {"command": <name>, "payload": ...}
// Core -> caller: {"event": <name>, "payload": ...}

use crate::error::ChannelError;
use crate::models::{PcInfoSnapshot, SupportTicket, UpdateRecord, VitalsSnapshot};
use serde::{Deserialize, Serialize};

/// Everything the presentation layer may invoke. Nothing else is reachable.
pub const CAPABILITIES: &[&str] = &[
    "request-vitals",
    "request-pc-info",
    "request-system-logs",
    "start-stage-1",
    "start-stage-2-scan",
    "resolve-threat",
    "start-stage-3-scan",
    "resolve-updates",
    "get-api-key",
    "submit-ticket",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload", rename_all = "kebab-case")]
pub enum Command {
    RequestVitals,
    RequestPcInfo,
    RequestSystemLogs,
    #[serde(rename = "start-stage-1")]
    StartStage1,
    #[serde(rename = "start-stage-2-scan")]
    StartStage2Scan,
    ResolveThreat,
    #[serde(rename = "start-stage-3-scan")]
    StartStage3Scan,
    /// Selected update ids.
    ResolveUpdates(Vec<String>),
    GetApiKey,
    SubmitTicket(SupportTicket),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::RequestVitals => "request-vitals",
            Command::RequestPcInfo => "request-pc-info",
            Command::RequestSystemLogs => "request-system-logs",
            Command::StartStage1 => "start-stage-1",
            Command::StartStage2Scan => "start-stage-2-scan",
            Command::ResolveThreat => "resolve-threat",
            Command::StartStage3Scan => "start-stage-3-scan",
            Command::ResolveUpdates(_) => "resolve-updates",
            Command::GetApiKey => "get-api-key",
            Command::SubmitTicket(_) => "submit-ticket",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum CoreEvent {
    VitalsUpdate(VitalsSnapshot),
    PcInfoData(PcInfoSnapshot),
    SystemLogsData(String),
    #[serde(rename = "stage-1-progress")]
    Stage1Progress(String),
    #[serde(rename = "stage-1-complete")]
    Stage1Complete,
    ThreatDetected {
        #[serde(rename = "threatName")]
        threat_name: String,
        #[serde(rename = "threatLocation")]
        threat_location: String,
    },
    #[serde(rename = "scan-2-clean")]
    Scan2Clean,
    ThreatResolved,
    UpdatesFound(Vec<UpdateRecord>),
    UpdatesResolved,
    ApiKey {
        key: String,
    },
    TicketSubmitted,
    TicketFailed {
        reason: String,
    },
    CommandRejected {
        command: String,
        reason: String,
    },
}

impl CoreEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CoreEvent::VitalsUpdate(_) => "vitals-update",
            CoreEvent::PcInfoData(_) => "pc-info-data",
            CoreEvent::SystemLogsData(_) => "system-logs-data",
            CoreEvent::Stage1Progress(_) => "stage-1-progress",
            CoreEvent::Stage1Complete => "stage-1-complete",
            CoreEvent::ThreatDetected { .. } => "threat-detected",
            CoreEvent::Scan2Clean => "scan-2-clean",
            CoreEvent::ThreatResolved => "threat-resolved",
            CoreEvent::UpdatesFound(_) => "updates-found",
            CoreEvent::UpdatesResolved => "updates-resolved",
            CoreEvent::ApiKey { .. } => "api-key",
            CoreEvent::TicketSubmitted => "ticket-submitted",
            CoreEvent::TicketFailed { .. } => "ticket-failed",
            CoreEvent::CommandRejected { .. } => "command-rejected",
        }
    }

    pub fn rejected(command: impl Into<String>, reason: impl ToString) -> Self {
        CoreEvent::CommandRejected {
            command: command.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    command: String,
}

/// Decodes one inbound frame. The command name is checked against the allow-list
/// before the payload is looked at.
pub fn decode_command(text: &str) -> Result<Command, ChannelError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| ChannelError::MalformedFrame(e.to_string()))?;
    if !CAPABILITIES.contains(&envelope.command.as_str()) {
        return Err(ChannelError::UnknownCapability(envelope.command));
    }
    serde_json::from_str(text).map_err(|e| ChannelError::InvalidPayload {
        command: envelope.command,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_commands() -> Vec<Command> {
        vec![
            Command::RequestVitals,
            Command::RequestPcInfo,
            Command::RequestSystemLogs,
            Command::StartStage1,
            Command::StartStage2Scan,
            Command::ResolveThreat,
            Command::StartStage3Scan,
            Command::ResolveUpdates(vec!["KB1".into()]),
            Command::GetApiKey,
            Command::SubmitTicket(SupportTicket {
                subject: "s".into(),
                body: "b".into(),
                contact: None,
            }),
        ]
    }

    #[test]
    fn allow_list_matches_command_set_exactly() {
        let names: Vec<&str> = all_commands().iter().map(Command::name).collect();
        assert_eq!(names, CAPABILITIES);
    }

    #[test]
    fn wire_tag_matches_name() {
        for cmd in all_commands() {
            let v = serde_json::to_value(&cmd).unwrap();
            assert_eq!(v["command"], cmd.name());
        }
    }
}
