// Typed errors crossing module seams. The service shell uses anyhow.

use crate::executor::ActionKind;
use crate::models::RepairStage;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiagError {
    /// An external action errored or returned malformed output.
    #[error("{action} failed: {reason}")]
    Executor { action: ActionKind, reason: String },

    /// Two CPU samples with no ticks between them.
    #[error("cpu tick window is empty")]
    ZeroTickWindow,

    #[error("malformed {what}: {reason}")]
    Parse { what: &'static str, reason: String },

    #[error("notification transport failed: {0}")]
    Transport(String),

    #[error("{requested} cannot start: {reason}")]
    StageOutOfOrder {
        requested: RepairStage,
        reason: &'static str,
    },

    #[error("{requested} cannot start while {running} is running")]
    StageBusy {
        requested: RepairStage,
        running: RepairStage,
    },
}

impl DiagError {
    pub fn executor(action: ActionKind, reason: impl Into<String>) -> Self {
        Self::Executor {
            action,
            reason: reason.into(),
        }
    }

    pub fn parse(what: &'static str, reason: impl ToString) -> Self {
        Self::Parse {
            what,
            reason: reason.to_string(),
        }
    }
}

/// Frames refused at the trust boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("capability '{0}' is not exposed")]
    UnknownCapability(String),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("invalid payload for '{command}': {reason}")]
    InvalidPayload { command: String, reason: String },
}

impl ChannelError {
    /// Command name to attach to the rejection event.
    pub fn command(&self) -> &str {
        match self {
            ChannelError::UnknownCapability(name) => name,
            ChannelError::MalformedFrame(_) => "unknown",
            ChannelError::InvalidPayload { command, .. } => command,
        }
    }
}
