// Executor backed by configured OS commands (tokio::process).
// stdout lines are forwarded as progress; payload actions read JSON from the last line.

use super::{
    ActionKind, ActionPayload, OutcomeSender, OutcomeStream, RepairAction, RepairExecutor,
};
use crate::config::ExecutorCommands;
use crate::error::DiagError;
use crate::models::{ScanReport, UpdateRecord};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, instrument};

const STDERR_TAIL_CHARS: usize = 400;

pub struct CommandExecutor {
    commands: ExecutorCommands,
}

impl CommandExecutor {
    pub fn new(commands: ExecutorCommands) -> Self {
        Self { commands }
    }
}

const ENV_THREAT_NAME: &str = "PCMEDIC_THREAT_NAME";
const ENV_THREAT_LOCATION: &str = "PCMEDIC_THREAT_LOCATION";
const ENV_UPDATE_IDS: &str = "PCMEDIC_UPDATE_IDS";

/// Action data handed to the child as environment variables. The configured argv is
/// never extended, so the data cannot be parsed as script text.
fn action_env(action: &RepairAction) -> Vec<(&'static str, String)> {
    match action {
        RepairAction::RemoveThreat(t) => vec![
            (ENV_THREAT_NAME, t.name.clone()),
            (ENV_THREAT_LOCATION, t.location.clone()),
        ],
        RepairAction::InstallUpdates(ids) => vec![(ENV_UPDATE_IDS, ids.join(","))],
        _ => Vec::new(),
    }
}

/// Whether stdout lines are progress chatter (true) or the payload itself.
fn streams_progress(kind: ActionKind) -> bool {
    !matches!(kind, ActionKind::ReadSystemLogs | ActionKind::QuerySystem)
}

fn last_line(lines: &[String]) -> Option<&str> {
    lines
        .iter()
        .rev()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
}

/// Turns captured stdout into the action's payload.
pub(super) fn parse_payload(kind: ActionKind, lines: &[String]) -> Result<ActionPayload, DiagError> {
    match kind {
        ActionKind::QuickScan => {
            let line = last_line(lines).ok_or_else(|| DiagError::parse("scan report", "no output"))?;
            let report: ScanReport =
                serde_json::from_str(line).map_err(|e| DiagError::parse("scan report", e))?;
            Ok(ActionPayload::Scan(report))
        }
        ActionKind::ScanUpdates => {
            let Some(line) = last_line(lines) else {
                return Ok(ActionPayload::Updates(Vec::new()));
            };
            let updates: Vec<UpdateRecord> =
                serde_json::from_str(line).map_err(|e| DiagError::parse("update list", e))?;
            Ok(ActionPayload::Updates(updates))
        }
        ActionKind::ReadSystemLogs | ActionKind::QuerySystem => {
            Ok(ActionPayload::Text(lines.join("\n")))
        }
        _ => Ok(ActionPayload::None),
    }
}

fn tail(s: &str) -> &str {
    let s = s.trim();
    match s.char_indices().rev().nth(STDERR_TAIL_CHARS - 1) {
        Some((i, _)) => &s[i..],
        None => s,
    }
}

#[instrument(skip(tx, argv, env), fields(executor = "command", action = %kind))]
async fn run(
    tx: OutcomeSender,
    kind: ActionKind,
    argv: Vec<String>,
    env: Vec<(&'static str, String)>,
) {
    let Some((program, args)) = argv.split_first() else {
        tx.failure("empty command").await;
        return;
    };
    let mut child = match Command::new(program)
        .args(args)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(c) => c,
        Err(e) => {
            tx.failure(format!("spawn {}: {}", program, e)).await;
            return;
        }
    };

    let stderr_task = child.stderr.take().map(|mut stderr| {
        tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        })
    });

    let mut lines = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        let mut reader = BufReader::new(stdout).lines();
        loop {
            match reader.next_line().await {
                Ok(Some(line)) => {
                    if streams_progress(kind) && !line.trim().is_empty() {
                        tx.progress(line.trim()).await;
                    }
                    lines.push(line);
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "stdout read failed");
                    break;
                }
            }
        }
    }

    let status = match child.wait().await {
        Ok(s) => s,
        Err(e) => {
            tx.failure(format!("wait {}: {}", program, e)).await;
            return;
        }
    };
    let stderr = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };

    if !status.success() {
        let detail = tail(&stderr);
        let reason = if detail.is_empty() {
            format!("{} exited with {}", program, status)
        } else {
            format!("{} exited with {}: {}", program, status, detail)
        };
        tx.failure(reason).await;
        return;
    }

    match parse_payload(kind, &lines) {
        Ok(payload) => tx.success(payload).await,
        Err(e) => tx.failure(e.to_string()).await,
    }
}

impl RepairExecutor for CommandExecutor {
    fn execute(&self, action: RepairAction) -> OutcomeStream {
        let kind = action.kind();
        let Some(base) = self.commands.argv(kind) else {
            return OutcomeStream::failed(kind, "no command configured");
        };
        let argv = base.to_vec();
        let env = action_env(&action);
        let (tx, stream) = OutcomeStream::channel(kind);
        tokio::spawn(run(tx, kind, argv, env));
        stream
    }
}
