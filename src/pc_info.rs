// Host descriptor assembly: local sysinfo facts + external system query, best effort.

use crate::error::DiagError;
use crate::executor::{ActionPayload, RepairAction, RepairExecutor};
use crate::models::{LocalHostFacts, PcInfoSnapshot, SystemQuery, merge_pc_info};
use crate::sysinfo_repo::SysinfoRepo;
use std::sync::Arc;
use tracing::{instrument, warn};

pub struct PcInfoAssembler {
    host: Arc<SysinfoRepo>,
    executor: Arc<dyn RepairExecutor>,
}

/// Parses the system-query tool output. Tolerates leading noise before the JSON object.
pub fn parse_system_query(text: &str) -> Result<SystemQuery, DiagError> {
    let start = text
        .find('{')
        .ok_or_else(|| DiagError::parse("system query", "no JSON object in output"))?;
    serde_json::from_str(text[start..].trim()).map_err(|e| DiagError::parse("system query", e))
}

impl PcInfoAssembler {
    pub fn new(host: Arc<SysinfoRepo>, executor: Arc<dyn RepairExecutor>) -> Self {
        Self { host, executor }
    }

    async fn query(&self) -> Result<SystemQuery, DiagError> {
        match self
            .executor
            .execute(RepairAction::QuerySystem)
            .finish(|_| {})
            .await?
        {
            ActionPayload::Text(text) => parse_system_query(&text),
            other => Err(DiagError::parse(
                "system query",
                format!("unexpected payload {:?}", other),
            )),
        }
    }

    #[instrument(skip(self), fields(operation = "collect_pc_info"))]
    pub async fn collect(&self) -> PcInfoSnapshot {
        let (local, query) = tokio::join!(self.host.local_facts(), self.query());
        let local = local.unwrap_or_else(|e| {
            warn!(error = %e, "local host facts unavailable; using defaults");
            LocalHostFacts {
                arch: std::env::consts::ARCH.into(),
                platform: std::env::consts::OS.into(),
                ..Default::default()
            }
        });
        let query = match query {
            Ok(q) => Some(q),
            Err(e) => {
                warn!(error = %e, "system query failed; using local values only");
                None
            }
        };
        merge_pc_info(&local, query.as_ref())
    }
}
