use crate::executor::ActionKind;
use crate::models::{ThreatRecord, UpdateRecord};
use axum::http::HeaderValue;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub channel: ChannelConfig,
    #[serde(default)]
    pub vitals: VitalsConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// Outbound events queued per session before emitters wait.
    pub event_buffer: usize,
    pub ping_interval_secs: u64,
    /// Max time to wait for a send before treating the client as dead.
    pub send_timeout_secs: u64,
    /// Exact `Origin` values allowed to open the channel. Upgrades without a
    /// listed Origin get 403.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VitalsConfig {
    #[serde(default = "default_temperature_base_c")]
    pub mock_temperature_base_c: f64,
}

fn default_temperature_base_c() -> f64 {
    38.0
}

impl Default for VitalsConfig {
    fn default() -> Self {
        Self {
            mock_temperature_base_c: default_temperature_base_c(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Reject stage commands issued before the previous stage reached its terminal event.
    #[serde(default = "default_strict_order")]
    pub strict_order: bool,
}

fn default_strict_order() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strict_order: default_strict_order(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorMode {
    Simulated,
    Command,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    pub mode: ExecutorMode,
    #[serde(default)]
    pub simulated: SimulatedConfig,
    #[serde(default)]
    pub commands: ExecutorCommands,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimulatedConfig {
    #[serde(default)]
    pub step_delay_ms: u64,
    /// Threat reported by the quick scan; clean when unset.
    pub threat: Option<ThreatRecord>,
    /// Replaces the default update list when set.
    pub updates: Option<Vec<UpdateRecord>>,
    #[serde(default)]
    pub failing: Vec<ActionKind>,
}

/// argv per action for `mode = "command"`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorCommands {
    pub flush_dns: Option<Vec<String>>,
    pub reset_network_stack: Option<Vec<String>>,
    pub restart_audio_service: Option<Vec<String>>,
    pub quick_scan: Option<Vec<String>>,
    pub remove_threat: Option<Vec<String>>,
    pub scan_updates: Option<Vec<String>>,
    pub install_updates: Option<Vec<String>>,
    pub read_system_logs: Option<Vec<String>>,
    pub query_system: Option<Vec<String>>,
}

impl ExecutorCommands {
    pub fn argv(&self, kind: ActionKind) -> Option<&[String]> {
        let v = match kind {
            ActionKind::FlushDns => &self.flush_dns,
            ActionKind::ResetNetworkStack => &self.reset_network_stack,
            ActionKind::RestartAudioService => &self.restart_audio_service,
            ActionKind::QuickScan => &self.quick_scan,
            ActionKind::RemoveThreat => &self.remove_threat,
            ActionKind::ScanUpdates => &self.scan_updates,
            ActionKind::InstallUpdates => &self.install_updates,
            ActionKind::ReadSystemLogs => &self.read_system_logs,
            ActionKind::QuerySystem => &self.query_system,
        };
        v.as_deref()
    }

    fn configured(&self) -> impl Iterator<Item = (ActionKind, &[String])> {
        [
            ActionKind::FlushDns,
            ActionKind::ResetNetworkStack,
            ActionKind::RestartAudioService,
            ActionKind::QuickScan,
            ActionKind::RemoveThreat,
            ActionKind::ScanUpdates,
            ActionKind::InstallUpdates,
            ActionKind::ReadSystemLogs,
            ActionKind::QuerySystem,
        ]
        .into_iter()
        .filter_map(|k| self.argv(k).map(|a| (k, a)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    /// Ticket webhook; submissions fail with a transport error when unset.
    pub webhook_url: Option<String>,
    #[serde(default = "default_notifier_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_notifier_timeout_ms() -> u64 {
    5000
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_ms: default_notifier_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecretsConfig {
    /// Environment variable holding the presentation layer's API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(!self.server.host.is_empty(), "server.host must be non-empty");
        anyhow::ensure!(
            self.channel.event_buffer > 0,
            "channel.event_buffer must be > 0, got {}",
            self.channel.event_buffer
        );
        anyhow::ensure!(
            self.channel.ping_interval_secs > 0,
            "channel.ping_interval_secs must be > 0, got {}",
            self.channel.ping_interval_secs
        );
        anyhow::ensure!(
            self.channel.send_timeout_secs > 0,
            "channel.send_timeout_secs must be > 0, got {}",
            self.channel.send_timeout_secs
        );
        anyhow::ensure!(
            !self.channel.allowed_origins.is_empty(),
            "channel.allowed_origins must list at least one origin"
        );
        for origin in &self.channel.allowed_origins {
            anyhow::ensure!(
                (origin.starts_with("http://") || origin.starts_with("https://"))
                    && HeaderValue::from_str(origin).is_ok(),
                "channel.allowed_origins entries must be http(s) origins, got {:?}",
                origin
            );
        }
        anyhow::ensure!(
            self.vitals.mock_temperature_base_c.is_finite(),
            "vitals.mock_temperature_base_c must be finite"
        );
        for (kind, argv) in self.executor.commands.configured() {
            anyhow::ensure!(
                argv.first().is_some_and(|p| !p.is_empty()),
                "executor.commands.{} must name a program",
                kind
            );
        }
        if let Some(url) = &self.notifier.webhook_url {
            anyhow::ensure!(
                url.starts_with("http://") || url.starts_with("https://"),
                "notifier.webhook_url must be an http(s) URL, got {}",
                url
            );
        }
        anyhow::ensure!(
            self.notifier.timeout_ms > 0,
            "notifier.timeout_ms must be > 0, got {}",
            self.notifier.timeout_ms
        );
        anyhow::ensure!(
            !self.secrets.api_key_env.is_empty(),
            "secrets.api_key_env must be non-empty"
        );
        Ok(())
    }
}
