use anyhow::Result;
use pcmedic::channel::{Dispatcher, DispatcherDeps};
use pcmedic::config::{self, ExecutorMode};
use pcmedic::executor::{CommandExecutor, RepairExecutor, SimulatedExecutor};
use pcmedic::notifier::Notifier;
use pcmedic::pc_info::PcInfoAssembler;
use pcmedic::pipeline::RepairPipeline;
use pcmedic::secrets::KeyStore;
use pcmedic::sysinfo_repo::SysinfoRepo;
use pcmedic::vitals::VitalsSampler;
use pcmedic::{routes, version};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "failed to load .env"),
    }

    let app_config = config::AppConfig::load()?;
    tracing::info!(name = version::NAME, version = version::VERSION, "starting");

    let sysinfo_repo = Arc::new(SysinfoRepo::new());
    let sampler = Arc::new(VitalsSampler::new(
        sysinfo_repo.clone(),
        app_config.vitals.mock_temperature_base_c,
    )?);

    let executor: Arc<dyn RepairExecutor> = match app_config.executor.mode {
        ExecutorMode::Simulated => {
            tracing::warn!("executor.mode = simulated; no repair actions touch the OS");
            Arc::new(SimulatedExecutor::from_config(
                &app_config.executor.simulated,
            ))
        }
        ExecutorMode::Command => Arc::new(CommandExecutor::new(
            app_config.executor.commands.clone(),
        )),
    };

    let keys = KeyStore::from_env(&app_config.secrets.api_key_env);
    if !keys.is_present() {
        tracing::warn!(
            env = %app_config.secrets.api_key_env,
            "API key not set; get-api-key will return a placeholder"
        );
    }

    let dispatcher = Dispatcher::new(DispatcherDeps {
        sampler,
        pc_info: Arc::new(PcInfoAssembler::new(sysinfo_repo, executor.clone())),
        pipeline: RepairPipeline::new(executor.clone(), app_config.pipeline.strict_order),
        executor,
        notifier: Arc::new(Notifier::from_config(&app_config.notifier)?),
        keys,
    });

    let app = routes::app(dispatcher, app_config.channel.clone());
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    tracing::info!("Received shutdown signal");
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("Received shutdown signal");
}
