use clap::{Parser, Subcommand};
use kanflow_core::api::{self, ApiServer};
use kanflow_core::config::Config;
use kanflow_core::constants::SHUTDOWN_GRACE_SECS;
use kanflow_core::{board, columns, registry, runner, spec_generator};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "kanflow-core", about = "Board-driven multi-agent task orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Override the health/control server port.
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the spec generator loop, the task runner loop, and the health server.
    Run,
    /// Produce a one-shot backup under `exports/` and exit.
    Export,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    if let Some(port) = cli.port {
        config.api.port = port;
    }

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Export => export_once(config).await,
    }
}

async fn export_once(config: Config) -> anyhow::Result<()> {
    let store = board::from_config(&config.board)?;
    let summary = api::export_backup(&store, &config.paths, 0, Default::default()).await?;
    info!(
        path = %summary.path,
        task_results = summary.task_results,
        backlog_projects = summary.backlog_projects,
        columns = summary.columns,
        "backup exported"
    );
    Ok(())
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!("starting kanflow-core");

    let store = board::from_config(&config.board)?;
    let resolved_columns = columns::bootstrap(&store).await?;
    let agent_registry = Arc::new(registry::AgentRegistry::load(&config.runner.agent_registry_path).await?);

    let spec_generator = spec_generator::build(&config, store.clone());
    let task_runner = runner::build(&config, store.clone(), agent_registry.clone(), resolved_columns);
    let api_server = ApiServer::new(
        config.api.clone(),
        store.clone(),
        agent_registry.clone(),
        task_runner.clone(),
        config.paths.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let generator_handle = tokio::spawn(spec_generator.clone().run(shutdown_rx.clone()));
    let runner_handle = tokio::spawn(task_runner.clone().run(shutdown_rx.clone()));
    let api_handle = tokio::spawn(async move {
        if let Err(err) = api_server.run().await {
            error!(error = %err, "health and control server exited with an error");
        }
    });

    let reload_registry = agent_registry.clone();
    tokio::spawn(async move {
        let Ok(mut hangup) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) else {
            warn!("SIGHUP handling unavailable on this platform");
            return;
        };
        loop {
            hangup.recv().await;
            info!("SIGHUP received, reloading agent registry");
            if let Err(err) = reload_registry.reload().await {
                warn!(error = %err, "agent registry reload failed");
            }
        }
    });

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, draining active work");

    let _ = shutdown_tx.send(true);
    task_runner.terminate_active(Duration::from_secs(SHUTDOWN_GRACE_SECS)).await;

    api_handle.abort();
    let _ = generator_handle.await;
    let _ = runner_handle.await;

    info!("shutdown complete");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
