use tokio::sync::broadcast;

use certsync_core::Config;
use certsync_engine::{pipeline, SyncMode, SyncReport};

use crate::error::{io_err, DaemonError};
use crate::scheduler::{RunStats, Scheduler};

/// How a [`run`] ended.
#[derive(Debug)]
pub enum Completion {
    /// Scheduling disabled: exactly one invocation ran and succeeded.
    Once(SyncReport),
    /// Scheduling enabled: the loop ran until a termination signal.
    Stopped(RunStats),
}

/// Install tracing, build a single-threaded runtime and block on [`run`].
pub fn start_blocking(
    config: &Config,
    mode: SyncMode,
    dry_run: bool,
) -> Result<Completion, DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio runtime", e))?;
    runtime.block_on(run(config, mode, dry_run))
}

/// Run once, or loop on the configured schedule when `[daemon] enabled`.
///
/// In one-shot mode the invocation's error is returned. In scheduled mode
/// invocation errors are logged and only signal-handler failures surface.
pub async fn run(config: &Config, mode: SyncMode, dry_run: bool) -> Result<Completion, DaemonError> {
    if !config.daemon.enabled {
        let report = pipeline::run(config, mode, dry_run).await?;
        return Ok(Completion::Once(report));
    }

    let scheduler = Scheduler::from_config(&config.daemon);
    let shutdown = scheduler.shutdown_handle();
    let signal_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(signal_task(shutdown))
    };

    tracing::info!(%mode, dry_run, "running as daemon");
    let stats = scheduler.run(|| pipeline::run(config, mode, dry_run)).await;

    let _ = shutdown.send(());
    handle_join("signal_handler", signal_handle.await)?;
    Ok(Completion::Stopped(stats))
}

/// Forward SIGINT/SIGTERM to the shutdown channel. Exits quietly when the
/// channel fires first.
async fn signal_task(shutdown: broadcast::Sender<()>) -> Result<(), DaemonError> {
    let mut shutdown_rx = shutdown.subscribe();
    tokio::select! {
        _ = shutdown_rx.recv() => Ok(()),
        signal = wait_for_signal() => {
            let name = signal?;
            tracing::info!(signal = name, "shutting down after the current run");
            let _ = shutdown.send(());
            Ok(())
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<&'static str, DaemonError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).map_err(|e| io_err("SIGTERM handler", e))?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.map_err(|e| io_err("ctrl-c handler", e))?;
            Ok("SIGINT")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<&'static str, DaemonError> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| io_err("ctrl-c handler", e))?;
    Ok("ctrl-c")
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Join {
            task,
            reason: err.to_string(),
        }),
    }
}

/// `RUST_LOG`-driven subscriber on stderr; also captures `log` records from
/// the engine. Safe to call more than once.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
