use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tracing::{info, warn};

use kiosk_core::browser::ChromiumController;
use kiosk_core::memory::SystemMemoryMonitor;
use kiosk_core::{
    HttpProbe, KioskConfig, ResilienceManager, RotationScheduler, UrlCatalog, VisitTelemetry,
};

use crate::{AppError, Cli, Result};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Restrict the rotation to a single catalog category
    #[arg(long)]
    pub category: Option<String>,
    /// Run the browser with a visible window
    #[arg(long, default_value_t = false)]
    pub headed: bool,
}

pub async fn execute(cli: &Cli, args: &RunArgs) -> Result<()> {
    let mut config = KioskConfig::load_or_default(&cli.config);
    if args.headed {
        config.chromium.headless = false;
    }
    let catalog = UrlCatalog::load_or_default(&cli.urls);
    let urls = match &args.category {
        Some(name) => catalog.category(name).to_vec(),
        None => catalog.flattened(),
    };

    let telemetry = match VisitTelemetry::new(
        &config.observability.failure_log,
        &config.observability.telemetry_db,
    ) {
        Ok(telemetry) => Some(Arc::new(telemetry)),
        Err(err) => {
            warn!(error = %err, "telemetry unavailable, continuing without it");
            None
        }
    };

    let probe = HttpProbe::new(
        Duration::from_secs(config.resilience.probe_timeout_secs),
        config.network.user_agents.clone(),
    )?;
    let controller = ChromiumController::new(
        config.chromium.clone(),
        Duration::from_secs(config.resilience.post_load_wait_secs),
    );
    let resilience = ResilienceManager::new(
        config.resilience.clone(),
        &config.network,
        Box::new(controller),
        Box::new(probe),
        Box::new(SystemMemoryMonitor::new()),
        telemetry,
    );
    let mut scheduler = RotationScheduler::new(&config, urls, resilience);

    // Cancellation is observable at every await point: the run future is
    // simply dropped when a signal arrives, then shutdown persists the
    // final snapshot and stops the browser best-effort.
    let outcome = tokio::select! {
        result = scheduler.run() => Some(result),
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            None
        }
    };
    scheduler.shutdown().await;

    match outcome {
        Some(Err(err)) => Err(AppError::Rotation(err)),
        Some(Ok(reason)) => {
            info!(?reason, "rotation finished");
            Ok(())
        }
        None => Ok(()),
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = ctrl_c.await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
