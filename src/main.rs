//! Promptdrop: batch prompt files from a directory into an image generation backend.

mod cli;

use crate::cli::Cli;
use clap::Parser;
use promptdrop_backend::{BackendHandle, DryRunBackend, HttpBackend};
use promptdrop_config::{BackendKind, Config};
use promptdrop_driver::{BatchDriver, DriverOptions};
use promptdrop_prompts::PromptDirectory;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Exit status after a second interrupt, as a shell reports death by SIGINT.
const FORCED_EXIT_CODE: i32 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let config = match Config::load(cli.config.as_deref(), &cli.overrides()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = ?err, "Invalid configuration");
            return ExitCode::FAILURE;
        },
    };
    for flag in cli.ignored_flags(config.backend) {
        tracing::warn!(flag, backend = %config.backend, "Option has no effect with this backend");
    }
    let Some(backend) = backend(&config) else {
        return ExitCode::FAILURE;
    };
    let directory = match PromptDirectory::open(&config.prompts_dir, &config.extension) {
        Ok(directory) => directory,
        Err(err) => {
            tracing::error!(path = %config.prompts_dir.display(), error = ?err, "Cannot use prompts directory");
            return ExitCode::FAILURE;
        },
    };
    let options = DriverOptions {
        batch_size: config.batch_size(),
        delete_after_success: config.delete_after_success,
        continuous: config.continuous,
        rescan_interval: Duration::from_secs(config.rescan_interval_secs),
    };
    let driver = BatchDriver::new(directory, backend, options);
    watch_signals(driver.shutdown_token());

    match driver.run().await {
        Ok(summary) => {
            tracing::info!(
                scans = summary.scans,
                processed = summary.processed,
                failed = summary.failed,
                deleted = summary.deleted,
                prompts = summary.prompts,
                "Done"
            );
            ExitCode::SUCCESS
        },
        Err(err) => {
            tracing::error!(error = ?err, "Batch processing aborted");
            ExitCode::FAILURE
        },
    }
}

fn backend(config: &Config) -> Option<BackendHandle> {
    match config.backend {
        BackendKind::DryRun => Some(Arc::new(DryRunBackend::new())),
        BackendKind::Http => match HttpBackend::new(config.http.clone(), config.generation.clone()) {
            Ok(backend) => Some(Arc::new(backend)),
            Err(err) => {
                tracing::error!(error = ?err, "Invalid HTTP backend settings");
                None
            },
        },
        BackendKind::Queue => {
            tracing::error!(
                "The queue backend needs a generation worker in the same process; \
                 use `--backend http` to reach a running server instead"
            );
            None
        },
    }
}

/// First interrupt stops the driver after the current file; a second one
/// exits straight away.
fn watch_signals(token: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::warn!("Interrupted; finishing the current file (interrupt again to exit immediately)");
        token.cancel();
        shutdown_signal().await;
        tracing::warn!("Interrupted again; exiting");
        std::process::exit(FORCED_EXIT_CODE);
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(err) => {
                tracing::warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
