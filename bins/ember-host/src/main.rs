use anyhow::{Context, Result};
use clap::Parser;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use ember_logging::{HandlerConfig, LoggingAddresses, LoggingConfigurator};
use ember_process_management::{
    readiness, Configuration, LoggerHint, ProcessHandle, ProcessLifecycleController, StopOutcome,
};

/// Ember host - boots an embedded server and manages its logging
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log directory (overrides config)
    #[arg(short, long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Logger hint: default, compact or json (overrides config)
    #[arg(long)]
    logger_hint: Option<LoggerHint>,

    /// Boot a host controller instead of a standalone server
    #[arg(long)]
    host_controller: bool,

    /// Seconds to wait for server.log to appear
    #[arg(long, default_value_t = 30)]
    startup_timeout: u64,

    /// Install a file handler with this name while running
    #[arg(long, value_name = "NAME")]
    handler: Option<String>,

    /// File the extra handler writes to (relative to the log directory)
    #[arg(long, value_name = "FILE", default_value = "handler.log")]
    handler_file: PathBuf,

    /// Formatter pattern of the extra handler
    #[arg(long, default_value = "[ember-host] %d{HH:mm:ss,SSS} %-5p [%c] (%t) %s%e%n")]
    handler_pattern: String,

    /// Run duration in seconds (default: until SIGINT/SIGTERM)
    #[arg(long)]
    run_duration: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.debug);

    info!("Starting ember host");
    let config = load_configuration(&args)?;
    info!(
        log_directory = %config.log_directory.display(),
        logger_hint = %config.logger_hint,
        "Configuration loaded"
    );

    let controller = ProcessLifecycleController::new();
    let mut handle = if args.host_controller {
        controller.create_host_controller(config)?
    } else {
        controller.create(config)?
    };

    let timeout = Duration::from_secs(args.startup_timeout);
    if let Err(e) = controller
        .start(&mut handle, readiness::server_log_exists(), timeout)
        .await
    {
        error!("Failed to start server: {}", e);
        report_stop(controller.stop(&mut handle).await);
        return Err(e).context("Start failed");
    }
    info!(
        process_id = %handle.id(),
        server_log = %handle.server_log_path().display(),
        "Server running"
    );

    let result = run(&args, &handle).await;

    info!("Shutting down server...");
    report_stop(controller.stop(&mut handle).await);
    result
}

async fn run(args: &Args, handle: &ProcessHandle) -> Result<()> {
    let addresses = LoggingAddresses::for_kind(handle.kind())?;
    let configurator = LoggingConfigurator::new(handle.management_client()?);

    let installed = match &args.handler {
        Some(name) => {
            let handler_address = addresses.file_handler(name)?;
            let file_path = handle.configuration().log_directory.join(&args.handler_file);
            let config = HandlerConfig::new(name, "INFO", &args.handler_pattern, file_path);
            configurator
                .configure_file_handler(addresses.root_logger(), &handler_address, &config)
                .context("Failed to configure handler")?;
            info!(handler = %name, path = %config.file_path.display(), "Handler installed");
            if let Some(context) = handle.log_context() {
                context
                    .logger("org.ember.host")
                    .info(format!("Handler {} installed", name));
            }
            Some((name.clone(), handler_address))
        }
        None => None,
    };

    wait_for_shutdown(args.run_duration, wait_for_shutdown_signal()).await;

    if let Some((name, handler_address)) = installed {
        configurator
            .remove_file_handler(addresses.root_logger(), &handler_address, &name)
            .context("Failed to remove handler")?;
        info!(handler = %name, "Handler removed");
    }
    Ok(())
}

/// Sleep for `run_duration` seconds, or until `signal` resolves. A failing
/// signal wait is logged and treated as a shutdown request.
async fn wait_for_shutdown<F>(run_duration: Option<u64>, signal: F)
where
    F: Future<Output = Result<()>>,
{
    match run_duration {
        Some(seconds) => {
            info!("Running for {} seconds", seconds);
            tokio::time::sleep(Duration::from_secs(seconds)).await;
        }
        None => {
            if let Err(e) = signal.await {
                error!("Signal handling failed, shutting down: {:#}", e);
            }
        }
    }
}

fn load_configuration(args: &Args) -> Result<Configuration> {
    let mut builder = Configuration::builder();
    if let Some(path) = &args.config {
        let loaded = Configuration::load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        builder = builder
            .logger_hint(loaded.logger_hint)
            .log_directory(loaded.log_directory)
            .console_capture_enabled(loaded.console_capture_enabled);
    }
    if let Some(dir) = &args.log_dir {
        builder = builder.log_directory(dir);
    }
    if let Some(hint) = args.logger_hint {
        builder = builder.logger_hint(hint);
    }
    Ok(builder.build()?)
}

fn report_stop(outcome: StopOutcome) {
    match outcome {
        StopOutcome::Stopped => info!("Server stopped"),
        StopOutcome::AlreadyStopped => info!("Server was already stopped"),
        StopOutcome::StoppedWithErrors(errors) => {
            for e in errors {
                warn!("{}", e);
            }
        }
    }
}

fn initialize_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT signal");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C signal");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_signal_wait_still_returns() {
        let signal = async { Err(anyhow::anyhow!("no signal support")) };
        tokio::time::timeout(Duration::from_secs(5), wait_for_shutdown(None, signal))
            .await
            .expect("shutdown wait should return after a signal error");
    }

    #[tokio::test]
    async fn test_run_duration_ignores_signal() {
        let signal = std::future::pending::<Result<()>>();
        tokio::time::timeout(Duration::from_secs(5), wait_for_shutdown(Some(0), signal))
            .await
            .expect("a zero run duration should return immediately");
    }

    #[test]
    fn test_cli_overrides_configuration() {
        let args = Args::parse_from([
            "ember-host",
            "--log-dir",
            "/tmp/ember-log",
            "--logger-hint",
            "json",
        ]);
        let config = load_configuration(&args).unwrap();
        assert_eq!(config.log_directory, PathBuf::from("/tmp/ember-log"));
        assert_eq!(config.logger_hint, LoggerHint::Json);
    }
}
