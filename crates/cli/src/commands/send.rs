//! `send` command implementation.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::SendArgs;
use crate::error::CliError;
use crate::pipeline::{RecordParser, SendStats};

/// Execute the `send` command
pub async fn run_send(args: &SendArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    for warning in config_loader::ConfigLoader::warnings(&blueprint) {
        warn!(warning = %warning, "Configuration warning");
    }

    info!(sinks = blueprint.sinks.len(), "Configuration loaded");

    let input = open_input(&args.input).await?;
    let stats = send_records(args, blueprint.sinks, input, shutdown_signal()).await?;

    if args.json {
        let json = serde_json::to_string_pretty(&stats).context("Failed to serialize stats")?;
        println!("{}", json);
    } else {
        stats.print_summary();
    }

    info!(
        records = stats.records_sent,
        invalid = stats.invalid_lines,
        duration_secs = stats.duration.as_secs_f64(),
        "Send finished"
    );
    Ok(())
}

async fn open_input(path: &Path) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(path)
        .await
        .map_err(CliError::from)
        .with_context(|| format!("Failed to open input {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Read records from `input` and deliver them until EOF or `shutdown`
pub async fn send_records<R, F>(
    args: &SendArgs,
    sinks: Vec<contracts::SinkConfig>,
    input: R,
    shutdown: F,
) -> Result<SendStats>
where
    R: AsyncBufRead + Unpin,
    F: std::future::Future<Output = ()>,
{
    let started = Instant::now();
    let (tx, rx) = mpsc::channel(args.buffer_size.max(1));

    let dispatcher = dispatcher::create_dispatcher(sinks, rx)
        .await
        .map_err(|e| CliError::dispatch(e.to_string()))?;
    let dispatch_task = dispatcher.spawn();

    let parser = RecordParser::new(&args.timestamp_field);
    let mut stats = SendStats::default();
    let mut lines = input.lines();
    let mut read_error = None;

    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            biased;
            _ = &mut shutdown => {
                warn!("Received shutdown signal, draining sinks...");
                stats.interrupted = true;
                break;
            }
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                read_error = Some(CliError::from(e));
                break;
            }
        };
        stats.lines_read += 1;

        match parser.parse_line(stats.lines_read as usize, &line) {
            Ok(Some(item)) => {
                if tx.send(item).await.is_err() {
                    read_error = Some(CliError::dispatch("dispatcher stopped early"));
                    break;
                }
            }
            Ok(None) => {}
            Err(e) if args.strict => {
                read_error = Some(e);
                break;
            }
            Err(e) => {
                stats.invalid_lines += 1;
                warn!(error = %e, "Skipping invalid line");
            }
        }
    }

    // Close input channel so the dispatcher drains and stops
    drop(tx);
    let report = dispatch_task
        .await
        .map_err(|e| CliError::dispatch(format!("dispatcher task failed: {e}")))?;
    debug!(fanout = %report.fanout, "Fan-out summary");

    stats.duration = started.elapsed();
    stats.absorb(report);

    match read_error {
        Some(e) => Err(e.into()),
        None => Ok(stats),
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
