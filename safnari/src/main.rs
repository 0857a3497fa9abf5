//! `safnari` binary (spec §6): flag/config-file parsing, collaborator
//! wiring, and the exit-code contract (0 success, 1 configuration or
//! fatal scan error).

mod cli;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use safnari_core::{Config, ErrorCode, OutputRecord};
use safnari_output::{default_output_path, OutputWriter};
use safnari_scan::{CancellationToken, RecordSink, ScanCollaborators};

use cli::Cli;

const DEFAULT_CONFIG_FILE: &str = "./safnari.toml";

fn main() -> ExitCode {
    let cli = Cli::parse();
    safnari_core::logging::init(cli.verbosity());

    let config_path = cli
        .config
        .clone()
        .or_else(|| {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.exists().then_some(default)
        });

    let cfg = match Config::load(config_path.as_deref(), &cli.to_overlay()) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(code = e.error_code(), "{e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let output_path = cfg
        .output_path
        .clone()
        .unwrap_or_else(default_output_path);

    let token = CancellationToken::new();
    register_signal_handler(token.clone());

    let writer = OutputWriter::spawn(output_path.clone(), cfg.max_output_file_size, token.clone())?;
    let writer = Arc::new(writer);
    let sink: RecordSink = {
        let writer = writer.clone();
        Arc::new(move |record: OutputRecord| writer.send(record))
    };

    tracing::info!(path = %output_path.display(), "writing evidence stream");

    let outcome = safnari_scan::run_scan(cfg, ScanCollaborators::default(), sink, token)?;

    let writer = Arc::try_unwrap(writer)
        .unwrap_or_else(|_| panic!("output writer still referenced after scan completed"));
    let metrics_record = OutputRecord::Metrics(outcome.metrics.clone());
    writer.send(metrics_record);
    let stats = writer.shutdown();

    tracing::info!(
        files_scanned = outcome.metrics.files_scanned,
        files_processed = outcome.metrics.files_processed,
        lines_written = stats.lines_written,
        rotations = stats.rotations,
        "scan complete"
    );

    if let Some(err) = stats.fatal_error {
        return Err(format!("output rotation failed: {err}").into());
    }
    Ok(())
}

/// Cancels the running scan on Ctrl-C instead of killing the process
/// outright, so in-flight records still get flushed (spec §5).
fn register_signal_handler(token: CancellationToken) {
    let result = ctrlc::set_handler(move || {
        tracing::warn!("received interrupt, cancelling scan");
        token.cancel();
    });
    if let Err(e) = result {
        tracing::warn!(error = %e, "failed to register interrupt handler");
    }
}
