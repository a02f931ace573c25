use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use copc_validator::cli::{Cli, VerbosityLevel};
use copc_validator::config::ConfigManager;
use copc_validator::output::{Output, write_output};
use copc_validator::scanner::{ProgressCallback, ProgressUnit, ScanProgress};
use copc_validator::validator::{ValidationConfig, ValidationEngine};

/// Exit code when at least one check failed
const EXIT_CHECK_FAILED: u8 = 1;
/// Exit code when no report could be produced
const EXIT_FATAL: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose, cli.quiet);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_keep_alive(Duration::from_secs(10))
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("Error: failed to start runtime: {}", error);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::from(EXIT_CHECK_FAILED),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

/// Log to stderr; `RUST_LOG` overrides the level picked from the flags
fn init_tracing(verbose: bool, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Validate the source named on the command line. Returns whether any check failed.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = ConfigManager::load_config(&cli)
        .await
        .context("Failed to load configuration")?;

    let engine = ValidationEngine::new(ValidationConfig {
        scan: ConfigManager::scan_options(&config),
        mini: config.output.mini,
        http: ConfigManager::http_config(&config),
        validation_timeout: None,
    });

    let progress = config.scan.show_progress.then(progress_printer);
    let report = engine
        .validate_named(&cli.report_name(), &cli.source, progress)
        .await
        .with_context(|| format!("Failed to validate {}", cli.source))?;
    if config.scan.show_progress {
        eprintln!();
    }

    let verbosity = VerbosityLevel::from_flags(config.output.verbose, config.output.quiet);
    let rendered = Output::new(verbosity)
        .render(&report, config.output.format)
        .context("Failed to serialize report")?;
    write_output(&rendered, cli.output.as_deref())
        .await
        .context("Failed to write report")?;

    Ok(report.has_failures())
}

fn progress_printer() -> ProgressCallback {
    Arc::new(|progress: ScanProgress| {
        let unit = match progress.unit {
            ProgressUnit::Nodes => "nodes",
            ProgressUnit::Points => "points",
        };
        let mut stderr = std::io::stderr();
        let _ = write!(
            stderr,
            "\rScanned {}/{} {}",
            progress.completed, progress.total, unit
        );
        let _ = stderr.flush();
    })
}
