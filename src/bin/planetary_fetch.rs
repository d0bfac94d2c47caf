use std::num::NonZeroUsize;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use planetary_fetch::app::{App, RunOptions};
use planetary_fetch::catalog::OdeHttpClient;
use planetary_fetch::config::{ConfigLoader, LogLevel};
use planetary_fetch::domain::ProductQuery;
use planetary_fetch::downloader::CancelToken;
use planetary_fetch::error::FetchError;
use planetary_fetch::output::{JsonOutput, OutputMode, SilentProgress, TerminalProgress};

const INTERRUPTED_EXIT_CODE: u8 = 130;

#[derive(Parser)]
#[command(name = "planetary-fetch")]
#[command(about = "Download PDS data products from the ODE catalog based on a part of the PDS ID")]
#[command(version, author)]
struct Cli {
    /// PDS ID to download, (*) is allowed
    #[arg(long)]
    ids: String,

    /// Directory where the data products are created
    #[arg(long = "output_dir", alias = "output-dir")]
    output_dir: Utf8PathBuf,

    /// Max workers to download data [default: 3]
    #[arg(long = "max_workers", alias = "max-workers")]
    max_workers: Option<NonZeroUsize>,

    /// Log level
    #[arg(long, value_enum, ignore_case = true, default_value_t = LogLevel::Info)]
    level: LogLevel,

    /// Disable the progress line
    #[arg(long)]
    no_progress: bool,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,

    /// JSON config file (defaults to planetary-fetch.json when present)
    #[arg(long)]
    config: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<FetchError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &FetchError) -> u8 {
    match error {
        FetchError::InvalidQuery(_)
        | FetchError::InvalidWorkerCount(_)
        | FetchError::ConfigRead(_)
        | FetchError::ConfigParse(_) => 2,
        FetchError::CatalogUnavailable(_) | FetchError::MalformedResponse(_) => 3,
        FetchError::LedgerRead(_) | FetchError::LedgerParse(_) => 4,
        FetchError::Interrupted => INTERRUPTED_EXIT_CODE,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cli.level.directive()))
        .into_diagnostic()?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancelToken::new();
    let handler_cancel = cancel.clone();
    ctrlc::set_handler(move || {
        if handler_cancel.cancel() {
            std::process::exit(i32::from(INTERRUPTED_EXIT_CODE));
        }
        tracing::warn!("You pressed Ctrl+C; stopping downloads, press again to exit now");
    })
    .into_diagnostic()?;

    let resolved = ConfigLoader::resolve(cli.config.as_deref())?;
    let query: ProductQuery = cli.ids.parse()?;
    let options = RunOptions {
        output_dir: cli.output_dir,
        max_workers: cli
            .max_workers
            .map(NonZeroUsize::get)
            .unwrap_or(resolved.max_workers),
        cancel,
    };
    tracing::info!(
        level = ?cli.level,
        endpoint = %resolved.endpoint,
        timeout_secs = resolved.timeout.as_secs(),
        "configuration loaded"
    );

    let client = OdeHttpClient::new(&resolved.endpoint, resolved.timeout)?;
    let app = App::new(client.clone(), client);

    let output_mode = if cli.json {
        OutputMode::Json
    } else if cli.no_progress {
        OutputMode::Quiet
    } else {
        OutputMode::Progress
    };

    match output_mode {
        OutputMode::Json => {
            let summary = app.run(&query, &options, &JsonOutput)?;
            JsonOutput::print_summary(&summary).into_diagnostic()?;
        }
        OutputMode::Quiet => {
            app.run(&query, &options, &SilentProgress)?;
        }
        OutputMode::Progress => {
            let progress = TerminalProgress::new();
            let result = app.run(&query, &options, &progress);
            progress.finish();
            let summary = result?;
            if summary.downloads.failed > 0 {
                eprintln!(
                    "{} of {} downloads failed; re-run to resume",
                    summary.downloads.failed, summary.downloads.attempted
                );
            }
        }
    }
    Ok(())
}
