//! Command line front end for bulk-dl

use bulk_dl::tools::ToolReport;
use bulk_dl::{BatchReport, BulkFetcher, Config, DedupLedger, Error, Event};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::AsyncReadExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "bulk-dl")]
#[command(about = "Fetch a list of tracks concurrently with yt-dlp")]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch tasks from a task file or the command line
    Run(RunArgs),
    /// Report whether yt-dlp and ffmpeg can be found
    CheckTools,
    /// List the keys recorded in the completion ledger
    Ledger,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Tasks to fetch instead of the task file; `-` reads them from stdin
    #[arg(value_name = "TASK", conflicts_with = "file")]
    lines: Vec<String>,

    /// Task file, one `subject - descriptor` per line
    #[arg(long, short)]
    file: Option<PathBuf>,

    /// Maximum throughput: more workers, lowest encode quality
    #[arg(long, conflicts_with = "quality")]
    turbo: bool,

    /// Highest encode quality
    #[arg(long)]
    quality: bool,

    /// Browser to read cookies from (e.g. firefox, chrome)
    #[arg(long, value_name = "BROWSER")]
    cookies: Option<String>,

    /// Disable the live progress line
    #[arg(long)]
    no_progress: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    Success,
    Partial,
    Failure,
}

impl ProcessExit {
    const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Partial => 1,
            Self::Failure => 2,
        }
    }

    fn from_report(report: &BatchReport) -> Self {
        if report.summary.failed == 0 {
            Self::Success
        } else {
            Self::Partial
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bulk_dl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(outcome) => ExitCode::from(outcome.code()),
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(ProcessExit::Failure.code())
        }
    }
}

async fn dispatch(cli: Cli) -> bulk_dl::Result<ProcessExit> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Run(args) => run(config, args).await,
        Command::CheckTools => Ok(check_tools(&config)),
        Command::Ledger => list_ledger(&config).await,
    }
}

fn apply_run_args(mut config: Config, args: &RunArgs) -> Config {
    if let Some(file) = &args.file {
        config.paths.task_file = file.clone();
    }
    if let Some(browser) = &args.cookies {
        config.fetch.cookies_from_browser = Some(browser.clone());
    }
    if args.no_progress {
        config.progress.show_progress = false;
    }
    config
}

async fn run(config: Config, args: RunArgs) -> bulk_dl::Result<ProcessExit> {
    let config = apply_run_args(config, &args);
    let mut fetcher = BulkFetcher::new(config).await?;
    let manual = if args.lines.is_empty() {
        None
    } else {
        Some(manual_lines(&args.lines).await?)
    };

    if args.turbo {
        fetcher.mode_mut().enable_turbo();
    } else if args.quality {
        fetcher.mode_mut().enable_quality();
    }

    let mode = *fetcher.mode();
    let resources = mode.resources();
    println!(
        "Mode: {} | {} cores, {} GiB | {} workers | audio quality {}",
        mode.active_mode(),
        resources.cores,
        resources.memory_gib(),
        fetcher.optimal_workers(),
        mode.quality_param().as_arg()
    );

    let printer = tokio::spawn(print_failures(fetcher.subscribe(), std::io::stdout()));

    let result = match manual {
        Some(lines) => Ok(fetcher.run_lines(lines.iter().map(String::as_str)).await),
        None => fetcher.run_file().await,
    };
    let report = match result {
        Ok(report) => report,
        Err(Error::TaskFileMissing {
            path,
            example_created,
        }) => {
            printer.abort();
            eprintln!("Task file {} not found", path.display());
            if example_created {
                eprintln!("An example task file was created there; edit it and run again");
            }
            return Ok(ProcessExit::Failure);
        }
        Err(e) => {
            printer.abort();
            return Err(e);
        }
    };
    printer.await.ok();

    print_report(&report);
    Ok(ProcessExit::from_report(&report))
}

/// Task lines given on the command line, each `-` replaced by the lines of stdin
async fn manual_lines(args: &[String]) -> bulk_dl::Result<Vec<String>> {
    if !args.iter().any(|a| a == "-") {
        return Ok(args.to_vec());
    }
    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;
    Ok(splice_stdin(args, &input))
}

fn splice_stdin(args: &[String], input: &str) -> Vec<String> {
    args.iter()
        .flat_map(|arg| {
            if arg == "-" {
                input.lines().map(str::to_string).collect()
            } else {
                vec![arg.clone()]
            }
        })
        .collect()
}

/// Write each failed task to `out` as it happens
///
/// Returns once the batch completes or the channel closes. Falling behind the
/// channel only loses the overwritten events. Returns the failures written.
async fn print_failures<W: Write>(mut events: broadcast::Receiver<Event>, mut out: W) -> usize {
    let mut printed = 0;
    loop {
        match events.recv().await {
            Ok(Event::TaskFailed { task, reason, .. }) => {
                let _ = writeln!(out, "\rFailed: {task}: {reason}");
                printed += 1;
            }
            Ok(Event::BatchComplete { .. }) | Err(RecvError::Closed) => break,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "failure printer fell behind the event stream");
            }
        }
    }
    let _ = out.flush();
    printed
}

fn print_report(report: &BatchReport) {
    for line in &report.malformed {
        println!("Line {} has invalid format: {}", line.line_number, line.content);
    }

    let summary = &report.summary;
    println!();
    println!("Completed in {:.1}s", summary.elapsed.as_secs_f64());
    println!("  Succeeded:        {}", summary.succeeded);
    println!("  Failed:           {}", summary.failed);
    println!("  Already present:  {}", summary.skipped);
    println!("  Already in ledger: {}", report.already_done);
    println!("  Workers:          {}", summary.workers);

    if !summary.failures.is_empty() {
        println!();
        println!("Failures:");
        for failure in &summary.failures {
            println!("  {} ({})", failure.task, failure.reason);
        }
    }
}

fn check_tools(config: &Config) -> ProcessExit {
    let report = ToolReport::discover(&config.tools);

    for tool in [&report.fetcher, &report.transcoder] {
        match &tool.path {
            Some(path) => println!("{}: OK ({})", tool.name, path.display()),
            None => println!("{}: NOT INSTALLED", tool.name),
        }
    }

    if report.all_available() {
        return ProcessExit::Success;
    }

    println!();
    println!("Install missing tools:");
    for tool in report.missing() {
        println!("  {}: {}", tool.name, tool.hint);
    }
    ProcessExit::Failure
}

async fn list_ledger(config: &Config) -> bulk_dl::Result<ProcessExit> {
    let ledger = DedupLedger::load(&config.paths.ledger_path).await?;
    for key in ledger.keys().await {
        println!("{key}");
    }
    eprintln!("{} entries in {}", ledger.len().await, ledger.path().display());
    Ok(ProcessExit::Success)
}
