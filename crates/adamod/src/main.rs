//! adamod CLI: update or delete ADABAS records selected by ISN, search or scan.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use adamod_adabas::{DatabaseImage, NucleusParams};
use adamod_lib::request::DEFAULT_PAGE_CAPACITY;
use adamod_lib::{
    modify_file_records, status_line, AdamodError, Config, ConfigProblem, Mutation, RunRequest,
    Selection, Target,
};
use clap::{ArgAction, ArgGroup, Parser};
use miette::{IntoDiagnostic, WrapErr};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    name = "adamod",
    version,
    about = "Update or delete ADABAS records selected by ISN, search or scan"
)]
#[command(group(ArgGroup::new("action").required(true).args(["modify", "delete"])))]
struct Cli {
    /// Increase verbosity (repeat for more detail)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Select records but do not modify them
    #[arg(short = 'n', long = "dry-run")]
    dry_run: bool,

    /// Target database and file (DBID,FILE; either part may come from config)
    #[arg(short, long, value_name = "DBID,FILE")]
    target: Option<String>,

    /// ISN of the single record to modify
    #[arg(short, long, value_name = "ISN", conflicts_with = "search")]
    isn: Option<String>,

    /// Search and value buffers (SEARCH.VALUE)
    #[arg(short, long, value_name = "SEARCH.VALUE")]
    search: Option<String>,

    /// Format and record buffers of the update (FORMAT.RECORD)
    #[arg(short, long, value_name = "FORMAT.RECORD")]
    modify: Option<String>,

    /// Delete the selected records
    #[arg(short, long)]
    delete: bool,

    /// ISN buffer entries per search call
    #[arg(short = 'p', long = "page-size", value_name = "N")]
    page_size: Option<u32>,

    /// Write the ISN of every processed record to this file (default stdout)
    #[arg(short = 'l', long = "isn-log", value_name = "FILE")]
    isn_log: Option<PathBuf>,

    /// Database image to run against
    #[arg(long, value_name = "IMAGE")]
    database: Option<PathBuf>,

    /// Additional configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write diagnostic tracing to this file
    #[arg(long = "trace-log", value_name = "FILE")]
    trace_log: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

/// Run the tool; `Ok(false)` means the run failed and its status line was printed.
fn run(cli: &Cli) -> miette::Result<bool> {
    let config = Config::load(cli.config.as_deref()).into_diagnostic()?;
    init_tracing(cli, &config)?;

    let request = match resolve_request(cli, &config) {
        Ok(request) => request,
        Err(problem) => {
            let result = Err(AdamodError::from(problem));
            eprintln!("{}", status_line(&result));
            return Ok(false);
        }
    };
    debug!(?request, "request resolved");

    let image_path = cli
        .database
        .clone()
        .or_else(|| config.database.image.clone())
        .ok_or_else(|| {
            miette::miette!(
                help = "pass --database, set [database] image in adamod.toml or ADAMOD_DATABASE_IMAGE",
                "no database image configured"
            )
        })?;
    let image = DatabaseImage::read(&image_path)
        .wrap_err_with(|| format!("cannot load database image {}", image_path.display()))?;
    let mut nucleus = image
        .into_nucleus(NucleusParams::default())
        .wrap_err("database image is inconsistent")?;

    let mut trace: Box<dyn Write> = match &cli.isn_log {
        Some(path) => Box::new(
            File::create(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("cannot create ISN log {}", path.display()))?,
        ),
        None => Box::new(io::stdout()),
    };

    let stderr = io::stderr();
    let mut status = stderr.lock();
    let result = modify_file_records(&request, &mut nucleus, &mut status, trace.as_mut());
    trace.flush().into_diagnostic()?;
    let _ = writeln!(status, "{}", status_line(&result));
    drop(status);

    if nucleus.is_modified() {
        DatabaseImage::from_nucleus(&nucleus)
            .write(&image_path)
            .wrap_err_with(|| format!("cannot write database image {}", image_path.display()))?;
        info!(path = %image_path.display(), "database image saved");
    }

    Ok(result.is_ok())
}

/// Build the run request from arguments, falling back to configuration.
fn resolve_request(cli: &Cli, config: &Config) -> Result<RunRequest, ConfigProblem> {
    let (db_id, file_number) = match &cli.target {
        Some(arg) => Target::parse_override(arg)?,
        None => (None, None),
    };
    let target = Target::new(
        db_id
            .or(config.target.database)
            .ok_or(ConfigProblem::NoDatabase)?,
        file_number
            .or(config.target.file)
            .ok_or(ConfigProblem::NoFile)?,
    )?;

    let isn = cli
        .isn
        .as_deref()
        .map(|s| s.trim().parse::<u64>().map_err(|_| ConfigProblem::InvalidIsn))
        .transpose()?;
    let selection = Selection::from_args(isn, cli.search.as_deref())?;

    let mutation = match (&cli.modify, cli.delete) {
        (Some(arg), false) => Mutation::update(arg)?,
        (None, true) => Mutation::Delete,
        _ => {
            return Err(ConfigProblem::InvalidArgument(
                "exactly one of --modify and --delete is required".to_string(),
            ))
        }
    };

    let page_capacity = cli
        .page_size
        .or(config.search.page_capacity)
        .unwrap_or(u32::from(DEFAULT_PAGE_CAPACITY));

    RunRequest::new(target, selection, mutation)
        .with_dry_run(cli.dry_run)
        .with_verbosity(cli.verbose)
        .with_page_capacity(page_capacity)
}

/// Log to a file so the status stream stays clean.
/// Enabled by --trace-log, `[trace] file` or the RUST_LOG env var.
fn init_tracing(cli: &Cli, config: &Config) -> miette::Result<()> {
    let rust_log = std::env::var("RUST_LOG").is_ok();
    let file = cli.trace_log.clone().or_else(|| config.trace.file.clone());
    if file.is_none() && !rust_log {
        return Ok(());
    }

    let path = file.unwrap_or_else(|| PathBuf::from("adamod.log"));
    let log_file = File::create(&path)
        .into_diagnostic()
        .wrap_err_with(|| format!("cannot create trace log {}", path.display()))?;
    let filter = if rust_log {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        tracing_subscriber::EnvFilter::new(config.trace.filter.as_deref().unwrap_or("debug"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}
