//! userforge - resumable username enumeration
//!
//! ## Subcommands
//!
//! - `file <wordlist>`: probe every valid line of a wordlist (`-` for stdin).
//! - `dynamic <names> <surnames> <small|big>`: probe name × surname × format
//!   combinations from the beginning.
//! - `resume <names> <surnames> <small|big>`: continue a `dynamic` run from
//!   the state file, given the same inputs.
//!
//! Without `--probe-cmd` candidates are only printed (dry run).

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use userforge::enumerate::{read_lines, ProgressTracker};
use userforge::types::DEFAULT_STATE_FILE;
use userforge::{
    CandidateSource, CombinatorialSource, CommandProbe, DryRunProbe, EnumConfig, Enumerator,
    FormatLevel, ListSource, Probe, Target, UserForgeError,
};

#[derive(Parser)]
#[command(
    name = "userforge",
    version,
    about = "Enumerate valid usernames from wordlists or name/surname combinations"
)]
struct Cli {
    /// Domain to enumerate; upper-cased to form the Kerberos realm
    #[arg(short, long, env = "USERFORGE_DOMAIN")]
    domain: Option<String>,

    /// KDC address (resolved by the probe when omitted)
    #[arg(long, env = "USERFORGE_DC")]
    dc: Option<String>,

    /// Number of concurrent probe workers
    #[arg(short, long, env = "USERFORGE_THREADS", default_value_t = 10)]
    threads: usize,

    /// Delay in milliseconds before each candidate is queued
    #[arg(long, env = "USERFORGE_DELAY_MS", default_value_t = 0)]
    delay: u64,

    /// State file used to resume `dynamic` runs
    #[arg(long, env = "USERFORGE_STATE_FILE", default_value = DEFAULT_STATE_FILE)]
    state_file: PathBuf,

    /// Seconds in-flight probes may take to finish after an interrupt
    #[arg(long, env = "USERFORGE_DRAIN_TIMEOUT_SECS", default_value_t = 10)]
    drain_timeout: u64,

    /// Program run per candidate as `<cmd> <username>`; exit 0 = valid, 1 = invalid
    #[arg(long, env = "USERFORGE_PROBE_CMD")]
    probe_cmd: Option<String>,

    /// Per-candidate timeout for the probe command, in seconds
    #[arg(long, default_value_t = 30)]
    probe_timeout: u64,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe usernames from a wordlist, one per line
    File {
        /// Wordlist path, or `-` for standard input
        wordlist: String,
    },
    /// Probe name × surname × format combinations
    Dynamic {
        names: PathBuf,
        surnames: PathBuf,
        /// Format catalog: small or big
        level: FormatLevel,
    },
    /// Continue an interrupted `dynamic` run with the same inputs
    Resume {
        names: PathBuf,
        surnames: PathBuf,
        /// Format catalog: small or big
        level: FormatLevel,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    let _ = userforge::init();
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            match e.downcast_ref::<UserForgeError>() {
                Some(err) => error!("{}", err.user_message()),
                None => error!("{:#}", e),
            }
            1
        }
    };
    std::process::exit(code);
}

fn init_logging(verbose: u8, format: LogFormat) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,userforge={}", level)));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(verbose >= 2)
            .init(),
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let target = Target::new(cli.domain.clone().unwrap_or_default(), cli.dc.clone());
    let config = EnumConfig {
        threads: cli.threads,
        delay: Duration::from_millis(cli.delay),
        drain_timeout: Duration::from_secs(cli.drain_timeout),
        target,
        state_file: cli.state_file.clone(),
    };

    let probe = build_probe(&cli, &config.target)?;
    let enumerator = Enumerator::with_probe(config, probe)?;

    // Inputs are opened before any worker starts; a missing list is fatal.
    let source: CandidateSource = match &cli.command {
        Commands::File { wordlist } => ListSource::open(wordlist).await?.into(),
        Commands::Dynamic {
            names,
            surnames,
            level,
        } => load_combinatorial(names, surnames, *level)?.into(),
        Commands::Resume {
            names,
            surnames,
            level,
        } => enumerator
            .resume_source(load_combinatorial(names, surnames, *level)?)?
            .into(),
    };

    // Lives until the process exits so a repeated interrupt can force it.
    let _signals = enumerator.shutdown_signal().listen_for_os_signals();
    let progress = (!cli.no_progress && std::io::stderr().is_terminal())
        .then(|| spawn_progress(enumerator.progress(), source.remaining()));

    let report = enumerator.run(source).await;
    if let Some((bar, ticker)) = progress {
        ticker.abort();
        bar.finish_and_clear();
    }
    let report = report?;
    info!(
        started_at = %report.started_at.to_rfc3339(),
        elapsed_secs = report.elapsed.as_secs_f64(),
        outcome = ?report.outcome,
        peak_in_flight = report.peak_in_flight,
        "Run finished"
    );

    for username in &report.valid {
        match &cli.domain {
            Some(domain) => println!("{}@{}", username, domain),
            None => println!("{}", username),
        }
    }

    Ok(report.exit_code())
}

fn build_probe(cli: &Cli, target: &Target) -> Result<Arc<dyn Probe>> {
    let Some(command_line) = &cli.probe_cmd else {
        info!("No probe command configured, printing candidates only");
        return Ok(Arc::new(DryRunProbe));
    };

    if target.domain.is_empty() {
        return Err(UserForgeError::config("--domain is required when a probe command is set").into());
    }

    let probe = CommandProbe::from_command_line(command_line)
        .ok_or_else(|| UserForgeError::config("--probe-cmd is empty"))?
        .with_timeout(Duration::from_secs(cli.probe_timeout));
    Ok(Arc::new(probe))
}

fn load_combinatorial(names: &Path, surnames: &Path, level: FormatLevel) -> Result<CombinatorialSource> {
    let names = read_lines(names).context("Invalid names list")?;
    let surnames = read_lines(surnames).context("Invalid surnames list")?;
    info!(
        names = names.len(),
        surnames = surnames.len(),
        formats = level.len(),
        level = %level,
        "Loaded combinatorial inputs"
    );
    Ok(CombinatorialSource::new(names, surnames, level.templates()))
}

fn spawn_progress(tracker: Arc<ProgressTracker>, total: Option<u64>) -> (ProgressBar, JoinHandle<()>) {
    let bar = match total {
        Some(total) => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.cyan} [{elapsed_precise}] {pos} tested {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar
        }
    };

    let ticker_bar = bar.clone();
    let ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(250));
        loop {
            interval.tick().await;
            let snap = tracker.snapshot();
            ticker_bar.set_position(snap.attempted);
            ticker_bar.set_message(format!(
                "{} valid, {} errors, {:.1}/s",
                snap.confirmed,
                snap.errors,
                tracker.rate()
            ));
        }
    });

    (bar, ticker)
}
