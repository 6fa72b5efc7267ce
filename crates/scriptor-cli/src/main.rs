//! Scriptor Command-Line Interface
//!
//! Applies change scripts to a database through an external client and
//! keeps track of what already ran.

mod error;
mod formatter;
mod settings;

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use formatter::OutputFormat;
use scriptor_core::{Error, Scriptor};
use tracing_subscriber::EnvFilter;

/// Exit code when at least one script failed.
const EXIT_SCRIPT_FAILURE: i32 = 2;

/// Scriptor Command-Line Interface
#[derive(Parser, Debug)]
#[command(name = "scriptor")]
#[command(version, about = "Run database change scripts exactly once, in order")]
pub struct Args {
    /// TOML configuration file; command-line flags take precedence
    #[arg(long, global = true, env = "SCRIPTOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "table", value_enum)]
    pub format: OutputFormat,

    /// Print only processed script names
    #[arg(long, global = true)]
    pub porcelain: bool,

    /// Regex applied to file names; its first group is the ordering key
    #[arg(long, global = true, env = "SCRIPTOR_IDENTIFIER_REGEX")]
    pub identifier_regex: Option<String>,

    #[command(flatten)]
    pub driver: DriverArgs,

    #[command(flatten)]
    pub monitoring: MonitoringArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options of the shell driver.
#[derive(ClapArgs, Debug, Default)]
pub struct DriverArgs {
    /// Database client binary (psql, mongosh, ...)
    #[arg(long, global = true, env = "SCRIPTOR_CLIENT_PATH")]
    pub client_path: Option<PathBuf>,

    /// Argument passed to the client; `{file}` is replaced by the script file
    #[arg(long = "client-arg", global = true, allow_hyphen_values = true)]
    pub client_args: Vec<String>,

    /// Directory of the local execution history
    #[arg(long, global = true, env = "SCRIPTOR_HISTORY_PATH")]
    pub history_path: Option<PathBuf>,

    /// Temporary file each script is written to
    #[arg(long, global = true, env = "SCRIPTOR_TMP_FILE_PATH")]
    pub tmp_file_path: Option<PathBuf>,

    /// Log client output
    #[arg(long, global = true)]
    pub print_output: bool,

    /// Keep client output in history
    #[arg(long, global = true)]
    pub save_output: bool,

    /// Kill the client after this many seconds and count the script as failed
    #[arg(long, global = true, env = "SCRIPTOR_CLIENT_TIMEOUT")]
    pub client_timeout: Option<u64>,
}

/// Options of the monitoring notifier.
#[derive(ClapArgs, Debug, Default)]
pub struct MonitoringArgs {
    /// Base URL of the monitoring service
    #[arg(long, global = true, env = "SCRIPTOR_MONITORING_URL")]
    pub monitoring_url: Option<String>,

    /// Timeout of each monitoring request in milliseconds
    #[arg(long, global = true, env = "SCRIPTOR_MONITORING_TIMEOUT_MS")]
    pub monitoring_timeout_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute pending scripts
    UpdateDb(UpdateArgs),
    /// Print the execution history
    List,
    /// Record a single script as executed without running it
    MarkScript {
        /// Script file
        #[arg(long)]
        path: PathBuf,
    },
}

/// Options of `update-db`.
#[derive(ClapArgs, Debug, Default)]
pub struct UpdateArgs {
    /// Root directory of the scripts
    #[arg(long, env = "SCRIPTOR_PATH")]
    pub path: Option<PathBuf>,

    /// Execution mode
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Keep going after a failed script
    #[arg(long)]
    pub continue_on_failure: bool,

    /// Accept changed checksums of executed scripts
    #[arg(long)]
    pub override_changed: bool,

    /// Tag rule as NAME=GLOB; repeat for several globs
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Tag scripts with the names of their folders
    #[arg(long)]
    pub tags_from_folder: bool,

    /// Only run scripts carrying one of these tags
    #[arg(long = "whitelist")]
    pub whitelisted_tags: Vec<String>,

    /// Never run scripts carrying one of these tags
    #[arg(long = "blacklist")]
    pub blacklisted_tags: Vec<String>,

    /// Run already executed scripts carrying one of these tags again
    #[arg(long = "play-again")]
    pub tags_to_play_again: Vec<String>,

    /// Record matching scripts as executed without running them
    #[arg(long = "mark")]
    pub mark_as_executed: Vec<String>,

    /// Replace the record of matching scripts with their current checksum
    #[arg(long = "override")]
    pub override_executed: Vec<String>,
}

/// `--mode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Normal,
    Dry,
    ForceMarkAsExecuted,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_level = if args.verbose {
        "scriptor=debug"
    } else {
        "scriptor=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(error = %e, "scriptor failed");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<i32, Box<dyn std::error::Error>> {
    let format = if args.porcelain {
        OutputFormat::Porcelain
    } else {
        args.format
    };
    let config = settings::resolve(&args)?;
    tracing::debug!(command = ?args.command, %format, "configuration resolved");
    let scriptor = Scriptor::new(config);
    let formatter = formatter::create_formatter(format);

    match &args.command {
        Command::UpdateDb(_) => match scriptor.update_database().await {
            Ok(report) => {
                print_non_empty(formatter.format_report(&report));
                if report.is_success() {
                    Ok(0)
                } else {
                    tracing::warn!(
                        status = %report.status(),
                        failures = report.failures().count(),
                        "update finished with failed scripts"
                    );
                    Ok(EXIT_SCRIPT_FAILURE)
                }
            }
            Err(Error::RunAborted {
                script,
                source,
                report,
            }) => {
                tracing::error!(
                    script = %script,
                    error = %source,
                    processed = report.len(),
                    "update aborted by driver failure"
                );
                print_non_empty(formatter.format_report(&report));
                Err(format!("run aborted on {script}: {source}").into())
            }
            Err(e) => Err(e.into()),
        },
        Command::List => {
            let records = scriptor.list_executed_scripts().await?;
            print_non_empty(formatter.format_history(&records));
            Ok(0)
        }
        Command::MarkScript { path } => {
            let record = scriptor.mark_script(path).await?;
            print_non_empty(formatter.format_history(std::slice::from_ref(&record)));
            Ok(0)
        }
    }
}

fn print_non_empty(output: String) {
    if !output.is_empty() {
        println!("{}", output);
    }
}
