//! Command-line arguments for `crawlqa`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

pub const DEFAULT_KEYS_LIMIT: usize = 10;

#[derive(Parser)]
#[command(
    name = "crawlqa",
    version,
    about = "Data-quality checks for scraped items",
    long_about = "Run data-quality checks over scraped items.\n\n\
                  Items are read from JSON lines, JSON array or CSV exports. A JSON \
                  schema enables validation and tag-driven rules; job metadata enables \
                  job checks and the data-quality report."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run every applicable rule and print summaries and details.
    Report(ReportArgs),

    /// Validate items against the schema, collecting every error per item.
    Validate(ValidateArgs),

    /// Validate items against the schema, stopping at the first error per item.
    Glance(ValidateArgs),

    /// Score the job and write the HTML data-quality report.
    Dqr(DqrArgs),

    /// Show which schema tags are used and whether their fields exist.
    Tags(SourceArgs),

    /// Find items sharing the values of the given columns.
    Duplicates(DuplicatesArgs),
}

/// The items under audit.
#[derive(Args, Clone)]
pub struct SourceArgs {
    /// Items file (.jl, .jsonl, .json or .csv).
    #[arg(long = "items", value_name = "FILE")]
    pub items: PathBuf,

    /// Job or collection key the items were exported from.
    #[arg(long = "source", value_name = "KEY")]
    pub source: Option<String>,

    /// JSON schema with optional field tags.
    #[arg(long = "schema", value_name = "FILE")]
    pub schema: Option<PathBuf>,

    /// Job metadata (JSON) of the source job.
    #[arg(long = "job-meta", value_name = "FILE")]
    pub job_meta: Option<PathBuf>,

    /// Do not expand nested objects and arrays into flat columns.
    #[arg(long = "no-expand")]
    pub no_expand: bool,
}

/// How results are printed.
#[derive(Args, Clone)]
pub struct OutputArgs {
    /// Print results as JSON instead of tables.
    #[arg(long = "json")]
    pub json: bool,

    /// Limit details to the largest error groups.
    #[arg(long = "short")]
    pub short: bool,

    /// Sample keys shown per error group.
    #[arg(long = "keys-limit", value_name = "N", default_value_t = DEFAULT_KEYS_LIMIT)]
    pub keys_limit: usize,
}

impl Default for OutputArgs {
    fn default() -> Self {
        Self {
            json: false,
            short: false,
            keys_limit: DEFAULT_KEYS_LIMIT,
        }
    }
}

#[derive(Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Items file to compare against.
    #[arg(long = "target-items", value_name = "FILE")]
    pub target_items: Option<PathBuf>,

    /// Job or collection key of the target items.
    #[arg(long = "target", value_name = "KEY", requires = "target_items")]
    pub target: Option<String>,

    /// Job metadata (JSON) of the target job.
    #[arg(long = "target-job-meta", value_name = "FILE", requires = "target_items")]
    pub target_job_meta: Option<PathBuf>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args)]
pub struct DqrArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Where to write the HTML report (stdout when omitted).
    #[arg(long = "output", short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct DuplicatesArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Columns whose combined values identify an item; repeat for several.
    #[arg(long = "by", value_name = "COLUMN", required = true, value_delimiter = ',')]
    pub by: Vec<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
