use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "problabel", version, about = "Label messages with problems from a controlled vocabulary")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Classify a message spreadsheet and write <input>_classified.csv
    Classify(ClassifyArgs),
    /// Show merged problem categories and their counts
    Distribution(DistributionArgs),
    /// Print the merged category for one raw label
    Merge(MergeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ClassifyArgs {
    /// Input CSV (`;` or `,` delimited)
    #[arg(long)]
    pub input: PathBuf,

    /// Problems list, one label per line
    #[arg(long, env = "PROBLEMS_RU_FILE")]
    pub problems_file: PathBuf,

    /// Comma-separated ISO 639-1 codes, 1 or 2 (e.g. en,sw)
    #[arg(long)]
    pub langs: String,

    /// Output CSV (default: <input>_classified.csv next to the input)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Add one-hot columns per problem and language
    #[arg(long)]
    pub wide: bool,

    /// Max labels per text (default from config, 3)
    #[arg(long)]
    pub max_labels: Option<usize>,

    /// Parallel oracle calls (default from config, 1)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Cache file (default from config, cache/classify_cache.json)
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// Oracle API key (overrides the environment)
    #[arg(long)]
    pub api_key: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct DistributionArgs {
    /// Input CSV with a problem label column
    #[arg(long)]
    pub input: PathBuf,

    /// Print message groups as JSON instead of the count table
    #[arg(long)]
    pub json: bool,

    /// Max messages per group in --json output
    #[arg(long, default_value = "30")]
    pub max_messages: usize,

    /// Max characters per message in --json output
    #[arg(long, default_value = "2000")]
    pub max_chars: usize,
}

#[derive(Args, Clone, Debug)]
pub struct MergeArgs {
    /// Raw label
    pub raw: String,

    /// Secondary (translated/alternate) label, checked first
    #[arg(long)]
    pub secondary: Option<String>,
}
