use std::path::PathBuf;

use arbor_store::StrategyKind;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "arbor",
    about = "Arbor: compare storage strategies for bitemporal trees",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file; missing files mean defaults
    #[arg(short, long, global = true, default_value = "arbor.toml")]
    pub config: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum StrategyArg {
    #[value(name = "parent_pointer")]
    ParentPointer,
    #[value(name = "parent_pointer_snapshots")]
    SnapshottedParentPointer,
    #[value(name = "materialized_path")]
    MaterializedPath,
    #[value(name = "closure_table")]
    ClosureTable,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::ParentPointer => StrategyKind::ParentPointer,
            StrategyArg::SnapshottedParentPointer => StrategyKind::SnapshottedParentPointer,
            StrategyArg::MaterializedPath => StrategyKind::MaterializedPath,
            StrategyArg::ClosureTable => StrategyKind::ClosureTable,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a workload file
    Generate(GenerateArgs),
    /// Replay one workload against one strategy
    Run(RunArgs),
    /// Replay workloads against every configured strategy
    Bench(BenchArgs),
    /// Print the results table
    Report(ReportArgs),
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Output file; `.json` writes JSON, anything else binary
    #[arg(short, long)]
    pub output: PathBuf,
    /// Random seed; drawn at random when omitted
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long)]
    pub initial_inserts: Option<usize>,
    #[arg(long)]
    pub updates: Option<usize>,
    #[arg(long)]
    pub reads_per_update: Option<usize>,
}

#[derive(Args)]
pub struct RunArgs {
    pub strategy: StrategyArg,
    pub dataset: PathBuf,
    #[arg(long)]
    pub snapshot_threshold: Option<u64>,
    /// Do not merge the run into the results book
    #[arg(long)]
    pub no_record: bool,
}

#[derive(Args)]
pub struct BenchArgs {
    /// Workload files; defaults to the configured datasets
    pub datasets: Vec<PathBuf>,
    /// Restrict the sweep to these strategies
    #[arg(short, long)]
    pub strategy: Vec<StrategyArg>,
    #[arg(long)]
    pub snapshot_threshold: Option<u64>,
}

#[derive(Args)]
pub struct ReportArgs {
    /// Write the table here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
