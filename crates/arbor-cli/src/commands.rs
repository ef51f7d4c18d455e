use std::fs;
use std::path::Path;

use anyhow::Context;
use arbor_bench::{BenchConfig, ReplayHarness, ResultsBook, RunReport};
use arbor_store::{StoreConfig, StrategyKind};
use arbor_workload::{Generator, Workload};
use colored::Colorize;
use tracing::info;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = BenchConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    match cli.command {
        Command::Generate(args) => cmd_generate(&config, args, cli.format),
        Command::Run(args) => cmd_run(&config, args, cli.format),
        Command::Bench(args) => cmd_bench(&config, args, cli.format),
        Command::Report(args) => cmd_report(&config, args),
    }
}

fn cmd_generate(
    config: &BenchConfig,
    args: GenerateArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut generator = config.generator.clone();
    if let Some(n) = args.initial_inserts {
        generator.initial_inserts = n;
    }
    if let Some(n) = args.updates {
        generator.updates = n;
    }
    if let Some(n) = args.reads_per_update {
        generator.reads_per_update = n;
    }
    let seed = args.seed.unwrap_or_else(rand::random);

    let workload = Generator::new(generator, seed).generate();
    workload.save(&args.output)?;
    let stats = workload.stats();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Text => {
            println!(
                "{} Generated {} (seed {})",
                "✓".green().bold(),
                args.output.display().to_string().bold(),
                seed.to_string().cyan()
            );
            println!(
                "  Events: {} add, {} change_parent, {} implode",
                stats.add_node, stats.change_parent, stats.implode_node
            );
            println!(
                "  Checks: {} ancestors, {} descendants",
                stats.ancestors, stats.descendants
            );
        }
    }
    Ok(())
}

fn cmd_run(config: &BenchConfig, args: RunArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store_config = store_config(config, args.snapshot_threshold);
    let kind = StrategyKind::from(args.strategy);
    let workload = load_workload(&args.dataset)?;

    let report = replay(kind, &store_config, &workload)?;
    print_report(&report, format)?;

    if !args.no_record {
        let mut book = ResultsBook::load(&config.results_path)?;
        book.record(kind.label(), &dataset_name(&args.dataset), report.summary());
        book.save(&config.results_path)?;
    }
    Ok(())
}

fn cmd_bench(config: &BenchConfig, args: BenchArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store_config = store_config(config, args.snapshot_threshold);
    let datasets = if args.datasets.is_empty() {
        config.datasets.clone()
    } else {
        args.datasets
    };
    let strategies: Vec<StrategyKind> = if args.strategy.is_empty() {
        config.strategies.clone()
    } else {
        args.strategy.into_iter().map(StrategyKind::from).collect()
    };
    anyhow::ensure!(
        !datasets.is_empty(),
        "no datasets given and none configured in {}",
        BenchConfig::DEFAULT_PATH
    );

    let mut book = ResultsBook::load(&config.results_path)?;
    for dataset in &datasets {
        let workload = load_workload(dataset)?;
        let name = dataset_name(dataset);
        for &kind in &strategies {
            info!(strategy = kind.label(), dataset = %name, "starting run");
            let report = replay(kind, &store_config, &workload)?;
            print_report(&report, format)?;
            book.record(kind.label(), &name, report.summary());
        }
    }
    book.save(&config.results_path)?;

    if format == OutputFormat::Text {
        println!(
            "{} Recorded {} runs in {}",
            "✓".green().bold(),
            datasets.len() * strategies.len(),
            config.results_path.display()
        );
    }
    Ok(())
}

fn cmd_report(config: &BenchConfig, args: ReportArgs) -> anyhow::Result<()> {
    let book = ResultsBook::load(&config.results_path)?;
    if book.is_empty() {
        println!("No results recorded in {}.", config.results_path.display());
        return Ok(());
    }
    let table = book.render_tsv();
    match args.output {
        Some(path) => {
            fs::write(&path, table).with_context(|| format!("writing {}", path.display()))?;
            println!("{} Wrote {}", "✓".green(), path.display());
        }
        None => println!("{table}"),
    }
    Ok(())
}

fn store_config(config: &BenchConfig, snapshot_threshold: Option<u64>) -> StoreConfig {
    match snapshot_threshold {
        Some(threshold) => StoreConfig::with_snapshot_threshold(threshold),
        None => config.store.clone(),
    }
}

fn load_workload(path: &Path) -> anyhow::Result<Workload> {
    Workload::load(path).with_context(|| format!("loading workload {}", path.display()))
}

fn dataset_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn replay(
    kind: StrategyKind,
    store_config: &StoreConfig,
    workload: &Workload,
) -> anyhow::Result<RunReport> {
    let store = kind.build(store_config);
    let report = ReplayHarness::new(store.as_ref())
        .run(workload)
        .with_context(|| format!("replaying with {kind}"))?;
    Ok(report)
}

fn print_report(report: &RunReport, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&report.summary())?);
        return Ok(());
    }

    println!(
        "{} {}: {} events, {} checks passed",
        "✓".green().bold(),
        report.strategy.yellow().bold(),
        report.events,
        report.checks
    );
    for (label, metric) in &report.metrics {
        println!(
            "  {:<14} {:>7} calls  {:>12.3} µs/call",
            label,
            metric.calls,
            metric.time_per_call * 1e6
        );
    }
    println!(
        "  {:<14} {:>12.3} s",
        "setup_total", report.setup_total.total_time
    );
    println!(
        "  {:<14} {:>12.3} s",
        "tests_total", report.tests_total.total_time
    );
    println!(
        "  {:<14} {} rows, {} index entries, {:.3} MiB",
        "footprint",
        report.footprint.rows,
        report.footprint.index_entries,
        report.footprint.megabytes()
    );
    Ok(())
}
