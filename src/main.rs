use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use warren::{
    counter::BigCount,
    engine::EngineBuilder,
    experiments::{run_series, SeriesReport},
    scenario::{Scenario, ScenarioLoader, SeriesSpec},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Cohort-based rabbit population simulator")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, global = true, default_value = "scenarios/warren.yaml")]
    scenario: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Simulate the scenario once and print a census line per year
    Run(RunArgs),
    /// Run replicate series and print final population statistics
    Experiments(ExperimentArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Override the number of simulated years
    #[arg(long)]
    years: Option<u64>,

    /// Override the founding female count
    #[arg(long)]
    females: Option<BigCount>,

    /// Override the founding male count
    #[arg(long)]
    males: Option<BigCount>,

    /// Override the scenario seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override snapshot interval in years (0 disables snapshots)
    #[arg(long)]
    snapshot_interval: Option<u64>,

    /// Directory for snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Print every cohort of the final grid
    #[arg(long)]
    dump_grid: bool,
}

#[derive(Debug, Args)]
struct ExperimentArgs {
    /// Founding females of an ad-hoc series (replaces the scenario's series)
    #[arg(long, requires = "males")]
    females: Option<BigCount>,

    /// Founding males of an ad-hoc series
    #[arg(long, requires = "females")]
    males: Option<BigCount>,

    /// Years per replicate of the ad-hoc series
    #[arg(long, default_value_t = 10)]
    years: u64,

    /// Replicates of the ad-hoc series
    #[arg(long, default_value_t = 5)]
    replicates: u32,

    /// First replicate seed of the ad-hoc series
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loader = ScenarioLoader::new(".");
    let scenario = loader.load(&cli.scenario)?;
    init_tracing(&scenario.logging.level);

    match cli.command {
        Command::Run(args) => run(&scenario, args),
        Command::Experiments(args) => experiments(&scenario, args),
    }
}

/// `RUST_LOG` wins over the scenario's log level.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(scenario: &Scenario, args: RunArgs) -> Result<()> {
    let params = scenario.parameters()?;
    let years = scenario.years(args.years);
    let females = args.females.unwrap_or_else(|| scenario.founders.females.clone());
    let males = args.males.unwrap_or_else(|| scenario.founders.males.clone());
    let settings = scenario.engine_settings(args.seed, args.snapshot_interval, args.snapshot_dir);

    let mut engine = EngineBuilder::new(settings, params).with_demography().build();
    let mut world = engine.found_world(&females, &males);
    println!("Year 0 : {}", world.census());
    engine.run_years_with_hook(&mut world, years, |report| {
        println!("Year {} : {}", report.year, report.census);
        if let Some(path) = &report.snapshot_path {
            println!("  snapshot written to {}", path.display());
        }
    })?;

    if args.dump_grid {
        print!("{}", world.grid.render());
    }
    let anomalies = world.bookkeeping.anomalies;
    println!(
        "Scenario '{}' completed for {} years. Final population: {} ({} sampling anomalies)",
        engine.settings().scenario_name,
        years,
        world.total_population(),
        anomalies.total()
    );
    Ok(())
}

fn experiments(scenario: &Scenario, args: ExperimentArgs) -> Result<()> {
    let params = scenario.parameters()?;
    let series = match (args.females, args.males) {
        (Some(females), Some(males)) => vec![SeriesSpec {
            label: format!("{females}f-{males}m-{}y", args.years),
            females,
            males,
            years: args.years,
            replicates: args.replicates,
            seed: args.seed,
        }],
        _ => scenario.experiments.clone(),
    };
    if series.is_empty() {
        bail!(
            "scenario '{}' defines no experiments; pass --females and --males for an ad-hoc series",
            scenario.name
        );
    }

    for spec in &series {
        let report = run_series(spec, &params, scenario.seed)?;
        print_report(spec, &report);
    }
    Ok(())
}

fn print_report(spec: &SeriesSpec, report: &SeriesReport) {
    println!();
    println!(
        "Series '{}': {} females, {} males, {} years, {} replicates",
        report.label, spec.females, spec.males, spec.years, spec.replicates
    );
    if let Some(stats) = &report.stats {
        println!("  mean population:          {:.0}", stats.mean);
        println!("  standard deviation:       {:.0}", stats.std_dev);
        match stats.coefficient_of_variation {
            Some(cv) => println!("  coefficient of variation: {:.2}%", cv * 100.0),
            None => println!("  coefficient of variation: n/a (all replicates extinct)"),
        }
        println!("  minimum population:       {}", stats.min);
        println!("  maximum population:       {}", stats.max);
    }
    for (index, outcome) in report.outcomes.iter().enumerate() {
        println!(
            "  replicate {:2} (seed {}): {} ({})",
            index + 1,
            outcome.seed,
            outcome.total(),
            outcome.census
        );
    }
}
