use anyhow::Context;
use clap::{Parser, Subcommand};
use qfolio_classical::efficient_frontier;
use qfolio_compare::{EngineConfig, OptimizationRequest, SolverPool};
use qfolio_dataset::{DatasetSource, MemoryDataset};
use qfolio_report::{MemoryReporter, Reporter};
use qfolio_risk::compute_moments_annualized;
use qfolio_types::ConstraintConfig;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DATASET: &str = "input";

#[derive(Parser)]
#[command(name = "qfolio")]
#[command(about = "Compare classical, annealing and variational portfolio optimizers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine config JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the requested solvers and print the comparison report
    Compare {
        /// Price table: JSON array of {asset_id, date, adjusted_price}
        #[arg(short, long)]
        prices: PathBuf,
        /// Optimization request JSON (all solvers, default constraints if omitted)
        #[arg(short, long)]
        request: Option<PathBuf>,
    },
    /// Trace the classical efficient frontier
    Frontier {
        #[arg(short, long)]
        prices: PathBuf,
        #[arg(long, default_value = "20")]
        points: usize,
        #[arg(long, default_value = "1.0")]
        max_weight: f64,
    },
    /// Describe a price table
    Summary {
        #[arg(short, long)]
        prices: PathBuf,
    },
}

#[derive(Serialize)]
struct CompareOutput<'a> {
    job_id: qfolio_report::JobId,
    fingerprint: &'a str,
    input_hash: &'a str,
    output_hash: &'a str,
    report: &'a serde_json::Value,
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays JSON
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            EngineConfig::from_json(&text)?
        }
        None => EngineConfig::default(),
    };

    match &cli.command {
        Commands::Compare { prices, request } => run_compare(&cli, config, prices, request.as_deref()),
        Commands::Frontier {
            prices,
            points,
            max_weight,
        } => run_frontier(&cli, &config, prices, *points, *max_weight),
        Commands::Summary { prices } => {
            let store = load_prices(prices)?;
            print_json(&cli, &store.summary(DATASET)?)
        }
    }
}

fn run_compare(
    cli: &Cli,
    config: EngineConfig,
    prices: &Path,
    request: Option<&Path>,
) -> anyhow::Result<()> {
    let store = load_prices(prices)?;
    let rows = store.price_rows(DATASET, &[])?;
    let request = match request {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading request {}", path.display()))?;
            OptimizationRequest::from_json(&text)?
        }
        None => OptimizationRequest::default(),
    };

    let reporter = MemoryReporter::new();
    let job_id = reporter.next_job_id();
    let inputs = serde_json::json!({
        "config": &config,
        "request": &request,
        "prices": &rows,
    });

    let pool = SolverPool::new(config)?;
    tracing::info!(%job_id, workers = pool.num_threads(), "job submitted");
    let handle = pool.submit(rows, request);
    let report = handle.wait()?;

    let outputs = report.to_json()?;
    let record = reporter.publish(job_id, &inputs, &outputs)?;

    print_json(
        cli,
        &CompareOutput {
            job_id,
            fingerprint: &record.fingerprint,
            input_hash: &record.input_hash,
            output_hash: &record.output_hash,
            report: &record.outputs,
        },
    )
}

fn run_frontier(
    cli: &Cli,
    config: &EngineConfig,
    prices: &Path,
    points: usize,
    max_weight: f64,
) -> anyhow::Result<()> {
    let store = load_prices(prices)?;
    let returns = store.return_series(DATASET, &[], config.return_kind)?;
    let moments = compute_moments_annualized(&returns, config.annualization)?;
    let constraints = ConstraintConfig {
        max_weight_per_asset: max_weight,
        ..Default::default()
    }
    .validate(returns.num_assets())?;

    let frontier = efficient_frontier(&moments, &constraints, points, config.risk_free_rate);
    print_json(cli, &frontier)
}

fn load_prices(path: &Path) -> anyhow::Result<MemoryDataset> {
    let file = File::open(path).with_context(|| format!("opening prices {}", path.display()))?;
    let mut store = MemoryDataset::new();
    let count = store.load_json(DATASET, BufReader::new(file))?;
    tracing::debug!(rows = count, "loaded price table");
    Ok(store)
}

fn print_json<T: Serialize>(cli: &Cli, value: &T) -> anyhow::Result<()> {
    let text = if cli.pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}
