use state_health::aggregator::{self, DegeneratePolicy, ScoreOptions};
use state_health::catalog::MetricCatalog;
use state_health::config::DashboardConfig;
use state_health::dataset::Dataset;
use state_health::report::{self, ReportSettings};
use state_health::store;

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dashboard")]
#[command(about = "Health and food access statistics per U.S. state")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Read the dataset from a local GeoJSON or CSV file instead of the artifact store
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// Zero-variance policy: reject, constant, or constant:<value> (or set DEGENERATE_POLICY)
    #[arg(long, global = true)]
    policy: Option<DegeneratePolicy>,

    /// Print JSON instead of text (not accepted by `map`, which emits HTML)
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the selectable metrics
    Metrics,
    /// Mean, median, min and max of a metric
    Summary {
        #[arg(short, long)]
        metric: String,
    },
    /// States with the highest values of a metric
    Top {
        #[arg(short, long)]
        metric: String,

        /// Number of states (default: RANKING_TOP_N or 10)
        #[arg(short)]
        n: Option<usize>,
    },
    /// Priority states by aggregate score, with impact analysis
    Priority {
        /// Number of states (default: PRIORITY_TOP_N or 5)
        #[arg(short)]
        n: Option<usize>,
    },
    /// Full dashboard report for a metric
    Report {
        /// Metric column (default: first selectable metric)
        #[arg(short, long)]
        metric: Option<String>,
    },
    /// Fetch the pre-rendered map for a metric
    Map {
        #[arg(short, long)]
        metric: String,

        /// Write the HTML to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    run(Args::parse()).await
}

async fn run(args: Args) -> Result<()> {
    let mut config = DashboardConfig::from_env().context("Invalid configuration")?;
    if let Some(policy) = args.policy {
        config.degenerate = policy;
    }
    let catalog = MetricCatalog::default();
    let options = ScoreOptions::with_policy(config.degenerate);

    match args.command {
        Commands::Metrics => {
            if args.json {
                return print_json(&catalog);
            }
            for metric in &catalog.selectable {
                println!("{:<22} {}", metric.column, metric.label);
            }
        }
        Commands::Summary { metric } => {
            let dataset = load_dataset(&config, args.dataset.as_ref()).await?;
            let summary = aggregator::summarize(&dataset, &metric)?;
            if args.json {
                return print_json(&summary);
            }
            println!("{}", catalog.label(&metric));
            print!("{}", report::render_summary(&summary));
        }
        Commands::Top { metric, n } => {
            let dataset = load_dataset(&config, args.dataset.as_ref()).await?;
            let ranking = aggregator::top_n(&dataset, &metric, n.unwrap_or(config.ranking_top_n))?;
            if args.json {
                return print_json(&ranking);
            }
            print!(
                "{}",
                report::render_ranking(catalog.label(&metric), &ranking, report::format_percent)
            );
        }
        Commands::Priority { n } => {
            let dataset = load_dataset(&config, args.dataset.as_ref()).await?;
            let analysis = report::priority_analysis(
                &dataset,
                &catalog,
                n.unwrap_or(config.priority_top_n),
                &options,
            )?;
            if args.json {
                return print_json(&analysis);
            }
            print!("{}", report::render_priority(&analysis));
        }
        Commands::Report { metric } => {
            let metric = metric
                .or_else(|| catalog.default_metric().map(str::to_string))
                .context("No metric selected")?;
            let dataset = load_dataset(&config, args.dataset.as_ref()).await?;
            let settings = ReportSettings {
                ranking_top_n: config.ranking_top_n,
                priority_top_n: config.priority_top_n,
                options,
            };
            let report = report::build_report(&dataset, &catalog, &metric, &settings)?;
            if args.json {
                println!("{}", report.to_json()?);
            } else {
                print!("{}", report.render_text());
            }
        }
        Commands::Map { metric, out } => {
            ensure!(!args.json, "--json does not apply to map; the map is an HTML document");
            let store = config.build_store()?;
            let html = store::fetch_map_html(store.as_ref(), &metric)
                .await
                .with_context(|| format!("Unable to load map for {}", metric))?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, html).await?;
                    info!("Wrote map to {}", path.display());
                }
                None => println!("{}", html),
            }
        }
    }

    Ok(())
}

/// Load the session dataset once; a failure ends the command before any aggregation.
async fn load_dataset(config: &DashboardConfig, local: Option<&PathBuf>) -> Result<Dataset> {
    let dataset = match local {
        Some(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            store::parse_dataset(&path.to_string_lossy(), &bytes, &config.state_column)?
        }
        None => {
            let store = config.build_store()?;
            info!("Loading {} from {}", config.dataset_key, store.describe());
            store::fetch_dataset(store.as_ref(), &config.dataset_key, &config.state_column)
                .await
                .context("Error loading data")?
        }
    };
    Ok(dataset)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
