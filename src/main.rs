use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use reqwest::Client;
use stampede::config::{endpoint_filter_from_env, load_config};
use stampede::executor::{
    print_iteration_report, print_run_summary, run_scenarios, IterationOptions, RunContext,
};
use stampede::metrics::Metrics;
use stampede::scenario::build_options;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "stampede",
    version,
    about = "Declarative HTTP performance-test runner",
    disable_help_subcommand = true
)]
struct Cli {
    /// Directory or file containing stampede.json
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Comma-separated endpoint names to run (overrides STAMPEDE_ENDPOINTS)
    #[arg(short, long)]
    endpoints: Option<String>,

    /// Iterations to run per selected scenario
    #[arg(short, long, default_value_t = 1)]
    iterations: u32,

    /// Print the scenario and threshold maps for an external load engine
    /// instead of running iterations
    #[arg(long)]
    print_options: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let config_target = cli
        .config
        .as_ref()
        .map(|p| resolve_path(p))
        .transpose()?
        .unwrap_or(std::env::current_dir()?);

    let Some(loaded) = load_config(&config_target).context("loading configuration")? else {
        bail!("no stampede.json found at {}", config_target.display());
    };
    let config = loaded.config;

    let filter = cli
        .endpoints
        .as_deref()
        .map(|raw| {
            raw.split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect::<Vec<_>>()
        })
        .or_else(endpoint_filter_from_env);

    let options = build_options(&config, filter.as_deref());
    if options.scenarios.is_empty() {
        bail!("no scenarios selected");
    }

    if cli.print_options {
        println!("{}", serde_json::to_string_pretty(&options)?);
        return Ok(());
    }

    let client = Client::new();
    let context = RunContext::new();
    let metrics = Metrics::new();

    let names: Vec<String> = options.scenarios.keys().cloned().collect();
    let reports = run_scenarios(
        &client,
        &names,
        cli.iterations,
        IterationOptions {
            config: &config,
            context: &context,
            metrics: &metrics,
        },
    )
    .await;

    for report in &reports {
        print_iteration_report(report);
    }
    print_run_summary(&metrics.snapshot(), &context.slow_requests());
    Ok(())
}

fn resolve_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
