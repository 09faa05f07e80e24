use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use wpmigrator_core::config::{MigratorConfig, config_path, load_config};
use wpmigrator_core::driver::{MigrationDriver, MigrationOptions, MigrationReport};
use wpmigrator_core::source::{WordPressClient, WordPressClientConfig};

#[derive(Debug, Parser)]
#[command(
    name = "wpmigrator",
    version,
    about = "Migrate WordPress posts, pages and authors into static front-matter files"
)]
struct Cli {
    #[arg(long, help = "Use debug logging")]
    debug: bool,
    #[arg(
        long,
        value_name = "PATH",
        default_value = "output",
        help = "Path to write the output files"
    )]
    output: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = resolve_config()?;
    let client = WordPressClient::new(WordPressClientConfig::from_config(&config))?;
    tracing::info!(api_url = client.api_url(), "using WordPress source");

    let options = MigrationOptions::from_config(&config, &cli.output);
    if cli.debug {
        println!("[diagnostics]\n{}\n", options.layout.diagnostics());
    }

    let mut driver = MigrationDriver::new(client, options);
    let report = driver
        .run()
        .with_context(|| format!("migration aborted during {}", driver.phase().as_str()))?;

    print_report(&cli.output, &report);
    if !report.success() {
        bail!(
            "{} record(s) failed to migrate",
            report.failures().count()
        );
    }
    Ok(())
}

fn init_logging(debug: bool) {
    let default_filter = if debug {
        "wpmigrator=debug,wpmigrator_core=debug"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn resolve_config() -> Result<MigratorConfig> {
    dotenvy::dotenv().ok();

    let cwd = env::current_dir().context("failed to read current directory")?;
    load_config(&config_path(&cwd))
}

fn print_report(output: &Path, report: &MigrationReport) {
    println!("migration report");
    println!("output: {}", normalize_path(output));
    for phase in &report.phases {
        let prefix = phase.phase.as_str();
        println!("{prefix}.fetched: {}", phase.fetched);
        println!("{prefix}.indexed: {}", phase.indexed);
        println!("{prefix}.written: {}", phase.written);
        println!("{prefix}.skipped: {}", phase.skipped);
        println!("{prefix}.failed: {}", phase.failures.len());
    }
    println!("written: {}", report.written());
    println!("request_count: {}", report.request_count);
    let failures = report.failures().collect::<Vec<_>>();
    if failures.is_empty() {
        println!("failures: <none>");
    } else {
        println!("failures:");
        for failure in failures {
            println!("  - {} id={}: {}", failure.kind, failure.id, failure.message);
        }
    }
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
