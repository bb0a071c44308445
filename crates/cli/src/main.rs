//! kbeval - retrieval accuracy evaluation for knowledge bases
//!
//! This binary provides the command-line interface for running the ground
//! truth corpus against a knowledge base and comparing report snapshots.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kbeval::{create_progress_bar, format_cases, run_evaluation, select_cases, RunOverrides};
use kbeval_core::config::Config;
use kbeval_evals::{compare, Report};
use kbeval_knowledge_base::create_knowledge_base_client;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

#[derive(Parser)]
#[command(name = "kbeval")]
#[command(about = "Retrieval accuracy evaluation for knowledge bases")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ground truth corpus against a knowledge base
    Run {
        /// Knowledge base reference (overrides config)
        #[arg(short, long)]
        knowledge_base: Option<String>,

        /// Only run cases in this category
        #[arg(long)]
        category: Option<String>,

        /// Only run cases in this partition (e.g. US, UK, BOTH)
        #[arg(long)]
        partition: Option<String>,

        /// Directory for report snapshots
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Maximum number of cases evaluated at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Passages requested per retrieval
        #[arg(long)]
        num_results: Option<usize>,

        /// Deadline for the whole run in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        #[arg(long)]
        min_f1: Option<f64>,

        #[arg(long)]
        min_faithfulness: Option<f64>,

        #[arg(long)]
        min_relevance: Option<f64>,

        /// Print the report without writing a snapshot
        #[arg(long)]
        no_save: bool,

        /// Print the report as JSON instead of the summary
        #[arg(long)]
        json: bool,
    },
    /// List the ground truth corpus
    Cases {
        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        partition: Option<String>,
    },
    /// List the data sources connected to a knowledge base
    Sources {
        #[arg(short, long)]
        knowledge_base: Option<String>,
    },
    /// Show the knowledge base configuration summary
    Info {
        #[arg(short, long)]
        knowledge_base: Option<String>,
    },
    /// Compare two report snapshots
    Compare {
        /// Baseline report
        baseline: PathBuf,

        /// Current report (defaults to the latest snapshot)
        current: Option<PathBuf>,

        /// Exit non-zero when any case regressed
        #[arg(long)]
        fail_on_regression: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Some(Commands::Run {
            knowledge_base,
            category,
            partition,
            output_dir,
            concurrency,
            num_results,
            timeout,
            min_f1,
            min_faithfulness,
            min_relevance,
            no_save,
            json,
        }) => {
            let overrides = RunOverrides {
                knowledge_base,
                output_dir,
                concurrency,
                num_results,
                timeout_secs: timeout,
                min_f1,
                min_faithfulness,
                min_relevance,
            };
            run(
                config_path,
                &overrides,
                category.as_deref(),
                partition.as_deref(),
                no_save,
                json,
            )
            .await
        }
        Some(Commands::Cases {
            category,
            partition,
        }) => {
            let cases = select_cases(category.as_deref(), partition.as_deref());
            print!("{}", format_cases(&cases));
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Sources { knowledge_base }) => {
            list_sources(config_path, knowledge_base).await
        }
        Some(Commands::Info { knowledge_base }) => show_info(config_path, knowledge_base).await,
        Some(Commands::Compare {
            baseline,
            current,
            fail_on_regression,
        }) => compare_reports(config_path, &baseline, current, fail_on_regression),
        None => {
            println!("Run 'kbeval run --knowledge-base <ID>' to evaluate, or --help for more options");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Initialize logging system
///
/// `RUST_LOG` takes precedence over the verbosity flag when set.
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        format!(
            "{}={level},kbeval_core={level},kbeval_knowledge_base={level},kbeval_judge={level},kbeval_evals={level}",
            env!("CARGO_PKG_NAME")
        )
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    Config::load(config_path).context("Failed to load configuration")
}

async fn run(
    config_path: Option<&Path>,
    overrides: &RunOverrides,
    category: Option<&str>,
    partition: Option<&str>,
    no_save: bool,
    json: bool,
) -> Result<ExitCode> {
    let mut config = load_config(config_path)?;
    overrides.apply(&mut config);

    let cases = select_cases(category, partition);
    let progress = (!json).then(|| create_progress_bar(cases.len()));

    let report = run_evaluation(&config, &cases, progress).await?;

    if !no_save {
        let path = report
            .save(Path::new(&config.runner.output_dir))
            .context("Failed to save report")?;
        info!("Report written to {}", path.display());
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        report.print_summary();
    }

    if report.all_passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{} case(s) failed", report.failed);
        Ok(ExitCode::FAILURE)
    }
}

async fn list_sources(
    config_path: Option<&Path>,
    knowledge_base: Option<String>,
) -> Result<ExitCode> {
    let mut config = load_config(config_path)?;
    if knowledge_base.is_some() {
        config.knowledge_base.knowledge_base_id = knowledge_base;
    }
    let kb_id = config.knowledge_base.require_knowledge_base_id()?;
    let client = create_knowledge_base_client(&config.knowledge_base)?;

    let sources = client
        .list_sources(kb_id)
        .await
        .context("Failed to list data sources")?;

    if sources.is_empty() {
        println!("No data sources connected to {kb_id}");
        return Ok(ExitCode::SUCCESS);
    }

    for source in &sources {
        println!(
            "{:<14} {:<32} {:<10} {}",
            source.id.as_deref().unwrap_or("-"),
            source.name.as_deref().unwrap_or("-"),
            source.status.as_deref().unwrap_or("-"),
            source.updated_at.as_deref().unwrap_or("-")
        );
    }
    println!("\n{} data sources", sources.len());
    Ok(ExitCode::SUCCESS)
}

async fn show_info(config_path: Option<&Path>, knowledge_base: Option<String>) -> Result<ExitCode> {
    let mut config = load_config(config_path)?;
    if knowledge_base.is_some() {
        config.knowledge_base.knowledge_base_id = knowledge_base;
    }
    let kb_id = config.knowledge_base.require_knowledge_base_id()?;
    let client = create_knowledge_base_client(&config.knowledge_base)?;

    let info = client
        .knowledge_base_info(kb_id)
        .await
        .context("Failed to fetch knowledge base info")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&info).context("Failed to serialize knowledge base info")?
    );
    Ok(ExitCode::SUCCESS)
}

fn compare_reports(
    config_path: Option<&Path>,
    baseline: &Path,
    current: Option<PathBuf>,
    fail_on_regression: bool,
) -> Result<ExitCode> {
    let current = match current {
        Some(path) => path,
        None => {
            let config = load_config(config_path)?;
            Path::new(&config.runner.output_dir).join(kbeval_evals::report::LATEST_SNAPSHOT)
        }
    };

    let baseline_report = Report::load(baseline)
        .with_context(|| format!("Failed to load baseline report {}", baseline.display()))?;
    let current_report = Report::load(&current)
        .with_context(|| format!("Failed to load report {}", current.display()))?;

    let comparison = compare(&baseline_report, &current_report);
    print!("{}", comparison.summary());

    if fail_on_regression && comparison.has_regressions() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
