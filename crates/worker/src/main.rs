//! Truth Lens Worker
//!
//! Command-line entry point for the verification pipeline:
//! 1. `verify` runs one verification under the configured deadline
//! 2. `watch` reads one item per stdin line and verifies each new one
//!
//! Every outcome is enriched where possible, stored, and printed as JSON.

mod runner;

use anyhow::Result;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;
use truthlens_common::config::ObservabilityConfig;
use truthlens_common::llm::create_understanding;
use truthlens_common::lookup::create_lookup;
use truthlens_common::metrics::{register_metrics, STAGE_BUCKETS};
use truthlens_common::retrieval::create_retriever;
use truthlens_common::store::InMemoryStore;
use truthlens_common::{AppConfig, VERSION};
use truthlens_pipeline::{
    Categorizer, Cl100kCounter, HeadlineGenerator, Pipeline, PipelineDeps, VerificationInput,
};

use crate::runner::{ItemOutput, Runner};

#[derive(Parser, Debug)]
#[command(name = "truthlens-worker", about = "Truth Lens claim verification worker", version)]
struct Args {
    /// Configuration file to load instead of the layered defaults
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify a piece of text or the page behind a URL
    Verify {
        /// Text or URL to verify
        content: String,

        /// Treat the content as a URL
        #[arg(long, conflicts_with = "text")]
        url: bool,

        /// Treat the content as text even if it looks like a URL
        #[arg(long)]
        text: bool,
    },
    /// Verify items read one per line from stdin
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    init_tracing(&config.observability);
    let service = config.observability.service_name.as_str();
    info!(service, "Starting Truth Lens Worker v{}", VERSION);

    if config.observability.metrics_port != 0 {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.observability.metrics_port))
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                STAGE_BUCKETS,
            )?
            .install()?;
        info!(port = config.observability.metrics_port, "Prometheus exporter listening");
    }
    register_metrics();

    let runner = build_runner(&config)?;
    run(args.command, &runner)
        .instrument(info_span!("worker", service))
        .await?;

    info!("Truth Lens Worker stopped");
    Ok(())
}

async fn run(command: Command, runner: &Runner) -> Result<()> {
    match command {
        Command::Verify { content, url, text } => {
            let input = if url {
                VerificationInput::Url(content)
            } else if text {
                VerificationInput::Text(content)
            } else {
                VerificationInput::detect(&content)
            };

            let output = runner.verify(&input).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);

            if output.is_failure() {
                std::process::exit(1);
            }
        }
        Command::Watch => watch(runner).await?,
    }
    Ok(())
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&observability.log_level));

    // stdout carries results; logs go to stderr
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_runner(config: &AppConfig) -> Result<Runner> {
    let extraction_llm = create_understanding(&config.llm, &config.llm.extraction_model)?;
    let reasoning_llm = create_understanding(&config.llm, config.reasoning_model())?;
    info!(
        extraction_model = %extraction_llm.model_name(),
        reasoning_model = %reasoning_llm.model_name(),
        "Understanding capability initialized"
    );

    let deps = PipelineDeps {
        extraction_llm: extraction_llm.clone(),
        reasoning_llm,
        lookup: create_lookup(&config.search)?,
        retriever: create_retriever(
            &config.retrieval,
            config.retrieval_api_key().map(str::to_string),
        )?,
        token_counter: Arc::new(Cl100kCounter::new()?),
    };

    let pipeline = Pipeline::from_config(deps, config);
    info!(
        deadline_secs = pipeline.deadline().as_secs(),
        policy = ?config.pipeline.reasoning_policy,
        "Pipeline ready"
    );

    Ok(Runner::new(
        pipeline,
        HeadlineGenerator::new(extraction_llm.clone()),
        Categorizer::new(extraction_llm),
        Arc::new(InMemoryStore::new()),
    ))
}

/// Process stdin line by line until EOF or Ctrl+C
async fn watch(runner: &Runner) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut processed = 0usize;

    info!("Watching stdin for items");

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        };

        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let input = VerificationInput::detect(line);
        match runner.process_monitored(&input).await {
            Ok(output) => {
                if let ItemOutput::Failed { kind, .. } = &output {
                    warn!(kind, "Item failed verification");
                }
                println!("{}", serde_json::to_string(&output)?);
                processed += 1;
            }
            Err(e) => {
                error!(error = %e, "Failed to record item");
                println!(
                    "{}",
                    serde_json::json!({ "status": "error", "input": line, "error": e.to_string() })
                );
            }
        }
    }

    info!(processed, "Input stream closed");
    Ok(())
}
