//! # ETL CLI Tool
//!
//! Command-line interface for launching ETL workflows and inspecting backend
//! jobs, data sources and the effective configuration.

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use etl_orchestrator::client::{AuthFailureHandler, HttpJobBackend, JobBackend};
use etl_orchestrator::config::ConfigManager;
use etl_orchestrator::events::OrchestratorEvent;
use etl_orchestrator::logging;
use etl_orchestrator::models::{JobId, LaunchParams, WorkflowVariant};
use etl_orchestrator::orchestration::{Orchestrator, WorkflowState};

#[derive(Parser, Debug)]
#[command(name = "etl-cli")]
#[command(about = "Command-line interface for the ETL workflow orchestrator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file path (default: config/orchestrator.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Launch a workflow and follow it until every job is ready
    Run {
        /// extract-only, extract-then-transform, extract-transform-load, transform-only or load-only
        #[arg(value_name = "VARIANT")]
        variant: WorkflowVariant,
        /// Reprocess records that were already handled
        #[arg(long)]
        force_reprocess: bool,
        /// Restrict to a user (repeatable)
        #[arg(long = "user-id", value_name = "ID")]
        user_ids: Vec<i64>,
        /// First record day to include (YYYY-MM-DD)
        #[arg(long)]
        since: Option<NaiveDate>,
        /// Last record day to include (YYYY-MM-DD)
        #[arg(long)]
        until: Option<NaiveDate>,
    },
    /// Show the status of one backend job
    Status {
        #[arg(value_name = "JOB_ID")]
        job_id: String,
    },
    /// Show the result of a finished backend job
    Result {
        #[arg(value_name = "JOB_ID")]
        job_id: String,
    },
    /// List configured data sources
    Sources,
    /// Print the effective configuration with secrets masked
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_structured_logging();
    let cli = Cli::parse();

    let manager = ConfigManager::load(cli.config.clone())
        .context("Failed to load orchestrator configuration")?;
    info!(
        environment = %manager.environment(),
        config_file = %manager.config_file().display(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Run {
            variant,
            force_reprocess,
            user_ids,
            since,
            until,
        } => {
            let params = LaunchParams {
                force_reprocess,
                user_ids: (!user_ids.is_empty()).then_some(user_ids),
                since,
                until,
                ..LaunchParams::default()
            };
            run_workflow(manager, variant, params).await
        }
        Commands::Status { job_id } => {
            let backend = HttpJobBackend::new(&manager.config().backend)?;
            let status = backend.get_status(&JobId::new(job_id)).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Commands::Result { job_id } => {
            let backend = HttpJobBackend::new(&manager.config().backend)?;
            let result = backend.get_result(&JobId::new(job_id)).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Commands::Sources => {
            let backend = HttpJobBackend::new(&manager.config().backend)?;
            let sources = backend.list_data_sources().await?;
            if sources.is_empty() {
                println!("No data sources configured");
            }
            for source in sources {
                println!(
                    "  {:>4}  {:<30} {:>10} records  {}",
                    source.source_id,
                    source.name,
                    source.record_count,
                    source.source_type.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
            Ok(())
        }
    }
}

async fn run_workflow(
    manager: ConfigManager,
    variant: WorkflowVariant,
    params: LaunchParams,
) -> anyhow::Result<()> {
    let handler: Arc<dyn AuthFailureHandler> = Arc::new(|operation: &'static str, status: u16| {
        eprintln!("✗ Backend rejected credentials during {operation} (HTTP {status})");
    });
    let orchestrator = Orchestrator::from_config_with_auth_handler(manager.into_config(), handler)?;
    let mut events = orchestrator.subscribe();

    let invocation = orchestrator
        .launch_workflow(variant, params)
        .await
        .with_context(|| format!("Failed to launch '{variant}'"))?;
    println!("✓ Launched {} ({})", invocation.description, invocation.invocation_id);
    for tracked in &invocation.stages {
        println!("  {:<10} {}", tracked.stage, tracked.job_id);
    }

    let final_state = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted; stopping poll loop");
                orchestrator.teardown();
                bail!("Interrupted before workflow finished");
            }
            event = events.recv() => match event {
                Ok(OrchestratorEvent::StateUpdated { state })
                    if state.invocation_id == invocation.invocation_id =>
                {
                    render(&state);
                }
                Ok(OrchestratorEvent::WorkflowCompleted { state, .. })
                    if state.invocation_id == invocation.invocation_id =>
                {
                    render(&state);
                    break state;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => bail!("Event stream closed before workflow finished"),
            },
        }
    };

    orchestrator.teardown();
    if final_state.failed {
        bail!("Workflow '{variant}' finished with failures");
    }
    println!("✓ Workflow '{variant}' finished");
    Ok(())
}

fn render(state: &WorkflowState) {
    println!("{}", progress_line(state));
}

fn progress_line(state: &WorkflowState) -> String {
    let stages: Vec<String> = state
        .stages
        .iter()
        .map(|snapshot| {
            let mut line = format!(
                "{} {:>3}% {}",
                snapshot.stage, snapshot.progress, snapshot.status.state
            );
            if snapshot.failure.is_failure() {
                let detail = snapshot
                    .status
                    .info
                    .as_ref()
                    .and_then(|info| info.error().or_else(|| info.message()));
                match detail {
                    Some(detail) => {
                        line.push_str(&format!(" ({}: {detail})", snapshot.failure.label()))
                    }
                    None => line.push_str(&format!(" ({})", snapshot.failure.label())),
                }
            }
            line
        })
        .collect();
    format!("[tick {:>4}] {}", state.ticks, stages.join(" | "))
}
