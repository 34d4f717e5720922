use anyhow::{Context, Result};
use clap::Parser;
use impact_engine_rs::cli::{Cli, Commands, RunArgs};
use impact_engine_rs::config::EngineConfig;
use impact_engine_rs::db;
use impact_engine_rs::services::analysis::jobs::{AnalysisEngine, ImpactJobTypeV1, JobFailure};
use impact_engine_rs::services::analysis::repository::{
    InMemoryRepository, PgTimeSeriesRepository, TimeSeriesRepository,
};
use tokio_util::sync::CancellationToken;

async fn run_job<R: TimeSeriesRepository>(
    engine: AnalysisEngine<R>,
    args: &RunArgs,
    cancel: CancellationToken,
) -> Result<()> {
    let raw = std::fs::read_to_string(&args.params)
        .with_context(|| format!("failed to read params {}", args.params.display()))?;
    let params: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("params {} are not valid JSON", args.params.display()))?;

    match engine.execute(&args.job_type, params, &cancel).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(JobFailure::Canceled) => anyhow::bail!("job {} was canceled", args.job_type),
        Err(JobFailure::Failed(error)) => {
            eprintln!("{}", serde_json::to_string_pretty(&error)?);
            anyhow::bail!("job {} failed: {}", args.job_type, error.message)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = match cli.command {
        Commands::ListJobs => {
            for job_type in ImpactJobTypeV1::ALL {
                println!("{}", job_type.as_str());
            }
            return Ok(());
        }
        Commands::Run(args) => args,
    };

    let config = EngineConfig::from_env()?;
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            signal_cancel.cancel();
        }
    });

    match args.dataset.as_deref() {
        Some(path) => {
            let repo = InMemoryRepository::from_json_file(path)?;
            run_job(AnalysisEngine::new(repo, config), &args, cancel).await
        }
        None => {
            let database_url = config
                .database_url
                .clone()
                .context("IMPACT_DATABASE_URL is required when no --dataset is given")?;
            let pool = db::connect_lazy(&database_url)?;
            let repo = PgTimeSeriesRepository::new(pool);
            run_job(AnalysisEngine::new(repo, config), &args, cancel).await
        }
    }
}
