use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "impact-engine",
    version,
    about = "Temporal impact analysis for business events"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one analysis job and print its result as JSON.
    Run(RunArgs),
    /// List the supported job types.
    ListJobs,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[arg(long)]
    pub job_type: String,
    /// JSON file with the job params.
    #[arg(long)]
    pub params: PathBuf,
    /// JSON dataset to analyse instead of Postgres.
    #[arg(long)]
    pub dataset: Option<PathBuf>,
}
