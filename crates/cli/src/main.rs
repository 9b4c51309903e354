//! Magpie CLI
//!
//! Queries a running Magpie server for the traffic and performance models
//! it offers for Apache Heron topologies, and runs predictions with them.

mod client;
mod commands;
mod output;

use clap::{Parser, Subcommand};
use client::{ApiClient, ClientError};
use commands::{topology, traffic, Target};
use std::time::Duration;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Magpie CLI
#[derive(Parser)]
#[command(name = "magpie")]
#[command(author, version, about = "CLI for the Magpie Heron modelling server", long_about = None)]
pub struct Cli {
    /// Server URL; `http://` is assumed when no scheme is given
    #[arg(long, short, env = "MAGPIE_URL")]
    pub url: String,

    /// Output debug level information
    #[arg(long)]
    pub debug: bool,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Seconds to wait for the server to answer
    #[arg(long, env = "MAGPIE_TIMEOUT", default_value_t = client::DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apache Heron modelling options
    #[command(subcommand)]
    Heron(HeronCommands),
}

#[derive(Subcommand)]
pub enum HeronCommands {
    /// Heron topology traffic modelling options
    #[command(subcommand)]
    Traffic(TrafficCommands),

    /// Heron topology performance modelling options
    #[command(subcommand)]
    Topology(TopologyCommands),
}

#[derive(clap::Args)]
pub struct TargetArgs {
    /// The topology ID string
    #[arg(long, short = 't')]
    pub topology_id: String,

    /// The cluster name
    #[arg(long, short)]
    pub cluster: String,

    /// The environment (PROD, DEVEL etc)
    #[arg(long, short)]
    pub environ: String,

    /// Run only this model (all configured models when omitted)
    #[arg(long, short)]
    pub model: Option<String>,
}

impl From<TargetArgs> for Target {
    fn from(args: TargetArgs) -> Self {
        Target {
            topology_id: args.topology_id,
            cluster: args.cluster,
            environ: args.environ,
            model: args.model,
        }
    }
}

#[derive(Subcommand)]
pub enum TrafficCommands {
    /// List available traffic models
    #[command(alias = "model_info")]
    ModelInfo,

    /// Predict traffic levels into a topology
    Prediction {
        #[command(flatten)]
        target: TargetArgs,

        /// Hours of source data to use in the prediction
        #[arg(long, alias = "source_hours")]
        source_hours: f64,

        /// Minutes of future traffic to predict
        #[arg(long, alias = "future_mins")]
        future_mins: f64,
    },
}

#[derive(Subcommand)]
pub enum TopologyCommands {
    /// List available topology performance models
    #[command(alias = "model_info")]
    ModelInfo,

    /// Predict the performance of a topology
    Prediction {
        #[command(flatten)]
        target: TargetArgs,

        /// Hours of source data to use in the prediction
        #[arg(long, alias = "source_hours")]
        source_hours: Option<f64>,

        /// Model a proposed packing plan instead of the running one
        #[arg(long)]
        proposed: bool,

        /// Proposed parallelism as component=N (repeatable)
        #[arg(long, requires = "proposed", value_parser = topology::parse_parallelism)]
        parallelism: Vec<(String, u32)>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .with_target(cli.debug)
        .init();

    let client = ApiClient::new(&cli.url, Duration::from_secs(cli.timeout))?;

    let result = match cli.command {
        Commands::Heron(HeronCommands::Traffic(cmd)) => match cmd {
            TrafficCommands::ModelInfo => traffic::model_info(&client, cli.format).await,
            TrafficCommands::Prediction {
                target,
                source_hours,
                future_mins,
            } => {
                traffic::prediction(&client, &target.into(), source_hours, future_mins, cli.format)
                    .await
            }
        },
        Commands::Heron(HeronCommands::Topology(cmd)) => match cmd {
            TopologyCommands::ModelInfo => topology::model_info(&client, cli.format).await,
            TopologyCommands::Prediction {
                target,
                source_hours,
                proposed,
                parallelism,
            } => {
                topology::prediction(
                    &client,
                    &target.into(),
                    source_hours,
                    proposed,
                    &parallelism,
                    cli.format,
                )
                .await
            }
        },
    };

    match result {
        Ok(()) => Ok(()),
        Err(e @ ClientError::Unreachable { .. }) => {
            error!("{}", e);
            Ok(())
        }
        Err(e) => {
            output::print_error(&e.to_string());
            std::process::exit(1);
        }
    }
}
