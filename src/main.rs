use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tracing::{error, info};

use resource_cluster::config::{Cli, Command};
use resource_cluster::http::{self, ServerError};
use resource_cluster::lifecycle::{
    run_single, run_worker, setup_tracing, shutdown_signal, Cluster, ClusterError, WorkerLaunch,
};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error("cannot locate the current executable: {0}")]
    CurrentExe(#[source] std::io::Error),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_tracing();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let limits = cli.http.limits();
    match cli.command {
        Some(Command::Worker(ref worker)) => {
            run_worker(worker.worker_id, worker.worker_port, limits, shutdown_signal()).await?;
        }
        Some(Command::Serve) => {
            info!(port = cli.port, "Starting single-process server");
            run_single(cli.public_addr(), limits, shutdown_signal()).await?;
        }
        None => {
            let mut args = cli.http.to_args();
            args.push("worker".into());
            let launch = WorkerLaunch {
                program: std::env::current_exe().map_err(AppError::CurrentExe)?,
                args,
            };

            let listener = http::bind(cli.public_addr())?;
            let config = cli.cluster.supervisor_config(cli.port, launch);
            let cluster = Cluster::start(listener, cli.cluster.balance, config)?;
            cluster.run_until(shutdown_signal()).await?;
        }
    }
    info!("Stopped");
    Ok(())
}
