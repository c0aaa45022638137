//! Runtime orchestration and lifecycle management.
//!
//! - [`Cluster`] - supervisor plus dispatcher, the default run mode
//! - [`Supervisor`] - spawns worker processes and tracks them in the [`WorkerRegistry`]
//! - [`run_worker`] / [`run_single`] - a repository and router behind one listener
//! - [`setup_tracing`] - initializes the tracing/logging infrastructure

pub mod cluster;
pub mod registry;
pub mod supervisor;
pub mod tracing;
pub mod worker;

pub use cluster::{Cluster, ClusterError};
pub use registry::{WorkerEntry, WorkerId, WorkerRegistry, WorkerState};
pub use supervisor::{
    default_worker_count, RestartPolicy, Supervisor, SupervisorConfig, SupervisorError, SupervisorHandle,
    WorkerLaunch, WORKER_ID_ENV, WORKER_PORT_ENV,
};
pub use self::tracing::setup_tracing;
pub use worker::{run_single, run_worker, serve_with_fresh_repository};

/// Resolves on Ctrl-C, or on SIGTERM on unix.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            ::tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                ::tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
}
