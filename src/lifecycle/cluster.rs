use std::future::Future;
use std::net::{SocketAddr, TcpListener};

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::dispatcher::{self, Balancer, Dispatcher, SelectionPolicy};
use crate::http::ServerError;
use crate::lifecycle::registry::WorkerRegistry;
use crate::lifecycle::supervisor::{Supervisor, SupervisorConfig, SupervisorError, SupervisorHandle};

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    #[error("dispatcher failed: {0}")]
    Dispatcher(#[from] ServerError),
    #[error("dispatcher task failed: {0}")]
    DispatcherTask(#[source] tokio::task::JoinError),
}

/// The primary process: a supervisor owning the worker processes and the
/// dispatcher forwarding to them.
///
/// Both share one [`WorkerRegistry`]; the supervisor writes worker states into
/// it and the dispatcher's balancer reads them on every request.
///
/// # Example
///
/// ```ignore
/// let listener = http::bind(addr)?;
/// let cluster = Cluster::start(listener, SelectionPolicy::RoundRobin, supervisor_config)?;
///
/// cluster.run_until(shutdown_signal()).await?;
/// ```
pub struct Cluster {
    local_addr: Option<SocketAddr>,
    supervisor: SupervisorHandle,
    dispatcher: JoinHandle<Result<(), ServerError>>,
    stop_dispatcher: oneshot::Sender<()>,
}

impl Cluster {
    /// Launches the workers and starts dispatching on `listener`.
    ///
    /// The dispatcher accepts connections immediately; until a worker reports
    /// ready it answers with 503.
    pub fn start(
        listener: TcpListener,
        policy: SelectionPolicy,
        config: SupervisorConfig,
    ) -> Result<Self, ClusterError> {
        let local_addr = listener.local_addr().ok();
        let registry = WorkerRegistry::new();
        let supervisor = Supervisor::new(config, registry.clone()).start()?;

        let (stop_dispatcher, stopped) = oneshot::channel::<()>();
        let front = Dispatcher::new(Balancer::new(policy, registry));
        let dispatcher = tokio::spawn(dispatcher::serve(listener, front, async {
            let _ = stopped.await;
        }));

        info!(addr = ?local_addr, ?policy, "Cluster started");
        Ok(Self {
            local_addr,
            supervisor,
            dispatcher,
            stop_dispatcher,
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn registry(&self) -> WorkerRegistry {
        self.supervisor.registry()
    }

    /// Runs until `shutdown` resolves or the dispatcher stops on its own, then
    /// shuts everything down.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<(), ClusterError> {
        let Self {
            supervisor,
            mut dispatcher,
            stop_dispatcher,
            ..
        } = self;

        tokio::select! {
            _ = shutdown => {
                info!("Shutdown requested");
            }
            joined = &mut dispatcher => {
                error!("Dispatcher stopped unexpectedly");
                supervisor.shutdown().await?;
                return flatten(joined);
            }
        }

        let _ = stop_dispatcher.send(());
        let served = flatten(dispatcher.await);
        supervisor.shutdown().await?;
        served
    }

    /// Stops accepting requests, drains the dispatcher, then stops the workers.
    pub async fn shutdown(self) -> Result<(), ClusterError> {
        self.run_until(std::future::ready(())).await
    }
}

fn flatten(joined: Result<Result<(), ServerError>, tokio::task::JoinError>) -> Result<(), ClusterError> {
    joined.map_err(ClusterError::DispatcherTask)?.map_err(ClusterError::from)
}
