//! A worker: one repository actor, one router, one listener.

use std::future::Future;
use std::net::{SocketAddr, TcpListener};

use tracing::{error, info, info_span, Instrument};

use crate::http::{self, BodyLimits, Router, ServerError};
use crate::lifecycle::registry::WorkerId;

/// Runs a supervised worker on `127.0.0.1:port`.
///
/// Workers are only reachable through the dispatcher, so they never bind a
/// public interface.
pub async fn run_worker(
    id: WorkerId,
    port: u16,
    limits: BodyLimits,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServerError> {
    let span = info_span!("worker", id, port);
    async move {
        let listener = http::bind(SocketAddr::from(([127, 0, 0, 1], port)))?;
        serve_with_fresh_repository(listener, limits, shutdown).await
    }
    .instrument(span)
    .await
}

/// Runs a single unsupervised process directly on `addr`.
pub async fn run_single(
    addr: SocketAddr,
    limits: BodyLimits,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServerError> {
    let span = info_span!("serve", port = addr.port());
    async move {
        let listener = http::bind(addr)?;
        serve_with_fresh_repository(listener, limits, shutdown).await
    }
    .instrument(span)
    .await
}

/// Spawns a new, empty repository and serves it on `listener`.
///
/// Once the server has drained, the last repository handle is gone and the
/// actor's mailbox closes; the actor task is awaited so its final log lines
/// are emitted before returning.
pub async fn serve_with_fresh_repository(
    listener: TcpListener,
    limits: BodyLimits,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServerError> {
    let (repository, actor) = crate::resource_actor::spawn();
    let router = Router::new(repository, limits);

    let served = http::serve(listener, router, shutdown).await;

    match actor.await {
        Ok(()) => info!("Repository closed"),
        Err(e) => error!(error = %e, "Repository task failed"),
    }
    served
}
