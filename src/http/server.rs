//! Worker HTTP server: binds a listener and drives a [`Router`] with hyper.

use std::convert::Infallible;
use std::future::Future;
use std::net::{SocketAddr, TcpListener};

use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::http::response::error_response;
use crate::http::router::{RequestAbandoned, Router};
use crate::http::ApiError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP server error: {0}")]
    Serve(#[from] hyper::Error),
}

/// Binds a non-blocking listener suitable for [`hyper::Server::from_tcp`].
pub fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    let listener = TcpListener::bind(addr).map_err(|source| ServerError::Bind { addr, source })?;
    listener
        .set_nonblocking(true)
        .map_err(|source| ServerError::Bind { addr, source })?;
    Ok(listener)
}

/// Runs one request handler in its own task so that a panic is caught here and
/// answered with a generic 500 instead of tearing down the connection task.
async fn run_guarded<F>(handler: F) -> Result<Response<Body>, RequestAbandoned>
where
    F: Future<Output = Result<Response<Body>, RequestAbandoned>> + Send + 'static,
{
    match tokio::spawn(handler).await {
        Ok(outcome) => outcome,
        Err(join_error) => {
            error!(error = %join_error, "Request handler failed");
            Ok(error_response(&ApiError::Internal(join_error.to_string())))
        }
    }
}

async fn handle_guarded(router: Router, req: Request<Body>) -> Result<Response<Body>, RequestAbandoned> {
    run_guarded(async move { router.handle(req).await }).await
}

/// Serves `router` on `listener` until `shutdown` resolves, then drains open
/// connections.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServerError> {
    let local_addr = listener.local_addr().ok();

    let make_svc = make_service_fn(move |conn: &AddrStream| {
        let router = router.clone();
        let remote = conn.remote_addr();
        async move {
            debug!(%remote, "Connection accepted");
            Ok::<_, Infallible>(service_fn(move |req| handle_guarded(router.clone(), req)))
        }
    });

    info!(addr = ?local_addr, "Listening");
    Server::from_tcp(listener)?
        .serve(make_svc)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!(addr = ?local_addr, "Server stopped");
    Ok(())
}
