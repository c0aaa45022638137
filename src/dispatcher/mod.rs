//! # Front Dispatcher
//!
//! The only externally bound listener. Every inbound request is forwarded to a
//! worker chosen by the [`Balancer`] and the worker's response is streamed back.

pub mod balancer;
pub mod proxy;

pub use balancer::{Balancer, SelectionPolicy};
pub use proxy::Dispatcher;

use std::convert::Infallible;
use std::future::Future;
use std::net::TcpListener;
use std::sync::Arc;

use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use tracing::info;

use crate::http::ServerError;

/// Serves the dispatcher on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    dispatcher: Dispatcher,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServerError> {
    let local_addr = listener.local_addr().ok();
    let dispatcher = Arc::new(dispatcher);

    let make_svc = make_service_fn(move |_conn| {
        let dispatcher = dispatcher.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let dispatcher = dispatcher.clone();
                async move { Ok::<_, Infallible>(dispatcher.forward(req).await) }
            }))
        }
    });

    info!(addr = ?local_addr, "Dispatcher listening");
    Server::from_tcp(listener)?
        .serve(make_svc)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!(addr = ?local_addr, "Dispatcher stopped");
    Ok(())
}
