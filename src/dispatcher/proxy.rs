//! Pass-through forwarding of one request to one worker.
//!
//! Request and response bodies are handed to hyper as streams, so neither is
//! buffered here and backpressure flows in both directions.

use hyper::client::HttpConnector;
use hyper::header::{HeaderMap, HeaderName};
use hyper::http::uri::InvalidUri;
use hyper::{Body, Client, Request, Response, Uri, Version};
use tracing::{debug, error, instrument, warn};

use crate::dispatcher::balancer::Balancer;
use crate::http::response::error_response;
use crate::http::ApiError;

/// Connection-scoped headers that must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(HeaderName::from_static(name));
    }
}

/// Rewrites `req` to target the worker on `127.0.0.1:port`, keeping method,
/// path, query, end-to-end headers and the (unread) body stream.
fn upstream_request(req: Request<Body>, port: u16) -> Result<Request<Body>, InvalidUri> {
    let (mut parts, body) = req.into_parts();
    let target = match parts.uri.path_and_query() {
        Some(path) => format!("http://127.0.0.1:{port}{path}"),
        None => format!("http://127.0.0.1:{port}/"),
    };
    parts.uri = target.parse::<Uri>()?;
    parts.version = Version::HTTP_11;
    strip_hop_by_hop(&mut parts.headers);
    Ok(Request::from_parts(parts, body))
}

pub struct Dispatcher {
    balancer: Balancer,
    client: Client<HttpConnector>,
}

impl Dispatcher {
    pub fn new(balancer: Balancer) -> Self {
        Self {
            balancer,
            client: Client::new(),
        }
    }

    /// Forwards one request and returns the worker's response unchanged apart
    /// from hop-by-hop headers. Failures are answered locally, never retried.
    #[instrument(skip_all, fields(method = %req.method(), path = %req.uri().path()))]
    pub async fn forward(&self, req: Request<Body>) -> Response<Body> {
        let Some(worker) = self.balancer.select() else {
            warn!(policy = ?self.balancer.policy(), "No ready worker");
            return error_response(&ApiError::NoWorkers);
        };

        let upstream = match upstream_request(req, worker.port) {
            Ok(upstream) => upstream,
            Err(e) => {
                error!(worker = worker.id, error = %e, "Failed to build upstream request");
                return error_response(&ApiError::Internal(e.to_string()));
            }
        };

        match self.client.request(upstream).await {
            Ok(mut response) => {
                debug!(worker = worker.id, status = %response.status(), "Forwarded");
                strip_hop_by_hop(response.headers_mut());
                response
            }
            Err(e) => {
                warn!(worker = worker.id, port = worker.port, error = %e, "Upstream request failed");
                error_response(&ApiError::UpstreamUnavailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{CONNECTION, CONTENT_TYPE, HOST};
    use hyper::Method;

    #[test]
    fn rewrites_target_and_drops_connection_headers() {
        let req = Request::builder()
            .method(Method::PUT)
            .uri("/api/resources/abc?x=1")
            .header(HOST, "example.com")
            .header(CONTENT_TYPE, "application/json")
            .header(CONNECTION, "keep-alive")
            .header("transfer-encoding", "chunked")
            .body(Body::from("{}"))
            .unwrap();

        let upstream = upstream_request(req, 4002).unwrap();
        assert_eq!(upstream.method(), Method::PUT);
        assert_eq!(upstream.uri(), "http://127.0.0.1:4002/api/resources/abc?x=1");
        assert_eq!(upstream.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(upstream.headers()[HOST], "example.com");
        assert!(upstream.headers().get(CONNECTION).is_none());
        assert!(upstream.headers().get("transfer-encoding").is_none());
    }
}
