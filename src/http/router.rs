//! Per-worker request routing.
//!
//! The [`Router`] turns one HTTP request into at most one repository call and
//! formats the result. It keeps no state between requests apart from the
//! repository handle it was built with.

use std::time::Duration;

use hyper::body::HttpBody;
use hyper::header::{HeaderMap, CONTENT_LENGTH};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use crate::clients::{ActorClient, Repository};
use crate::http::response::{empty, error_response, json};
use crate::http::ApiError;
use crate::resource_actor::RepositoryError;

pub const COLLECTION_PATH: &str = "/api/resources";

pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
pub const DEFAULT_BODY_TIMEOUT: Duration = Duration::from_secs(10);

/// Bounds applied to every buffered request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyLimits {
    pub max_bytes: usize,
    pub timeout: Duration,
}

impl Default for BodyLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BODY_BYTES,
            timeout: DEFAULT_BODY_TIMEOUT,
        }
    }
}

/// The client went away before the request body was complete.
///
/// Returned as the service error so that hyper drops the connection without
/// writing a response.
#[derive(Debug, Error)]
#[error("request abandoned before end of body: {0}")]
pub struct RequestAbandoned(#[source] hyper::Error);

/// Why a request did not produce a success response.
#[derive(Debug)]
enum Rejection {
    Api(ApiError),
    Abandoned(RequestAbandoned),
}

impl From<ApiError> for Rejection {
    fn from(err: ApiError) -> Self {
        Rejection::Api(err)
    }
}

impl From<RepositoryError> for Rejection {
    fn from(err: RepositoryError) -> Self {
        Rejection::Api(err.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route<'a> {
    Collection,
    Item(&'a str),
}

fn parse_route(path: &str) -> Option<Route<'_>> {
    let rest = path.strip_prefix(COLLECTION_PATH)?;
    if rest.is_empty() {
        return Some(Route::Collection);
    }
    let id = rest.strip_prefix('/')?;
    if id.is_empty() || id.contains('/') {
        None
    } else {
        Some(Route::Item(id))
    }
}

#[derive(Clone)]
pub struct Router {
    repository: Repository,
    limits: BodyLimits,
}

impl Router {
    pub fn new(repository: Repository, limits: BodyLimits) -> Self {
        Self { repository, limits }
    }

    /// Answers one request.
    ///
    /// `OPTIONS` is answered before any routing. Every other outcome is a
    /// response, except a client disconnect during the body read, which
    /// surfaces as [`RequestAbandoned`] with no repository call made.
    #[instrument(skip_all, fields(method = %req.method(), path = %req.uri().path()))]
    pub async fn handle(&self, req: Request<Body>) -> Result<Response<Body>, RequestAbandoned> {
        if req.method() == Method::OPTIONS {
            return Ok(empty(StatusCode::OK));
        }

        let (parts, body) = req.into_parts();
        match self.dispatch(&parts.method, parts.uri.path(), &parts.headers, body).await {
            Ok(response) => Ok(response),
            Err(Rejection::Api(err)) => {
                match &err {
                    ApiError::Internal(detail) => error!(detail = %detail, "Internal fault"),
                    other => debug!(status = %other.status(), error = %other, "Rejected"),
                }
                Ok(error_response(&err))
            }
            Err(Rejection::Abandoned(abandoned)) => {
                warn!(error = %abandoned, "Request abandoned");
                Err(abandoned)
            }
        }
    }

    async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        body: Body,
    ) -> Result<Response<Body>, Rejection> {
        let route = parse_route(path).ok_or(ApiError::UnknownRoute)?;

        match (method, route) {
            (&Method::GET, Route::Collection) => {
                let resources = self.repository.list().await?;
                Ok(json(StatusCode::OK, &resources))
            }
            (&Method::GET, Route::Item(id)) => {
                let resource = self.repository.read(id).await?;
                Ok(json(StatusCode::OK, &resource))
            }
            (&Method::POST, Route::Collection) => {
                let candidate = self.read_json(headers, body).await?;
                let resource = self.repository.create(candidate).await?;
                Ok(json(StatusCode::CREATED, &resource))
            }
            (&Method::PUT, Route::Item(id)) => {
                let candidate = self.read_json(headers, body).await?;
                let resource = self.repository.update(id, candidate).await?;
                Ok(json(StatusCode::OK, &resource))
            }
            (&Method::DELETE, Route::Item(id)) => {
                self.repository.delete(id).await?;
                Ok(empty(StatusCode::NO_CONTENT))
            }
            _ => Err(ApiError::UnknownRoute.into()),
        }
    }

    /// Buffers the whole body within the configured limits, then parses it.
    async fn read_json(&self, headers: &HeaderMap, body: Body) -> Result<Value, Rejection> {
        let bytes = tokio::time::timeout(
            self.limits.timeout,
            read_body(headers, body, self.limits.max_bytes),
        )
        .await
        .map_err(|_| ApiError::BodyTimeout)??;

        if bytes.is_empty() {
            return Err(ApiError::EmptyBody.into());
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            debug!(error = %e, "Body is not valid JSON");
            ApiError::MalformedPayload.into()
        })
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

async fn read_body(headers: &HeaderMap, mut body: Body, limit: usize) -> Result<Vec<u8>, Rejection> {
    if declared_length(headers).is_some_and(|len| len > limit) {
        return Err(ApiError::PayloadTooLarge { limit }.into());
    }

    let mut buffer = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|e| Rejection::Abandoned(RequestAbandoned(e)))?;
        if buffer.len() + chunk.len() > limit {
            return Err(ApiError::PayloadTooLarge { limit }.into());
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer)
}
