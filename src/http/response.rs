//! Response builders shared by workers and the dispatcher.
//!
//! Every response, errors and empty bodies included, carries the JSON content
//! type and the CORS headers.

use hyper::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use hyper::{Body, Response, StatusCode};
use serde::Serialize;
use tracing::error;

use crate::http::ApiError;

pub const ALLOWED_METHODS: &str = "GET,POST,PUT,DELETE,OPTIONS";

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
}

pub fn apply_common_headers(headers: &mut HeaderMap) {
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Content-Type"));
}

fn with_body(status: StatusCode, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    apply_common_headers(response.headers_mut());
    response
}

/// A response with no body (204 on delete, 200 on preflight).
pub fn empty(status: StatusCode) -> Response<Body> {
    with_body(status, Body::empty())
}

pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    match serde_json::to_vec(value) {
        Ok(bytes) => with_body(status, Body::from(bytes)),
        Err(e) => {
            error!(error = %e, "Failed to serialize response body");
            error_response(&ApiError::Internal(e.to_string()))
        }
    }
}

/// `{"message": ...}` with the status that belongs to `err`.
pub fn error_response(err: &ApiError) -> Response<Body> {
    let message = err.to_string();
    let body = serde_json::to_vec(&ErrorBody { message: &message })
        .unwrap_or_else(|_| br#"{"message":"Internal server error"}"#.to_vec());
    with_body(err.status(), Body::from(body))
}
