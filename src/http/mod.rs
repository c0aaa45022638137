//! HTTP surface of a worker: routing, response formatting and the server loop.

pub mod error;
pub mod response;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use router::{BodyLimits, RequestAbandoned, Router};
pub use server::{bind, serve, ServerError};
