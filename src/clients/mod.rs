//! Type-safe wrappers around [`ResourceClient`](crate::framework::ResourceClient).

pub mod actor_client;
pub mod repository;

pub use actor_client::*;
pub use repository::*;
