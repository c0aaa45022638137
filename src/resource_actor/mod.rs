//! Resource-specific repository logic and entity implementation.

pub mod entity;
pub mod error;

pub use error::*;

use crate::clients::Repository;
use crate::domain::Resource;
use crate::framework::ResourceActor;
use uuid::Uuid;

/// Mailbox depth for a repository actor.
const MAILBOX_SIZE: usize = 64;

/// Creates a new resource actor and its repository handle.
///
/// Every call yields an independent store: two repositories never share or
/// replicate entries.
pub fn new() -> (ResourceActor<Resource>, Repository) {
    let (actor, generic_client) = ResourceActor::new(MAILBOX_SIZE, Uuid::new_v4);
    let repository = Repository::new(generic_client);

    (actor, repository)
}

/// Creates a repository and runs its actor on the current runtime.
pub fn spawn() -> (Repository, tokio::task::JoinHandle<()>) {
    let (actor, repository) = new();
    let handle = tokio::spawn(actor.run());
    (repository, handle)
}
