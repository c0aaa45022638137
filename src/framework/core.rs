//! # Core Actor Framework
//!
//! This module defines the generic building blocks behind every repository.
//!
//! ## Key Types
//!
//! - [`ActorEntity`]: The trait that all stored resource types must implement.
//! - [`ResourceActor`]: The generic actor that owns an ordered store of entities.
//! - [`ResourceClient`]: The generic client for communicating with actors.
//! - [`FrameworkError`]: Common errors (e.g., ActorClosed, NotFound, Rejected).

use std::collections::{BTreeMap, HashMap};
use std::fmt::{Debug, Display};
use std::hash::Hash;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

// =============================================================================
// 1. THE ABSTRACTION
// =============================================================================

/// Ordered list of violated-rule messages produced by validation.
pub type Violations = Vec<String>;

/// Trait that any resource entity must implement to be managed by ResourceActor.
///
/// # Architecture Note
/// The actor never sees raw field rules. It hands the unvalidated `Candidate`
/// to [`ActorEntity::validate`], and only a validated `Draft` can become (or
/// replace) a stored entity. A rejected candidate therefore can never leave the
/// store half-updated.
///
/// Creation and replacement share the same candidate type: an update replaces
/// every field except the identifier, it never merges.
pub trait ActorEntity: Clone + Send + Sync + 'static {
    /// The unique identifier for this entity (e.g., String, Uuid, u64).
    type Id: Eq + Hash + Clone + Send + Sync + Display + Debug;

    /// The raw, unvalidated payload supplied by a caller.
    type Candidate: Send + Sync + Debug;

    /// The validated field set, ready to be stored.
    type Draft: Send + Debug;

    /// Check a candidate against the entity's field rules.
    fn validate(candidate: Self::Candidate) -> Result<Self::Draft, Violations>;

    /// Construct the full entity from a freshly generated ID and a validated draft.
    fn from_draft(id: Self::Id, draft: Self::Draft) -> Self;

    /// Replace every field except the identifier.
    fn replace(&mut self, draft: Self::Draft);
}

// =============================================================================
// 2. THE GENERIC MESSAGES & ERRORS
// =============================================================================

/// Errors that can occur within the actor framework itself.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum FrameworkError {
    #[error("Actor closed")]
    ActorClosed,
    #[error("Actor dropped response channel")]
    ActorDropped,
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Rejected: {}", .0.join(", "))]
    Rejected(Violations),
}

/// Type alias for the one-shot response channel used by actors.
pub type Response<T> = oneshot::Sender<Result<T, FrameworkError>>;

/// Internal message type sent to the actor to request operations.
///
/// # The CRUD Pattern
/// The variants map directly to standard **CRUD** operations plus a `List`
/// snapshot:
///
/// - **List**: Returns a cloned snapshot of every entity in insertion order.
/// - **Create**: Validates a candidate and stores a new entity under a fresh ID.
/// - **Get (Read)**: Fetches the current state of the entity by ID.
/// - **Update**: Validates a candidate and replaces the entity in place.
/// - **Delete**: Removes the entity.
///
/// Every message is handled to completion before the next one is received, so
/// each variant is atomic with respect to all others.
#[derive(Debug)]
pub enum ResourceRequest<T: ActorEntity> {
    List {
        respond_to: Response<Vec<T>>,
    },
    Create {
        candidate: T::Candidate,
        respond_to: Response<T>,
    },
    Get {
        id: T::Id,
        respond_to: Response<Option<T>>,
    },
    Update {
        id: T::Id,
        candidate: T::Candidate,
        respond_to: Response<T>,
    },
    Delete {
        id: T::Id,
        respond_to: Response<()>,
    },
}

// =============================================================================
// 3. THE GENERIC ACTOR SERVER
// =============================================================================

/// The generic actor that manages an ordered collection of entities.
///
/// # Architecture Note
/// This struct is the "Server" half of the actor. It owns the state and the
/// receiver end of the channel.
///
/// **Concurrency Model**:
/// The actor processes its messages *sequentially* in a loop, so the store
/// needs no `Mutex` even on a multi-threaded runtime: mutations are serialized
/// through the mailbox and a `List` snapshot is taken between two mutations.
///
/// **Ordering**:
/// Entries are keyed by a monotonically increasing sequence number assigned
/// at creation. Iterating the `BTreeMap` yields insertion order, updates keep
/// their sequence number, and removals leave the others untouched.
pub struct ResourceActor<T: ActorEntity> {
    receiver: mpsc::Receiver<ResourceRequest<T>>,
    entries: BTreeMap<u64, T>,
    index: HashMap<T::Id, u64>,
    next_seq: u64,
    next_id_fn: Box<dyn Fn() -> T::Id + Send + Sync>,
}

impl<T: ActorEntity> ResourceActor<T> {
    pub fn new(
        buffer_size: usize,
        next_id_fn: impl Fn() -> T::Id + Send + Sync + 'static,
    ) -> (Self, ResourceClient<T>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            receiver,
            entries: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
            next_id_fn: Box::new(next_id_fn),
        };
        let client = ResourceClient::new(sender);
        (actor, client)
    }

    /// Runs the actor's event loop, processing messages until the channel closes.
    pub async fn run(mut self) {
        // Extract just the type name (e.g., "Resource" instead of "resource_cluster::domain::resource::Resource")
        let entity_type = std::any::type_name::<T>()
            .split("::")
            .last()
            .unwrap_or("Unknown");
        info!(entity_type, "Actor started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                ResourceRequest::List { respond_to } => {
                    let snapshot: Vec<T> = self.entries.values().cloned().collect();
                    debug!(entity_type, size = snapshot.len(), "List");
                    let _ = respond_to.send(Ok(snapshot));
                }
                ResourceRequest::Create { candidate, respond_to } => {
                    debug!(entity_type, ?candidate, "Create");
                    let result = self.create(candidate);
                    match &result {
                        Ok(_) => info!(entity_type, size = self.entries.len(), "Created"),
                        Err(e) => warn!(entity_type, error = %e, "Create failed"),
                    }
                    let _ = respond_to.send(result);
                }
                ResourceRequest::Get { id, respond_to } => {
                    let item = self.index.get(&id).and_then(|seq| self.entries.get(seq)).cloned();
                    let found = item.is_some();
                    debug!(entity_type, %id, found, "Get");
                    let _ = respond_to.send(Ok(item));
                }
                ResourceRequest::Update { id, candidate, respond_to } => {
                    debug!(entity_type, %id, ?candidate, "Update");
                    let result = self.update(&id, candidate);
                    match &result {
                        Ok(_) => info!(entity_type, %id, "Updated"),
                        Err(e) => warn!(entity_type, %id, error = %e, "Update failed"),
                    }
                    let _ = respond_to.send(result);
                }
                ResourceRequest::Delete { id, respond_to } => {
                    debug!(entity_type, %id, "Delete");
                    match self.index.remove(&id) {
                        Some(seq) => {
                            self.entries.remove(&seq);
                            info!(entity_type, %id, size = self.entries.len(), "Deleted");
                            let _ = respond_to.send(Ok(()));
                        }
                        None => {
                            warn!(entity_type, %id, "Not found");
                            let _ = respond_to.send(Err(FrameworkError::NotFound(id.to_string())));
                        }
                    }
                }
            }
        }

        info!(entity_type, size = self.entries.len(), "Shutdown");
    }

    fn create(&mut self, candidate: T::Candidate) -> Result<T, FrameworkError> {
        let draft = T::validate(candidate).map_err(FrameworkError::Rejected)?;

        let mut id = (self.next_id_fn)();
        while self.index.contains_key(&id) {
            id = (self.next_id_fn)();
        }

        let item = T::from_draft(id.clone(), draft);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(id, seq);
        self.entries.insert(seq, item.clone());
        Ok(item)
    }

    fn update(&mut self, id: &T::Id, candidate: T::Candidate) -> Result<T, FrameworkError> {
        // Validation runs before the lookup: a bad payload is reported even for absent IDs.
        let draft = T::validate(candidate).map_err(FrameworkError::Rejected)?;

        let item = self
            .index
            .get(id)
            .and_then(|seq| self.entries.get_mut(seq))
            .ok_or_else(|| FrameworkError::NotFound(id.to_string()))?;
        item.replace(draft);
        Ok(item.clone())
    }
}

// =============================================================================
// 4. THE GENERIC CLIENT
// =============================================================================

/// A type-safe client for interacting with a `ResourceActor`.
#[derive(Clone)]
pub struct ResourceClient<T: ActorEntity> {
    sender: mpsc::Sender<ResourceRequest<T>>,
}

impl<T: ActorEntity> ResourceClient<T> {
    pub fn new(sender: mpsc::Sender<ResourceRequest<T>>) -> Self {
        Self { sender }
    }

    pub async fn list(&self) -> Result<Vec<T>, FrameworkError> {
        let (respond_to, response) = oneshot::channel();
        self.sender.send(ResourceRequest::List { respond_to })
            .await.map_err(|_| FrameworkError::ActorClosed)?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }

    pub async fn create(&self, candidate: T::Candidate) -> Result<T, FrameworkError> {
        let (respond_to, response) = oneshot::channel();
        self.sender.send(ResourceRequest::Create { candidate, respond_to })
            .await.map_err(|_| FrameworkError::ActorClosed)?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }

    pub async fn get(&self, id: T::Id) -> Result<Option<T>, FrameworkError> {
        let (respond_to, response) = oneshot::channel();
        self.sender.send(ResourceRequest::Get { id, respond_to })
            .await.map_err(|_| FrameworkError::ActorClosed)?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }

    pub async fn update(&self, id: T::Id, candidate: T::Candidate) -> Result<T, FrameworkError> {
        let (respond_to, response) = oneshot::channel();
        self.sender.send(ResourceRequest::Update { id, candidate, respond_to })
            .await.map_err(|_| FrameworkError::ActorClosed)?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }

    pub async fn delete(&self, id: T::Id) -> Result<(), FrameworkError> {
        let (respond_to, response) = oneshot::channel();
        self.sender.send(ResourceRequest::Delete { id, respond_to })
            .await.map_err(|_| FrameworkError::ActorClosed)?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }
}

// =============================================================================
// 5. EXAMPLE USAGE (Test)
// =============================================================================
