use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The single entity type managed by a repository.
///
/// # Actor Framework
/// This struct implements the [`ActorEntity`](crate::framework::ActorEntity) trait
/// (see [`crate::resource_actor::entity`]), allowing it to be managed by a
/// [`ResourceActor`](crate::framework::ResourceActor).
///
/// Serializes as `{"id": "...", "name": "...", "count": 0, "tags": []}` with the
/// identifier in canonical hyphenated form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub name: String,
    pub count: u64,
    pub tags: Vec<String>,
}

/// Validated field set for creating or replacing a [`Resource`].
///
/// Only [`validate_resource`](crate::domain::validate_resource) produces one, so
/// holding a draft means every field rule has already passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDraft {
    pub name: String,
    pub count: u64,
    pub tags: Vec<String>,
}

impl Resource {
    /// Builds a resource from a validated draft under the given identifier.
    pub fn from_draft(id: Uuid, draft: ResourceDraft) -> Self {
        Self {
            id,
            name: draft.name,
            count: draft.count,
            tags: draft.tags,
        }
    }

    /// Replaces every field except `id`.
    pub fn replace_with(&mut self, draft: ResourceDraft) {
        self.name = draft.name;
        self.count = draft.count;
        self.tags = draft.tags;
    }
}
