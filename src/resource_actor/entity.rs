//! Entity trait implementation for the [`Resource`] domain type.
//!
//! This module contains the [`ActorEntity`] trait implementation that enables
//! [`Resource`] to be managed by the generic [`crate::framework::ResourceActor`].

use serde_json::Value;
use uuid::Uuid;

use crate::domain::{validate_resource, Resource, ResourceDraft};
use crate::framework::{ActorEntity, Violations};

impl ActorEntity for Resource {
    type Id = Uuid;
    type Candidate = Value;
    type Draft = ResourceDraft;

    /// Delegates to the field rules in [`crate::domain::validation`].
    fn validate(candidate: Value) -> Result<ResourceDraft, Violations> {
        validate_resource(&candidate)
    }

    fn from_draft(id: Uuid, draft: ResourceDraft) -> Self {
        Resource::from_draft(id, draft)
    }

    /// Wholesale replacement: `name`, `count` and `tags` all come from the draft.
    fn replace(&mut self, draft: ResourceDraft) {
        self.replace_with(draft);
    }
}
