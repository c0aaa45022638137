use crate::clients::actor_client::ActorClient;
use crate::domain::{parse_resource_id, Resource};
use crate::framework::{FrameworkError, ResourceClient};
use crate::resource_actor::RepositoryError;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Handle to one process-local resource repository.
///
/// Identifiers arrive as raw path text; every identifier-taking operation
/// checks the UUID-v4 shape before anything reaches the actor, so a malformed
/// identifier is reported as [`RepositoryError::InvalidIdentifier`] whether or
/// not anything is stored.
#[derive(Clone)]
pub struct Repository {
    inner: ResourceClient<Resource>,
}

impl Repository {
    pub fn new(inner: ResourceClient<Resource>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ActorClient<Resource> for Repository {
    type Error = RepositoryError;

    fn inner(&self) -> &ResourceClient<Resource> {
        &self.inner
    }

    fn map_error(e: FrameworkError) -> Self::Error {
        RepositoryError::from(e)
    }
}

fn parse_id(raw: &str) -> Result<Uuid, RepositoryError> {
    parse_resource_id(raw).ok_or_else(|| RepositoryError::InvalidIdentifier(raw.to_string()))
}

impl Repository {
    #[instrument(skip(self, candidate))]
    pub async fn create(&self, candidate: Value) -> Result<Resource, RepositoryError> {
        debug!("Sending request");
        self.inner.create(candidate).await.map_err(Self::map_error)
    }

    #[instrument(skip(self))]
    pub async fn read(&self, id: &str) -> Result<Resource, RepositoryError> {
        let id = parse_id(id)?;
        self.fetch(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    /// Replaces every field but `id`. Check order: identifier, payload, existence.
    #[instrument(skip(self, candidate))]
    pub async fn update(&self, id: &str, candidate: Value) -> Result<Resource, RepositoryError> {
        let id = parse_id(id)?;
        debug!("Sending request");
        self.inner.update(id, candidate).await.map_err(Self::map_error)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let id = parse_id(id)?;
        self.remove(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::validation::{INVALID_COUNT, NOT_AN_OBJECT};
    use serde_json::json;
    use std::collections::HashSet;

    fn payload(name: &str, count: u64) -> Value {
        json!({"name": name, "count": count, "tags": ["reading", "swimming"]})
    }

    #[tokio::test]
    async fn created_ids_are_v4_and_unique() {
        let (repository, _handle) = crate::resource_actor::spawn();

        let mut seen = HashSet::new();
        for i in 0..50 {
            let created = repository.create(payload("item", i)).await.unwrap();
            assert_eq!(parse_resource_id(&created.id.to_string()), Some(created.id));
            assert!(seen.insert(created.id), "duplicate id {}", created.id);
        }
        assert_eq!(repository.list().await.unwrap().len(), 50);
    }

    #[tokio::test]
    async fn list_after_deletes_keeps_survivor_order() {
        let (repository, _handle) = crate::resource_actor::spawn();

        let mut ids = Vec::new();
        for i in 0..6 {
            ids.push(repository.create(payload(&format!("r{i}"), i)).await.unwrap().id);
        }
        for victim in [ids[0], ids[3], ids[5]] {
            repository.delete(&victim.to_string()).await.unwrap();
        }

        let names: Vec<String> = repository.list().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["r1", "r2", "r4"]);
    }

    #[tokio::test]
    async fn update_then_read_returns_payload_fields() {
        let (repository, _handle) = crate::resource_actor::spawn();
        let created = repository.create(payload("John Doe", 30)).await.unwrap();
        let id = created.id.to_string();

        let replacement = json!({"name": "John Smith", "count": 31, "tags": ["coding"]});
        let updated = repository.update(&id, replacement).await.unwrap();
        assert_eq!(updated.id, created.id);

        let read = repository.read(&id).await.unwrap();
        assert_eq!(read, updated);
        assert_eq!(read.name, "John Smith");
        assert_eq!(read.count, 31);
        assert_eq!(read.tags, vec!["coding"]);
    }

    #[tokio::test]
    async fn malformed_identifiers_are_rejected_before_lookup() {
        let (repository, _handle) = crate::resource_actor::spawn();
        let invalid = RepositoryError::InvalidIdentifier("not-a-uuid".into());

        assert_eq!(repository.read("not-a-uuid").await, Err(invalid.clone()));
        assert_eq!(repository.update("not-a-uuid", payload("x", 1)).await, Err(invalid.clone()));
        assert_eq!(repository.delete("not-a-uuid").await, Err(invalid));
    }

    #[tokio::test]
    async fn absent_and_invalid_payload_errors() {
        let (repository, _handle) = crate::resource_actor::spawn();
        let missing = Uuid::new_v4().to_string();

        assert_eq!(repository.read(&missing).await, Err(RepositoryError::NotFound(missing.clone())));
        assert_eq!(repository.delete(&missing).await, Err(RepositoryError::NotFound(missing.clone())));
        assert_eq!(
            repository.update(&missing, payload("x", 1)).await,
            Err(RepositoryError::NotFound(missing.clone()))
        );
        // Payload problems win over absence.
        assert_eq!(
            repository.update(&missing, json!({"name": "x", "tags": []})).await,
            Err(RepositoryError::ValidationFailed(vec![INVALID_COUNT.to_string()]))
        );
        assert_eq!(
            repository.create(json!([])).await,
            Err(RepositoryError::ValidationFailed(vec![NOT_AN_OBJECT.to_string()]))
        );
        assert!(repository.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_is_not_idempotent() {
        let (repository, _handle) = crate::resource_actor::spawn();
        let id = repository.create(payload("x", 1)).await.unwrap().id.to_string();

        assert_eq!(repository.delete(&id).await, Ok(()));
        assert_eq!(repository.delete(&id).await, Err(RepositoryError::NotFound(id.clone())));
    }

    #[tokio::test]
    async fn separate_repositories_do_not_share_entries() {
        let (first, _h1) = crate::resource_actor::spawn();
        let (second, _h2) = crate::resource_actor::spawn();

        let a = first.create(payload("on-first", 1)).await.unwrap();
        let b = second.create(payload("on-second", 2)).await.unwrap();

        assert_eq!(first.list().await.unwrap(), vec![a.clone()]);
        assert_eq!(second.list().await.unwrap(), vec![b]);
        assert_eq!(
            second.read(&a.id.to_string()).await,
            Err(RepositoryError::NotFound(a.id.to_string()))
        );
    }

    #[tokio::test]
    async fn stopped_actor_is_unavailable() {
        let (actor, repository) = crate::resource_actor::new();
        drop(actor);
        assert!(matches!(repository.list().await, Err(RepositoryError::Unavailable(_))));
    }
}
