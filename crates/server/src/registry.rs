//! Entity registry.
//!
//! The registry is the single authoritative collection of live entities. It is
//! shared by the simulation, population, broadcast and per-connection ingest
//! tasks through [`SharedRegistry`], which guards it with one exclusive lock.

use protocol::Entity;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Result of an [`Registry::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

/// All live entities, unique by id. Order is insertion order and carries no meaning.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    entities: Vec<Entity>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entity with the same id in place, or append it.
    pub fn upsert(&mut self, entity: Entity) -> Upsert {
        match self.entities.iter_mut().find(|e| e.id == entity.id) {
            Some(slot) => {
                *slot = entity;
                Upsert::Replaced
            }
            None => {
                self.entities.push(entity);
                Upsert::Inserted
            }
        }
    }

    /// Remove the entity with this id. Unknown ids are a no-op.
    pub fn remove(&mut self, id: &str) -> Option<Entity> {
        let index = self.entities.iter().position(|e| e.id == id)?;
        Some(self.entities.remove(index))
    }

    /// Owned copy of every entity.
    pub fn snapshot(&self) -> Vec<Entity> {
        self.entities.clone()
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Drop every entity.
    pub fn clear(&mut self) {
        self.entities.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub(crate) fn entities_mut(&mut self) -> &mut [Entity] {
        &mut self.entities
    }
}

/// Cloneable handle to the registry behind its process-wide lock.
///
/// Each method takes the lock once and releases it before returning. The lock
/// is not reentrant: never call these while holding a guard from [`lock`].
///
/// [`lock`]: SharedRegistry::lock
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the lock for a multi-step operation (a simulation tick, a spawn).
    pub async fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().await
    }

    pub async fn upsert(&self, entity: Entity) -> Upsert {
        self.inner.lock().await.upsert(entity)
    }

    pub async fn remove(&self, id: &str) -> Option<Entity> {
        self.inner.lock().await.remove(id)
    }

    pub async fn snapshot(&self) -> Vec<Entity> {
        self.inner.lock().await.snapshot()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_same_id_replaces() {
        let mut registry = Registry::new();
        assert_eq!(
            registry.upsert(Entity::new("p1").with_position(1.0, 2.0)),
            Upsert::Inserted
        );
        assert_eq!(
            registry.upsert(Entity::new("p1").with_position(30.0, -4.0)),
            Upsert::Replaced
        );

        assert_eq!(registry.len(), 1);
        let entity = registry.get("p1").unwrap();
        assert_eq!((entity.x, entity.y), (30.0, -4.0));
    }

    #[test]
    fn test_replace_keeps_position_in_order() {
        let mut registry = Registry::new();
        registry.upsert(Entity::new("a"));
        registry.upsert(Entity::new("b"));
        registry.upsert(Entity::new("a").with_position(5.0, 5.0));

        let ids: Vec<_> = registry.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut registry = Registry::new();
        registry.upsert(Entity::new("a"));
        assert!(registry.remove("missing").is_none());
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.remove("a").map(|e| e.id), Some("a".to_string()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut registry = Registry::new();
        registry.upsert(Entity::new("a"));
        let snapshot = registry.snapshot();
        registry.clear();

        assert_eq!(snapshot.len(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_shared_registry_concurrent_upserts() {
        let shared = SharedRegistry::new();
        let mut tasks = Vec::new();
        for i in 0..8 {
            let shared = shared.clone();
            tasks.push(tokio::spawn(async move {
                for step in 0..50 {
                    shared
                        .upsert(Entity::new(format!("p{i}")).with_position(step as f64, 0.0))
                        .await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let snapshot = shared.snapshot().await;
        assert_eq!(snapshot.len(), 8);
        assert!(snapshot.iter().all(|e| e.x == 49.0));
    }
}
