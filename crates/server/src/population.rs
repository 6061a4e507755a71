//! Periodic spawning and the population cap.

use crate::config::PopulationConfig;
use crate::registry::Registry;
use protocol::Entity;
use rand::Rng;
use uuid::Uuid;

/// What a spawn did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    /// The entity was added; `population` is the registry size afterwards.
    Spawned { population: usize },
    /// Adding the entity pushed the registry over the cap and everything,
    /// including the new entity, was dropped.
    Reset { cleared: usize },
}

fn sample<R: Rng>(rng: &mut R, min: f64, max: f64) -> f64 {
    if max > min {
        rng.random_range(min..max)
    } else {
        min
    }
}

/// A new entity at the origin with random size, speed and heading.
pub fn random_entity<R: Rng>(rng: &mut R, config: &PopulationConfig) -> Entity {
    Entity {
        id: Uuid::new_v4().to_string(),
        x: 0.0,
        y: 0.0,
        size: sample(rng, config.min_size, config.max_size),
        speed: sample(rng, config.min_speed, config.max_speed),
        angle: rng.random_range(0.0..360.0),
    }
}

/// Insert `entity`, then clear the whole registry if it now holds more than `cap`.
///
/// The caller holds the registry lock for both steps.
pub fn spawn_with_cap(registry: &mut Registry, entity: Entity, cap: usize) -> SpawnOutcome {
    registry.upsert(entity);
    let population = registry.len();
    if population > cap {
        registry.clear();
        SpawnOutcome::Reset { cleared: population }
    } else {
        SpawnOutcome::Spawned { population }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_eleventh_entity_clears_registry() {
        let mut registry = Registry::new();
        let mut rng = rand::rng();
        let config = PopulationConfig::default();

        for expected in 1..=10 {
            let outcome = spawn_with_cap(&mut registry, random_entity(&mut rng, &config), 10);
            assert_eq!(outcome, SpawnOutcome::Spawned { population: expected });
        }

        let outcome = spawn_with_cap(&mut registry, random_entity(&mut rng, &config), 10);
        assert_eq!(outcome, SpawnOutcome::Reset { cleared: 11 });
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_cap_counts_client_entities_too() {
        let mut registry = Registry::new();
        for i in 0..3 {
            registry.upsert(Entity::new(format!("client-{i}")));
        }
        let outcome = spawn_with_cap(&mut registry, Entity::new("spawned"), 3);
        assert_eq!(outcome, SpawnOutcome::Reset { cleared: 4 });
        assert!(registry.is_empty());
    }

    #[test]
    fn test_random_entity_ranges() {
        let mut rng = rand::rng();
        let config = PopulationConfig::default();
        for _ in 0..500 {
            let entity = random_entity(&mut rng, &config);
            assert_eq!((entity.x, entity.y), (0.0, 0.0));
            assert!((5.0..10.0).contains(&entity.size));
            assert!((300.0..600.0).contains(&entity.speed));
            assert!((0.0..360.0).contains(&entity.angle));
        }
    }

    #[test]
    fn test_random_ids_are_unique() {
        let mut rng = rand::rng();
        let config = PopulationConfig::default();
        let ids: HashSet<_> = (0..1000)
            .map(|_| random_entity(&mut rng, &config).id)
            .collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_degenerate_range_uses_min() {
        let mut rng = rand::rng();
        let config = PopulationConfig {
            min_size: 7.0,
            max_size: 7.0,
            ..PopulationConfig::default()
        };
        assert_eq!(random_entity(&mut rng, &config).size, 7.0);
    }
}
