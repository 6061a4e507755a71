//! Shared arena state and the periodic tasks that run against it.

use crate::config::Config;
use crate::population::{self, SpawnOutcome};
use crate::registry::SharedRegistry;
use crate::simulation::{Bounds, SimulationEngine};
use crate::stats::{StatsSnapshot, TickStats};
use protocol::{ProtocolError, ServerMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use super::connections::{BroadcastReport, ConnectionSet};

/// Everything the periodic tasks and connection handlers share.
#[derive(Debug)]
pub struct Arena {
    pub config: Config,
    pub registry: SharedRegistry,
    pub connections: ConnectionSet,
    pub stats: TickStats,
}

impl Arena {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry: SharedRegistry::new(),
            connections: ConnectionSet::new(),
            stats: TickStats::new(),
        })
    }

    /// Start the simulation, population, broadcast and stats tasks.
    pub fn spawn_loops(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(run_simulation_loop(Arc::clone(self))),
            tokio::spawn(run_population_loop(Arc::clone(self))),
            tokio::spawn(run_broadcast_loop(Arc::clone(self))),
            tokio::spawn(run_stats_loop(Arc::clone(self))),
        ]
    }

    /// Add one random entity, clearing the registry if that exceeds the cap.
    pub async fn spawn_tick(&self) -> SpawnOutcome {
        let entity = population::random_entity(&mut rand::rng(), &self.config.population);
        let outcome = {
            let mut registry = self.registry.lock().await;
            population::spawn_with_cap(&mut registry, entity, self.config.population.cap)
        };

        self.stats.record_spawn();
        if let SpawnOutcome::Reset { .. } = outcome {
            self.stats.record_population_reset();
        }
        outcome
    }

    /// Snapshot the registry, release the lock, then offer the encoded
    /// snapshot to every live connection.
    pub async fn broadcast_tick(&self) -> Result<BroadcastReport, ProtocolError> {
        let snapshot = self.registry.snapshot().await;
        let frame = ServerMessage::Snapshot(snapshot).encode()?;
        let report = self.connections.broadcast(&frame).await;
        self.stats.record_broadcast_tick();
        Ok(report)
    }

    pub async fn stats_snapshot(&self) -> StatsSnapshot {
        let entities = self.registry.len().await;
        let connections = self.connections.len().await;
        self.stats.snapshot(entities, connections)
    }
}

fn ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Step every entity at `simulation.tick_hz`, one lock acquisition per tick.
pub async fn run_simulation_loop(arena: Arc<Arena>) {
    let mut ticker = ticker(arena.config.simulation.tick_interval());
    let mut engine = SimulationEngine::new(Bounds::from(&arena.config.arena));

    loop {
        ticker.tick().await;
        let now = std::time::Instant::now();
        {
            let mut registry = arena.registry.lock().await;
            engine.tick(&mut registry, now);
        }
        arena.stats.record_simulation_tick();
    }
}

/// Spawn one entity every `simulation.spawn_interval_ms`.
pub async fn run_population_loop(arena: Arc<Arena>) {
    let mut ticker = ticker(arena.config.simulation.spawn_interval());

    loop {
        ticker.tick().await;
        match arena.spawn_tick().await {
            SpawnOutcome::Spawned { population } => debug!("Spawned entity, population {}", population),
            SpawnOutcome::Reset { cleared } => {
                info!("Population cap exceeded, cleared {} entities", cleared)
            }
        }
    }
}

/// Push the full snapshot to every client at `simulation.broadcast_hz`.
pub async fn run_broadcast_loop(arena: Arc<Arena>) {
    let mut ticker = ticker(arena.config.simulation.broadcast_interval());

    loop {
        ticker.tick().await;
        match arena.broadcast_tick().await {
            Ok(report) if report.dropped > 0 => debug!(
                "Broadcast delivered to {}, dropped for {}",
                report.delivered, report.dropped
            ),
            Ok(_) => {}
            Err(e) => warn!("Failed to encode snapshot: {}", e),
        }
    }
}

/// Log the tick counters once per `simulation.stats_interval_ms`.
pub async fn run_stats_loop(arena: Arc<Arena>) {
    let mut ticker = ticker(arena.config.simulation.stats_interval());

    loop {
        ticker.tick().await;
        let stats = arena.stats_snapshot().await;
        info!(
            simulation_ticks = stats.simulation_ticks,
            broadcast_ticks = stats.broadcast_ticks,
            entities = stats.entities,
            connections = stats.connections,
            "Tick stats"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::connections::ClientChannel;
    use crate::server::session::SessionId;
    use protocol::Entity;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_spawn_tick_resets_past_cap() {
        let mut config = Config::default();
        config.population.cap = 2;
        let arena = Arena::new(config);

        assert_eq!(arena.spawn_tick().await, SpawnOutcome::Spawned { population: 1 });
        assert_eq!(arena.spawn_tick().await, SpawnOutcome::Spawned { population: 2 });
        assert_eq!(arena.spawn_tick().await, SpawnOutcome::Reset { cleared: 3 });
        assert_eq!(arena.registry.len().await, 0);

        let stats = arena.stats_snapshot().await;
        assert_eq!(stats.spawns, 3);
        assert_eq!(stats.population_resets, 1);
    }

    #[tokio::test]
    async fn test_broadcast_tick_sends_snapshot() {
        let arena = Arena::new(Config::default());
        arena.registry.upsert(Entity::new("a").with_position(1.0, 2.0)).await;
        let (tx, mut rx) = mpsc::channel(4);
        arena
            .connections
            .insert(SessionId::from("s"), ClientChannel::new("127.0.0.1:1".parse().unwrap(), tx))
            .await;

        let report = arena.broadcast_tick().await.unwrap();
        assert_eq!(report.delivered, 1);

        let frame = rx.recv().await.unwrap();
        match ServerMessage::decode(&frame).unwrap() {
            ServerMessage::Snapshot(entities) => {
                assert_eq!(entities, vec![Entity::new("a").with_position(1.0, 2.0)]);
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }
}
