//! Tick and traffic counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters bumped by the periodic tasks and connection handlers.
#[derive(Debug)]
pub struct TickStats {
    simulation_ticks: AtomicU64,
    broadcast_ticks: AtomicU64,
    spawns: AtomicU64,
    population_resets: AtomicU64,
    frames_ingested: AtomicU64,
    connections_accepted: AtomicU64,
    started: Instant,
}

/// Point-in-time view of [`TickStats`] plus the current sizes of the shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub simulation_ticks: u64,
    pub broadcast_ticks: u64,
    pub spawns: u64,
    pub population_resets: u64,
    pub frames_ingested: u64,
    pub connections_accepted: u64,
    pub entities: usize,
    pub connections: usize,
    pub uptime_secs: u64,
}

impl TickStats {
    pub fn new() -> Self {
        Self {
            simulation_ticks: AtomicU64::new(0),
            broadcast_ticks: AtomicU64::new(0),
            spawns: AtomicU64::new(0),
            population_resets: AtomicU64::new(0),
            frames_ingested: AtomicU64::new(0),
            connections_accepted: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_simulation_tick(&self) {
        self.simulation_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast_tick(&self) {
        self.broadcast_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_spawn(&self) {
        self.spawns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_population_reset(&self) {
        self.population_resets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame(&self) {
        self.frames_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, entities: usize, connections: usize) -> StatsSnapshot {
        StatsSnapshot {
            simulation_ticks: self.simulation_ticks.load(Ordering::Relaxed),
            broadcast_ticks: self.broadcast_ticks.load(Ordering::Relaxed),
            spawns: self.spawns.load(Ordering::Relaxed),
            population_resets: self.population_resets.load(Ordering::Relaxed),
            frames_ingested: self.frames_ingested.load(Ordering::Relaxed),
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            entities,
            connections,
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }
}

impl Default for TickStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = TickStats::new();
        stats.record_simulation_tick();
        stats.record_simulation_tick();
        stats.record_broadcast_tick();
        stats.record_population_reset();

        let snapshot = stats.snapshot(4, 2);
        assert_eq!(snapshot.simulation_ticks, 2);
        assert_eq!(snapshot.broadcast_ticks, 1);
        assert_eq!(snapshot.population_resets, 1);
        assert_eq!(snapshot.spawns, 0);
        assert_eq!((snapshot.entities, snapshot.connections), (4, 2));
    }
}
