//! Entity motion and wall reflection.
//!
//! Each tick moves every entity by `speed * dt` along its heading. Before
//! committing an axis, a probe point pushed `size` further along that axis is
//! tested against the arena walls; if it crosses, the heading is reflected and
//! that axis keeps its previous value for the tick.

use crate::config::ArenaConfig;
use crate::registry::Registry;
use glam::DVec2;
use protocol::Entity;
use std::time::Instant;

/// Half-extents of the arena, which is centered on the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub half_width: f64,
    pub half_height: f64,
}

impl Bounds {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            half_width: width / 2.0,
            half_height: height / 2.0,
        }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(1920.0, 1080.0)
    }
}

impl From<&ArenaConfig> for Bounds {
    fn from(arena: &ArenaConfig) -> Self {
        Self::new(arena.width, arena.height)
    }
}

/// Walls hit during one step.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Bounce {
    pub horizontal: bool,
    pub vertical: bool,
}

impl Bounce {
    pub fn any(self) -> bool {
        self.horizontal || self.vertical
    }
}

/// Heading after hitting a left or right wall.
#[inline]
pub fn reflect_horizontal(angle: f64) -> f64 {
    180.0 - angle
}

/// Heading after hitting a top or bottom wall.
#[inline]
pub fn reflect_vertical(angle: f64) -> f64 {
    360.0 - angle
}

/// Margin added on the side the entity is moving towards.
#[inline]
fn leading_edge(displacement: f64, size: f64) -> f64 {
    if displacement > 0.0 { size } else { -size }
}

/// Advance one entity by `dt` seconds.
///
/// A non-positive `dt` is not a step: the entity is left untouched.
pub fn step_entity(entity: &mut Entity, dt: f64, bounds: &Bounds) -> Bounce {
    if dt <= 0.0 {
        return Bounce::default();
    }

    let displacement = entity.heading() * (entity.speed * dt);
    let next = entity.position() + displacement;
    let probe = next
        + DVec2::new(
            leading_edge(displacement.x, entity.size),
            leading_edge(displacement.y, entity.size),
        );

    let mut bounce = Bounce::default();

    if probe.x > bounds.half_width || probe.x < -bounds.half_width {
        entity.angle = reflect_horizontal(entity.angle);
        bounce.horizontal = true;
    } else {
        entity.x = next.x;
    }

    if probe.y > bounds.half_height || probe.y < -bounds.half_height {
        entity.angle = reflect_vertical(entity.angle);
        bounce.vertical = true;
    } else {
        entity.y = next.y;
    }

    bounce
}

/// Advance every entity. Returns how many bounced off a wall.
pub fn advance(entities: &mut [Entity], dt: f64, bounds: &Bounds) -> usize {
    entities
        .iter_mut()
        .map(|entity| step_entity(entity, dt, bounds))
        .filter(|bounce| bounce.any())
        .count()
}

/// Wall-clock driven stepper. `dt` is measured between consecutive ticks, so
/// scheduling jitter shows up as slightly longer or shorter steps.
#[derive(Debug)]
pub struct SimulationEngine {
    bounds: Bounds,
    last_tick: Instant,
}

impl SimulationEngine {
    pub fn new(bounds: Bounds) -> Self {
        Self::starting_at(bounds, Instant::now())
    }

    pub fn starting_at(bounds: Bounds, start: Instant) -> Self {
        Self {
            bounds,
            last_tick: start,
        }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Step the registry by the time elapsed since the previous tick. Returns
    /// the `dt` that was applied, in seconds.
    pub fn tick(&mut self, registry: &mut Registry, now: Instant) -> f64 {
        let dt = now.saturating_duration_since(self.last_tick).as_secs_f64();
        self.last_tick = now;
        advance(registry.entities_mut(), dt, &self.bounds);
        dt
    }
}
