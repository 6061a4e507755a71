//! The entity record.

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// One simulated moving body.
///
/// Coordinates are in arena space, centered on the origin. `angle` is the
/// heading in degrees, 0° along +x, counter-clockwise positive.
///
/// Only `id` is required on the wire; missing numeric fields decode as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    /// Collision margin added to the leading edge when probing walls.
    #[serde(default)]
    pub size: f64,
    /// Distance per second.
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub angle: f64,
}

impl Entity {
    /// A motionless entity at the origin.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            x: 0.0,
            y: 0.0,
            size: 0.0,
            speed: 0.0,
            angle: 0.0,
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_motion(mut self, speed: f64, angle: f64) -> Self {
        self.speed = speed;
        self.angle = angle;
        self
    }

    #[inline]
    pub fn position(&self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }

    /// Unit vector along the current heading.
    #[inline]
    pub fn heading(&self) -> DVec2 {
        DVec2::from_angle(self.angle.to_radians())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_follows_math_convention() {
        let east = Entity::new("a").with_motion(1.0, 0.0).heading();
        assert!((east.x - 1.0).abs() < 1e-12);
        assert!(east.y.abs() < 1e-12);

        let north = Entity::new("a").with_motion(1.0, 90.0).heading();
        assert!(north.x.abs() < 1e-12);
        assert!((north.y - 1.0).abs() < 1e-12);
    }
}
