//! Server configuration.

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// File read by [`Config::load`] when present in the working directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub arena: ArenaConfig,
    #[serde(default)]
    pub population: PopulationConfig,
}

impl Config {
    /// Load `config.toml` if it exists, then apply the `PORT` override.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::from_file(Path::new(CONFIG_FILE))?;
        config.apply_port_override(std::env::var("PORT").ok().as_deref());
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file, falling back to defaults when it does not exist.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            info!("No {} found, using default config", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))
    }

    /// Apply the value of the `PORT` environment variable.
    ///
    /// Unset or empty keeps the current port; an unparsable value is logged
    /// and ignored.
    pub fn apply_port_override(&mut self, value: Option<&str>) {
        let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return;
        };
        match raw.parse::<u16>() {
            Ok(port) => self.server.port = port,
            Err(_) => warn!("Invalid PORT '{}', keeping {}", raw, self.server.port),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.server.path.starts_with('/') {
            bail!("server.path must start with '/', got {:?}", self.server.path);
        }
        if self.simulation.tick_hz == 0 || self.simulation.broadcast_hz == 0 {
            bail!("simulation.tick_hz and simulation.broadcast_hz must be positive");
        }
        if self.simulation.spawn_interval_ms == 0 || self.simulation.stats_interval_ms == 0 {
            bail!("simulation intervals must be positive");
        }
        if self.arena.width <= 0.0 || self.arena.height <= 0.0 {
            bail!("arena dimensions must be positive");
        }
        if self.population.min_size > self.population.max_size
            || self.population.min_speed > self.population.max_speed
        {
            bail!("population ranges must have min <= max");
        }
        Ok(())
    }
}

/// Server networking settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Port to listen on. Overridden by `PORT`.
    #[serde(default = "default_port")]
    pub port: u16,
    /// WebSocket endpoint path.
    #[serde(default = "default_path")]
    pub path: String,
    /// Upper bound on a single outbound frame write, in milliseconds.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,
    /// Frames buffered per client before broadcasts start dropping.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl ServerConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            path: default_path(),
            write_timeout_ms: default_write_timeout(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_path() -> String {
    "/ws".to_string()
}
fn default_write_timeout() -> u64 {
    1000
}
fn default_outbound_queue() -> usize {
    64
}

/// Timer frequencies for the periodic tasks.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimulationConfig {
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    #[serde(default = "default_broadcast_hz")]
    pub broadcast_hz: u32,
    #[serde(default = "default_spawn_interval")]
    pub spawn_interval_ms: u64,
    #[serde(default = "default_stats_interval")]
    pub stats_interval_ms: u64,
}

impl SimulationConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_hz.max(1)))
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.broadcast_hz.max(1)))
    }

    pub fn spawn_interval(&self) -> Duration {
        Duration::from_millis(self.spawn_interval_ms.max(1))
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms.max(1))
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            broadcast_hz: default_broadcast_hz(),
            spawn_interval_ms: default_spawn_interval(),
            stats_interval_ms: default_stats_interval(),
        }
    }
}

fn default_tick_hz() -> u32 {
    60
}
fn default_broadcast_hz() -> u32 {
    30
}
fn default_spawn_interval() -> u64 {
    1000
}
fn default_stats_interval() -> u64 {
    1000
}

/// Arena extents. The arena is centered on the origin.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ArenaConfig {
    #[serde(default = "default_arena_width")]
    pub width: f64,
    #[serde(default = "default_arena_height")]
    pub height: f64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: default_arena_width(),
            height: default_arena_height(),
        }
    }
}

fn default_arena_width() -> f64 {
    1920.0
}
fn default_arena_height() -> f64 {
    1080.0
}

/// Spawned entity parameters and the population cap.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PopulationConfig {
    /// Registry size above which the whole registry is cleared.
    #[serde(default = "default_cap")]
    pub cap: usize,
    #[serde(default = "default_min_size")]
    pub min_size: f64,
    #[serde(default = "default_max_size")]
    pub max_size: f64,
    #[serde(default = "default_min_speed")]
    pub min_speed: f64,
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            cap: default_cap(),
            min_size: default_min_size(),
            max_size: default_max_size(),
            min_speed: default_min_speed(),
            max_speed: default_max_speed(),
        }
    }
}

fn default_cap() -> usize {
    10
}
fn default_min_size() -> f64 {
    5.0
}
fn default_max_size() -> f64 {
    10.0
}
fn default_min_speed() -> f64 {
    300.0
}
fn default_max_speed() -> f64 {
    600.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.path, "/ws");
        assert_eq!(config.simulation.tick_hz, 60);
        assert_eq!(config.simulation.broadcast_hz, 30);
        assert_eq!(config.arena.width, 1920.0);
        assert_eq!(config.population.cap, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [population]
            cap = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.path, "/ws");
        assert_eq!(config.population.cap, 3);
        assert_eq!(config.population.max_speed, 600.0);
        assert_eq!(config.simulation, SimulationConfig::default());
    }

    #[test]
    fn test_port_override() {
        let mut config = Config::default();
        config.apply_port_override(None);
        assert_eq!(config.server.port, 8080);
        config.apply_port_override(Some(""));
        assert_eq!(config.server.port, 8080);
        config.apply_port_override(Some("not-a-port"));
        assert_eq!(config.server.port, 8080);
        config.apply_port_override(Some("3000"));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_validate_rejects_bad_path() {
        let mut config = Config::default();
        config.server.path = "ws".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_intervals() {
        let sim = SimulationConfig::default();
        assert_eq!(sim.spawn_interval(), Duration::from_secs(1));
        assert!((sim.tick_interval().as_secs_f64() - 1.0 / 60.0).abs() < 1e-9);
    }
}
