//! Scene files for the runner.
//!
//! A scene is a JSON document describing the fluid parameters, the domain,
//! how particles are placed, the obstacles and how long to run.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use sph2d::{spawn, Bounds, Collider, FluidParams};
use std::fs;
use std::path::{Path, PathBuf};

/// Initial particle placement.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpawnConfig {
    /// Centered grid filling the whole domain.
    Grid { count: usize },
    /// Uniform random positions, deterministic per seed.
    Random { count: usize, seed: u64 },
    /// Dense rectangular block.
    Block {
        origin: Vec2,
        cols: u32,
        rows: u32,
        spacing: f32,
        #[serde(default)]
        jitter: f32,
    },
}

impl Default for SpawnConfig {
    fn default() -> Self {
        SpawnConfig::Block {
            origin: Vec2::new(0.5, 2.0),
            cols: 30,
            rows: 20,
            spacing: 0.25,
            jitter: 0.01,
        }
    }
}

impl SpawnConfig {
    pub fn name(&self) -> &'static str {
        match self {
            SpawnConfig::Grid { .. } => "Grid",
            SpawnConfig::Random { .. } => "Random",
            SpawnConfig::Block { .. } => "Block",
        }
    }

    /// Resolve the placement into concrete positions.
    pub fn positions(&self, bounds: Bounds, particle_radius: f32) -> Vec<Vec2> {
        match self {
            SpawnConfig::Grid { count } => spawn::grid_in_bounds(*count, bounds),
            SpawnConfig::Random { count, seed } => {
                spawn::random_in_bounds(*count, bounds, particle_radius, *seed)
            }
            SpawnConfig::Block {
                origin,
                cols,
                rows,
                spacing,
                jitter,
            } => {
                let mut positions = spawn::block(*origin, *cols, *rows, *spacing);
                if *jitter > 0.0 {
                    spawn::jitter(&mut positions, *jitter, 0);
                }
                positions
            }
        }
    }
}

/// Complete runner scene.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SceneConfig {
    pub name: String,
    pub params: FluidParams,
    pub bounds: Bounds,
    pub spawn: SpawnConfig,
    pub colliders: Vec<Collider>,
    /// Number of fixed steps to run.
    pub steps: u32,
    /// Fixed step length in seconds.
    pub dt: f32,
    /// Log stats every this many steps. Zero disables periodic logging.
    pub snapshot_every: u32,
    /// Where the final binary snapshot goes, if anywhere.
    pub output: Option<PathBuf>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            name: "dam break".into(),
            params: FluidParams::water(),
            bounds: Bounds::new(Vec2::ZERO, Vec2::new(16.0, 9.0)),
            spawn: SpawnConfig::default(),
            colliders: vec![Collider::circle(Vec2::new(11.0, 2.0), 1.0)],
            steps: 600,
            dt: 1.0 / 120.0,
            snapshot_every: 60,
            output: None,
        }
    }
}

impl SceneConfig {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let json = fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }

    pub fn initial_positions(&self) -> Vec<Vec2> {
        self.spawn.positions(self.bounds, self.params.particle_radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scene_round_trips_through_json() {
        let scene = SceneConfig::default();
        let json = serde_json::to_string(&scene).unwrap();
        let back: SceneConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scene);
    }

    #[test]
    fn test_partial_scene_uses_defaults() {
        let json = r#"{
            "name": "tiny",
            "spawn": { "type": "grid", "count": 25 },
            "colliders": [ { "type": "circle", "center": [5.0, 3.0], "radius": 0.5 } ],
            "steps": 10
        }"#;
        let scene: SceneConfig = serde_json::from_str(json).unwrap();
        assert_eq!(scene.name, "tiny");
        assert_eq!(scene.steps, 10);
        assert_eq!(scene.dt, SceneConfig::default().dt);
        assert_eq!(scene.spawn.name(), "Grid");
        assert_eq!(scene.initial_positions().len(), 25);
        assert_eq!(scene.colliders.len(), 1);
        assert!(scene.output.is_none());
    }

    #[test]
    fn test_block_spawn_count() {
        let spawn = SpawnConfig::Block {
            origin: Vec2::ONE,
            cols: 4,
            rows: 3,
            spacing: 0.5,
            jitter: 0.0,
        };
        let positions = spawn.positions(Bounds::default(), 0.1);
        assert_eq!(positions.len(), 12);
        assert_eq!(positions[0], Vec2::ONE);
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("sph2d-scene-{}.json", std::process::id()));
        let scene = SceneConfig {
            steps: 42,
            ..SceneConfig::default()
        };
        scene.save(&path).unwrap();
        let loaded = SceneConfig::load(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, scene);
    }
}
