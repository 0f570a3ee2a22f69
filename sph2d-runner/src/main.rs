//! sph2d scene runner
//!
//! Loads a scene from JSON and runs it headless.
//!
//! Usage: `sph2d-runner <scene.json> [--realtime] [--init]`
//!
//! With `--realtime` steps are paced against the wall clock through a
//! fixed-timestep accumulator instead of running as fast as possible.
//! `--init` writes the default scene to the given path and exits.

mod config;

use config::SceneConfig;
use log::{error, info, warn};
use sph2d::prelude::*;
use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

struct Args {
    scene_path: PathBuf,
    realtime: bool,
    init: bool,
}

fn parse_args() -> Args {
    let mut scene_path = None;
    let mut realtime = false;
    let mut init = false;
    for arg in env::args().skip(1) {
        if arg == "--realtime" {
            realtime = true;
        } else if arg == "--init" {
            init = true;
        } else if scene_path.is_none() {
            scene_path = Some(PathBuf::from(arg));
        }
    }

    let scene_path = scene_path.unwrap_or_else(|| {
        eprintln!("Usage: sph2d-runner <scene.json> [--realtime] [--init]");
        warn!("No scene file specified, using defaults.");
        PathBuf::from("scene.json")
    });
    Args {
        scene_path,
        realtime,
        init,
    }
}

/// Load a scene, falling back to the default one if the file is unusable.
fn load_scene(path: &Path) -> SceneConfig {
    match SceneConfig::load(path) {
        Ok(scene) => scene,
        Err(e) => {
            warn!("Failed to load scene from {:?}: {}. Using default scene.", path, e);
            SceneConfig::default()
        }
    }
}

fn build_simulation(scene: &SceneConfig) -> Result<Simulation, ConfigError> {
    let positions = scene.initial_positions();
    let mut sim = Simulation::new(&positions, scene.params.clone(), scene.bounds)?;
    sim.set_colliders(scene.colliders.iter().cloned());
    Ok(sim)
}

fn report(scene: &SceneConfig, sim: &Simulation) {
    let step = sim.step_count();
    if scene.snapshot_every > 0 && step % u64::from(scene.snapshot_every) == 0 {
        info!("{}", sim.stats());
    }
}

fn run_batch(scene: &SceneConfig, sim: &mut Simulation) {
    for _ in 0..scene.steps {
        sim.advance(scene.dt);
        report(scene, sim);
    }
}

fn run_realtime(scene: &SceneConfig, sim: &mut Simulation) -> Result<(), ConfigError> {
    let mut clock = FixedTimestep::new(scene.dt)?;
    let frame = Duration::from_secs_f32(1.0 / 60.0);
    let target = u64::from(scene.steps);
    let mut last = Instant::now();

    while sim.step_count() < target {
        let now = Instant::now();
        let delta = now.duration_since(last);
        last = now;

        for _ in 0..clock.tick_duration(delta) {
            if sim.step_count() >= target {
                break;
            }
            sim.advance(clock.step());
            report(scene, sim);
        }

        let spent = now.elapsed();
        if spent < frame {
            thread::sleep(frame - spent);
        }
    }

    if clock.dropped_steps() > 0 {
        info!("Dropped {} steps to keep up with the wall clock", clock.dropped_steps());
    }
    Ok(())
}

fn write_output(path: &Path, sim: &Simulation) -> Result<(), SnapshotError> {
    let file = File::create(path)?;
    sim.save_snapshot(BufWriter::new(file))?;
    info!("Wrote {} particles to {:?}", sim.particle_count(), path);
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = parse_args();

    if args.init {
        return match SceneConfig::default().save(&args.scene_path) {
            Ok(()) => {
                info!("Wrote default scene to {:?}", args.scene_path);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Failed to write scene to {:?}: {}", args.scene_path, e);
                ExitCode::FAILURE
            }
        };
    }

    let scene = load_scene(&args.scene_path);

    info!(
        "Running '{}' ({} spawn, {} colliders, {} steps of {}s)",
        scene.name,
        scene.spawn.name(),
        scene.colliders.len(),
        scene.steps,
        scene.dt
    );

    let mut sim = match build_simulation(&scene) {
        Ok(sim) => sim,
        Err(e) => {
            error!("Invalid scene: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let started = Instant::now();
    if args.realtime {
        if let Err(e) = run_realtime(&scene, &mut sim) {
            error!("Invalid scene: {}", e);
            return ExitCode::FAILURE;
        }
    } else {
        run_batch(&scene, &mut sim);
    }
    info!(
        "Finished {} steps in {:.2?}: {}",
        sim.step_count(),
        started.elapsed(),
        sim.stats()
    );

    if let Some(path) = &scene.output {
        if let Err(e) = write_output(path, &sim) {
            error!("Failed to write snapshot to {:?}: {}", path, e);
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_scene_falls_back_to_default() {
        let path = env::temp_dir().join("sph2d-runner-no-such-scene.json");
        assert_eq!(load_scene(&path), SceneConfig::default());
    }

    #[test]
    fn test_default_scene_builds_and_steps() {
        let scene = SceneConfig {
            steps: 3,
            snapshot_every: 1,
            ..SceneConfig::default()
        };
        let mut sim = build_simulation(&scene).unwrap();
        assert_eq!(sim.colliders().len(), scene.colliders.len());
        run_batch(&scene, &mut sim);
        assert_eq!(sim.step_count(), 3);
    }
}
