//! Headless runner for the tidepool simulation engines.
//!
//! Steps the fluid and ecosystem engines at the configured frame rate for
//! a fixed duration, logging population statistics along the way. Accepts
//! an optional JSON config path as the first argument.

mod engine;
mod telemetry;

use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tidepool_core::{RunnerConfig, SpeciesKind};
use tracing::info;

fn main() -> Result<()> {
    let config = load_config()?;

    telemetry::init_telemetry();
    info!(
        width = config.width,
        height = config.height,
        target_fps = config.target_fps,
        duration_secs = config.duration_secs,
        "starting tidepool runner"
    );

    let mut engine = engine::SimulationEngine::new(&config)?;
    engine.start();

    let stats_interval =
        Duration::from_secs_f32(config.stats_interval_frames as f32 / config.target_fps.max(1.0));
    let deadline = Instant::now() + Duration::from_secs(config.duration_secs);

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep(stats_interval.min(deadline - now));

        let stats = engine.population_stats();
        let particles = engine.particle_snapshot();
        let avg_particle_speed = mean(particles.iter().map(|p| p.speed()));
        let organisms = engine.organism_snapshot();
        let avg_organism_speed = mean(organisms.iter().map(|o| o.velocity.length()));
        info!(
            frame = engine.frames(),
            particles = engine.particle_count(),
            avg_particle_speed,
            fluid_dt = engine.fluid_dt(),
            organisms = stats.total,
            avg_organism_speed,
            predators = stats.count(SpeciesKind::Predator),
            prey = stats.count(SpeciesKind::Prey),
            producers = stats.count(SpeciesKind::Producer),
            decomposers = stats.count(SpeciesKind::Decomposer),
            avg_energy = stats.avg_energy,
            "progress"
        );
    }

    engine.stop();
    info!(frames = engine.frames(), "run complete");
    Ok(())
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0f32, 0u32), |(s, c), v| (s + v, c + 1));
    if count > 0 {
        sum / count as f32
    } else {
        0.0
    }
}

fn load_config() -> Result<RunnerConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {path}"))?;
            RunnerConfig::from_json(&raw).with_context(|| format!("parsing config file {path}"))
        }
        None => Ok(RunnerConfig::default()),
    }
}
