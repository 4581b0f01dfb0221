//! Configuration types for the simulation.

use crate::SpeciesKind;
use serde::{Deserialize, Serialize};

/// SPH fluid engine parameters. Fixed per engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FluidConfig {
    /// Kernel smoothing radius `h` (pixels). Also the spatial index cell size.
    pub smoothing_radius: f32,
    /// Rest density the pressure term relaxes toward
    pub rest_density: f32,
    /// Pressure stiffness `k` in p = k * (density - rest_density)
    pub stiffness: f32,
    /// Viscosity coefficient
    pub viscosity: f32,
    /// Surface tension coefficient (0.0 disables the term)
    pub surface_tension: f32,
    /// Minimum surface-normal magnitude before tension applies
    pub surface_normal_epsilon: f32,
    /// Downward gravity (pixels/s^2)
    pub gravity: f32,
    /// Mass assigned to each spawned particle
    pub particle_mass: f32,
    /// Display/collision radius of each particle (pixels)
    pub particle_radius: f32,
    /// Strict positive density floor guarding division
    pub density_floor: f32,
    /// CFL stability safety factor, must be < 1
    pub cfl_factor: f32,
    /// Lower clamp for the adaptive timestep (seconds)
    pub min_dt: f32,
    /// Upper clamp for the adaptive timestep (seconds)
    pub max_dt: f32,
    /// Cap on sub-steps per frame; excess simulated time is discarded
    pub max_substeps: u32,
    /// Fraction of velocity retained (sign-flipped) on wall contact
    pub restitution: f32,
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            smoothing_radius: 8.0,
            rest_density: 1.0,
            stiffness: 800.0,
            viscosity: 5.0,
            surface_tension: 50.0,
            surface_normal_epsilon: 0.01,
            gravity: 120.0,
            particle_mass: 1000.0,
            particle_radius: 3.0,
            density_floor: 0.1,
            cfl_factor: 0.5,
            min_dt: 0.001,
            max_dt: 0.033,
            max_substeps: 50,
            restitution: 0.5,
        }
    }
}

/// Ecosystem engine parameters. Fixed per engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcosystemConfig {
    /// Radius for the separation rule (pixels)
    pub separation_radius: f32,
    /// Radius for alignment/cohesion, same species only (pixels)
    pub flock_radius: f32,
    /// Vision radius for pursuit/evasion; also the index cell size (pixels)
    pub vision_radius: f32,
    pub separation_weight: f32,
    pub alignment_weight: f32,
    pub cohesion_weight: f32,
    pub pursuit_weight: f32,
    pub evasion_weight: f32,
    /// Base cruising speed (pixels/s), scaled by the speed gene
    pub base_speed: f32,
    /// Cap on steering acceleration (pixels/s^2)
    pub base_force: f32,
    /// Energy ceiling for every organism
    pub max_energy: f32,
    /// Age ceiling in steps; reaching it is death
    pub max_age: u32,
    /// Per-step energy drain for predators
    pub predator_metabolism: f32,
    /// Per-step energy drain for prey
    pub prey_metabolism: f32,
    /// Per-step energy drain for producers
    pub producer_metabolism: f32,
    /// Per-step energy drain for decomposers
    pub decomposer_metabolism: f32,
    /// Per-step passive energy income for producers
    pub producer_photosynthesis: f32,
    /// Fraction of max energy required before reproduction
    pub reproduction_threshold: f32,
    /// Fraction of max energy paid per offspring
    pub reproduction_cost: f32,
    /// Steps between reproduction attempts
    pub reproduction_cooldown: u32,
    /// Base per-step reproduction probability, scaled by efficiency
    pub reproduction_base_rate: f32,
    /// Per-neighbor suppression of reproduction probability
    pub crowding_penalty: f32,
    /// Energy restored to a predator per capture
    pub predation_reward: f32,
    /// Hard population cap
    pub max_population: usize,
    /// Bounded position-history length per organism
    pub trail_length: usize,
    /// Offspring spawn offset radius (pixels)
    pub spawn_jitter: f32,
    /// RNG seed for reproducible runs
    pub seed: u64,
}

impl EcosystemConfig {
    /// Per-step energy drain for the given species
    pub fn metabolism(&self, kind: SpeciesKind) -> f32 {
        match kind {
            SpeciesKind::Predator => self.predator_metabolism,
            SpeciesKind::Prey => self.prey_metabolism,
            SpeciesKind::Producer => self.producer_metabolism,
            SpeciesKind::Decomposer => self.decomposer_metabolism,
        }
    }
}

impl Default for EcosystemConfig {
    fn default() -> Self {
        Self {
            separation_radius: 12.0,
            flock_radius: 40.0,
            vision_radius: 80.0,
            separation_weight: 1.5,
            alignment_weight: 1.0,
            cohesion_weight: 0.8,
            pursuit_weight: 1.2,
            evasion_weight: 1.8,
            base_speed: 60.0,
            base_force: 120.0,
            max_energy: 100.0,
            max_age: 3000,
            predator_metabolism: 0.08,
            prey_metabolism: 0.05,
            producer_metabolism: 0.01,
            decomposer_metabolism: 0.02,
            producer_photosynthesis: 0.08,
            reproduction_threshold: 0.7,
            reproduction_cost: 0.4,
            reproduction_cooldown: 120,
            reproduction_base_rate: 0.02,
            crowding_penalty: 0.15,
            predation_reward: 30.0,
            max_population: 600,
            trail_length: 10,
            spawn_jitter: 8.0,
            seed: 42,
        }
    }
}

/// Headless runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Simulation bounds (pixels)
    pub width: f32,
    pub height: f32,
    /// Target stepping rate (Hz)
    pub target_fps: f32,
    /// Wall-clock run duration before the loop stops
    pub duration_secs: u64,
    /// Particles seeded into the fluid burst at startup
    pub initial_particles: usize,
    /// Initial population per species: predators, prey, producers, decomposers
    pub initial_population: [usize; 4],
    /// Frames between population/stat log lines
    pub stats_interval_frames: u64,
}

impl RunnerConfig {
    /// Parse a configuration from a JSON document.
    pub fn from_json(raw: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            target_fps: 60.0,
            duration_secs: 30,
            initial_particles: 400,
            initial_population: [6, 40, 30, 10],
            stats_interval_frames: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let fluid = FluidConfig::default();
        assert_eq!(fluid.smoothing_radius, 8.0);
        assert!(fluid.cfl_factor < 1.0);
        assert!(fluid.density_floor > 0.0);
        assert!(fluid.min_dt <= fluid.max_dt);

        let eco = EcosystemConfig::default();
        assert!(eco.separation_radius <= eco.flock_radius);
        assert!(eco.flock_radius <= eco.vision_radius);
        assert_eq!(eco.metabolism(SpeciesKind::Prey), eco.prey_metabolism);
    }

    #[test]
    fn test_runner_config_roundtrip() {
        let config = RunnerConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed = RunnerConfig::from_json(&json).unwrap();
        assert_eq!(parsed.target_fps, config.target_fps);
        assert_eq!(parsed.initial_population, config.initial_population);
    }

    #[test]
    fn test_runner_config_rejects_malformed_json() {
        let err = RunnerConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, crate::Error::Serialization(_)));
    }
}
