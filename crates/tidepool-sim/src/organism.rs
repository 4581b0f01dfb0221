//! Organism state and management.

use crate::genome::Genome;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tidepool_core::{EcosystemConfig, OrganismId, SpeciesKind, Vec2};

/// An organism in the ecosystem. Owned exclusively by the simulation;
/// the render layer sees read snapshots only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organism {
    pub id: OrganismId,
    pub kind: SpeciesKind,
    pub position: Vec2,
    pub velocity: Vec2,
    pub acceleration: Vec2,
    /// Bounded in [0, max_energy]; 0 is death
    pub energy: f32,
    /// Steps lived; reaching max_age is death
    pub age: u32,
    pub genome: Genome,
    /// Steps remaining before the next reproduction attempt
    pub cooldown: u32,
    /// Recent positions, oldest first, bounded by the configured length
    pub trail: VecDeque<Vec2>,
}

impl Organism {
    pub fn new(kind: SpeciesKind, position: Vec2, genome: Genome, config: &EcosystemConfig) -> Self {
        Self {
            id: OrganismId::new(),
            kind,
            position,
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            energy: config.max_energy * 0.6,
            age: 0,
            genome,
            cooldown: config.reproduction_cooldown,
            trail: VecDeque::with_capacity(config.trail_length),
        }
    }

    /// Body radius from the size gene.
    pub fn radius(&self) -> f32 {
        self.genome.size
    }

    /// Speed cap from the speed gene.
    pub fn max_speed(&self, config: &EcosystemConfig) -> f32 {
        config.base_speed * self.genome.speed
    }

    pub fn is_alive(&self, config: &EcosystemConfig) -> bool {
        self.energy > 0.0 && self.age < config.max_age
    }

    pub fn add_energy(&mut self, amount: f32, max: f32) {
        self.energy = (self.energy + amount).min(max);
    }

    pub fn consume_energy(&mut self, amount: f32) {
        self.energy = (self.energy - amount).max(0.0);
    }

    /// Record the current position, evicting the oldest entry when full.
    pub fn push_trail(&mut self, max_len: usize) {
        if max_len == 0 {
            return;
        }
        while self.trail.len() >= max_len {
            self.trail.pop_front();
        }
        self.trail.push_back(self.position);
    }
}
