//! Flocking/predator-prey ecosystem engine.
//!
//! Evolves a mixed-species population under local boids rules
//! (separation, alignment, cohesion) plus pursuit/evasion, a genetic
//! mutation reproduction model, and per-step lifecycle accounting.
//! Reuses the fluid engine's spatial index for neighbor queries.

use crate::genome::{Genome, MutationConfig, Mutator, SIZE_RANGE};
use crate::organism::Organism;
use crate::spatial::SpatialIndex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tidepool_core::{EcosystemConfig, Error, OrganismId, PopulationStats, Result, SpeciesKind, Vec2};
use tracing::{debug, info, trace};

/// Toroidal wrap into [0, max). `rem_euclid` alone can round a tiny
/// negative input up to exactly `max`.
fn wrap(value: f32, max: f32) -> f32 {
    let wrapped = value.rem_euclid(max);
    if wrapped >= max {
        0.0
    } else {
        wrapped
    }
}

pub struct EcosystemSimulation {
    config: EcosystemConfig,
    width: f32,
    height: f32,
    organisms: Vec<Organism>,
    index: SpatialIndex,
    /// Position snapshot handed to the index each step
    positions: Vec<Vec2>,
    /// Reusable neighbor-query buffer
    neighbors: Vec<usize>,
    mutator: Mutator,
    rng: ChaCha8Rng,
    tick: u64,
    births: u64,
    deaths: u64,
}

impl EcosystemSimulation {
    pub fn new(width: f32, height: f32) -> Result<Self> {
        Self::with_config(width, height, EcosystemConfig::default())
    }

    pub fn with_config(width: f32, height: f32, config: EcosystemConfig) -> Result<Self> {
        if !(width > 0.0 && height > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "simulation bounds must be positive, got {}x{}",
                width, height
            )));
        }
        if config.vision_radius < config.flock_radius
            || config.flock_radius < config.separation_radius
        {
            return Err(Error::InvalidConfig(
                "rule radii must be ordered separation <= flock <= vision".to_string(),
            ));
        }

        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        let index = SpatialIndex::new(config.vision_radius);
        Ok(Self {
            config,
            width,
            height,
            organisms: Vec::new(),
            index,
            positions: Vec::new(),
            neighbors: Vec::new(),
            mutator: Mutator::new(MutationConfig::default()),
            rng,
            tick: 0,
            births: 0,
            deaths: 0,
        })
    }

    /// Spawn an organism with a species-flavored genome.
    pub fn spawn(&mut self, kind: SpeciesKind, position: Vec2) -> OrganismId {
        let genome = Genome::for_species(kind, &mut self.rng);
        let organism = Organism::new(kind, position, genome, &self.config);
        let id = organism.id;
        self.organisms.push(organism);
        id
    }

    /// Seed an initial population at random positions:
    /// predators, prey, producers, decomposers.
    pub fn populate(&mut self, counts: [usize; 4]) {
        for (kind, count) in SpeciesKind::all().into_iter().zip(counts) {
            for _ in 0..count {
                let position = Vec2::new(
                    self.rng.gen_range(0.0..self.width),
                    self.rng.gen_range(0.0..self.height),
                );
                self.spawn(kind, position);
            }
        }
    }

    /// Read snapshot for the render layer.
    pub fn organisms(&self) -> &[Organism] {
        &self.organisms
    }

    pub fn len(&self) -> usize {
        self.organisms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.organisms.is_empty()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Per-species counts and averages, for telemetry.
    pub fn population_stats(&self) -> PopulationStats {
        PopulationStats::from_samples(self.organisms.iter().map(|o| (o.kind, o.energy, o.age)))
    }

    /// Advance the population by one frame of `dt_ms` milliseconds.
    pub fn step(&mut self, dt_ms: f32) {
        let dt = dt_ms / 1000.0;
        if !(dt > 0.0) || !dt.is_finite() {
            return;
        }
        self.tick += 1;
        if self.organisms.is_empty() {
            return;
        }

        self.rebuild_index();
        let accelerations = self.accumulate_steering();
        self.integrate(&accelerations, dt);
        self.apply_lifecycle();
        let eaten = self.apply_predation();
        self.reproduce(&eaten);
        self.remove_dead(&eaten);

        if self.tick % 100 == 0 {
            self.emit_population_metrics();
        }
    }

    fn rebuild_index(&mut self) {
        self.positions.clear();
        self.positions.extend(self.organisms.iter().map(|o| o.position));
        self.index.rebuild(&self.positions);
    }

    /// Steering pass: reads a fixed snapshot of the population and
    /// produces one acceleration per organism.
    fn accumulate_steering(&mut self) -> Vec<Vec2> {
        let config = &self.config;
        let mut accelerations = Vec::with_capacity(self.organisms.len());

        for i in 0..self.organisms.len() {
            self.index.neighbors_within_into(
                &self.positions,
                self.positions[i],
                config.vision_radius,
                Some(i),
                &mut self.neighbors,
            );

            let me = &self.organisms[i];
            let mut separation = Vec2::ZERO;
            let mut separation_count = 0u32;
            let mut velocity_sum = Vec2::ZERO;
            let mut position_sum = Vec2::ZERO;
            let mut flock_count = 0u32;
            let mut evasion = Vec2::ZERO;
            let mut nearest_prey: Option<(usize, f32)> = None;

            for &j in &self.neighbors {
                let other = &self.organisms[j];
                let delta = me.position - other.position;
                let dist_sq = delta.length_sq();
                let dist = dist_sq.sqrt();

                if dist < config.separation_radius && dist > 0.0 {
                    separation += delta * (1.0 / dist);
                    separation_count += 1;
                }

                if other.kind == me.kind && dist < config.flock_radius {
                    velocity_sum += other.velocity;
                    position_sum += other.position;
                    flock_count += 1;
                }

                match (me.kind, other.kind) {
                    (SpeciesKind::Predator, SpeciesKind::Prey) => {
                        if nearest_prey.map_or(true, |(_, best)| dist < best) {
                            nearest_prey = Some((j, dist));
                        }
                    }
                    (SpeciesKind::Prey, SpeciesKind::Predator) if dist > 0.0 => {
                        // Away from the threat, weighted by inverse distance.
                        evasion += delta * (1.0 / dist_sq);
                    }
                    _ => {}
                }
            }

            let mut force = Vec2::ZERO;

            if separation_count > 0 {
                force += separation.normalized() * (config.separation_weight * config.base_force);
            }

            if flock_count > 0 {
                let inv = 1.0 / flock_count as f32;
                let alignment = (velocity_sum * inv - me.velocity).normalized();
                force += alignment * (config.alignment_weight * config.base_force);

                let cohesion = (position_sum * inv - me.position).normalized();
                force += cohesion * (config.cohesion_weight * config.base_force);
            }

            if let Some((j, _)) = nearest_prey {
                let chase = (self.organisms[j].position - me.position).normalized();
                let drive = 0.5 + 0.5 * me.genome.aggression;
                force += chase * (config.pursuit_weight * drive * config.base_force);
            }

            if evasion.length_sq() > 0.0 {
                force += evasion.normalized() * (config.evasion_weight * config.base_force);
            }

            accelerations.push(force.clamped(config.base_force));
        }

        accelerations
    }

    fn integrate(&mut self, accelerations: &[Vec2], dt: f32) {
        let config = &self.config;
        let (width, height) = (self.width, self.height);

        for (organism, &acceleration) in self.organisms.iter_mut().zip(accelerations) {
            organism.acceleration = acceleration;
            organism.velocity += acceleration * dt;
            organism.velocity = organism.velocity.clamped(organism.max_speed(config));

            organism.position += organism.velocity * dt;
            organism.position.x = wrap(organism.position.x, width);
            organism.position.y = wrap(organism.position.y, height);

            organism.push_trail(config.trail_length);
        }
    }

    fn apply_lifecycle(&mut self) {
        let config = &self.config;
        for organism in &mut self.organisms {
            organism.age += 1;
            organism.consume_energy(config.metabolism(organism.kind));
            if organism.kind == SpeciesKind::Producer {
                organism.add_energy(config.producer_photosynthesis, config.max_energy);
            }
            organism.cooldown = organism.cooldown.saturating_sub(1);
        }
    }

    /// Contact predation: each prey can be consumed at most once; every
    /// successful capture restores predator energy, capped at max. The
    /// index is rebuilt on post-integration positions so a pair that
    /// closed into contact during this step is offered as a candidate.
    fn apply_predation(&mut self) -> Vec<bool> {
        self.rebuild_index();

        let mut eaten = vec![false; self.organisms.len()];
        let mut gains: Vec<(usize, f32)> = Vec::new();
        let search_radius = (SIZE_RANGE.1 * 2.0).min(self.config.vision_radius);

        for i in 0..self.organisms.len() {
            if self.organisms[i].kind != SpeciesKind::Predator {
                continue;
            }

            self.index.neighbors_within_into(
                &self.positions,
                self.positions[i],
                search_radius,
                Some(i),
                &mut self.neighbors,
            );

            let predator = &self.organisms[i];
            for &j in &self.neighbors {
                if eaten[j] || self.organisms[j].kind != SpeciesKind::Prey {
                    continue;
                }
                let prey = &self.organisms[j];
                let capture = predator.radius() + prey.radius();
                if predator.position.distance_sq(prey.position) < capture * capture {
                    eaten[j] = true;
                    gains.push((i, self.config.predation_reward));
                    trace!(
                        predator = %predator.id,
                        prey = %prey.id,
                        tick = self.tick,
                        "prey captured"
                    );
                }
            }
        }

        let max_energy = self.config.max_energy;
        for (i, reward) in gains {
            self.organisms[i].add_energy(reward, max_energy);
        }

        eaten
    }

    /// Probabilistic asexual reproduction, suppressed by local crowding.
    fn reproduce(&mut self, eaten: &[bool]) {
        let threshold = self.config.reproduction_threshold * self.config.max_energy;
        let cost = self.config.reproduction_cost * self.config.max_energy;
        let mut offspring: Vec<Organism> = Vec::new();

        for i in 0..self.organisms.len() {
            if eaten[i] {
                continue;
            }
            let parent = &self.organisms[i];
            if parent.energy <= threshold || parent.cooldown > 0 {
                continue;
            }
            if self.organisms.len() + offspring.len() >= self.config.max_population {
                debug!(tick = self.tick, "reproduction suppressed: population cap");
                break;
            }

            self.index.neighbors_within_into(
                &self.positions,
                self.positions[i],
                self.config.flock_radius,
                Some(i),
                &mut self.neighbors,
            );
            let local_density = self.neighbors.len() as f32;

            let probability = self.config.reproduction_base_rate * parent.genome.efficiency
                / (1.0 + self.config.crowding_penalty * local_density);
            if self.rng.gen::<f32>() >= probability {
                continue;
            }

            let kind = parent.kind;
            let mut genome = parent.genome;
            self.mutator.mutate(&mut genome, &mut self.rng);

            let jitter = self.config.spawn_jitter;
            let base = self.organisms[i].position;
            let position = Vec2::new(
                wrap(base.x + self.rng.gen_range(-jitter..=jitter), self.width),
                wrap(base.y + self.rng.gen_range(-jitter..=jitter), self.height),
            );

            let child = Organism::new(kind, position, genome, &self.config);
            debug!(
                parent = %self.organisms[i].id,
                child = %child.id,
                kind = ?kind,
                tick = self.tick,
                "organism reproduced"
            );
            offspring.push(child);

            let parent = &mut self.organisms[i];
            parent.consume_energy(cost);
            parent.cooldown = self.config.reproduction_cooldown;
        }

        self.births += offspring.len() as u64;
        self.organisms.extend(offspring);
    }

    /// Single filter pass removing eaten prey and organisms past their
    /// energy or age limit. Never removes in place during iteration.
    fn remove_dead(&mut self, eaten: &[bool]) {
        let config = &self.config;
        let before = self.organisms.len();

        let mut i = 0;
        self.organisms.retain(|organism| {
            let consumed = i < eaten.len() && eaten[i];
            i += 1;
            !consumed && organism.is_alive(config)
        });

        let removed = before - self.organisms.len();
        if removed > 0 {
            self.deaths += removed as u64;
            debug!(removed, tick = self.tick, "organisms removed");
        }
    }

    fn emit_population_metrics(&self) {
        let stats = self.population_stats();
        info!(
            event = "population_metrics",
            tick = self.tick,
            total = stats.total,
            predators = stats.count(SpeciesKind::Predator),
            prey = stats.count(SpeciesKind::Prey),
            producers = stats.count(SpeciesKind::Producer),
            decomposers = stats.count(SpeciesKind::Decomposer),
            avg_energy = stats.avg_energy,
            avg_age = stats.avg_age,
            births = self.births,
            deaths = self.deaths,
            "population snapshot"
        );
    }
}
