//! SPH fluid engine.
//!
//! Advances a 2D particle ensemble through three passes per sub-step:
//! density/pressure, force accumulation (pressure, viscosity, surface
//! tension), and semi-implicit Euler integration with boundary
//! reflection. Frame time is split into CFL-bounded sub-steps so a
//! stalled caller degrades to more sub-steps instead of instability.

use crate::particle::Particle;
use crate::spatial::SpatialIndex;
use std::f32::consts::PI;
use tidepool_core::{Error, FluidConfig, Result, Vec2};
use tracing::{debug, warn};

/// Spawn colors cycled per particle; display-only.
const PALETTE: [u32; 5] = [0x4fc3f7, 0x29b6f6, 0x0288d1, 0x81d4fa, 0xb3e5fc];

/// Poly6 kernel: 315/(64 pi h^9) * (h^2 - r^2)^3 inside the support.
/// Weights density and viscosity sums.
fn poly6(r_sq: f32, h: f32) -> f32 {
    let h_sq = h * h;
    if r_sq >= h_sq {
        return 0.0;
    }
    let norm = 315.0 / (64.0 * PI * h.powi(9));
    norm * (h_sq - r_sq).powi(3)
}

/// Spiky kernel gradient: -45/(pi h^6) * (h - r)^2 / r * delta for
/// 0 < r < h, else zero. The r > 0 guard makes coincident pairs inert.
fn spiky_gradient(delta: Vec2, r: f32, h: f32) -> Vec2 {
    if r <= 0.0 || r >= h {
        return Vec2::ZERO;
    }
    let coeff = -45.0 / (PI * h.powi(6)) * (h - r).powi(2) / r;
    delta * coeff
}

/// Viscosity kernel Laplacian: 45/(pi h^6) * (h - r), peaking at r = 0.
/// Estimates surface curvature.
fn viscosity_laplacian(r_sq: f32, h: f32) -> f32 {
    if r_sq >= h * h {
        return 0.0;
    }
    45.0 / (PI * h.powi(6)) * (h - r_sq.sqrt())
}

/// SPH particle ensemble with adaptive sub-stepping.
///
/// Single-threaded and frame-driven: the owning driver calls
/// [`step`](Self::step) once per frame and renders
/// [`particles`](Self::particles) read-only. `step` must not be
/// re-entered concurrently; this is a usage contract, not a lock.
pub struct FluidSimulation {
    config: FluidConfig,
    width: f32,
    height: f32,
    particles: Vec<Particle>,
    index: SpatialIndex,
    /// Position snapshot handed to the index each sub-step
    positions: Vec<Vec2>,
    /// Reusable neighbor-query buffer
    neighbors: Vec<usize>,
    adaptive_dt: f32,
    spawned: usize,
}

impl FluidSimulation {
    /// Engine over a `width` x `height` pixel box with default constants.
    pub fn new(width: f32, height: f32) -> Result<Self> {
        Self::with_config(width, height, FluidConfig::default())
    }

    pub fn with_config(width: f32, height: f32, config: FluidConfig) -> Result<Self> {
        if !(width > 0.0 && height > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "simulation bounds must be positive, got {}x{}",
                width, height
            )));
        }
        if !(config.cfl_factor > 0.0 && config.cfl_factor < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "CFL factor must be in (0, 1), got {}",
                config.cfl_factor
            )));
        }
        if config.density_floor <= 0.0 {
            return Err(Error::InvalidConfig(
                "density floor must be strictly positive".to_string(),
            ));
        }
        if !(config.min_dt > 0.0 && config.min_dt <= config.max_dt) {
            return Err(Error::InvalidConfig(format!(
                "timestep band [{}, {}] is invalid",
                config.min_dt, config.max_dt
            )));
        }

        let index = SpatialIndex::new(config.smoothing_radius);
        let adaptive_dt = config.max_dt;
        Ok(Self {
            config,
            width,
            height,
            particles: Vec::new(),
            index,
            positions: Vec::new(),
            neighbors: Vec::new(),
            adaptive_dt,
            spawned: 0,
        })
    }

    /// Spawn a particle with the configured mass and radius.
    pub fn add_particle(&mut self, x: f32, y: f32, vx: f32, vy: f32) {
        let color = PALETTE[self.spawned % PALETTE.len()];
        self.spawned += 1;
        self.particles.push(Particle::new(
            Vec2::new(x, y),
            Vec2::new(vx, vy),
            self.config.particle_radius,
            self.config.particle_mass,
            color,
        ));
    }

    /// Read snapshot for the render layer.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Mutable access for render-driven fields (`life`, `color`). The
    /// physics fields are overwritten on the next step.
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Current stability-bounded timestep (seconds).
    pub fn adaptive_dt(&self) -> f32 {
        self.adaptive_dt
    }

    /// Advance the ensemble by `dt_ms` milliseconds of frame time.
    ///
    /// The frame is split into `ceil(frame / adaptive_dt)` equal
    /// sub-steps. When that count exceeds the configured cap the engine
    /// runs exactly the cap at the adaptive timestep and discards the
    /// remaining simulated time rather than looping unboundedly.
    pub fn step(&mut self, dt_ms: f32) {
        let frame_dt = dt_ms / 1000.0;
        if !(frame_dt > 0.0) || !frame_dt.is_finite() {
            return;
        }

        // Epsilon keeps a frame of exactly N * adaptive_dt at N sub-steps
        // under f32 rounding.
        let raw = ((frame_dt / self.adaptive_dt) - 1e-6).ceil().max(1.0);
        let (substeps, sub_dt) = if raw > self.config.max_substeps as f32 {
            warn!(
                frame_ms = dt_ms,
                adaptive_dt = self.adaptive_dt,
                cap = self.config.max_substeps,
                "frame exceeds sub-step cap, discarding remainder"
            );
            (self.config.max_substeps, self.adaptive_dt)
        } else {
            (raw as u32, frame_dt / raw)
        };

        for _ in 0..substeps {
            self.compute_density_pressure();
            let max_speed = self.accumulate_forces();
            self.update_adaptive_dt(max_speed);
            self.integrate(sub_dt);
        }

        debug!(
            particles = self.particles.len(),
            substeps,
            adaptive_dt = self.adaptive_dt,
            "fluid step complete"
        );
    }

    /// Pass 1: rebuild the index and recompute density and pressure.
    /// Only true neighbors contribute; density is floored before it can
    /// ever divide a force term.
    fn compute_density_pressure(&mut self) {
        let h = self.config.smoothing_radius;

        self.positions.clear();
        self.positions.extend(self.particles.iter().map(|p| p.position));
        self.index.rebuild(&self.positions);

        for i in 0..self.particles.len() {
            self.index.neighbors_within_into(
                &self.positions,
                self.positions[i],
                h,
                Some(i),
                &mut self.neighbors,
            );

            let mut density = 0.0;
            for &j in &self.neighbors {
                let r_sq = self.positions[j].distance_sq(self.positions[i]);
                density += self.particles[j].mass * poly6(r_sq, h);
            }

            let particle = &mut self.particles[i];
            particle.density = density.max(self.config.density_floor);
            particle.pressure =
                self.config.stiffness * (particle.density - self.config.rest_density);
        }
    }

    /// Pass 2: accumulate pressure, viscosity, and surface-tension forces
    /// into fresh accelerations. Returns the maximum particle speed seen,
    /// which bounds the next timestep.
    fn accumulate_forces(&mut self) -> f32 {
        let h = self.config.smoothing_radius;
        let mut max_speed = 0.0f32;

        for i in 0..self.particles.len() {
            self.index.neighbors_within_into(
                &self.positions,
                self.positions[i],
                h,
                Some(i),
                &mut self.neighbors,
            );

            let pi = self.particles[i];
            let mut force = Vec2::ZERO;
            let mut normal = Vec2::ZERO;
            let mut curvature = 0.0f32;

            for &j in &self.neighbors {
                let pj = self.particles[j];
                let delta = pi.position - pj.position;
                let r_sq = delta.length_sq();
                let r = r_sq.sqrt();

                let grad = spiky_gradient(delta, r, h);
                force += grad * (-pj.mass * (pi.pressure + pj.pressure) / (2.0 * pj.density));

                let w = poly6(r_sq, h);
                force += (pj.velocity - pi.velocity)
                    * (self.config.viscosity * pj.mass / pj.density * w);

                normal += grad * (pj.mass / pj.density);
                curvature += viscosity_laplacian(r_sq, h) * pj.mass / pj.density;
            }

            if self.config.surface_tension > 0.0 {
                let n_len = normal.length();
                if n_len > self.config.surface_normal_epsilon {
                    force += normal * (-self.config.surface_tension * curvature / n_len);
                }
            }

            let particle = &mut self.particles[i];
            particle.acceleration = Vec2::new(
                force.x / particle.density,
                force.y / particle.density + self.config.gravity,
            );
            max_speed = max_speed.max(particle.speed());
        }

        max_speed
    }

    /// Derive the next adaptive timestep from the CFL bound. Growth is
    /// capped at 10% per step and the 0.9 safety multiplier backs off
    /// the exact CFL limit.
    fn update_adaptive_dt(&mut self, max_speed: f32) {
        let candidate = if max_speed > 1e-6 {
            let dt_cfl = self.config.cfl_factor * self.config.smoothing_radius / max_speed;
            (self.adaptive_dt * 1.1).min(dt_cfl * 0.9)
        } else {
            // Nothing is moving: hold or grow, never collapse the step.
            self.adaptive_dt * 1.1
        };
        self.adaptive_dt = candidate.clamp(self.config.min_dt, self.config.max_dt);
    }

    /// Pass 3: semi-implicit Euler update with inelastic boundary
    /// reflection into `[radius, dimension - radius]`.
    fn integrate(&mut self, dt: f32) {
        let restitution = self.config.restitution;
        let (width, height) = (self.width, self.height);

        for p in &mut self.particles {
            p.velocity += p.acceleration * dt;
            p.position += p.velocity * dt;

            let r = p.radius;
            if p.position.x < r {
                p.position.x = r;
                p.velocity.x = -p.velocity.x * restitution;
            } else if p.position.x > width - r {
                p.position.x = width - r;
                p.velocity.x = -p.velocity.x * restitution;
            }
            if p.position.y < r {
                p.position.y = r;
                p.velocity.y = -p.velocity.y * restitution;
            } else if p.position.y > height - r {
                p.position.y = height - r;
                p.velocity.y = -p.velocity.y * restitution;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDTH: f32 = 800.0;
    const HEIGHT: f32 = 600.0;

    fn engine() -> FluidSimulation {
        FluidSimulation::new(WIDTH, HEIGHT).unwrap()
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        assert!(FluidSimulation::new(-10.0, 100.0).is_err());
        assert!(FluidSimulation::new(100.0, 0.0).is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = FluidConfig {
            cfl_factor: 1.5,
            ..FluidConfig::default()
        };
        assert!(FluidSimulation::with_config(WIDTH, HEIGHT, config).is_err());

        let config = FluidConfig {
            density_floor: 0.0,
            ..FluidConfig::default()
        };
        assert!(FluidSimulation::with_config(WIDTH, HEIGHT, config).is_err());
    }

    #[test]
    fn test_kernel_support() {
        let h = 8.0;
        assert_eq!(poly6(h * h, h), 0.0);
        assert_eq!(poly6(h * h + 1.0, h), 0.0);
        assert!(poly6(0.0, h) > 0.0);
        assert!(poly6(1.0, h) < poly6(0.0, h));

        assert_eq!(spiky_gradient(Vec2::new(h, 0.0), h, h), Vec2::ZERO);
        assert_eq!(spiky_gradient(Vec2::ZERO, 0.0, h), Vec2::ZERO);

        assert_eq!(viscosity_laplacian(h * h, h), 0.0);
        assert!(viscosity_laplacian(0.0, h) > viscosity_laplacian(1.0, h));
    }

    #[test]
    fn test_empty_step_is_noop() {
        let mut sim = engine();
        let dt_before = sim.adaptive_dt();
        sim.step(16.0);
        assert!(sim.is_empty());
        assert!(sim.adaptive_dt() >= dt_before);
    }

    #[test]
    fn test_density_floor_holds_for_coincident_particles() {
        let mut sim = engine();
        for _ in 0..5 {
            sim.add_particle(100.0, 100.0, 0.0, 0.0);
        }
        sim.step(16.0);

        let floor = FluidConfig::default().density_floor;
        for p in sim.particles() {
            assert!(p.density >= floor);
            assert!(p.density.is_finite());
            assert!(p.pressure.is_finite());
        }
    }

    #[test]
    fn test_isolated_particle_sits_at_density_floor() {
        let mut sim = engine();
        sim.add_particle(400.0, 300.0, 0.0, 0.0);
        sim.step(16.0);

        let config = FluidConfig::default();
        let p = sim.particles()[0];
        assert_eq!(p.density, config.density_floor);
        let expected = config.stiffness * (config.density_floor - config.rest_density);
        assert!((p.pressure - expected).abs() < 1e-3);
    }

    #[test]
    fn test_close_pair_repels() {
        // Two particles h/2 apart: kernel density exceeds the rest
        // density with default constants, so pressure is repulsive.
        let mut sim = engine();
        let h = FluidConfig::default().smoothing_radius;
        sim.add_particle(400.0 - h / 4.0, 300.0, 0.0, 0.0);
        sim.add_particle(400.0 + h / 4.0, 300.0, 0.0, 0.0);
        sim.step(16.0);

        let rest = FluidConfig::default().rest_density;
        let left = sim.particles()[0];
        let right = sim.particles()[1];
        assert!(left.density > rest, "density {} not above rest", left.density);
        assert!(right.density > rest);
        assert!(left.acceleration.x < 0.0, "left particle not pushed left");
        assert!(right.acceleration.x > 0.0, "right particle not pushed right");
    }

    #[test]
    fn test_boundary_reflection_is_inelastic() {
        let mut sim = engine();
        sim.add_particle(WIDTH - 10.0, 300.0, 1000.0, 0.0);
        sim.step(16.0);

        let config = FluidConfig::default();
        let p = sim.particles()[0];
        assert_eq!(p.position.x, WIDTH - config.particle_radius);
        assert_eq!(p.velocity.x, -1000.0 * config.restitution);
    }

    #[test]
    fn test_adaptive_dt_stays_in_band() {
        let config = FluidConfig::default();

        // Pathologically fast particle drives dt to the lower clamp.
        let mut sim = engine();
        sim.add_particle(400.0, 300.0, 1e6, 0.0);
        sim.step(16.0);
        assert!(sim.adaptive_dt() >= config.min_dt);
        assert!(sim.adaptive_dt() <= config.max_dt);
        assert!(sim.adaptive_dt().is_finite());

        // All-zero velocities hold or grow the step, never NaN.
        let mut sim = engine();
        sim.add_particle(100.0, 100.0, 0.0, 0.0);
        let before = sim.adaptive_dt();
        sim.step(16.0);
        assert!(sim.adaptive_dt() >= before.min(config.max_dt) - 1e-9);
        assert!(sim.adaptive_dt().is_finite());
    }

    #[test]
    fn test_substep_cap_discards_remainder() {
        let mut sim = engine();
        sim.add_particle(400.0, 100.0, 0.0, 0.0);

        // A 10 second frame would need ~300 sub-steps; the cap runs 50 at
        // the adaptive dt, so exactly 50 * 0.033s of fall is simulated.
        let dt = sim.adaptive_dt();
        sim.step(10_000.0);

        let config = FluidConfig::default();
        let expected_vy = config.gravity * dt * config.max_substeps as f32;
        let p = sim.particles()[0];
        assert!((p.velocity.y - expected_vy).abs() < 0.5);
    }

    #[test]
    fn test_substep_decomposition_is_deterministic() {
        // One step of 10*dt must match ten steps of dt.
        let mut whole = engine();
        let mut split = engine();
        whole.add_particle(200.0, 150.0, 12.0, -4.0);
        split.add_particle(200.0, 150.0, 12.0, -4.0);

        let dt_ms = whole.adaptive_dt() * 1000.0;
        whole.step(dt_ms * 10.0);
        for _ in 0..10 {
            split.step(dt_ms);
        }

        let a = whole.particles()[0];
        let b = split.particles()[0];
        assert!((a.position.x - b.position.x).abs() < 1e-2);
        assert!((a.position.y - b.position.y).abs() < 1e-2);
        assert!((a.velocity.x - b.velocity.x).abs() < 1e-2);
        assert!((a.velocity.y - b.velocity.y).abs() < 1e-2);
    }

    #[test]
    fn test_dropped_particle_settles_on_floor() {
        let mut sim = engine();
        sim.add_particle(400.0, 100.0, 0.0, 0.0);

        for _ in 0..3000 {
            sim.step(16.0);
        }

        let config = FluidConfig::default();
        let p = sim.particles()[0];
        let floor_y = HEIGHT - config.particle_radius;
        assert!(
            (p.position.y - floor_y).abs() < 1.0,
            "particle at y={} did not settle near {}",
            p.position.y,
            floor_y
        );
        assert!(p.velocity.y.abs() < 5.0, "vy {} did not decay", p.velocity.y);
        assert_eq!(p.velocity.x, 0.0);
    }

    #[test]
    fn test_cluster_stays_in_bounds() {
        let mut sim = engine();
        for i in 0..10 {
            for j in 0..10 {
                sim.add_particle(390.0 + i as f32 * 2.0, 290.0 + j as f32 * 2.0, 0.0, 0.0);
            }
        }

        for _ in 0..200 {
            sim.step(16.0);
        }

        let r = FluidConfig::default().particle_radius;
        for p in sim.particles() {
            assert!(p.position.x >= r && p.position.x <= WIDTH - r);
            assert!(p.position.y >= r && p.position.y <= HEIGHT - r);
            assert!(p.velocity.x.is_finite() && p.velocity.y.is_finite());
        }
    }
}
