//! Background simulation driver.
//!
//! Owns one fluid engine and one ecosystem engine behind shared locks and
//! steps both from a dedicated thread at the configured frame rate, using
//! measured wall-clock frame times so physics stays stable under jitter.

use anyhow::Result;
use parking_lot::Mutex;
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tidepool_core::{PopulationStats, RunnerConfig, Vec2};
use tidepool_sim::{EcosystemSimulation, FluidSimulation, Organism, Particle};
use tracing::{info, warn};

/// Frame times above this are treated as a stall, not simulated time.
const MAX_FRAME_MS: f32 = 100.0;

pub struct SimulationEngine {
    fluid: Arc<Mutex<FluidSimulation>>,
    ecosystem: Arc<Mutex<EcosystemSimulation>>,
    running: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
    target_fps: f32,
}

impl SimulationEngine {
    /// Build both engines and seed the initial scene: a radial particle
    /// burst for the fluid and the configured starting population.
    pub fn new(config: &RunnerConfig) -> Result<Self> {
        let mut fluid = FluidSimulation::new(config.width, config.height)?;
        let mut ecosystem = EcosystemSimulation::new(config.width, config.height)?;

        seed_burst(&mut fluid, config);
        ecosystem.populate(config.initial_population);

        info!(
            particles = fluid.len(),
            organisms = ecosystem.len(),
            "initial scene seeded"
        );

        Ok(Self {
            fluid: Arc::new(Mutex::new(fluid)),
            ecosystem: Arc::new(Mutex::new(ecosystem)),
            running: Arc::new(AtomicBool::new(false)),
            frames: Arc::new(AtomicU64::new(0)),
            handle: None,
            target_fps: config.target_fps.max(1.0),
        })
    }

    /// Start the stepping thread. Idempotent.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let fluid = self.fluid.clone();
        let ecosystem = self.ecosystem.clone();
        let running = self.running.clone();
        let frames = self.frames.clone();
        let frame_budget = Duration::from_secs_f32(1.0 / self.target_fps);

        self.handle = Some(thread::spawn(move || {
            info!(budget_ms = frame_budget.as_millis() as u64, "simulation loop started");
            let mut last = Instant::now() - frame_budget;
            let mut behind_frames = 0u32;

            while running.load(Ordering::SeqCst) {
                let start = Instant::now();
                let dt_ms = ((start - last).as_secs_f32() * 1000.0).min(MAX_FRAME_MS);
                last = start;

                fluid.lock().step(dt_ms);
                ecosystem.lock().step(dt_ms);
                frames.fetch_add(1, Ordering::Relaxed);

                let elapsed = start.elapsed();
                if elapsed > frame_budget {
                    behind_frames += 1;
                    // One line per streak, not per late frame.
                    if behind_frames == 1 {
                        warn!(
                            frame_ms = elapsed.as_secs_f32() * 1000.0,
                            "stepping slower than target frame rate"
                        );
                    }
                } else {
                    behind_frames = 0;
                    thread::sleep(frame_budget - elapsed);
                }
            }

            info!("simulation loop stopped");
        }));
    }

    /// Signal the stepping thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn particle_count(&self) -> usize {
        self.fluid.lock().len()
    }

    pub fn fluid_dt(&self) -> f32 {
        self.fluid.lock().adaptive_dt()
    }

    pub fn population_stats(&self) -> PopulationStats {
        self.ecosystem.lock().population_stats()
    }

    /// Owned copy of the particle ensemble for a render layer.
    pub fn particle_snapshot(&self) -> Vec<Particle> {
        self.fluid.lock().particles().to_vec()
    }

    /// Owned copy of the population for a render layer.
    pub fn organism_snapshot(&self) -> Vec<Organism> {
        self.ecosystem.lock().organisms().to_vec()
    }
}

impl Drop for SimulationEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sunflower-spiral burst above the floor: deterministic, dense in the
/// middle, with a gentle outward velocity so the splash reads on frame one.
fn seed_burst(fluid: &mut FluidSimulation, config: &RunnerConfig) {
    let center = Vec2::new(config.width / 2.0, config.height / 3.0);
    for i in 0..config.initial_particles {
        let angle = i as f32 * TAU * 0.618_034;
        let radius = 4.0 * (i as f32).sqrt();
        let (sin, cos) = angle.sin_cos();
        fluid.add_particle(
            center.x + cos * radius,
            center.y + sin * radius,
            cos * 40.0,
            sin * 40.0,
        );
    }
}
