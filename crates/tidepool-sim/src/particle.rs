//! Fluid particle record.

use serde::{Deserialize, Serialize};
use tidepool_core::Vec2;

/// A single SPH particle. Owned exclusively by the fluid engine; density,
/// pressure, and acceleration are recomputed in full every step rather
/// than accumulated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    pub acceleration: Vec2,
    /// Display/collision radius, constant after creation
    pub radius: f32,
    /// Kernel-summation mass, constant after creation
    pub mass: f32,
    /// Kernel-weighted density; clamped to a strict positive floor before
    /// it is ever used as a divisor
    pub density: f32,
    /// Equation-of-state pressure; negative in the attractive regime
    pub pressure: f32,
    /// Render fade in [0, 1]; driven by the render layer, ignored by physics
    pub life: f32,
    /// Opaque display tag (0xRRGGBB); ignored by physics
    pub color: u32,
}

impl Particle {
    pub fn new(position: Vec2, velocity: Vec2, radius: f32, mass: f32, color: u32) -> Self {
        Self {
            position,
            velocity,
            acceleration: Vec2::ZERO,
            radius,
            mass,
            density: 0.0,
            pressure: 0.0,
            life: 1.0,
            color,
        }
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }
}
