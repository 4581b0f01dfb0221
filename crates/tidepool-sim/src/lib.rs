//! Simulation engines for the tidepool animation core.
//!
//! Two frame-driven engines share one neighbor-search structure: the SPH
//! fluid engine ([`FluidSimulation`]) and the flocking/predator-prey
//! ecosystem engine ([`EcosystemSimulation`]). A driver calls `step` once
//! per frame on whichever engine is active and renders the returned
//! snapshot read-only.

pub mod ecosystem;
pub mod genome;
pub mod organism;
pub mod particle;
pub mod spatial;
pub mod sph;

pub use ecosystem::EcosystemSimulation;
pub use genome::{Genome, MutationConfig, Mutator};
pub use organism::Organism;
pub use particle::Particle;
pub use spatial::SpatialIndex;
pub use sph::FluidSimulation;
