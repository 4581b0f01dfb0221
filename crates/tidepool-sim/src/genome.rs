//! Genome representation and mutation operators for organisms.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tidepool_core::SpeciesKind;

/// Inclusive valid range for each gene. Mutation clamps into these.
pub const HUE_RANGE: (f32, f32) = (0.0, 360.0);
pub const SATURATION_RANGE: (f32, f32) = (0.3, 1.0);
pub const BRIGHTNESS_RANGE: (f32, f32) = (0.3, 1.0);
pub const SIZE_RANGE: (f32, f32) = (2.0, 8.0);
pub const SPEED_RANGE: (f32, f32) = (0.5, 1.5);
pub const AGGRESSION_RANGE: (f32, f32) = (0.0, 1.0);
pub const EFFICIENCY_RANGE: (f32, f32) = (0.5, 1.5);

/// Heritable traits. Color genes feed the render layer; size, speed,
/// aggression, and efficiency feed behavior and reproduction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    pub hue: f32,
    pub saturation: f32,
    pub brightness: f32,
    /// Body radius in pixels
    pub size: f32,
    /// Multiplier on the configured base speed
    pub speed: f32,
    pub aggression: f32,
    /// Scales reproduction probability
    pub efficiency: f32,
}

impl Genome {
    /// Uniform random genome across every gene range.
    pub fn random(rng: &mut ChaCha8Rng) -> Self {
        Self {
            hue: rng.gen_range(HUE_RANGE.0..=HUE_RANGE.1),
            saturation: rng.gen_range(SATURATION_RANGE.0..=SATURATION_RANGE.1),
            brightness: rng.gen_range(BRIGHTNESS_RANGE.0..=BRIGHTNESS_RANGE.1),
            size: rng.gen_range(SIZE_RANGE.0..=SIZE_RANGE.1),
            speed: rng.gen_range(SPEED_RANGE.0..=SPEED_RANGE.1),
            aggression: rng.gen_range(AGGRESSION_RANGE.0..=AGGRESSION_RANGE.1),
            efficiency: rng.gen_range(EFFICIENCY_RANGE.0..=EFFICIENCY_RANGE.1),
        }
    }

    /// Species-flavored starting genome: hue band per species plus a
    /// jittered mid-range body.
    pub fn for_species(kind: SpeciesKind, rng: &mut ChaCha8Rng) -> Self {
        let hue_band = match kind {
            SpeciesKind::Predator => (0.0, 40.0),
            SpeciesKind::Prey => (180.0, 240.0),
            SpeciesKind::Producer => (90.0, 150.0),
            SpeciesKind::Decomposer => (270.0, 320.0),
        };
        let mut genome = Self::random(rng);
        genome.hue = rng.gen_range(hue_band.0..=hue_band.1);
        genome.aggression = match kind {
            SpeciesKind::Predator => rng.gen_range(0.6..=1.0),
            _ => rng.gen_range(0.0..=0.4),
        };
        genome
    }

    fn genes(&self) -> [(f32, (f32, f32)); 7] {
        [
            (self.hue, HUE_RANGE),
            (self.saturation, SATURATION_RANGE),
            (self.brightness, BRIGHTNESS_RANGE),
            (self.size, SIZE_RANGE),
            (self.speed, SPEED_RANGE),
            (self.aggression, AGGRESSION_RANGE),
            (self.efficiency, EFFICIENCY_RANGE),
        ]
    }

    fn from_genes(values: [f32; 7]) -> Self {
        Self {
            hue: values[0],
            saturation: values[1],
            brightness: values[2],
            size: values[3],
            speed: values[4],
            aggression: values[5],
            efficiency: values[6],
        }
    }

    /// True when every gene sits inside its documented range.
    pub fn in_range(&self) -> bool {
        self.genes()
            .iter()
            .all(|(value, (lo, hi))| *value >= *lo && *value <= *hi)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Independent perturbation probability per gene
    pub gene_mutation_rate: f32,
    /// Maximum perturbation as a fraction of the gene's range width
    pub mutation_strength: f32,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            gene_mutation_rate: 0.15,
            mutation_strength: 0.1,
        }
    }
}

pub struct Mutator {
    config: MutationConfig,
}

impl Mutator {
    pub fn new(config: MutationConfig) -> Self {
        Self { config }
    }

    /// Mutate a genome in place: each gene independently gets a bounded
    /// random delta, then is clamped back to its valid range.
    pub fn mutate(&self, genome: &mut Genome, rng: &mut ChaCha8Rng) {
        let mut values = [0.0f32; 7];
        for (slot, (value, (lo, hi))) in values.iter_mut().zip(genome.genes()) {
            *slot = if rng.gen::<f32>() < self.config.gene_mutation_rate {
                let span = (hi - lo) * self.config.mutation_strength;
                (value + rng.gen_range(-span..=span)).clamp(lo, hi)
            } else {
                value
            };
        }
        *genome = Genome::from_genes(values);
    }

    /// Sexual recombination: each gene picked at random from one parent.
    /// Provided for completeness; the ecosystem's default reproduction
    /// path is asexual mutation.
    pub fn crossover(&self, a: &Genome, b: &Genome, rng: &mut ChaCha8Rng) -> Genome {
        let genes_a = a.genes();
        let genes_b = b.genes();
        let mut values = [0.0f32; 7];
        for i in 0..7 {
            values[i] = if rng.gen::<bool>() {
                genes_a[i].0
            } else {
                genes_b[i].0
            };
        }
        Genome::from_genes(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;

    #[test]
    fn test_random_genome_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..100 {
            assert!(Genome::random(&mut rng).in_range());
        }
    }

    #[test]
    fn test_species_genomes_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        for kind in SpeciesKind::all() {
            let genome = Genome::for_species(kind, &mut rng);
            assert!(genome.in_range());
        }
    }

    #[test]
    fn test_predators_start_aggressive() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let predator = Genome::for_species(SpeciesKind::Predator, &mut rng);
        let prey = Genome::for_species(SpeciesKind::Prey, &mut rng);
        assert!(predator.aggression >= 0.6);
        assert!(prey.aggression <= 0.4);
    }

    #[test]
    fn test_crossover_picks_parent_genes() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let a = Genome::random(&mut rng);
        let b = Genome::random(&mut rng);
        let mutator = Mutator::new(MutationConfig::default());

        let child = mutator.crossover(&a, &b, &mut rng);
        assert!(child.in_range());
        assert!(child.hue == a.hue || child.hue == b.hue);
        assert!(child.size == a.size || child.size == b.size);
        assert!(child.efficiency == a.efficiency || child.efficiency == b.efficiency);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(2000))]

        /// Mutation never escapes a gene's documented range, for any seed
        /// and any starting genome.
        #[test]
        fn prop_mutation_stays_in_range(seed in any::<u64>(), rounds in 1usize..5) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut genome = Genome::random(&mut rng);
            let mutator = Mutator::new(MutationConfig::default());

            for _ in 0..rounds {
                mutator.mutate(&mut genome, &mut rng);
                prop_assert!(genome.in_range());
            }
        }

        /// Same invariant under an aggressive mutation profile.
        #[test]
        fn prop_heavy_mutation_stays_in_range(seed in any::<u64>()) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut genome = Genome::random(&mut rng);
            let mutator = Mutator::new(MutationConfig {
                gene_mutation_rate: 1.0,
                mutation_strength: 1.0,
            });

            for _ in 0..10 {
                mutator.mutate(&mut genome, &mut rng);
                prop_assert!(genome.in_range());
            }
        }
    }
}
