//! Population statistics consumed by telemetry.

use crate::SpeciesKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Aggregate snapshot of the ecosystem population
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PopulationStats {
    /// Total organisms alive
    pub total: usize,
    /// Alive count per species
    pub counts: HashMap<SpeciesKind, usize>,
    /// Mean energy across the population (0.0 when empty)
    pub avg_energy: f32,
    /// Mean age in steps across the population (0.0 when empty)
    pub avg_age: f32,
}

impl PopulationStats {
    pub fn count(&self, kind: SpeciesKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Build stats from per-organism (kind, energy, age) samples
    pub fn from_samples<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = (SpeciesKind, f32, u32)>,
    {
        let mut stats = PopulationStats::default();
        let mut energy_sum = 0.0f64;
        let mut age_sum = 0.0f64;

        for (kind, energy, age) in samples {
            *stats.counts.entry(kind).or_insert(0) += 1;
            stats.total += 1;
            energy_sum += energy as f64;
            age_sum += age as f64;
        }

        if stats.total > 0 {
            stats.avg_energy = (energy_sum / stats.total as f64) as f32;
            stats.avg_age = (age_sum / stats.total as f64) as f32;
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_population() {
        let stats = PopulationStats::from_samples(std::iter::empty());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.avg_energy, 0.0);
        assert_eq!(stats.count(SpeciesKind::Prey), 0);
    }

    #[test]
    fn test_aggregation() {
        let samples = vec![
            (SpeciesKind::Prey, 40.0, 10),
            (SpeciesKind::Prey, 60.0, 30),
            (SpeciesKind::Predator, 80.0, 20),
        ];
        let stats = PopulationStats::from_samples(samples);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.count(SpeciesKind::Prey), 2);
        assert_eq!(stats.count(SpeciesKind::Predator), 1);
        assert_eq!(stats.count(SpeciesKind::Producer), 0);
        assert!((stats.avg_energy - 60.0).abs() < 1e-5);
        assert!((stats.avg_age - 20.0).abs() < 1e-5);
    }
}
