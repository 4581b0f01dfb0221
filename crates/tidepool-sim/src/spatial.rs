//! Uniform-grid spatial index for radius-bounded neighbor queries.
//!
//! Buckets 2D points into cells sized to the interaction radius so a
//! neighbor query only scans the 3x3 block of cells around the query
//! point instead of comparing against every particle.

use std::collections::HashMap;
use tidepool_core::Vec2;

/// Maps discretized cell coordinates to the point indices inside the cell.
///
/// Rebuilt from scratch at the start of every simulation step; entries are
/// never carried across steps, so no bucket can hold a stale index.
#[derive(Debug)]
pub struct SpatialIndex {
    cell_size: f32,
    buckets: HashMap<(i32, i32), Vec<usize>>,
}

impl SpatialIndex {
    /// The cell size must equal the physical interaction radius: the 3x3
    /// scan in [`neighbors_within`](Self::neighbors_within) is only
    /// sufficient when no query radius exceeds one cell width.
    pub fn new(cell_size: f32) -> Self {
        assert!(cell_size > 0.0, "cell size must be positive");
        Self {
            cell_size,
            buckets: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn cell_of(&self, point: Vec2) -> (i32, i32) {
        (
            (point.x / self.cell_size).floor() as i32,
            (point.y / self.cell_size).floor() as i32,
        )
    }

    /// Clear all buckets and re-insert every point once. Bucket capacity
    /// is retained across rebuilds to keep the per-step allocation cost
    /// flat. An empty point set is a no-op.
    pub fn rebuild(&mut self, points: &[Vec2]) {
        for bucket in self.buckets.values_mut() {
            bucket.clear();
        }

        for (index, point) in points.iter().enumerate() {
            let cell = self.cell_of(*point);
            self.buckets.entry(cell).or_default().push(index);
        }
    }

    /// Indices of all points strictly within `radius` of `point`, scanning
    /// the 3x3 cell block centered on the query cell. `exclude` is never
    /// returned. Ordering of the result is unspecified.
    pub fn neighbors_within(
        &self,
        points: &[Vec2],
        point: Vec2,
        radius: f32,
        exclude: Option<usize>,
    ) -> Vec<usize> {
        let mut out = Vec::new();
        self.neighbors_within_into(points, point, radius, exclude, &mut out);
        out
    }

    /// As [`neighbors_within`](Self::neighbors_within), appending into a
    /// caller-owned buffer so hot loops can reuse the allocation.
    pub fn neighbors_within_into(
        &self,
        points: &[Vec2],
        point: Vec2,
        radius: f32,
        exclude: Option<usize>,
        out: &mut Vec<usize>,
    ) {
        debug_assert!(
            radius <= self.cell_size,
            "query radius {} exceeds cell size {}",
            radius,
            self.cell_size
        );

        out.clear();
        let (cx, cy) = self.cell_of(point);
        let radius_sq = radius * radius;

        for dy in -1..=1 {
            for dx in -1..=1 {
                let Some(bucket) = self.buckets.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                for &index in bucket {
                    if Some(index) == exclude {
                        continue;
                    }
                    if points[index].distance_sq(point) < radius_sq {
                        out.push(index);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_empty_rebuild_is_noop() {
        let mut index = SpatialIndex::new(10.0);
        index.rebuild(&[]);
        let neighbors = index.neighbors_within(&[], Vec2::new(5.0, 5.0), 10.0, None);
        assert!(neighbors.is_empty());
    }

    #[test]
    fn test_neighbors_across_cell_boundary() {
        // Two points in adjacent cells, closer than the radius.
        let points = vec![Vec2::new(9.5, 5.0), Vec2::new(10.5, 5.0)];
        let mut index = SpatialIndex::new(10.0);
        index.rebuild(&points);

        let neighbors = index.neighbors_within(&points, points[0], 10.0, Some(0));
        assert_eq!(neighbors, vec![1]);
    }

    #[test]
    fn test_self_exclusion() {
        let points = vec![Vec2::new(5.0, 5.0), Vec2::new(5.0, 5.0)];
        let mut index = SpatialIndex::new(10.0);
        index.rebuild(&points);

        // Coincident points: the excluded index never appears, the other does.
        let neighbors = index.neighbors_within(&points, points[0], 10.0, Some(0));
        assert_eq!(neighbors, vec![1]);
    }

    #[test]
    fn test_negative_coordinates() {
        let points = vec![Vec2::new(-0.5, -0.5), Vec2::new(0.5, 0.5)];
        let mut index = SpatialIndex::new(10.0);
        index.rebuild(&points);

        let neighbors = index.neighbors_within(&points, points[0], 10.0, Some(0));
        assert_eq!(neighbors, vec![1]);
    }

    #[test]
    fn test_stale_indices_cleared_on_rebuild() {
        let points = vec![Vec2::new(5.0, 5.0), Vec2::new(6.0, 5.0)];
        let mut index = SpatialIndex::new(10.0);
        index.rebuild(&points);

        let fewer = vec![Vec2::new(5.0, 5.0)];
        index.rebuild(&fewer);
        let neighbors = index.neighbors_within(&fewer, fewer[0], 10.0, Some(0));
        assert!(neighbors.is_empty());
    }

    #[test]
    fn test_parity_with_brute_force() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let points: Vec<Vec2> = (0..300)
            .map(|_| Vec2::new(rng.gen_range(0.0..200.0), rng.gen_range(0.0..200.0)))
            .collect();

        let radius = 16.0;
        let mut index = SpatialIndex::new(radius);
        index.rebuild(&points);

        for i in 0..points.len() {
            let mut expected: Vec<usize> = (0..points.len())
                .filter(|&j| j != i && points[j].distance_sq(points[i]) < radius * radius)
                .collect();
            let mut actual = index.neighbors_within(&points, points[i], radius, Some(i));

            expected.sort_unstable();
            actual.sort_unstable();
            assert_eq!(actual, expected, "mismatch at point {}", i);
        }
    }
}
