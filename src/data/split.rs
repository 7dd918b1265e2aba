//! Row selection for training and evaluation

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Which rows of a table a dataset uses
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    /// Every row, in table order
    Full,
    /// A random subset of `ceil(proportion * n)` rows
    Holdout { proportion: f32 },
}

impl Split {
    /// Number of rows selected out of `n`
    pub fn size(&self, n: usize) -> usize {
        match *self {
            Split::Full => n,
            Split::Holdout { proportion } => {
                let p = proportion.clamp(0.0, 1.0) as f64;
                // Tolerance absorbs the f32 representation error of `proportion`
                ((p * n as f64 - 1e-6).ceil().max(0.0) as usize).min(n)
            }
        }
    }

    /// Row indices selected out of `n`
    pub fn indices<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n).collect();
        if let Split::Holdout { .. } = self {
            indices.shuffle(rng);
            indices.truncate(self.size(n));
        }

        tracing::debug!("Split {:?}: {} of {} rows", self, indices.len(), n);
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_full_keeps_order() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(Split::Full.indices(4, &mut rng), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_holdout_size_rounds_up() {
        let split = Split::Holdout { proportion: 0.9 };
        assert_eq!(split.size(10), 9);
        assert_eq!(split.size(11), 10);
        assert_eq!(Split::Holdout { proportion: 0.25 }.size(3), 1);
    }

    #[test]
    fn test_holdout_indices_are_distinct() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut picked = Split::Holdout { proportion: 0.5 }.indices(20, &mut rng);
        assert_eq!(picked.len(), 10);
        picked.sort_unstable();
        picked.dedup();
        assert_eq!(picked.len(), 10);
        assert!(picked.iter().all(|&i| i < 20));
    }

    #[test]
    fn test_holdout_is_seeded() {
        let split = Split::Holdout { proportion: 0.3 };
        let a = split.indices(50, &mut StdRng::seed_from_u64(42));
        let b = split.indices(50, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
