use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{PipelineError, Result};
use crate::features::Samples;

#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Samples,
    pub test: Samples,
}

/// Shuffled train/test partition. `test_size` is the fraction of rows held
/// out, rounded up; the same seed always yields the same partition.
pub fn train_test_split(samples: &Samples, test_size: f64, seed: u64) -> Result<Split> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(PipelineError::InvalidSplit {
            reason: format!("test_size must be in (0, 1), got {test_size}"),
        });
    }
    let n = samples.len();
    let n_test = (n as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(PipelineError::InvalidSplit {
            reason: format!("{n} rows cannot be split with test_size {test_size}"),
        });
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let (test_idx, train_idx) = indices.split_at(n_test);
    debug!("split {n} rows into {} train / {} test (seed {seed})", train_idx.len(), test_idx.len());

    Ok(Split {
        train: samples.select(train_idx),
        test: samples.select(test_idx),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureMatrix;

    fn samples(n: usize) -> Samples {
        let rows = (0..n).map(|i| vec![i as f64, (i * 2) as f64]).collect();
        let x = FeatureMatrix::new(vec!["a".into(), "b".into()], rows).unwrap();
        Samples::new(x, (0..n).map(|i| (i % 3 == 0) as i32).collect()).unwrap()
    }

    #[test]
    fn same_seed_same_partition() {
        let s = samples(101);
        let first = train_test_split(&s, 0.2, 42).unwrap();
        let second = train_test_split(&s, 0.2, 42).unwrap();
        assert_eq!(first, second);
        let other = train_test_split(&s, 0.2, 7).unwrap();
        assert_ne!(first.test, other.test);
    }

    #[test]
    fn sizes_and_alignment() {
        let s = samples(101);
        let split = train_test_split(&s, 0.2, 1).unwrap();
        assert_eq!(split.test.len(), 21);
        assert_eq!(split.train.len(), 80);
        for part in [&split.train, &split.test] {
            assert_eq!(part.x().nrows(), part.y().len());
            for (row, &label) in part.x().rows().iter().zip(part.y()) {
                // label was derived from the row index stored in column a
                assert_eq!(label, (row[0] as usize % 3 == 0) as i32);
            }
        }
    }

    #[test]
    fn partition_covers_every_row_once() {
        let s = samples(50);
        let split = train_test_split(&s, 0.3, 3).unwrap();
        let mut seen: Vec<usize> = split
            .train
            .x()
            .rows()
            .iter()
            .chain(split.test.x().rows())
            .map(|r| r[0] as usize)
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn rejects_bad_fractions() {
        let s = samples(10);
        assert!(train_test_split(&s, 0.0, 1).is_err());
        assert!(train_test_split(&s, 1.0, 1).is_err());
        assert!(train_test_split(&samples(1), 0.5, 1).is_err());
    }
}
