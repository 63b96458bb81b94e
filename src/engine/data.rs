//! In-memory dataset and the deterministic train/test split.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::EngineError;

/// Row-major feature matrix plus target column. Rows must be rectangular;
/// non-finite entries are allowed and masked out by the metrics.
#[derive(Debug, Clone)]
pub struct Dataset {
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
}

impl Dataset {
    pub fn new(x: Vec<Vec<f64>>, y: Vec<f64>) -> Result<Self, EngineError> {
        if x.is_empty() || y.is_empty() {
            return Err(EngineError::Config("empty dataset".into()));
        }
        if x.len() != y.len() {
            return Err(EngineError::Config(format!(
                "feature rows ({}) and target length ({}) disagree",
                x.len(),
                y.len()
            )));
        }
        let width = x[0].len();
        if width == 0 {
            return Err(EngineError::Config("dataset has no feature columns".into()));
        }
        if x.iter().any(|row| row.len() != width) {
            return Err(EngineError::Config("ragged feature rows".into()));
        }
        Ok(Self { x, y })
    }

    /// A 1-D input reshaped to a single column.
    pub fn single_feature(x: Vec<f64>, y: Vec<f64>) -> Result<Self, EngineError> {
        Self::new(x.into_iter().map(|v| vec![v]).collect(), y)
    }

    pub fn n_samples(&self) -> usize {
        self.y.len()
    }

    pub fn n_features(&self) -> usize {
        self.x[0].len()
    }

    pub fn x(&self) -> &[Vec<f64>] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }
}

/// The materialized train/test split.
#[derive(Debug, Clone)]
pub struct Split {
    pub x_train: Vec<Vec<f64>>,
    pub y_train: Vec<f64>,
    pub x_test: Vec<Vec<f64>>,
    pub y_test: Vec<f64>,
}

impl Split {
    pub fn n_train(&self) -> usize {
        self.y_train.len()
    }

    pub fn n_test(&self) -> usize {
        self.y_test.len()
    }
}

/// Deterministic pseudo-random split: the seed fully determines which rows
/// land in the held-out set, so identical runs see identical splits. The
/// test set takes `ceil(m * test_size)` rows, leaving at least one train
/// row.
pub fn train_test_split(dataset: &Dataset, test_size: f64, seed: u64) -> Split {
    let m = dataset.n_samples();
    let mut indices: Vec<usize> = (0..m).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = if test_size <= 0.0 {
        0
    } else {
        ((m as f64 * test_size).ceil() as usize).min(m.saturating_sub(1))
    };

    let (test_idx, train_idx) = indices.split_at(n_test);
    Split {
        x_train: train_idx.iter().map(|&i| dataset.x()[i].clone()).collect(),
        y_train: train_idx.iter().map(|&i| dataset.y()[i]).collect(),
        x_test: test_idx.iter().map(|&i| dataset.x()[i].clone()).collect(),
        y_test: test_idx.iter().map(|&i| dataset.y()[i]).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(m: usize) -> Dataset {
        let x: Vec<Vec<f64>> = (0..m).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..m).map(|i| 2.0 * i as f64).collect();
        Dataset::new(x, y).unwrap()
    }

    #[test]
    fn rejects_malformed_datasets() {
        assert!(Dataset::new(vec![], vec![]).is_err());
        assert!(Dataset::new(vec![vec![1.0]], vec![1.0, 2.0]).is_err());
        assert!(Dataset::new(vec![vec![1.0], vec![1.0, 2.0]], vec![0.0, 0.0]).is_err());
    }

    #[test]
    fn split_is_deterministic_in_the_seed() {
        let data = dataset(100);
        let a = train_test_split(&data, 0.2, 42);
        let b = train_test_split(&data, 0.2, 42);
        assert_eq!(a.y_train, b.y_train);
        assert_eq!(a.y_test, b.y_test);

        let c = train_test_split(&data, 0.2, 7);
        assert_ne!(a.y_test, c.y_test);
    }

    #[test]
    fn split_sizes_follow_the_fraction() {
        let data = dataset(50);
        let s = train_test_split(&data, 0.2, 42);
        assert_eq!(s.n_test(), 10);
        assert_eq!(s.n_train(), 40);

        let none = train_test_split(&data, 0.0, 42);
        assert_eq!(none.n_test(), 0);
        assert_eq!(none.n_train(), 50);
    }

    #[test]
    fn split_partitions_the_rows() {
        let data = dataset(30);
        let s = train_test_split(&data, 0.3, 1);
        let mut all: Vec<f64> = s.y_train.iter().chain(s.y_test.iter()).copied().collect();
        all.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mut expected: Vec<f64> = data.y().to_vec();
        expected.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(all, expected);
    }
}
