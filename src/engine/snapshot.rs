//! Checkpointable engine state.
//!
//! Everything here is a deep copy: capturing a snapshot and then letting
//! the engine keep evolving never mutates the captured data.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::engine::config::EngineConfig;
use crate::engine::report::GenerationStats;
use crate::gp::population::Individual;

/// Shape of the dataset a snapshot was taken against. Restoring onto a
/// different shape is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataInfo {
    pub n_samples: usize,
    pub n_features: usize,
    pub n_train: usize,
    pub n_test: usize,
}

/// Serialized generator state: the original seed plus the stream position.
/// Restoring reproduces the exact remaining draw sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    seed: [u8; 32],
    word_pos: u128,
}

impl RngState {
    pub fn capture(rng: &ChaCha8Rng) -> Self {
        Self {
            seed: rng.get_seed(),
            word_pos: rng.get_word_pos(),
        }
    }

    pub fn restore(&self) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::from_seed(self.seed);
        rng.set_word_pos(self.word_pos);
        rng
    }
}

/// Full evolutionary state at a generation boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionSnapshot {
    pub generation: u64,
    pub population: Vec<Individual>,
    pub best_hof: Vec<Individual>,
    pub simplest_hof: Vec<Individual>,
    pub gen_stats: Vec<GenerationStats>,
    pub adaptive_parsimony: f64,
    pub config: EngineConfig,
    pub data_info: DataInfo,
    pub rng_state: RngState,
}
