//! Engine construction options.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::{MAX_POPULATION, MAX_TREE_DEPTH};

/// Which parent-selection scheme the generation loop uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// Tournament on fitness with a simplicity tiebreak among near-ties.
    #[default]
    Lexicographic,
    /// Fitness tournament followed by a probabilistic parsimony challenge.
    DoubleTournament,
}

/// The recognized engine options. Anything omitted takes the documented
/// default; population size and initial depth are clamped to their hard
/// caps at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Display names for the input columns; sanitized on construction.
    pub variable_names: Vec<String>,
    pub operators: Vec<String>,
    pub functions: Vec<String>,
    pub population_size: usize,
    pub mutation_prob: f64,
    pub crossover_prob: f64,
    pub tournament_size: usize,
    pub max_depth: usize,
    pub parsimony_coefficient: f64,
    /// Minimum wall time between streamed updates, in seconds.
    pub update_interval: f64,
    /// Fraction of samples held out for the test split.
    pub test_size: f64,
    /// Seed for the split, the initial population, and every later draw.
    pub random_state: u64,
    pub selection: Selection,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            variable_names: Vec::new(),
            operators: ["+", "-", "*", "/"].map(String::from).to_vec(),
            functions: ["sin", "cos", "sqrt", "log", "exp"]
                .map(String::from)
                .to_vec(),
            population_size: 300,
            mutation_prob: 0.2,
            crossover_prob: 0.5,
            tournament_size: 7,
            max_depth: 4,
            parsimony_coefficient: 0.01,
            update_interval: 0.5,
            test_size: 0.2,
            random_state: 42,
            selection: Selection::Lexicographic,
        }
    }
}

impl EngineConfig {
    /// Apply the hard caps.
    pub(crate) fn clamped(mut self) -> Self {
        self.population_size = self.population_size.min(MAX_POPULATION);
        self.max_depth = self.max_depth.min(MAX_TREE_DEPTH).max(1);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), EngineError> {
        if self.population_size == 0 {
            return Err(EngineError::Config("population_size must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.mutation_prob) {
            return Err(EngineError::Config("mutation_prob must be in [0, 1]".into()));
        }
        if !(0.0..=1.0).contains(&self.crossover_prob) {
            return Err(EngineError::Config("crossover_prob must be in [0, 1]".into()));
        }
        if self.tournament_size == 0 {
            return Err(EngineError::Config("tournament_size must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.test_size) {
            return Err(EngineError::Config("test_size must be in [0, 1)".into()));
        }
        if self.update_interval < 0.0 || !self.update_interval.is_finite() {
            return Err(EngineError::Config("update_interval must be non-negative".into()));
        }
        if !self.parsimony_coefficient.is_finite() || self.parsimony_coefficient < 0.0 {
            return Err(EngineError::Config(
                "parsimony_coefficient must be non-negative".into(),
            ));
        }
        Ok(())
    }
}
