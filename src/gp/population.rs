//! Individuals and population-level statistics.

use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::WORST_FITNESS;

/// A member of the population: an expression tree plus cached structural
/// metadata and an optional fitness.
///
/// Fitness is `None` until evaluated and is cleared by any structural
/// change; selection must only read individuals whose fitness is present.
/// The train R² observed by the evaluation pass is cached alongside it so
/// the simplest-good hall of fame does not re-predict every generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Individual {
    pub expr: Expr,
    pub size: usize,
    pub depth: usize,
    pub fitness: Option<f64>,
    pub train_r2: Option<f64>,
}

impl Individual {
    pub fn new(expr: Expr) -> Self {
        let size = expr.size();
        let depth = expr.depth();
        Self {
            expr,
            size,
            depth,
            fitness: None,
            train_r2: None,
        }
    }

    /// Drop cached evaluation results after a structural change.
    pub fn invalidate(&mut self) {
        self.fitness = None;
        self.train_r2 = None;
    }

    /// Fitness for ordering purposes; unevaluated individuals rank worst.
    pub fn fitness_or_worst(&self) -> f64 {
        self.fitness.unwrap_or(WORST_FITNESS)
    }
}

/// Aggregates over the current population, computed once per emission.
#[derive(Debug, Clone, Copy)]
pub struct PopulationStats {
    pub best_fitness: f64,
    pub avg_fitness: f64,
    pub std_fitness: f64,
    pub avg_size: f64,
}

pub fn population_stats(population: &[Individual]) -> PopulationStats {
    if population.is_empty() {
        return PopulationStats {
            best_fitness: WORST_FITNESS,
            avg_fitness: WORST_FITNESS,
            std_fitness: 0.0,
            avg_size: 0.0,
        };
    }

    let n = population.len() as f64;

    let fitnesses: Vec<f64> = population.iter().map(|ind| ind.fitness_or_worst()).collect();
    let best_fitness = fitnesses.iter().cloned().fold(f64::INFINITY, f64::min);
    let avg_fitness = fitnesses.iter().sum::<f64>() / n;
    let fitness_variance = fitnesses
        .iter()
        .map(|f| (f - avg_fitness).powi(2))
        .sum::<f64>()
        / n;
    let std_fitness = fitness_variance.sqrt();

    let avg_size = population.iter().map(|ind| ind.size as f64).sum::<f64>() / n;

    PopulationStats {
        best_fitness,
        avg_fitness,
        std_fitness,
        avg_size,
    }
}
