//! Parent selection.
//!
//! The default selector is a lexicographic tournament: fitness decides, but
//! among near-ties (a relative epsilon band around the tournament best) the
//! smallest tree wins. A double tournament with an explicit parsimony
//! second stage is also available.

use rand::Rng;

use crate::gp::population::Individual;

/// Sample `k` distinct indices from `0..n` when possible; if `k >= n`,
/// every index is taken once.
fn sample_indices(rng: &mut impl Rng, n: usize, k: usize) -> Vec<usize> {
    if k >= n {
        return (0..n).collect();
    }
    let mut picked = Vec::with_capacity(k);
    while picked.len() < k {
        let idx = rng.gen_range(0..n);
        if !picked.contains(&idx) {
            picked.push(idx);
        }
    }
    picked
}

/// Run one lexicographic tournament and return the winning index.
fn lexicographic_winner(
    population: &[Individual],
    tournsize: usize,
    epsilon: f64,
    rng: &mut impl Rng,
) -> usize {
    let mut aspirants = sample_indices(rng, population.len(), tournsize);
    aspirants.sort_by(|&a, &b| {
        population[a]
            .fitness_or_worst()
            .partial_cmp(&population[b].fitness_or_worst())
            .unwrap()
    });

    let best_fitness = population[aspirants[0]].fitness_or_worst();
    let band = epsilon * best_fitness.abs().max(1.0);

    // among the near-ties, the smallest tree wins; earlier entries break
    // further ties
    let mut winner = aspirants[0];
    for &idx in &aspirants {
        let f = population[idx].fitness_or_worst();
        if (f - best_fitness).abs() < band && population[idx].size < population[winner].size {
            winner = idx;
        }
    }
    winner
}

/// Select `k` individuals by lexicographic tournament. Returned individuals
/// are clones (offspring are independent objects).
pub fn select_lexicographic(
    population: &[Individual],
    k: usize,
    tournsize: usize,
    epsilon: f64,
    rng: &mut impl Rng,
) -> Vec<Individual> {
    (0..k)
        .map(|_| population[lexicographic_winner(population, tournsize, epsilon, rng)].clone())
        .collect()
}

/// Select `k` individuals by double tournament: a fitness tournament first,
/// then with probability `1 / parsimony_size` a random challenger replaces
/// the winner iff it is strictly smaller and its fitness is within 1.5x.
pub fn select_double_tournament(
    population: &[Individual],
    k: usize,
    fitness_size: usize,
    parsimony_size: f64,
    rng: &mut impl Rng,
) -> Vec<Individual> {
    (0..k)
        .map(|_| {
            let aspirants = sample_indices(rng, population.len(), fitness_size);
            let mut winner = aspirants
                .into_iter()
                .min_by(|&a, &b| {
                    population[a]
                        .fitness_or_worst()
                        .partial_cmp(&population[b].fitness_or_worst())
                        .unwrap()
                })
                .unwrap();

            if rng.gen_bool((1.0 / parsimony_size).clamp(0.0, 1.0)) {
                let challenger = rng.gen_range(0..population.len());
                if population[challenger].size < population[winner].size
                    && population[challenger].fitness_or_worst()
                        < population[winner].fitness_or_worst() * 1.5
                {
                    winner = challenger;
                }
            }
            population[winner].clone()
        })
        .collect()
}
