//! Genetic-programming operators: individuals, population construction,
//! variation, selection, and the halls of fame.

pub mod generate;
pub mod hof;
pub mod population;
pub mod select;
pub mod variation;

pub use generate::{ramped_half_and_half, random_expr_full, random_expr_grow, random_population};
pub use hof::{HallOfFame, SimplestHallOfFame};
pub use population::{population_stats, Individual, PopulationStats};
pub use select::{select_double_tournament, select_lexicographic};
pub use variation::{crossover_one_point, mutate_uniform};
