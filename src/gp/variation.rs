//! Structural variation: one-point crossover and uniform subtree mutation,
//! both guarded by the static size limit.
//!
//! The static limit works like a decorator around the raw operator: any
//! product whose size exceeds `MAX_TREE_SIZE` is discarded and the
//! corresponding parent returned unchanged, which keeps the population size
//! and the size invariant intact. Returned individuals always carry an
//! invalidated fitness; the caller re-evaluates under the current parsimony
//! coefficient.

use rand::Rng;

use crate::expr::PrimitiveSet;
use crate::gp::generate::random_expr_grow;
use crate::gp::population::Individual;
use crate::MAX_TREE_SIZE;

/// One-point crossover: pick one node path in each parent uniformly at
/// random and swap the subtrees rooted there.
pub fn crossover_one_point(
    a: &Individual,
    b: &Individual,
    rng: &mut impl Rng,
) -> (Individual, Individual) {
    let paths_a = a.expr.node_paths();
    let paths_b = b.expr.node_paths();
    let path_a = &paths_a[rng.gen_range(0..paths_a.len())];
    let path_b = &paths_b[rng.gen_range(0..paths_b.len())];

    let sub_a = a.expr.subtree(path_a).clone();
    let sub_b = b.expr.subtree(path_b).clone();

    let child_a = a.expr.replace_subtree(path_a, sub_b);
    let child_b = b.expr.replace_subtree(path_b, sub_a);

    let child_a = if child_a.size() > MAX_TREE_SIZE {
        a.expr.clone()
    } else {
        child_a
    };
    let child_b = if child_b.size() > MAX_TREE_SIZE {
        b.expr.clone()
    } else {
        child_b
    };

    (Individual::new(child_a), Individual::new(child_b))
}

/// Uniform subtree mutation: replace a uniformly chosen node with a small
/// freshly grown subtree (a terminal, or one primitive over terminals).
pub fn mutate_uniform(
    ind: &Individual,
    pset: &PrimitiveSet,
    rng: &mut impl Rng,
) -> Individual {
    let paths = ind.expr.node_paths();
    let path = &paths[rng.gen_range(0..paths.len())];

    let height = rng.gen_range(1..=2);
    let replacement = random_expr_grow(rng, pset, height);

    let mutated = ind.expr.replace_subtree(path, replacement);
    if mutated.size() > MAX_TREE_SIZE {
        Individual::new(ind.expr.clone())
    } else {
        Individual::new(mutated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Expr, Op};
    use crate::gp::generate::random_population;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn pset() -> PrimitiveSet {
        PrimitiveSet::from_config(
            1,
            &["x".to_string()],
            &["+".to_string(), "-".to_string(), "*".to_string(), "/".to_string()],
            &[],
        )
        .unwrap()
    }

    #[test]
    fn crossover_preserves_the_size_limit() {
        let pset = pset();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let pop = random_population(&mut rng, &pset, 60, 4);
        for pair in pop.chunks(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let (ca, cb) = crossover_one_point(a, b, &mut rng);
            assert!(ca.size <= MAX_TREE_SIZE);
            assert!(cb.size <= MAX_TREE_SIZE);
            assert!(ca.fitness.is_none());
            assert!(cb.fitness.is_none());
        }
    }

    #[test]
    fn mutation_preserves_the_size_limit() {
        let pset = pset();
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let pop = random_population(&mut rng, &pset, 60, 4);
        for ind in &pop {
            let m = mutate_uniform(ind, &pset, &mut rng);
            assert!(m.size <= MAX_TREE_SIZE);
            assert!(m.fitness.is_none());
        }
    }

    #[test]
    fn oversized_crossover_product_falls_back_to_parent() {
        // two maximal chains of nested calls; swapping a deep node for a
        // whole tree overflows the cap, so the parent must come back
        let mut chain = Expr::Var(0);
        for _ in 0..9 {
            chain = Expr::Call(Op::Add, vec![chain, Expr::Var(0)]);
        }
        let a = Individual::new(chain.clone());
        let b = Individual::new(chain);
        assert_eq!(a.size, 19);

        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let vars = ["x".to_string()];
        for _ in 0..50 {
            let (ca, cb) = crossover_one_point(&a, &b, &mut rng);
            assert!(ca.size <= MAX_TREE_SIZE);
            assert!(cb.size <= MAX_TREE_SIZE);
            if ca.size == a.size {
                // fallback keeps the parent's exact shape or a legal swap;
                // either way the printed form stays well-formed
                let _ = ca.expr.format(&vars);
            }
        }
    }

    #[test]
    fn mutation_changes_at_most_one_subtree() {
        let pset = pset();
        let mut rng = ChaCha8Rng::seed_from_u64(14);
        let base = Individual::new(Expr::Call(
            Op::Mul,
            vec![Expr::Var(0), Expr::Var(0)],
        ));
        let m = mutate_uniform(&base, &pset, &mut rng);
        // replacement subtrees have height at most 2
        assert!(m.depth <= base.depth + 2);
    }
}
