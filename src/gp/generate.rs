//! Random tree construction.
//!
//! Initial populations use ramped half-and-half: a target depth is drawn
//! uniformly from `[1, max_depth]` and a fair coin picks between the *full*
//! strategy (primitives all the way down to the target depth) and the
//! *grow* strategy (primitives and terminals mixed at every level).

use rand::Rng;

use crate::expr::{Expr, PrimitiveSet};
use crate::gp::population::Individual;

/// Build a tree where every branch reaches exactly `depth` levels
/// (the root counts as level 1). A depth of 1 is a lone terminal.
pub fn random_expr_full(rng: &mut impl Rng, pset: &PrimitiveSet, depth: usize) -> Expr {
    if depth <= 1 || pset.ops().is_empty() {
        return pset.random_terminal(rng);
    }
    let op = pset.random_op(rng);
    let children = (0..op.arity())
        .map(|_| random_expr_full(rng, pset, depth - 1))
        .collect();
    Expr::Call(op, children)
}

/// Build a tree of at most `depth` levels, choosing uniformly between
/// primitives and terminals at every interior position.
pub fn random_expr_grow(rng: &mut impl Rng, pset: &PrimitiveSet, depth: usize) -> Expr {
    if depth <= 1 || pset.ops().is_empty() {
        return pset.random_terminal(rng);
    }
    // uniform over primitives + terminal atoms
    let n_ops = pset.ops().len();
    let choice = rng.gen_range(0..n_ops + pset.n_terminals());
    if choice < n_ops {
        let op = pset.ops()[choice];
        let children = (0..op.arity())
            .map(|_| random_expr_grow(rng, pset, depth - 1))
            .collect();
        Expr::Call(op, children)
    } else {
        pset.random_terminal(rng)
    }
}

/// One ramped half-and-half tree: depth target uniform in `[1, max_depth]`,
/// then a fair coin between full and grow.
pub fn ramped_half_and_half(
    rng: &mut impl Rng,
    pset: &PrimitiveSet,
    max_depth: usize,
) -> Expr {
    let depth = rng.gen_range(1..=max_depth.max(1));
    if rng.gen_bool(0.5) {
        random_expr_full(rng, pset, depth)
    } else {
        random_expr_grow(rng, pset, depth)
    }
}

/// Build an initial population of `n` unevaluated individuals.
pub fn random_population(
    rng: &mut impl Rng,
    pset: &PrimitiveSet,
    n: usize,
    max_depth: usize,
) -> Vec<Individual> {
    (0..n)
        .map(|_| Individual::new(ramped_half_and_half(rng, pset, max_depth)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn pset() -> PrimitiveSet {
        PrimitiveSet::from_config(
            2,
            &["a".to_string(), "b".to_string()],
            &["+".to_string(), "*".to_string()],
            &["sqrt".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn full_trees_hit_the_target_depth() {
        let pset = pset();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for depth in 1..=4 {
            for _ in 0..50 {
                let t = random_expr_full(&mut rng, &pset, depth);
                assert_eq!(t.depth(), depth);
            }
        }
    }

    #[test]
    fn grow_trees_respect_the_depth_bound() {
        let pset = pset();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        for _ in 0..200 {
            let t = random_expr_grow(&mut rng, &pset, 4);
            assert!(t.depth() <= 4);
        }
    }

    #[test]
    fn ramped_population_is_within_bounds() {
        let pset = pset();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let pop = random_population(&mut rng, &pset, 100, 4);
        assert_eq!(pop.len(), 100);
        for ind in &pop {
            assert!(ind.depth <= 4);
            assert!(ind.size <= crate::MAX_TREE_SIZE);
            assert!(ind.fitness.is_none());
        }
    }

    #[test]
    fn same_seed_same_population() {
        let pset = pset();
        let mut a = ChaCha8Rng::seed_from_u64(42);
        let mut b = ChaCha8Rng::seed_from_u64(42);
        let pa = random_population(&mut a, &pset, 30, 4);
        let pb = random_population(&mut b, &pset, 30, 4);
        let vars = pset.variables();
        for (x, y) in pa.iter().zip(pb.iter()) {
            assert_eq!(x.expr.format(vars), y.expr.format(vars));
        }
    }
}
