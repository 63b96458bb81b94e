//! Halls of fame: bounded archives of the best trees seen.
//!
//! Two archives run side by side. The first keeps the lowest-fitness trees
//! ever observed; the second keeps the smallest trees whose train R² clears
//! a quality gate. Both deduplicate on printed form and deep-copy on
//! insertion, so later mutations of the population never leak in.

use crate::gp::population::Individual;
use crate::SIMPLE_R2_GATE;

/// Best-by-fitness archive, sorted ascending by fitness.
#[derive(Debug, Clone)]
pub struct HallOfFame {
    max_size: usize,
    members: Vec<Individual>,
    keys: Vec<String>,
}

impl HallOfFame {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            members: Vec::with_capacity(max_size),
            keys: Vec::with_capacity(max_size),
        }
    }

    /// Offer every member of the population. A candidate enters iff the
    /// archive is not full or its fitness strictly beats the current worst.
    pub fn update(&mut self, population: &[Individual], variables: &[String]) {
        for ind in population {
            if ind.fitness.is_none() {
                continue;
            }
            self.offer(ind, variables);
        }
    }

    fn offer(&mut self, ind: &Individual, variables: &[String]) {
        let key = ind.expr.format(variables);
        if self.keys.contains(&key) {
            return;
        }
        let fitness = ind.fitness_or_worst();
        if self.members.len() >= self.max_size {
            let worst = self.members.last().map(|m| m.fitness_or_worst());
            if worst.is_some_and(|w| fitness >= w) {
                return;
            }
            self.members.pop();
            self.keys.pop();
        }
        let pos = self
            .members
            .partition_point(|m| m.fitness_or_worst() <= fitness);
        self.members.insert(pos, ind.clone());
        self.keys.insert(pos, key);
    }

    pub fn best(&self) -> Option<&Individual> {
        self.members.first()
    }

    pub fn members(&self) -> &[Individual] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Rebuild from checkpointed members (assumed already sorted).
    pub fn restore(max_size: usize, members: Vec<Individual>, variables: &[String]) -> Self {
        let mut hof = Self::new(max_size);
        for ind in &members {
            hof.offer(ind, variables);
        }
        hof
    }
}

/// Simplest-good archive, sorted ascending by size. Only trees with
/// train R² at or above the gate are admitted; when full, a candidate must
/// be strictly smaller than the largest member, which it evicts.
#[derive(Debug, Clone)]
pub struct SimplestHallOfFame {
    max_size: usize,
    members: Vec<Individual>,
    keys: Vec<String>,
}

impl SimplestHallOfFame {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            members: Vec::with_capacity(max_size),
            keys: Vec::with_capacity(max_size),
        }
    }

    pub fn update(&mut self, population: &[Individual], variables: &[String]) {
        for ind in population {
            let Some(r2) = ind.train_r2 else { continue };
            if r2 < SIMPLE_R2_GATE {
                continue;
            }
            self.offer(ind, variables);
        }
    }

    fn offer(&mut self, ind: &Individual, variables: &[String]) {
        let key = ind.expr.format(variables);
        if self.keys.contains(&key) {
            return;
        }
        if self.members.len() >= self.max_size {
            let largest = self.members.last().map(|m| m.size);
            if largest.is_some_and(|l| ind.size >= l) {
                return;
            }
            self.members.pop();
            self.keys.pop();
        }
        let pos = self.members.partition_point(|m| m.size <= ind.size);
        self.members.insert(pos, ind.clone());
        self.keys.insert(pos, key);
    }

    /// The smallest admitted tree.
    pub fn simplest(&self) -> Option<&Individual> {
        self.members.first()
    }

    pub fn members(&self) -> &[Individual] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn restore(max_size: usize, members: Vec<Individual>, variables: &[String]) -> Self {
        let mut hof = Self::new(max_size);
        for ind in &members {
            hof.offer(ind, variables);
        }
        hof
    }
}
