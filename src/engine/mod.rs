//! The evolutionary engine: generation loop, adaptive parsimony, halls of
//! fame, Pareto extraction, streaming, and checkpoint capture/restore.
//!
//! The engine owns all population state and mutates it from a single
//! driver. The async driver ([`GpEngine::evolve`]) suspends at exactly two
//! points per emission (the observer call and a cooperative yield) and
//! never holds the engine lock across either, so stop requests and
//! checkpoint captures interleave at generation boundaries.

pub mod config;
pub mod data;
pub mod report;
pub mod snapshot;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::Mutex;

pub use config::{EngineConfig, Selection};
pub use data::{train_test_split, Dataset, Split};
pub use report::{CandidateReport, GenerationStats, NullObserver, Observer, Update};
pub use snapshot::{DataInfo, EvolutionSnapshot, RngState};

use crate::error::EngineError;
use crate::expr::PrimitiveSet;
use crate::fitness;
use crate::gp::{
    crossover_one_point, mutate_uniform, population_stats, ramped_half_and_half,
    random_population, select_double_tournament, select_lexicographic, HallOfFame, Individual,
    SimplestHallOfFame,
};
use crate::{HOF_SIZE, LEX_EPSILON, MAX_TREE_SIZE, REPORT_PARSIMONY_ALPHA};

/// Second-stage pressure of the double tournament.
const DOUBLE_TOURNAMENT_PARSIMONY: f64 = 1.4;

/// How many hall-of-fame entries ride along with each generation update.
const UPDATE_HOF_LIMIT: usize = 5;

/// Level-triggered stop flag. Setting it at any time makes the generation
/// loop exit at the next generation boundary; in-flight emissions complete.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct GpEngine {
    config: EngineConfig,
    pset: PrimitiveSet,
    split: Split,
    n_samples: usize,
    n_features: usize,
    population: Vec<Individual>,
    best_hof: HallOfFame,
    simplest_hof: SimplestHallOfFame,
    gen_stats: Vec<GenerationStats>,
    generation: u64,
    base_parsimony: f64,
    adaptive_parsimony: f64,
    rng: ChaCha8Rng,
    stop: StopToken,
}

impl GpEngine {
    /// Validate the options, split the data, build the primitive set, and
    /// run a one-tree setup probe. The population itself is built lazily on
    /// the first generation.
    pub fn new(dataset: Dataset, config: EngineConfig) -> Result<Self, EngineError> {
        let config = config.clamped();
        config.validate()?;

        let n_samples = dataset.n_samples();
        let n_features = dataset.n_features();
        let pset = PrimitiveSet::from_config(
            n_features,
            &config.variable_names,
            &config.operators,
            &config.functions,
        )?;
        let split = train_test_split(&dataset, config.test_size, config.random_state);
        let mut rng = ChaCha8Rng::seed_from_u64(config.random_state);

        // setup probe: one tree generated and evaluated end to end, so a
        // broken primitive set surfaces before the loop ever starts
        let probe = ramped_half_and_half(&mut rng, &pset, config.max_depth);
        let preds = fitness::predictions(&probe, &split.x_train);
        if preds.len() != split.n_train() || preds.iter().any(|p| !p.is_finite()) {
            return Err(EngineError::Fatal(
                "probe tree produced a malformed prediction vector".into(),
            ));
        }

        log::info!(
            "engine ready: {} samples ({} train / {} test), {} features, population {}, max depth {}, parsimony {}",
            n_samples,
            split.n_train(),
            split.n_test(),
            n_features,
            config.population_size,
            config.max_depth,
            config.parsimony_coefficient,
        );

        let base_parsimony = config.parsimony_coefficient;
        Ok(Self {
            pset,
            split,
            n_samples,
            n_features,
            population: Vec::new(),
            best_hof: HallOfFame::new(HOF_SIZE),
            simplest_hof: SimplestHallOfFame::new(HOF_SIZE),
            gen_stats: Vec::new(),
            generation: 0,
            base_parsimony,
            adaptive_parsimony: base_parsimony,
            rng,
            stop: StopToken::default(),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    pub fn best_hof(&self) -> &HallOfFame {
        &self.best_hof
    }

    pub fn simplest_hof(&self) -> &SimplestHallOfFame {
        &self.simplest_hof
    }

    pub fn gen_stats(&self) -> &[GenerationStats] {
        &self.gen_stats
    }

    pub fn variables(&self) -> &[String] {
        self.pset.variables()
    }

    pub fn data_info(&self) -> DataInfo {
        DataInfo {
            n_samples: self.n_samples,
            n_features: self.n_features,
            n_train: self.split.n_train(),
            n_test: self.split.n_test(),
        }
    }

    /// Cooperative stop. Idempotent and non-blocking.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// Build and evaluate the initial population if none exists yet (a
    /// restored checkpoint already carries one).
    pub fn initialize(&mut self) {
        if !self.population.is_empty() {
            return;
        }
        log::info!("creating population of {}", self.config.population_size);
        self.population = random_population(
            &mut self.rng,
            &self.pset,
            self.config.population_size,
            self.config.max_depth,
        );
        self.evaluate_population();
        self.best_hof.update(&self.population, self.pset.variables());
        self.simplest_hof.update(&self.population, self.pset.variables());

        if let Some(best) = self.best_hof.best() {
            log::info!(
                "initial best: {} (fitness {:.6}, size {})",
                best.expr.format(self.pset.variables()),
                best.fitness_or_worst(),
                best.size,
            );
        }
    }

    /// Advance one generation: selection, paired crossover, mutation,
    /// oversize replacement, evaluation, hall-of-fame update. RNG draws
    /// happen in a fixed order (selection, crossover left-to-right,
    /// mutation left-to-right, replacements left-to-right) so a given seed
    /// reproduces the run exactly.
    pub fn step(&mut self) {
        self.generation += 1;
        self.adaptive_parsimony =
            self.base_parsimony * (1.0 + self.generation as f64 / 200.0).min(5.0);

        let k = self.population.len();
        let mut offspring = match self.config.selection {
            Selection::Lexicographic => select_lexicographic(
                &self.population,
                k,
                self.config.tournament_size,
                LEX_EPSILON,
                &mut self.rng,
            ),
            Selection::DoubleTournament => select_double_tournament(
                &self.population,
                k,
                self.config.tournament_size,
                DOUBLE_TOURNAMENT_PARSIMONY,
                &mut self.rng,
            ),
        };

        // adjacent pairs; both slots are replaced (and re-evaluated) when
        // the operator fires, even if the size limit reverted a child
        for i in (0..offspring.len().saturating_sub(1)).step_by(2) {
            if self.rng.gen_bool(self.config.crossover_prob) {
                let (a, b) = crossover_one_point(&offspring[i], &offspring[i + 1], &mut self.rng);
                offspring[i] = a;
                offspring[i + 1] = b;
            }
        }

        for slot in offspring.iter_mut() {
            if self.rng.gen_bool(self.config.mutation_prob) {
                *slot = mutate_uniform(slot, &self.pset, &mut self.rng);
            }
        }

        // anything past the cap that slipped through is replaced outright
        let mut replaced = 0usize;
        for slot in offspring.iter_mut() {
            if slot.size > MAX_TREE_SIZE {
                *slot = Individual::new(ramped_half_and_half(
                    &mut self.rng,
                    &self.pset,
                    self.config.max_depth,
                ));
                replaced += 1;
            }
        }
        if replaced > 0 {
            log::debug!("replaced {replaced} oversized individuals");
        }

        self.population = offspring;
        self.evaluate_population();
        self.best_hof.update(&self.population, self.pset.variables());
        self.simplest_hof.update(&self.population, self.pset.variables());
    }

    /// Evaluate every individual whose fitness is invalid. The same
    /// prediction pass records the train R² consumed by the simplest-good
    /// hall of fame and the parsimonious pick.
    fn evaluate_population(&mut self) {
        for i in 0..self.population.len() {
            if self.population[i].fitness.is_some() {
                continue;
            }
            let preds = fitness::predictions(&self.population[i].expr, &self.split.x_train);
            let mse = fitness::mse(&self.split.y_train, &preds);
            let r2 = fitness::r_squared(&self.split.y_train, &preds);
            let ind = &mut self.population[i];
            ind.fitness = Some(fitness::selection_fitness(
                mse,
                ind.size,
                self.adaptive_parsimony,
            ));
            ind.train_r2 = Some(r2);
        }
    }

    /// The tree reported as "best": the simplest-good top member when its
    /// train R² reaches 95% of the fitness-best's and it is strictly
    /// smaller; the fitness-best otherwise.
    pub fn parsimonious_best(&self) -> Option<&Individual> {
        let best = self.best_hof.best()?;
        let Some(simplest) = self.simplest_hof.simplest() else {
            return Some(best);
        };
        let r2_best = best.train_r2.unwrap_or(0.0);
        let r2_simple = simplest.train_r2.unwrap_or(0.0);
        if r2_simple >= r2_best * 0.95 && simplest.size < best.size {
            Some(simplest)
        } else {
            Some(best)
        }
    }

    /// Full metric report for one tree, optionally with the prediction
    /// vectors used for plotting.
    pub fn candidate_report(&self, ind: &Individual, include_predictions: bool) -> CandidateReport {
        let complexity = ind.size;
        let pred_train = fitness::predictions(&ind.expr, &self.split.x_train);
        let train_mse = fitness::mse(&self.split.y_train, &pred_train);
        let train_r2 = fitness::r_squared(&self.split.y_train, &pred_train);

        let pred_test = fitness::predictions(&ind.expr, &self.split.x_test);
        let test_mse = fitness::mse(&self.split.y_test, &pred_test);
        let test_r2 = fitness::r_squared(&self.split.y_test, &pred_test);

        let n_test = self.split.n_test();
        let aic = fitness::aic(test_mse, n_test, complexity);
        let bic = fitness::bic(test_mse, n_test, complexity);
        let parsimony = fitness::parsimony_score(test_r2, complexity, REPORT_PARSIMONY_ALPHA);

        let (train_predictions, test_predictions, train_x, test_x, train_y, test_y) =
            if include_predictions {
                let n_train = self.split.n_train();
                let train_x = if self.n_features == 1 {
                    self.split.x_train.iter().map(|row| row[0]).collect()
                } else {
                    (0..n_train).map(|i| i as f64).collect()
                };
                let test_x = if self.n_features == 1 {
                    self.split.x_test.iter().map(|row| row[0]).collect()
                } else {
                    (n_train..n_train + n_test).map(|i| i as f64).collect()
                };
                (
                    Some(pred_train),
                    Some(pred_test),
                    Some(train_x),
                    Some(test_x),
                    Some(self.split.y_train.clone()),
                    Some(self.split.y_test.clone()),
                )
            } else {
                (None, None, None, None, None, None)
            };

        CandidateReport {
            equation: ind.expr.format(self.pset.variables()),
            fitness: ind.fitness_or_worst(),
            complexity,
            train_mse,
            train_r_squared: train_r2,
            test_mse,
            test_r_squared: test_r2,
            aic,
            bic,
            parsimony_score: parsimony,
            overfit_gap: train_r2 - test_r2,
            n_features: self.n_features,
            train_predictions,
            test_predictions,
            train_x,
            test_x,
            train_y,
            test_y,
        }
    }

    /// Simplicity/accuracy frontier over the best-fitness hall of fame:
    /// sorted by complexity, keeping each tree that strictly improves the
    /// running best test R².
    pub fn pareto_front(&self) -> Vec<CandidateReport> {
        let mut candidates: Vec<CandidateReport> = self
            .best_hof
            .members()
            .iter()
            .map(|ind| self.candidate_report(ind, true))
            .collect();
        candidates.sort_by_key(|c| c.complexity);

        let mut front = Vec::new();
        let mut best_test_r2 = f64::NEG_INFINITY;
        for candidate in candidates {
            if candidate.test_r_squared > best_test_r2 {
                best_test_r2 = candidate.test_r_squared;
                front.push(candidate);
            }
        }
        front
    }

    /// Build the generation-update payload and append its stats record.
    fn emission(&mut self, elapsed: f64) -> Update {
        let best = self
            .parsimonious_best()
            .cloned()
            .unwrap_or_else(|| Individual::new(crate::expr::Expr::Const(0.0)));
        let best_report = self.candidate_report(&best, true);
        let pop = population_stats(&self.population);

        let stats = GenerationStats {
            generation: self.generation,
            elapsed_time: elapsed,
            generations_per_second: if elapsed > 0.0 {
                self.generation as f64 / elapsed
            } else {
                0.0
            },
            best_fitness: pop.best_fitness,
            avg_fitness: pop.avg_fitness,
            std_fitness: pop.std_fitness,
            train_r_squared: best_report.train_r_squared,
            test_r_squared: best_report.test_r_squared,
            overfit_gap: best_report.overfit_gap,
            best_complexity: best_report.complexity,
            avg_complexity: pop.avg_size,
            aic: best_report.aic,
            bic: best_report.bic,
            parsimony_score: best_report.parsimony_score,
            adaptive_parsimony: self.adaptive_parsimony,
            best_equation: best_report.equation.clone(),
        };
        self.gen_stats.push(stats.clone());

        log::info!(
            "gen {} ({:.1}s): train R2={:.4}, test R2={:.4}, complexity={}, avg size={:.1}, {:.1} gen/s",
            self.generation,
            elapsed,
            best_report.train_r_squared,
            best_report.test_r_squared,
            best_report.complexity,
            pop.avg_size,
            stats.generations_per_second,
        );

        let hall_of_fame = self
            .best_hof
            .members()
            .iter()
            .take(UPDATE_HOF_LIMIT)
            .map(|ind| self.candidate_report(ind, true))
            .collect();

        Update::GenerationUpdate {
            generation: self.generation,
            elapsed_time: elapsed,
            stats,
            best: best_report,
            hall_of_fame,
        }
    }

    /// The terminal payload: full hall of fame, Pareto front, and the
    /// fitness-best equation.
    fn final_update(&self, elapsed: f64) -> Update {
        let hall_of_fame: Vec<CandidateReport> = self
            .best_hof
            .members()
            .iter()
            .map(|ind| self.candidate_report(ind, true))
            .collect();
        let pareto_front = self.pareto_front();

        if let Some(top) = hall_of_fame.first() {
            log::info!(
                "evolution stopped after {} generations: {} (train R2={:.4}, test R2={:.4})",
                self.generation,
                top.equation,
                top.train_r_squared,
                top.test_r_squared,
            );
        }

        Update::EvolutionStopped {
            status: "stopped".into(),
            elapsed_time: elapsed,
            generations_completed: self.generation,
            best_equation: hall_of_fame.first().map(|c| c.equation.clone()),
            best_fitness: hall_of_fame.first().map(|c| c.fitness),
            hall_of_fame,
            pareto_front,
        }
    }

    /// Deep-copied snapshot of the full evolutionary state. Later engine
    /// mutations never leak into it.
    pub fn checkpoint_state(&self) -> EvolutionSnapshot {
        EvolutionSnapshot {
            generation: self.generation,
            population: self.population.clone(),
            best_hof: self.best_hof.members().to_vec(),
            simplest_hof: self.simplest_hof.members().to_vec(),
            gen_stats: self.gen_stats.clone(),
            adaptive_parsimony: self.adaptive_parsimony,
            config: self.config.clone(),
            data_info: self.data_info(),
            rng_state: RngState::capture(&self.rng),
        }
    }

    /// Replace engine state with a snapshot. The engine must have been
    /// constructed against data of the same shape; the next generation
    /// continues from the captured index.
    pub fn restore(&mut self, snapshot: EvolutionSnapshot) -> Result<(), EngineError> {
        if snapshot.data_info != self.data_info() {
            return Err(EngineError::Checkpoint(format!(
                "snapshot data shape {:?} does not match engine data {:?}",
                snapshot.data_info,
                self.data_info(),
            )));
        }
        self.generation = snapshot.generation;
        self.population = snapshot.population;
        self.best_hof = HallOfFame::restore(HOF_SIZE, snapshot.best_hof, self.pset.variables());
        self.simplest_hof =
            SimplestHallOfFame::restore(HOF_SIZE, snapshot.simplest_hof, self.pset.variables());
        self.gen_stats = snapshot.gen_stats;
        self.adaptive_parsimony = snapshot.adaptive_parsimony;
        self.rng = snapshot.rng_state.restore();
        log::info!("restored checkpoint at generation {}", self.generation);
        Ok(())
    }

    /// Drive the generation loop until stopped, streaming updates to the
    /// observer at the configured cadence. The engine lock is released
    /// before every observer call, and a cooperative yield follows each
    /// emission. The terminal payload is both sent and returned.
    pub async fn evolve(
        engine: Arc<Mutex<GpEngine>>,
        observer: &mut (dyn Observer + Send),
    ) -> Update {
        let stop = { engine.lock().await.stop_token() };
        let started = Instant::now();
        let mut last_emit = Instant::now();

        {
            let mut eng = engine.lock().await;
            eng.initialize();
        }

        loop {
            let update = {
                let mut eng = engine.lock().await;
                if stop.is_stopped() {
                    break;
                }
                eng.step();
                if last_emit.elapsed().as_secs_f64() >= eng.config.update_interval {
                    last_emit = Instant::now();
                    Some(eng.emission(started.elapsed().as_secs_f64()))
                } else {
                    None
                }
            };

            if let Some(update) = update {
                if let Err(e) = observer.notify(update).await {
                    log::error!("failed to send update: {e}");
                }
                tokio::task::yield_now().await;
            }
        }

        let final_update = {
            let eng = engine.lock().await;
            eng.final_update(started.elapsed().as_secs_f64())
        };
        if let Err(e) = observer.notify(final_update.clone()).await {
            log::error!("failed to send final update: {e}");
        }
        final_update
    }
}
