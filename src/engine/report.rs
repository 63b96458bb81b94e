//! Streamed update payloads and the observer seam.
//!
//! The engine emits immutable, JSON-ready snapshots; whatever sits on the
//! other side (a websocket broadcaster, a logger, a test harness) only ever
//! sees these payloads, never live population state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Per-candidate metrics included in updates. Prediction vectors are only
/// populated where the payload is meant for plotting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateReport {
    pub equation: String,
    pub fitness: f64,
    pub complexity: usize,
    pub train_mse: f64,
    pub train_r_squared: f64,
    pub test_mse: f64,
    pub test_r_squared: f64,
    pub aic: f64,
    pub bic: f64,
    pub parsimony_score: f64,
    pub overfit_gap: f64,
    pub n_features: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train_predictions: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_predictions: Option<Vec<f64>>,
    /// Real x values for single-feature data, sample indices otherwise
    /// (test indices continue past the train count).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train_x: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_x: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train_y: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_y: Option<Vec<f64>>,
}

/// One per-emission record. The engine keeps the full history; it is part
/// of the checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: u64,
    pub elapsed_time: f64,
    pub generations_per_second: f64,
    pub best_fitness: f64,
    pub avg_fitness: f64,
    pub std_fitness: f64,
    pub train_r_squared: f64,
    pub test_r_squared: f64,
    pub overfit_gap: f64,
    pub best_complexity: usize,
    pub avg_complexity: f64,
    pub aic: f64,
    pub bic: f64,
    pub parsimony_score: f64,
    pub adaptive_parsimony: f64,
    pub best_equation: String,
}

/// The messages a session streams to its observer. For one session,
/// generation updates arrive in strictly increasing generation order and
/// the stopped message is always last.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Update {
    GenerationUpdate {
        generation: u64,
        elapsed_time: f64,
        stats: GenerationStats,
        best: CandidateReport,
        hall_of_fame: Vec<CandidateReport>,
    },
    EvolutionStopped {
        status: String,
        elapsed_time: f64,
        generations_completed: u64,
        hall_of_fame: Vec<CandidateReport>,
        pareto_front: Vec<CandidateReport>,
        best_equation: Option<String>,
        best_fitness: Option<f64>,
    },
    Error {
        message: String,
    },
}

impl Update {
    pub fn generation(&self) -> Option<u64> {
        match self {
            Update::GenerationUpdate { generation, .. } => Some(*generation),
            _ => None,
        }
    }
}

/// Receives each emission. The engine awaits the call without holding any
/// lock over population state; an error here is logged and evolution
/// continues.
#[async_trait]
pub trait Observer: Send {
    async fn notify(&mut self, update: Update) -> anyhow::Result<()>;
}

/// Discards every update.
pub struct NullObserver;

#[async_trait]
impl Observer for NullObserver {
    async fn notify(&mut self, _update: Update) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Bounded-channel observer: emissions apply backpressure to the consumer.
#[async_trait]
impl Observer for tokio::sync::mpsc::Sender<Update> {
    async fn notify(&mut self, update: Update) -> anyhow::Result<()> {
        self.send(update)
            .await
            .map_err(|_| anyhow::anyhow!("update channel closed"))
    }
}
