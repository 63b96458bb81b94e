// src/bin/symreg_multi.rs
//
// Two-variable demo with a checkpoint leg: evolve y = 2a + 3b + 1 for a
// while, save a checkpoint, then restore it into a fresh session and
// continue from where it left off.

use anyhow::Result;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;

use evoreg::checkpoint::CheckpointStore;
use evoreg::engine::{Dataset, EngineConfig, GpEngine, Update};
use evoreg::session::Session;

/// Uniform samples of y = 2a + 3b + 1 over the unit square.
fn generate_samples(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(1234);
    let x: Vec<Vec<f64>> = (0..n)
        .map(|_| vec![rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)])
        .collect();
    let y = x.iter().map(|row| 2.0 * row[0] + 3.0 * row[1] + 1.0).collect();
    (x, y)
}

fn config() -> EngineConfig {
    EngineConfig {
        variable_names: vec!["a".into(), "b".into()],
        population_size: 300,
        update_interval: 0.25,
        ..Default::default()
    }
}

/// Run a session until `updates` generation updates arrive; return the
/// terminal payload.
async fn run_for(session: &Session, updates: usize) -> Result<Update> {
    let (tx, mut rx) = mpsc::channel::<Update>(16);
    let runner = {
        let session = session.clone();
        tokio::spawn(async move {
            let mut tx = tx;
            session.evolve(&mut tx).await
        })
    };

    let mut seen = 0;
    while let Some(update) = rx.recv().await {
        if let Update::GenerationUpdate { generation, best, .. } = &update {
            println!(
                "[{}] gen {generation:>4}: {} (train R2={:.4}, size={})",
                session.id(),
                best.equation,
                best.train_r_squared,
                best.complexity
            );
            seen += 1;
            if seen >= updates {
                session.stop();
            }
        }
    }
    Ok(runner.await?)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let (x, y) = generate_samples(200);
    let dataset = Dataset::new(x, y)?;

    // first leg
    let session = Session::new("linear2", GpEngine::new(dataset.clone(), config())?);
    run_for(&session, 10).await?;

    // checkpoint between generations
    let store = CheckpointStore::new("checkpoints")?;
    let snapshot = session.checkpoint_state().await;
    let checkpoint_id = store.save(session.id(), &snapshot, Some("mid-run"))?;

    // second leg: fresh session restored from disk
    let restored = Session::new("linear2-restored", GpEngine::new(dataset, config())?);
    restored.restore(store.load(&checkpoint_id)?).await?;
    let final_update = run_for(&restored, 10).await?;

    if let Update::EvolutionStopped {
        best_equation,
        generations_completed,
        ..
    } = final_update
    {
        println!(
            "\nfinished at generation {generations_completed}: {}",
            best_equation.unwrap_or_default()
        );
    }

    store.cleanup("linear2", 3)?;
    Ok(())
}
