// src/bin/symreg.rs
//
// Single-variable demo: evolve a formula for f(x) = x^2 and print streamed
// generation updates, then the final hall of fame and Pareto front.

use anyhow::Result;
use tokio::sync::mpsc;

use evoreg::engine::{Dataset, EngineConfig, GpEngine, Update};
use evoreg::session::Session;

/// 1) Generate (x, y) samples for f(x) = x^2 over [-5, 5].
fn generate_samples() -> (Vec<f64>, Vec<f64>) {
    let xs: Vec<f64> = (0..50).map(|i| -5.0 + 10.0 * i as f64 / 49.0).collect();
    let ys: Vec<f64> = xs.iter().map(|x| x * x).collect();
    (xs, ys)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // 2) Build the dataset and engine
    let (xs, ys) = generate_samples();
    let dataset = Dataset::single_feature(xs, ys)?;
    let config = EngineConfig {
        variable_names: vec!["x".into()],
        operators: ["+", "-", "*", "/"].map(String::from).to_vec(),
        functions: ["sqrt", "abs"].map(String::from).to_vec(),
        population_size: 50,
        update_interval: 0.25,
        ..Default::default()
    };
    let engine = GpEngine::new(dataset, config)?;
    let session = Session::new("symreg-demo", engine);

    // 3) Stream updates over a bounded channel; stop after a fixed number
    let (tx, mut rx) = mpsc::channel::<Update>(16);
    let runner = {
        let session = session.clone();
        tokio::spawn(async move {
            let mut tx = tx;
            session.evolve(&mut tx).await
        })
    };

    let max_updates = 20;
    let mut seen = 0;
    while let Some(update) = rx.recv().await {
        match update {
            Update::GenerationUpdate { generation, best, stats, .. } => {
                println!(
                    "gen {generation:>4}: {} (train R2={:.4}, size={}, avg size={:.1})",
                    best.equation, best.train_r_squared, best.complexity, stats.avg_complexity,
                );
                seen += 1;
                if seen >= max_updates {
                    session.stop();
                }
            }
            Update::EvolutionStopped {
                generations_completed,
                elapsed_time,
                hall_of_fame,
                pareto_front,
                ..
            } => {
                println!("\n=== Final ({generations_completed} generations, {elapsed_time:.1}s) ===");
                println!("Hall of fame:");
                for (i, c) in hall_of_fame.iter().take(10).enumerate() {
                    println!(
                        "  #{i}: {} (fitness={:.6}, test R2={:.4}, size={})",
                        c.equation, c.fitness, c.test_r_squared, c.complexity
                    );
                }
                println!("Pareto front (complexity vs test R2):");
                for c in &pareto_front {
                    println!("  size {:>2} -> R2={:.4}  {}", c.complexity, c.test_r_squared, c.equation);
                }
            }
            Update::Error { message } => {
                eprintln!("evolution error: {message}");
            }
        }
    }

    runner.await?;
    Ok(())
}
