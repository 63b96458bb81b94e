//! End-to-end scenarios for the evolution engine.

use anyhow::anyhow;
use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;

use evoreg::engine::{Dataset, EngineConfig, GpEngine, Observer, Update};
use evoreg::session::Session;
use evoreg::MAX_TREE_SIZE;

fn quadratic_dataset() -> Dataset {
    let x: Vec<f64> = (0..50).map(|i| -5.0 + 10.0 * i as f64 / 49.0).collect();
    let y: Vec<f64> = x.iter().map(|v| v * v).collect();
    Dataset::single_feature(x, y).unwrap()
}

fn fast_config(population_size: usize) -> EngineConfig {
    EngineConfig {
        variable_names: vec!["x".into()],
        operators: ["+", "-", "*", "/"].map(String::from).to_vec(),
        functions: ["sqrt", "abs"].map(String::from).to_vec(),
        population_size,
        update_interval: 0.0,
        ..Default::default()
    }
}

#[test]
fn bloat_stays_bounded_on_a_noise_target() {
    // adversarial dataset: the target is pure noise, so nothing fits and
    // only parsimony pressure keeps sizes down
    let mut noise = ChaCha8Rng::seed_from_u64(99);
    let x: Vec<f64> = (0..60).map(|i| i as f64 / 10.0).collect();
    let y: Vec<f64> = (0..60).map(|_| noise.gen_range(-1.0..1.0)).collect();
    let dataset = Dataset::single_feature(x, y).unwrap();

    let mut engine = GpEngine::new(dataset, fast_config(100)).unwrap();
    engine.initialize();
    for _ in 0..100 {
        engine.step();
        assert_eq!(engine.population().len(), 100);
        let mut total = 0usize;
        for ind in engine.population() {
            assert!(ind.size <= MAX_TREE_SIZE);
            total += ind.size;
        }
        let avg = total as f64 / engine.population().len() as f64;
        assert!(avg < 18.0, "average size {avg} drifted toward the cap");
    }
}

#[test]
fn checkpoint_roundtrip_reproduces_the_trace() {
    let trace_of = |engine: &GpEngine| {
        let best = engine.best_hof().best().unwrap();
        (
            engine.generation(),
            best.fitness.unwrap(),
            best.expr.format(engine.variables()),
        )
    };

    // leg one: run, snapshot, keep running
    let mut a = GpEngine::new(quadratic_dataset(), fast_config(40)).unwrap();
    a.initialize();
    for _ in 0..10 {
        a.step();
    }
    let snapshot = a.checkpoint_state();

    let mut trace_a = Vec::new();
    for _ in 0..10 {
        a.step();
        trace_a.push(trace_of(&a));
    }

    // leg two: fresh engine, restore, continue
    let mut b = GpEngine::new(quadratic_dataset(), fast_config(40)).unwrap();
    b.restore(snapshot).unwrap();
    let mut trace_b = Vec::new();
    for _ in 0..10 {
        b.step();
        trace_b.push(trace_of(&b));
    }

    assert_eq!(trace_a, trace_b);
}

#[tokio::test]
async fn updates_stream_in_order_and_stop_is_clean() {
    let engine = GpEngine::new(quadratic_dataset(), fast_config(30)).unwrap();
    let session = Session::new("test", engine);

    let (tx, mut rx) = mpsc::channel::<Update>(8);
    let runner = {
        let session = session.clone();
        tokio::spawn(async move {
            let mut tx = tx;
            session.evolve(&mut tx).await
        })
    };

    let mut generations = Vec::new();
    let mut stopped: Option<(u64, Vec<_>)> = None;
    while let Some(update) = rx.recv().await {
        match update {
            Update::GenerationUpdate { generation, .. } => {
                generations.push(generation);
                if generations.len() == 5 {
                    session.stop();
                    session.stop(); // idempotent
                }
            }
            Update::EvolutionStopped {
                generations_completed,
                hall_of_fame,
                ..
            } => {
                stopped = Some((generations_completed, hall_of_fame));
            }
            Update::Error { .. } => panic!("unexpected error emission"),
        }
    }

    // strictly increasing generation numbers
    assert!(generations.windows(2).all(|w| w[0] < w[1]));

    // the final message arrived and agrees with the last streamed update
    let (generations_completed, hall_of_fame) = stopped.expect("final emission must arrive");
    assert_eq!(generations_completed, *generations.last().unwrap());

    // hall of fame is sorted ascending by fitness and bounded
    assert!(!hall_of_fame.is_empty() && hall_of_fame.len() <= 10);
    assert!(hall_of_fame
        .windows(2)
        .all(|w| w[0].fitness <= w[1].fitness));

    // the task's return value is the same terminal payload
    let returned = runner.await.unwrap();
    match returned {
        Update::EvolutionStopped {
            generations_completed: g,
            ..
        } => assert_eq!(g, generations_completed),
        other => panic!("expected the stopped payload, got {other:?}"),
    }
}

struct FailingObserver;

#[async_trait]
impl Observer for FailingObserver {
    async fn notify(&mut self, _update: Update) -> anyhow::Result<()> {
        Err(anyhow!("observer down"))
    }
}

#[tokio::test]
async fn observer_errors_do_not_kill_the_loop() {
    let engine = GpEngine::new(quadratic_dataset(), fast_config(15)).unwrap();
    let session = Session::new("flaky", engine);

    let runner = {
        let session = session.clone();
        tokio::spawn(async move { session.evolve(&mut FailingObserver).await })
    };

    // let the loop make progress despite every notify failing
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    session.stop();

    let final_update = runner.await.unwrap();
    match final_update {
        Update::EvolutionStopped {
            generations_completed,
            ..
        } => assert!(generations_completed > 0),
        other => panic!("expected the stopped payload, got {other:?}"),
    }
}

#[tokio::test]
async fn checkpoint_survives_a_session_boundary() {
    // run a session, capture through the session API, restore into a new
    // session built over the same dataset, and confirm the generation
    // counter carries over
    let session = Session::new(
        "origin",
        GpEngine::new(quadratic_dataset(), fast_config(25)).unwrap(),
    );

    let (tx, mut rx) = mpsc::channel::<Update>(8);
    let runner = {
        let session = session.clone();
        tokio::spawn(async move {
            let mut tx = tx;
            session.evolve(&mut tx).await
        })
    };
    let mut seen = 0;
    while let Some(update) = rx.recv().await {
        if matches!(update, Update::GenerationUpdate { .. }) {
            seen += 1;
            if seen == 3 {
                session.stop();
            }
        }
    }
    runner.await.unwrap();

    let snapshot = session.checkpoint_state().await;
    let generation = snapshot.generation;
    assert!(generation >= 3);

    let restored = Session::new(
        "resumed",
        GpEngine::new(quadratic_dataset(), fast_config(25)).unwrap(),
    );
    restored.restore(snapshot).await.unwrap();
    let engine = restored.engine();
    assert_eq!(engine.lock().await.generation(), generation);
}
