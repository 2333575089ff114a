//! Stream Clustering: train centroids on micro-batches, then flag outliers.
//!
//! Demonstrates the full engine lifecycle:
//!
//! 1. Seed three clusters and stream normal 2-D traffic in micro-batches
//! 2. Watch centroids converge while the engine is training
//! 3. Cross the training threshold; later batches are classified
//! 4. Inject far-away points and malformed records
//!
//! Run: RUST_LOG=inckmeans=info cargo run --example stream_clustering --release

use inckmeans::config::EngineConfig;
use inckmeans::highlevel::IncKMeans;
use inckmeans::model::Mode;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

const BATCH_SIZE: usize = 250;
const TRAINING_POINTS: u64 = 2_000;

/// True centres the normal traffic is drawn around.
const CENTRES: [(f64, f64); 3] = [(0.0, 0.0), (20.0, 5.0), (8.0, 25.0)];

fn normal_record(rng: &mut ChaCha8Rng) -> String {
    let (cx, cy) = CENTRES[rng.gen_range(0..CENTRES.len())];
    format!(
        "{:.4},{:.4}",
        cx + rng.gen_range(-2.0..2.0),
        cy + rng.gen_range(-2.0..2.0)
    )
}

fn outlier_record(rng: &mut ChaCha8Rng) -> String {
    format!(
        "{:.4},{:.4}",
        rng.gen_range(60.0..120.0),
        rng.gen_range(-80.0..-40.0)
    )
}

fn print_header(title: &str) {
    println!();
    println!("{}", "=".repeat(70));
    println!("  {}", title);
    println!("{}", "=".repeat(70));
}

fn main() -> inckmeans::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = EngineConfig::new(2, vec![vec![3.0, 3.0], vec![15.0, 0.0], vec![5.0, 20.0]])
        .with_training_threshold(TRAINING_POINTS);
    let engine = IncKMeans::new(config)?;
    let mut rng = ChaCha8Rng::seed_from_u64(1234);

    // =========================================================================
    // PHASE 1: TRAINING
    // =========================================================================
    print_header("PHASE 1: Training on micro-batches");

    while engine.mode() == Mode::Training {
        let batch: Vec<String> = (0..BATCH_SIZE).map(|_| normal_record(&mut rng)).collect();
        let report = engine.process_batch(&batch);

        println!(
            "  [batch {:>2}]  points={:>5}  keys={}  {:.1} µs/batch",
            report.sequence,
            report.counters.total_points_seen,
            report.status.len(),
            report.elapsed_nanos as f64 / 1_000.0
        );
    }

    println!();
    println!("{}", engine.status());

    // =========================================================================
    // PHASE 2: CLASSIFICATION
    // =========================================================================
    print_header("PHASE 2: Classifying mixed traffic");

    for round in 0..4 {
        let mut batch: Vec<String> = (0..BATCH_SIZE).map(|_| normal_record(&mut rng)).collect();
        for _ in 0..(round * 5) {
            batch.push(outlier_record(&mut rng));
        }
        if round == 3 {
            batch.push("12.5,abc".to_string());
            batch.push("1.0,2.0,3.0".to_string());
        }

        let report = engine.process_batch(&batch);
        println!();
        println!("  --- batch {} ({} injected outliers) ---", report.sequence, round * 5);
        for line in report.status_text() {
            println!("{}", line);
        }
        for rejected in &report.rejected {
            println!("  dropped record {:?}: {}", rejected.index, rejected.error);
        }
    }

    // =========================================================================
    // SUMMARY
    // =========================================================================
    print_header("SUMMARY");

    let counters = engine.counters();
    println!("  batches:  {}", counters.batches_applied);
    println!("  points:   {}", counters.total_points_seen);
    println!("  benign:   {}", counters.benign);
    println!("  outlier:  {}", counters.outlier);
    println!("  rejected: {}", counters.rejected_records);
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&engine.snapshot()).unwrap_or_default()
    );

    Ok(())
}
