//! Demo binary for tokio-intent-compiler
//!
//! Builds a compiler session and runs a handful of intents through the
//! full pipeline, printing each collapsed decision summary.
//!
//! ## Environment Variables
//!
//! - `LOG_FORMAT=json` — structured JSON output (production)
//! - `RUST_LOG=info` — log level filter (default: info)
//! - `COMPILER_CONFIG` — optional path to a TOML config file

use tokio_intent_compiler::{init_tracing, metrics, Compiler, CompilerConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing (JSON or pretty, based on LOG_FORMAT env)
    let _ = init_tracing();

    // Initialize Prometheus metrics registry before the first invocation.
    metrics::init_metrics()?;

    info!("Starting tokio-intent-compiler demo");

    // Load config from COMPILER_CONFIG if set, defaults otherwise.
    let config = match std::env::var("COMPILER_CONFIG") {
        Ok(path) => {
            let text = std::fs::read_to_string(&path)?;
            CompilerConfig::from_toml_str(&text)?
        }
        Err(_) => CompilerConfig::default(),
    };

    let compiler = Compiler::new(config)?;

    let demo_intents = [
        "We need a gold tier enterprise deal with an NDA, net 30 terms",
        "Cloud deployment with 24/7 support and an SLA",
        "Small startup engagement, upfront payment, no exclusivity",
        "hello",
    ];

    info!(count = demo_intents.len(), "Processing demo intents");

    for intent in demo_intents {
        let outcome = compiler.process(intent).await;
        info!(
            translation = ?outcome.translation_source,
            baseline = ?outcome.baseline_source,
            solver = ?outcome.solver_source,
            energy = outcome.solution.energy,
            "pipeline outcome"
        );
        println!("{}\n", compiler.collapse(&outcome, intent));
    }

    let stats = compiler.stats();
    info!(
        total_iterations = stats.total_iterations,
        average_coherence = stats.average_coherence,
        mutation_count = stats.mutation_count,
        latest_energy = stats.latest_energy,
        "Demo complete"
    );

    Ok(())
}
