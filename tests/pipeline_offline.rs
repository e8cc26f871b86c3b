//! End-to-end pipeline tests under total external-service unavailability.
//!
//! Every test points the compiler at an unreachable gateway, exercising the
//! fully local fallback path: local pattern compilation, the built-in
//! baseline, bounded local search, and the perfect-reading metrics default.

use std::sync::Arc;
use tokio_intent_compiler::config::GatewaySection;
use tokio_intent_compiler::telemetry::{MemorySink, TelemetrySink};
use tokio_intent_compiler::{Compiler, CompilerConfig, Source};

// ── Helpers ──────────────────────────────────────────────────────────

fn offline_config() -> CompilerConfig {
    CompilerConfig {
        gateway: GatewaySection {
            base_url: "http://127.0.0.1:1".to_string(),
            request_timeout_ms: 200,
        },
        ..CompilerConfig::default()
    }
}

fn offline_compiler() -> (Compiler, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let shared: Arc<dyn TelemetrySink> = sink.clone();
    let compiler = Compiler::with_sink(offline_config(), shared).expect("offline config is valid");
    (compiler, sink)
}

// ── Full pipeline under total unavailability ─────────────────────────

#[tokio::test]
async fn test_pipeline_survives_total_service_unavailability() {
    let (compiler, _sink) = offline_compiler();
    let intent = "We need a gold tier enterprise deal with an NDA, net 30 terms";
    let outcome = compiler.process(intent).await;

    assert_eq!(outcome.translation_source, Source::Fallback);
    assert_eq!(outcome.baseline_source, Source::Fallback);
    assert_eq!(outcome.solver_source, Source::Fallback);

    // The pipeline always produces a solution and a collapse-able artifact.
    assert_eq!(outcome.solution.bit_state.len(), outcome.model.width());
    let artifact = compiler.collapse(&outcome, intent);
    assert!(artifact.contains("Decision summary"));
    assert!(artifact.contains("energy:"));
}

#[tokio::test]
async fn test_local_compilation_includes_documented_deal_terms() {
    let (compiler, _sink) = offline_compiler();
    let outcome = compiler
        .process("We need a gold tier enterprise deal with an NDA, net 30 terms")
        .await;

    let meanings: Vec<&str> = outcome
        .model
        .terms
        .iter()
        .map(|t| t.meaning.as_str())
        .collect();
    for expected in [
        "gold service tier",
        "enterprise-scale engagement",
        "non-disclosure agreement required",
        "net-30 payment cadence",
    ] {
        assert!(meanings.contains(&expected), "missing term: {expected}");
    }
}

#[tokio::test]
async fn test_unrecognized_intent_compiles_to_identity_plus_baseline() {
    let (compiler, _sink) = offline_compiler();
    let outcome = compiler.process("hello").await;

    // One identity term from the translator, three baseline terms.
    let identity_terms: Vec<_> = outcome
        .model
        .terms
        .iter()
        .filter(|t| t.meaning == "no constraints")
        .collect();
    assert_eq!(identity_terms.len(), 1);
    assert!((identity_terms[0].coefficient - 0.0).abs() < f64::EPSILON);
    assert!(identity_terms[0].pattern.bytes().all(|b| b == b'I'));
}

#[tokio::test]
async fn test_offline_solver_reports_placeholder_confidence() {
    let (compiler, _sink) = offline_compiler();
    let outcome = compiler.process("enterprise nda").await;
    assert!((outcome.solution.probability - 0.95).abs() < f64::EPSILON);
    assert!(outcome.solution.distribution.contains_key(&outcome.solution.bit_state));
}

// ── Session state across invocations ─────────────────────────────────

#[tokio::test]
async fn test_fresh_session_stats_are_zero() {
    let (compiler, _sink) = offline_compiler();
    let stats = compiler.stats();
    assert_eq!(stats.total_iterations, 0);
    assert!((stats.average_coherence - 0.0).abs() < f64::EPSILON);
    assert_eq!(stats.mutation_count, 0);
    assert!((stats.latest_energy - 0.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_history_never_exceeds_hundred_entries() {
    let (compiler, _sink) = offline_compiler();
    for _ in 0..120 {
        compiler.process("hello").await;
    }
    assert_eq!(compiler.history_len(), 100);
    assert_eq!(compiler.stats().total_iterations, 120);
}

#[tokio::test]
async fn test_offline_metrics_read_perfect_and_fire_nothing() {
    let (compiler, _sink) = offline_compiler();
    compiler.process("enterprise").await;
    compiler.process("cloud sla").await;

    assert!(compiler.mutation_log().is_empty());
    let stats = compiler.stats();
    assert!((stats.average_coherence - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_telemetry_emitted_per_remembered_solution() {
    let (compiler, sink) = offline_compiler();
    compiler.process("enterprise").await;
    compiler.process("gold tier").await;

    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].iteration, 0);
    assert_eq!(records[1].iteration, 1);
    for record in &records {
        assert_eq!(record.backend, "ibm_fez");
        assert_eq!(record.mutation_action, "none");
        assert!((record.lambda - 1.0).abs() < f64::EPSILON);
        assert!((record.phi - 2.176435e-8).abs() < 1e-20);
    }
}

#[tokio::test]
async fn test_failed_baseline_fetch_is_cached_for_session_lifetime() {
    // First process degrades the baseline to the built-in default; the
    // second must reuse that cached fallback rather than refetching —
    // observable as an identical term multiset in both combined models.
    let (compiler, _sink) = offline_compiler();
    let first = compiler.process("hello").await;
    let second = compiler.process("hello").await;

    assert_eq!(first.baseline_source, Source::Fallback);
    assert_eq!(second.baseline_source, Source::Fallback);
    assert_eq!(first.model.terms, second.model.terms);
}
