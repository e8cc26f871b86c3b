//! Remote-path tests against a mocked solver gateway.
//!
//! These exercise the wire contracts and the remote/fallback provenance
//! split with `wiremock`: a healthy gateway yields `Source::Remote`
//! everywhere, degraded metrics fire both corrective calls, and the
//! baseline memo prevents refetching.

use serde_json::json;
use std::sync::Arc;
use tokio_intent_compiler::config::GatewaySection;
use tokio_intent_compiler::telemetry::{MemorySink, TelemetrySink};
use tokio_intent_compiler::{Compiler, CompilerConfig, Source};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ──────────────────────────────────────────────────────────

fn config_for(server: &MockServer) -> CompilerConfig {
    CompilerConfig {
        gateway: GatewaySection {
            base_url: format!("{}/v1/quantum", server.uri()),
            request_timeout_ms: 2_000,
        },
        ..CompilerConfig::default()
    }
}

fn compiler_for(server: &MockServer) -> (Compiler, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let shared: Arc<dyn TelemetrySink> = sink.clone();
    let compiler = Compiler::with_sink(config_for(server), shared).expect("config is valid");
    (compiler, sink)
}

fn model_body() -> serde_json::Value {
    json!({
        "terms": [
            {"operator": "ZIIIIIII", "coefficient": 2.0, "meaning": "remote nda"},
            {"operator": "IIZIIIII", "coefficient": 2.5, "meaning": "remote tier"}
        ],
        "energy": 0.5,
        "lambda": 0.999,
        "phi": 2.176435e-8,
        "gamma": 0.1,
        "w2": 0.001
    })
}

fn solve_body() -> serde_json::Value {
    json!({
        "optimal_state": "10100000",
        "probability": 0.87,
        "energy": -4.5,
        "measurements": {"10100000": 0.87, "00100000": 0.13}
    })
}

async fn mount_translate(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/quantum/nlp-to-constraints"))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_body()))
        .mount(server)
        .await;
}

async fn mount_baseline(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/quantum/baseline-model"))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_body()))
        .mount(server)
        .await;
}

async fn mount_solve(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/quantum/solve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(solve_body()))
        .mount(server)
        .await;
}

async fn mount_perfect_metrics(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/quantum/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lambda": 1.0, "gamma": 0.0, "w2": 0.0, "phi": 2.176435e-8
        })))
        .mount(server)
        .await;
}

// ── Healthy remote path ──────────────────────────────────────────────

#[tokio::test]
async fn test_healthy_gateway_yields_remote_provenance_everywhere() {
    let server = MockServer::start().await;
    mount_translate(&server).await;
    mount_baseline(&server).await;
    mount_solve(&server).await;
    mount_perfect_metrics(&server).await;

    let (compiler, _sink) = compiler_for(&server);
    let outcome = compiler.process("gold tier nda").await;

    assert_eq!(outcome.translation_source, Source::Remote);
    assert_eq!(outcome.baseline_source, Source::Remote);
    assert_eq!(outcome.solver_source, Source::Remote);

    assert_eq!(outcome.solution.bit_state, "10100000");
    assert!((outcome.solution.probability - 0.87).abs() < f64::EPSILON);
    assert!((outcome.solution.energy + 4.5).abs() < f64::EPSILON);
    assert_eq!(outcome.solution.distribution.len(), 2);

    // 2 translated + 2 baseline terms, multiset union without dedup.
    assert_eq!(outcome.model.terms.len(), 4);
    // combine: min coherence, max decoherence of two identical models.
    assert!((outcome.model.coherence - 0.999).abs() < f64::EPSILON);
    assert!((outcome.model.decoherence - 0.1).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_solve_request_carries_solver_parameters() {
    let server = MockServer::start().await;
    mount_translate(&server).await;
    mount_baseline(&server).await;
    mount_perfect_metrics(&server).await;

    // Strict body matcher pins the solve wire contract.
    Mock::given(method("POST"))
        .and(path("/v1/quantum/solve"))
        .and(body_partial_json(json!({
            "backend": "ibm_fez",
            "shots": 1024,
            "max_iterations": 50,
            "ansatz": "vqe",
            "optimizer": "cobyla"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(solve_body()))
        .expect(1)
        .mount(&server)
        .await;

    let (compiler, _sink) = compiler_for(&server);
    let outcome = compiler.process("nda").await;
    assert_eq!(outcome.solver_source, Source::Remote);
}

#[tokio::test]
async fn test_translate_request_carries_compilation_mode() {
    let server = MockServer::start().await;
    mount_baseline(&server).await;
    mount_solve(&server).await;
    mount_perfect_metrics(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1/quantum/nlp-to-constraints"))
        .and(body_partial_json(json!({
            "text": "enterprise nda",
            "mode": "constraint_compilation"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_body()))
        .expect(1)
        .mount(&server)
        .await;

    let (compiler, _sink) = compiler_for(&server);
    let outcome = compiler.process("enterprise nda").await;
    assert_eq!(outcome.translation_source, Source::Remote);
}

// ── Baseline memoization ─────────────────────────────────────────────

#[tokio::test]
async fn test_baseline_fetched_once_per_session() {
    let server = MockServer::start().await;
    mount_translate(&server).await;
    mount_solve(&server).await;
    mount_perfect_metrics(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/quantum/baseline-model"))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_body()))
        .expect(1)
        .mount(&server)
        .await;

    let (compiler, _sink) = compiler_for(&server);
    compiler.process("nda").await;
    compiler.process("gold tier").await;
    compiler.process("hello").await;
    // The .expect(1) mock verifies on drop: exactly one baseline fetch.
}

// ── Partial degradation ──────────────────────────────────────────────

#[tokio::test]
async fn test_failing_solver_degrades_to_local_search_only() {
    let server = MockServer::start().await;
    mount_translate(&server).await;
    mount_baseline(&server).await;
    mount_perfect_metrics(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1/quantum/solve"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (compiler, _sink) = compiler_for(&server);
    let outcome = compiler.process("nda").await;

    assert_eq!(outcome.translation_source, Source::Remote);
    assert_eq!(outcome.solver_source, Source::Fallback);
    assert_eq!(outcome.solution.bit_state.len(), outcome.model.width());
    assert!((outcome.solution.probability - 0.95).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_non_success_translate_status_falls_back_locally() {
    let server = MockServer::start().await;
    mount_baseline(&server).await;
    mount_solve(&server).await;
    mount_perfect_metrics(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1/quantum/nlp-to-constraints"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (compiler, _sink) = compiler_for(&server);
    let outcome = compiler.process("enterprise nda").await;
    assert_eq!(outcome.translation_source, Source::Fallback);
    assert!(outcome
        .model
        .terms
        .iter()
        .any(|t| t.meaning == "enterprise-scale engagement"));
}

// ── Corrective actions ───────────────────────────────────────────────

#[tokio::test]
async fn test_degraded_metrics_fire_both_corrective_calls() {
    let server = MockServer::start().await;
    mount_translate(&server).await;
    mount_baseline(&server).await;
    mount_solve(&server).await;

    // λ below floor AND γ above ceiling AND w2 above tolerance.
    Mock::given(method("GET"))
        .and(path("/v1/quantum/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lambda": 0.5, "gamma": 0.9, "w2": 0.02, "phi": 0.0
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/quantum/correct"))
        .and(body_partial_json(json!({"correction_type": "phase_inversion"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/quantum/mutate"))
        .and(body_partial_json(json!({"mutation_type": "structural"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (compiler, sink) = compiler_for(&server);
    compiler.process("nda").await;

    let log = compiler.mutation_log();
    assert_eq!(log.len(), 2, "both thresholds violated → two log entries");
    assert!(log[0].reason.contains("λ=0.500"));
    assert!(log[1].reason.contains("w2=0.0200"));

    // Telemetry reflects the degraded reading and the last fired action.
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert!((records[0].lambda - 0.5).abs() < f64::EPSILON);
    assert!((records[0].gamma_norm - 0.9).abs() < f64::EPSILON);
    assert_eq!(records[0].mutation_action, "mutation");
}

#[tokio::test]
async fn test_healthy_metrics_fire_no_corrections() {
    let server = MockServer::start().await;
    mount_translate(&server).await;
    mount_baseline(&server).await;
    mount_solve(&server).await;
    mount_perfect_metrics(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1/quantum/correct"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/quantum/mutate"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (compiler, _sink) = compiler_for(&server);
    compiler.process("nda").await;
    assert!(compiler.mutation_log().is_empty());
}

#[tokio::test]
async fn test_failing_corrective_call_is_swallowed() {
    let server = MockServer::start().await;
    mount_translate(&server).await;
    mount_baseline(&server).await;
    mount_solve(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/quantum/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lambda": 0.5, "gamma": 0.0, "w2": 0.0, "phi": 0.0
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/quantum/correct"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (compiler, _sink) = compiler_for(&server);
    // Must not fail the pipeline; the entry is still appended.
    let outcome = compiler.process("nda").await;
    assert_eq!(outcome.solution.bit_state.len(), 8);
    assert_eq!(compiler.mutation_log().len(), 1);
}
