//! The compiler session: pipeline wiring and per-run state.
//!
//! ## Responsibility
//! Own every piece of process-wide state (baseline cache, evolution memory,
//! mutation log, coherence trajectory) behind one explicit long-lived
//! object, and run the sequential pipeline:
//!
//! ```text
//! translate → baseline → combine → solve → monitor/correct → remember
//! ```
//!
//! Each stage runs inside a structured tracing span recording
//! `request_id`, `stage`, `duration_ms`, and `outcome`; intent content is
//! never logged (lengths only).
//!
//! ## Guarantees
//! - `process` is infallible: every stage degrades to its documented local
//!   fallback, so a [`PipelineOutcome`] is always produced.
//! - Stages within one invocation run strictly sequentially; concurrent
//!   invocations share only the memory, quality log, and baseline cache.
//!   The history cap is advisory under concurrency, not transactional.

use crate::baseline::BaselineLoader;
use crate::collapse;
use crate::config::CompilerConfig;
use crate::gateway::{GatewayClient, SolverParams};
use crate::memory::{EvolutionMemory, EvolutionStats};
use crate::metrics;
use crate::model::{Model, Solution, Source, INTEGRATION_BASELINE};
use crate::monitor::{MutationLogEntry, QualityLog, QualityMonitor};
use crate::solver::SolverGateway;
use crate::telemetry::{JsonLinesSink, NullSink, TelemetryRecord, TelemetrySink};
use crate::translate::IntentTranslator;
use crate::CompilerError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, Span};

/// Result of one pipeline invocation.
///
/// Carries the combined model alongside the solution so callers can
/// collapse against the layout that actually produced the bit-state, plus
/// per-stage provenance for observability and tests.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// The solved bit assignment.
    pub solution: Solution,
    /// The combined (intent + baseline) model the solution was produced
    /// against.
    pub model: Model,
    /// Where the translation came from.
    pub translation_source: Source,
    /// Where the baseline came from.
    pub baseline_source: Source,
    /// Where the solution came from.
    pub solver_source: Source,
}

/// One long-lived compiler session.
///
/// Construct once per logical session and share by reference; all stages
/// borrow the session's state rather than reaching for globals.
pub struct Compiler {
    config: CompilerConfig,
    translator: IntentTranslator,
    baseline: BaselineLoader,
    solver: SolverGateway,
    monitor: QualityMonitor,
    memory: Arc<Mutex<EvolutionMemory>>,
    quality: Arc<Mutex<QualityLog>>,
    telemetry: Arc<dyn TelemetrySink>,
    request_seq: AtomicU64,
}

impl Compiler {
    /// Build a compiler session from config.
    ///
    /// The telemetry sink follows `config.telemetry.path`: a JSON-lines
    /// file sink when set, discard otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`CompilerError::ConfigError`] if the config fails
    /// validation.
    pub fn new(config: CompilerConfig) -> Result<Self, CompilerError> {
        let sink: Arc<dyn TelemetrySink> = match &config.telemetry.path {
            Some(path) => Arc::new(JsonLinesSink::new(path)),
            None => Arc::new(NullSink),
        };
        Self::with_sink(config, sink)
    }

    /// Build a compiler session with an explicit telemetry sink.
    ///
    /// # Errors
    ///
    /// Returns [`CompilerError::ConfigError`] if the config fails
    /// validation.
    pub fn with_sink(
        config: CompilerConfig,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<Self, CompilerError> {
        config.validate()?;

        let gateway = Arc::new(GatewayClient::new(
            config.gateway.base_url.clone(),
            Duration::from_millis(config.gateway.request_timeout_ms),
        ));
        let quality = Arc::new(Mutex::new(QualityLog::default()));

        Ok(Self {
            translator: IntentTranslator::new(Arc::clone(&gateway)),
            baseline: BaselineLoader::new(Arc::clone(&gateway)),
            solver: SolverGateway::new(
                Arc::clone(&gateway),
                SolverParams {
                    backend: config.solver.backend.clone(),
                    shots: config.solver.shots,
                    max_iterations: config.solver.max_iterations,
                    ansatz: config.solver.ansatz.clone(),
                    optimizer: config.solver.optimizer.clone(),
                },
                config.solver.local_search_samples,
            ),
            monitor: QualityMonitor::new(Arc::clone(&gateway), Arc::clone(&quality)),
            memory: Arc::new(Mutex::new(EvolutionMemory::new(
                config.memory.history_capacity,
            ))),
            quality,
            telemetry,
            config,
            request_seq: AtomicU64::new(0),
        })
    }

    /// Run the full pipeline for one intent.
    ///
    /// Never fails: every network-bound stage degrades to its documented
    /// local fallback, so an outcome is always produced — even with the
    /// gateway completely unreachable.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub async fn process(&self, intent: &str) -> PipelineOutcome {
        let request_id = format!("req-{:06}", self.request_seq.fetch_add(1, Ordering::Relaxed));

        info!(
            target: "compiler::pipeline",
            request_id = %request_id,
            intent_len = intent.len(),
            "pipeline invocation started"
        );

        // Stage 1: translate intent into a constraint model.
        let translated = {
            let _stage = StageGuard::enter("translate", &request_id);
            self.translator.translate(intent).await
        };

        // Stage 2: load the (memoized) baseline fitness model.
        let baseline = {
            let _stage = StageGuard::enter("baseline", &request_id);
            self.baseline.load().await
        };

        // Stage 3: combine problem and baseline.
        let model = {
            let _stage = StageGuard::enter("combine", &request_id);
            translated.get().combine(baseline.get())
        };

        // Stage 4: solve for the lowest-energy assignment.
        let solved = {
            let _stage = StageGuard::enter("solve", &request_id);
            self.solver.solve(&model).await
        };

        // Stage 5: quality check and best-effort correction.
        {
            let _stage = StageGuard::enter("monitor", &request_id);
            self.monitor.check_and_correct(solved.get()).await;
        }

        // Stage 6: remember the solution and emit telemetry.
        {
            let _stage = StageGuard::enter("remember", &request_id);
            self.remember(solved.get().clone()).await;
        }

        info!(
            target: "compiler::pipeline",
            request_id = %request_id,
            translation = ?translated.source(),
            baseline = ?baseline.source(),
            solver = ?solved.source(),
            energy = solved.get().energy,
            "pipeline invocation complete"
        );

        PipelineOutcome {
            translation_source: translated.source(),
            baseline_source: baseline.source(),
            solver_source: solved.source(),
            model,
            solution: solved.into_inner(),
        }
    }

    /// Append a solution to the evolution memory and emit its telemetry
    /// record. Sink failures are logged and swallowed.
    async fn remember(&self, solution: Solution) {
        let energy = solution.energy;
        let (iteration, depth) = {
            let mut memory = self.memory.lock();
            let index = memory.remember(solution);
            (index, memory.len())
        };
        metrics::set_history_depth(depth as i64);

        let record = {
            let quality = self.quality.lock();
            TelemetryRecord {
                iteration,
                timestamp: chrono::Utc::now().to_rfc3339(),
                backend: self.config.solver.backend.clone(),
                lambda: quality.last_coherence(),
                phi: INTEGRATION_BASELINE,
                gamma_norm: quality.last_gamma.unwrap_or(0.0),
                w2: quality.last_w2.unwrap_or(0.0),
                mutation_action: quality.last_action().to_string(),
                energy,
            }
        };

        if let Err(e) = self.telemetry.emit(&record).await {
            tracing::warn!(
                target: "compiler::pipeline",
                error = %e,
                iteration,
                "telemetry emission failed (best-effort, continuing)"
            );
        }
    }

    /// Collapse an outcome into its human-readable decision summary.
    ///
    /// Pure and total: resolves bit positions through the slot layout
    /// carried by the outcome's own model.
    pub fn collapse(&self, outcome: &PipelineOutcome, intent: &str) -> String {
        collapse::collapse(&outcome.solution, intent, &outcome.model.layout)
    }

    /// Aggregate statistics over the session's history and quality log.
    pub fn stats(&self) -> EvolutionStats {
        let quality = self.quality.lock();
        self.memory.lock().stats(&quality)
    }

    /// Snapshot of the mutation log, in firing order.
    pub fn mutation_log(&self) -> Vec<MutationLogEntry> {
        self.quality.lock().entries.clone()
    }

    /// Number of solutions currently retained in the evolution memory.
    pub fn history_len(&self) -> usize {
        self.memory.lock().len()
    }
}

/// RAII span guard for one pipeline stage: opens the span, counts the
/// request, and records duration and outcome on drop.
struct StageGuard {
    span: Span,
    stage: &'static str,
    start: Instant,
}

impl StageGuard {
    fn enter(stage: &'static str, request_id: &str) -> Self {
        let span = tracing::info_span!(
            "pipeline.stage",
            request_id = %request_id,
            stage = stage,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );
        metrics::inc_request(stage);
        Self {
            span,
            stage,
            start: Instant::now(),
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        metrics::record_stage_latency(self.stage, elapsed);
        self.span.record("duration_ms", elapsed.as_millis() as u64);
        self.span.record("outcome", "ok");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewaySection;
    use crate::telemetry::MemorySink;

    /// Config pointing at an unreachable gateway so every stage exercises
    /// its local fallback deterministically.
    fn offline_config() -> CompilerConfig {
        CompilerConfig {
            gateway: GatewaySection {
                base_url: "http://127.0.0.1:1".to_string(),
                request_timeout_ms: 200,
            },
            ..CompilerConfig::default()
        }
    }

    fn offline_compiler_with_sink() -> (Compiler, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let shared: Arc<dyn TelemetrySink> = sink.clone();
        let compiler =
            Compiler::with_sink(offline_config(), shared).expect("test: offline config is valid");
        (compiler, sink)
    }

    #[tokio::test]
    async fn test_process_fully_offline_produces_solution() {
        let (compiler, _sink) = offline_compiler_with_sink();
        let outcome = compiler.process("gold tier enterprise nda net 30").await;

        assert_eq!(outcome.translation_source, Source::Fallback);
        assert_eq!(outcome.baseline_source, Source::Fallback);
        assert_eq!(outcome.solver_source, Source::Fallback);
        assert_eq!(outcome.solution.bit_state.len(), outcome.model.width());
        assert!((outcome.solution.probability - 0.95).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_process_combines_intent_with_baseline_terms() {
        let (compiler, _sink) = offline_compiler_with_sink();
        let outcome = compiler.process("enterprise nda").await;
        // 2 intent terms + 3 built-in baseline terms, multiset union.
        assert_eq!(outcome.model.terms.len(), 5);
    }

    #[tokio::test]
    async fn test_process_records_history_and_telemetry() {
        let (compiler, sink) = offline_compiler_with_sink();
        compiler.process("enterprise").await;
        compiler.process("hello").await;

        assert_eq!(compiler.history_len(), 2);
        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].iteration, 0);
        assert_eq!(records[1].iteration, 1);
        assert_eq!(records[0].backend, "ibm_fez");
        // Offline metrics read as perfect, so no corrective action fired.
        assert_eq!(records[1].mutation_action, "none");
        assert!((records[1].lambda - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_stats_track_iterations_and_coherence() {
        let (compiler, _sink) = offline_compiler_with_sink();
        compiler.process("enterprise").await;

        let stats = compiler.stats();
        assert_eq!(stats.total_iterations, 1);
        // One offline monitor pass recorded the assumed-perfect λ = 1.0.
        assert!((stats.average_coherence - 1.0).abs() < f64::EPSILON);
        assert_eq!(stats.mutation_count, 0);
    }

    #[tokio::test]
    async fn test_collapse_of_outcome_mentions_probability_and_energy() {
        let (compiler, _sink) = offline_compiler_with_sink();
        let outcome = compiler.process("gold tier").await;
        let artifact = compiler.collapse(&outcome, "gold tier");
        assert!(artifact.contains("Decision summary"));
        assert!(artifact.contains("confidence: 0.9500"));
        assert!(artifact.contains("energy:"));
    }

    #[tokio::test]
    async fn test_history_cap_respected_across_invocations() {
        let mut config = offline_config();
        config.memory.history_capacity = 3;
        let sink: Arc<dyn TelemetrySink> = Arc::new(MemorySink::new());
        let compiler = Compiler::with_sink(config, sink).expect("test: config is valid");

        for _ in 0..5 {
            compiler.process("hello").await;
        }
        assert_eq!(compiler.history_len(), 3);
        assert_eq!(compiler.stats().total_iterations, 5);
    }

    #[tokio::test]
    async fn test_concurrent_invocations_share_session_state() {
        let (compiler, _sink) = offline_compiler_with_sink();
        let compiler = Arc::new(compiler);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = Arc::clone(&compiler);
                tokio::spawn(async move { c.process("enterprise nda").await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.is_ok());
        }
        assert_eq!(compiler.stats().total_iterations, 4);
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let mut config = offline_config();
        config.solver.shots = 0;
        let result = Compiler::new(config);
        assert!(matches!(result, Err(CompilerError::ConfigError(_))));
    }
}
