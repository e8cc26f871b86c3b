//! Quality monitoring and corrective actions.
//!
//! ## Responsibility
//! After each solve, fetch the live quality reading (λ, γ, w2), compare it
//! against the fixed thresholds, and fire the matching corrective network
//! calls. Every fired action appends a [`MutationLogEntry`]; every check
//! appends the observed λ to the coherence trajectory.
//!
//! ## Guarantees
//! - The two threshold checks are independent — both may fire in one
//!   invocation.
//! - Corrective-call failures are logged to diagnostics and swallowed;
//!   corrections are best-effort, never required for the pipeline to
//!   proceed.
//! - An unreachable metrics endpoint reads as perfect, so a fully offline
//!   pipeline fires no corrections.

use crate::gateway::{GatewayClient, QualityReading};
use crate::metrics;
use crate::model::Solution;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Coherence floor: readings below this trigger phase correction.
pub const LAMBDA_THRESHOLD: f64 = 0.985;

/// Decoherence ceiling: readings above this trigger phase correction.
pub const GAMMA_CEILING: f64 = 0.75;

/// Drift tolerance: readings above this trigger structural mutation.
pub const W2_TOLERANCE: f64 = 0.01;

/// Which corrective action a mutation-log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectiveAction {
    /// Phase correction: the backing service inverts its accumulated
    /// error field.
    Correction,
    /// Structural mutation: the backing service evolves its internal
    /// search structure.
    Mutation,
}

impl CorrectiveAction {
    /// Stable lowercase name, as emitted in telemetry.
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectiveAction::Correction => "correction",
            CorrectiveAction::Mutation => "mutation",
        }
    }
}

/// One appended record of a fired corrective action.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationLogEntry {
    /// RFC 3339 wall-clock timestamp of the firing.
    pub timestamp: String,
    /// The threshold readings that triggered the action.
    pub reason: String,
    /// Which corrective action fired.
    pub action: CorrectiveAction,
}

/// Process-lifetime quality state: the coherence trajectory and the
/// mutation log. Unbounded, no persistence — drops with the owning
/// compiler.
#[derive(Debug, Default)]
pub struct QualityLog {
    /// Every observed λ, in check order.
    pub trajectory: Vec<f64>,
    /// Every fired corrective action, in firing order.
    pub entries: Vec<MutationLogEntry>,
    /// Most recently observed γ.
    pub last_gamma: Option<f64>,
    /// Most recently observed w2.
    pub last_w2: Option<f64>,
}

impl QualityLog {
    /// Most recently observed coherence, or 1.0 if none recorded yet.
    pub fn last_coherence(&self) -> f64 {
        self.trajectory.last().copied().unwrap_or(1.0)
    }

    /// Mean of the recorded coherence trajectory; 0.0 when empty (never
    /// NaN).
    pub fn average_coherence(&self) -> f64 {
        if self.trajectory.is_empty() {
            return 0.0;
        }
        self.trajectory.iter().sum::<f64>() / self.trajectory.len() as f64
    }

    /// Most recently fired corrective action, as its telemetry name, or
    /// `"none"`.
    pub fn last_action(&self) -> &'static str {
        self.entries
            .last()
            .map_or("none", |entry| entry.action.as_str())
    }
}

/// The two independent threshold checks: `(phase correction, structural
/// mutation)`.
fn violations(reading: &QualityReading) -> (bool, bool) {
    (
        reading.lambda < LAMBDA_THRESHOLD || reading.gamma > GAMMA_CEILING,
        reading.w2 > W2_TOLERANCE,
    )
}

/// Fetches quality readings and fires threshold-gated corrections.
#[derive(Debug, Clone)]
pub struct QualityMonitor {
    gateway: Arc<GatewayClient>,
    log: Arc<Mutex<QualityLog>>,
}

impl QualityMonitor {
    /// Create a monitor writing to the shared quality log.
    pub fn new(gateway: Arc<GatewayClient>, log: Arc<Mutex<QualityLog>>) -> Self {
        Self { gateway, log }
    }

    /// Fetch live metrics, check thresholds, and fire corrective actions.
    ///
    /// The metrics fetch degrades to [`QualityReading::perfect`] on any
    /// failure. Both threshold checks run independently; each fired action
    /// appends one mutation-log entry whether or not its network call
    /// succeeded.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub async fn check_and_correct(&self, solution: &Solution) -> QualityReading {
        let reading = match self.gateway.metrics().await {
            Ok(reading) => reading,
            Err(e) => {
                debug!(
                    target: "compiler::monitor",
                    error = %e,
                    "metrics fetch failed, assuming perfect reading"
                );
                metrics::inc_fallback("metrics");
                QualityReading::perfect()
            }
        };

        {
            let mut log = self.log.lock();
            log.trajectory.push(reading.lambda);
            log.last_gamma = Some(reading.gamma);
            log.last_w2 = Some(reading.w2);
        }

        debug!(
            target: "compiler::monitor",
            lambda = reading.lambda,
            gamma = reading.gamma,
            w2 = reading.w2,
            solution_energy = solution.energy,
            "quality reading"
        );

        let (correction, mutation) = violations(&reading);
        if correction {
            self.fire_correction(&reading).await;
        }
        if mutation {
            self.fire_mutation(&reading).await;
        }

        reading
    }

    /// Fire the phase correction and append its log entry.
    async fn fire_correction(&self, reading: &QualityReading) {
        if let Err(e) = self.gateway.correct(reading.lambda, reading.gamma).await {
            warn!(
                target: "compiler::monitor",
                error = %e,
                "phase correction call failed (best-effort, continuing)"
            );
        }
        metrics::inc_correction("correction");
        self.append(
            format!("λ={:.3}, γ={:.3}", reading.lambda, reading.gamma),
            CorrectiveAction::Correction,
        );
    }

    /// Fire the structural mutation and append its log entry.
    async fn fire_mutation(&self, reading: &QualityReading) {
        if let Err(e) = self.gateway.mutate().await {
            warn!(
                target: "compiler::monitor",
                error = %e,
                "structural mutation call failed (best-effort, continuing)"
            );
        }
        metrics::inc_correction("mutation");
        self.append(
            format!("w2={:.4}", reading.w2),
            CorrectiveAction::Mutation,
        );
    }

    fn append(&self, reason: String, action: CorrectiveAction) {
        self.log.lock().entries.push(MutationLogEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            reason,
            action,
        });
    }

    /// Apply threshold checks to an already-fetched reading, appending log
    /// entries without any network calls. Exposed for deterministic tests.
    pub fn apply_reading(&self, reading: &QualityReading) -> (bool, bool) {
        {
            let mut log = self.log.lock();
            log.trajectory.push(reading.lambda);
            log.last_gamma = Some(reading.gamma);
            log.last_w2 = Some(reading.w2);
        }

        let (correction, mutation) = violations(reading);
        if correction {
            metrics::inc_correction("correction");
            self.append(
                format!("λ={:.3}, γ={:.3}", reading.lambda, reading.gamma),
                CorrectiveAction::Correction,
            );
        }

        if mutation {
            metrics::inc_correction("mutation");
            self.append(format!("w2={:.4}", reading.w2), CorrectiveAction::Mutation);
        }

        (correction, mutation)
    }
}
