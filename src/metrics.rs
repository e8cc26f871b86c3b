//! Prometheus metrics for the compilation pipeline.
//!
//! ## Usage
//!
//! Call [`init_metrics`] once at process startup **before** the first
//! pipeline invocation. The helper functions (`record_stage_latency`,
//! `inc_request`, …) are no-ops if `init_metrics` was never called, so the
//! pipeline is always safe to run — observability simply degrades
//! gracefully.
//!
//! ## Metrics Exposed
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `compiler_requests_total` | Counter | `stage` |
//! | `compiler_fallbacks_total` | Counter | `stage` |
//! | `compiler_corrections_total` | Counter | `action` |
//! | `compiler_stage_duration_seconds` | Histogram | `stage` |
//! | `compiler_history_depth` | Gauge | — |

use crate::CompilerError;
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;

// ── Internal metrics bundle ────────────────────────────────────────────────

/// All Prometheus metrics for the compiler, bundled together so they can
/// be stored in a single [`OnceLock`] and initialised atomically.
pub struct Metrics {
    /// Prometheus registry that owns all metric descriptors.
    pub registry: Registry,
    /// Total pipeline requests per stage.
    pub requests_total: CounterVec,
    /// Local-fallback activations per stage.
    pub fallbacks_total: CounterVec,
    /// Fired corrective actions by kind.
    pub corrections_total: CounterVec,
    /// Stage processing latency histogram.
    pub stage_duration: HistogramVec,
    /// Current evolution-memory depth.
    pub history_depth: IntGauge,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

// ── Initialisation ─────────────────────────────────────────────────────────

/// Initialise all Prometheus metrics and register them with a private
/// registry.
///
/// Must be called once at process startup before the first pipeline
/// invocation. Calling it a second time is a no-op (returns `Ok(())`).
///
/// # Errors
///
/// Returns [`CompilerError::Other`] if metric construction or registry
/// registration fails (e.g., duplicate descriptor names).
///
/// # Panics
///
/// This function never panics.
pub fn init_metrics() -> Result<(), CompilerError> {
    if METRICS.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let requests_total = CounterVec::new(
        Opts::new("compiler_requests_total", "Total pipeline requests"),
        &["stage"],
    )
    .map_err(|e| CompilerError::Other(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(requests_total.clone()))
        .map_err(|e| CompilerError::Other(format!("metrics registration failed: {e}")))?;

    let fallbacks_total = CounterVec::new(
        Opts::new(
            "compiler_fallbacks_total",
            "Local-fallback activations per stage",
        ),
        &["stage"],
    )
    .map_err(|e| CompilerError::Other(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(fallbacks_total.clone()))
        .map_err(|e| CompilerError::Other(format!("metrics registration failed: {e}")))?;

    let corrections_total = CounterVec::new(
        Opts::new(
            "compiler_corrections_total",
            "Fired corrective actions by kind",
        ),
        &["action"],
    )
    .map_err(|e| CompilerError::Other(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(corrections_total.clone()))
        .map_err(|e| CompilerError::Other(format!("metrics registration failed: {e}")))?;

    let stage_duration = HistogramVec::new(
        HistogramOpts::new(
            "compiler_stage_duration_seconds",
            "Processing duration per stage",
        ),
        &["stage"],
    )
    .map_err(|e| CompilerError::Other(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(stage_duration.clone()))
        .map_err(|e| CompilerError::Other(format!("metrics registration failed: {e}")))?;

    let history_depth = IntGauge::new("compiler_history_depth", "Current evolution-memory depth")
        .map_err(|e| CompilerError::Other(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(history_depth.clone()))
        .map_err(|e| CompilerError::Other(format!("metrics registration failed: {e}")))?;

    // If another thread raced us, the first one wins — both initializations
    // produce identical metric descriptors, so neither outcome is incorrect.
    let _ = METRICS.set(Metrics {
        registry,
        requests_total,
        fallbacks_total,
        corrections_total,
        stage_duration,
        history_depth,
    });

    Ok(())
}

/// Return a reference to the initialised [`Metrics`], or `None` if
/// [`init_metrics`] has not been called yet.
fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

// ── Public helper functions ────────────────────────────────────────────────

/// Record the processing latency for a pipeline stage.
///
/// No-op if metrics have not been initialised.
pub fn record_stage_latency(stage: &str, d: Duration) {
    if let Some(m) = metrics() {
        if let Ok(h) = m.stage_duration.get_metric_with_label_values(&[stage]) {
            h.observe(d.as_secs_f64());
        }
    }
}

/// Increment the request counter for a pipeline stage.
///
/// No-op if metrics have not been initialised.
pub fn inc_request(stage: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.requests_total.get_metric_with_label_values(&[stage]) {
            c.inc();
        }
    }
}

/// Increment the fallback counter for a pipeline stage.
///
/// No-op if metrics have not been initialised.
pub fn inc_fallback(stage: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.fallbacks_total.get_metric_with_label_values(&[stage]) {
            c.inc();
        }
    }
}

/// Increment the corrective-action counter for an action kind.
///
/// No-op if metrics have not been initialised.
pub fn inc_correction(action: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.corrections_total.get_metric_with_label_values(&[action]) {
            c.inc();
        }
    }
}

/// Set the evolution-memory depth gauge.
///
/// No-op if metrics have not been initialised.
pub fn set_history_depth(depth: i64) {
    if let Some(m) = metrics() {
        m.history_depth.set(depth);
    }
}

/// Gather and encode all metrics in the Prometheus text exposition format.
///
/// Returns an empty string if metrics have not been initialised or if
/// encoding fails. Observability degrades gracefully rather than
/// panicking.
pub fn gather_metrics() -> String {
    let Some(m) = metrics() else {
        return String::new();
    };
    let families = m.registry.gather();
    if families.is_empty() {
        return String::new();
    }
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
