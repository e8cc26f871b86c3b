//! # tokio-intent-compiler
//!
//! An adaptive constraint-compilation pipeline over Tokio.
//!
//! ## Architecture
//!
//! Free-text intent flows through six sequential stages:
//! ```text
//! translate → baseline → combine → solve → monitor/correct → remember
//! ```
//!
//! Every network-bound stage degrades to a documented deterministic local
//! fallback, so the pipeline always produces a [`Solution`] — even with the
//! backing solver service completely unreachable. Remote-vs-local provenance
//! is explicit in the returned [`Sourced`] wrappers.

// ── Lint policy (aerospace-grade) ─────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod baseline;
pub mod collapse;
pub mod compiler;
pub mod config;
pub mod gateway;
pub mod memory;
pub mod metrics;
pub mod model;
pub mod monitor;
pub mod solver;
pub mod telemetry;
pub mod translate;

// Re-exports for convenience
pub use compiler::{Compiler, PipelineOutcome};
pub use config::CompilerConfig;
pub use memory::EvolutionStats;
pub use model::{Model, SlotLayout, Solution, Source, Sourced, Term};

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"` — structured JSON output for production log aggregators
/// - anything else (including unset) — human-readable pretty output
///   for local development
///
/// Filter level is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).
///
/// # Errors
///
/// Returns [`CompilerError::Other`] if the global subscriber has already
/// been set (e.g. by a previous call or a test harness).
///
/// # Panics
///
/// This function never panics.
pub fn init_tracing() -> Result<(), CompilerError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let result = match format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| CompilerError::Other(format!("tracing init failed: {e}")))
}

/// Top-level compiler errors.
///
/// Transport failures on read/compute stages are recovered internally by the
/// pipeline's local fallbacks and never reach callers through `process()`;
/// the variants here surface at construction time, on corrective write
/// stages (where they are logged and swallowed), and in the telemetry sink.
#[derive(Error, Debug)]
pub enum CompilerError {
    /// A network call to the solver gateway failed (connect, timeout,
    /// non-2xx status, or response parse failure).
    #[error("transport failure: {0}")]
    Transport(String),

    /// A configuration value is missing or invalid.
    ///
    /// Returned at construction time so misconfiguration surfaces
    /// immediately rather than at the first pipeline invocation.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The telemetry sink rejected a record (I/O or serialization failure).
    #[error("telemetry emission failed: {0}")]
    Telemetry(String),

    /// Catch-all for errors that do not fit a specific variant.
    #[error("{0}")]
    Other(String),
}
