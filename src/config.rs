//! Declarative compiler configuration.
//!
//! ## Responsibility
//! Parse and validate TOML configuration for a compiler session. Every
//! field has either a required value or a documented default, and all
//! semantic constraints are checked before a config is accepted.
//!
//! ## Guarantees
//! - Deterministic: same TOML input always produces the same
//!   `CompilerConfig`
//! - Validated: threshold ranges and budgets are checked up front
//! - Schema-exportable: JSON Schema output enables IDE autocomplete
//!
//! ## NOT Responsible For
//! - Building the runtime pipeline from config (that belongs to `compiler`)
//! - Issuing gateway calls (that belongs to `gateway`)

use crate::CompilerError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ── Default value functions ──────────────────────────────────────────────

/// Default gateway base URL.
fn default_base_url() -> String {
    "http://localhost:7777/v1/quantum".to_string()
}

/// Default per-request client-side timeout: 10 000 ms.
fn default_request_timeout_ms() -> u64 {
    10_000
}

/// Default solver backend name.
fn default_backend() -> String {
    "ibm_fez".to_string()
}

/// Default sampling count per solve.
fn default_shots() -> u32 {
    1024
}

/// Default optimizer iteration budget.
fn default_max_iterations() -> u32 {
    50
}

/// Default circuit ansatz family.
fn default_ansatz() -> String {
    "vqe".to_string()
}

/// Default classical optimizer.
fn default_optimizer() -> String {
    "cobyla".to_string()
}

/// Default local-search sample budget.
fn default_local_search_samples() -> usize {
    100
}

/// Default coherence floor.
fn default_lambda_floor() -> f64 {
    crate::monitor::LAMBDA_THRESHOLD
}

/// Default decoherence ceiling.
fn default_gamma_ceiling() -> f64 {
    crate::monitor::GAMMA_CEILING
}

/// Default drift tolerance.
fn default_w2_tolerance() -> f64 {
    crate::monitor::W2_TOLERANCE
}

/// Default retained-history capacity.
fn default_history_capacity() -> usize {
    crate::memory::DEFAULT_CAPACITY
}

// ── Top-level config ─────────────────────────────────────────────────────

/// Root configuration for one compiler session.
///
/// Deserialized from a TOML file and validated before use.
///
/// # Example
///
/// ```toml
/// [gateway]
/// base_url = "http://localhost:7777/v1/quantum"
///
/// [solver]
/// backend = "ibm_fez"
///
/// [telemetry]
/// path = "telemetry.jsonl"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(default)]
pub struct CompilerConfig {
    /// Solver-gateway endpoint settings.
    pub gateway: GatewaySection,
    /// External-solver tuning parameters and the local fallback budget.
    pub solver: SolverSection,
    /// Quality thresholds for the monitor/corrector.
    pub quality: QualitySection,
    /// Evolution-memory sizing.
    pub memory: MemorySection,
    /// Telemetry sink destination.
    pub telemetry: TelemetrySection,
}

/// Solver-gateway endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct GatewaySection {
    /// Base URL all six endpoint paths are appended to.
    pub base_url: String,
    /// Client-side timeout (ms) applied to every gateway request.
    pub request_timeout_ms: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// External-solver tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct SolverSection {
    /// Named solver backend.
    pub backend: String,
    /// Sampling count per solve.
    pub shots: u32,
    /// Iteration budget for the optimizer.
    pub max_iterations: u32,
    /// Circuit ansatz family.
    pub ansatz: String,
    /// Classical optimizer name.
    pub optimizer: String,
    /// Bounded local-search sample budget used when the external solver is
    /// unavailable.
    pub local_search_samples: usize,
}

impl Default for SolverSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            shots: default_shots(),
            max_iterations: default_max_iterations(),
            ansatz: default_ansatz(),
            optimizer: default_optimizer(),
            local_search_samples: default_local_search_samples(),
        }
    }
}

/// Quality thresholds for the monitor/corrector.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct QualitySection {
    /// Coherence floor (λ): readings below trigger phase correction.
    pub lambda_floor: f64,
    /// Decoherence ceiling (γ): readings above trigger phase correction.
    pub gamma_ceiling: f64,
    /// Drift tolerance (w2): readings above trigger structural mutation.
    pub w2_tolerance: f64,
}

impl Default for QualitySection {
    fn default() -> Self {
        Self {
            lambda_floor: default_lambda_floor(),
            gamma_ceiling: default_gamma_ceiling(),
            w2_tolerance: default_w2_tolerance(),
        }
    }
}

/// Evolution-memory sizing.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct MemorySection {
    /// Maximum retained history entries (drop-oldest on overflow).
    pub history_capacity: usize,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
        }
    }
}

/// Telemetry sink destination.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(default)]
pub struct TelemetrySection {
    /// JSON-lines file to append records to. `None` discards telemetry.
    pub path: Option<PathBuf>,
}

impl CompilerConfig {
    /// Parse a config from TOML text and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`CompilerError::ConfigError`] on parse failure or any
    /// violated semantic constraint.
    pub fn from_toml_str(text: &str) -> Result<Self, CompilerError> {
        let config: Self = toml::from_str(text)
            .map_err(|e| CompilerError::ConfigError(format!("TOML parse failed: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check all semantic constraints.
    ///
    /// # Errors
    ///
    /// Returns [`CompilerError::ConfigError`] naming the first violated
    /// constraint.
    pub fn validate(&self) -> Result<(), CompilerError> {
        if self.gateway.base_url.trim().is_empty() {
            return Err(CompilerError::ConfigError(
                "gateway.base_url must not be empty".to_string(),
            ));
        }
        if self.gateway.request_timeout_ms == 0 {
            return Err(CompilerError::ConfigError(
                "gateway.request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.solver.shots == 0 {
            return Err(CompilerError::ConfigError(
                "solver.shots must be positive".to_string(),
            ));
        }
        if self.solver.local_search_samples == 0 {
            return Err(CompilerError::ConfigError(
                "solver.local_search_samples must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.quality.lambda_floor) {
            return Err(CompilerError::ConfigError(
                "quality.lambda_floor must be within [0, 1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.quality.gamma_ceiling) {
            return Err(CompilerError::ConfigError(
                "quality.gamma_ceiling must be within [0, 1]".to_string(),
            ));
        }
        if self.quality.w2_tolerance < 0.0 {
            return Err(CompilerError::ConfigError(
                "quality.w2_tolerance must be non-negative".to_string(),
            ));
        }
        if self.memory.history_capacity == 0 {
            return Err(CompilerError::ConfigError(
                "memory.history_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Export the JSON Schema for `CompilerConfig`.
///
/// This enables IDE autocomplete when editing TOML config files.
///
/// # Errors
///
/// Returns `serde_json::Error` if schema serialization fails (should not
/// happen with well-formed derive macros).
pub fn export_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(CompilerConfig);
    serde_json::to_string_pretty(&schema)
}
