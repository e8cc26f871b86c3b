//! Solver-gateway HTTP client.
//!
//! One typed client for the six endpoints of the backing solver service.
//! Each call owns its request/response payload structs; all failures map to
//! [`CompilerError::Transport`] and are handled by the calling stage's
//! documented fallback — nothing here retries or recovers.
//!
//! ## Endpoints
//!
//! | Call | Method + path | Fallback on failure |
//! |------|---------------|---------------------|
//! | `translate` | POST `{base}/nlp-to-constraints` | local pattern table |
//! | `baseline` | GET `{base}/baseline-model` | built-in default model |
//! | `solve` | POST `{base}/solve` | bounded local search |
//! | `metrics` | GET `{base}/metrics` | perfect-reading default |
//! | `correct` | POST `{base}/correct` | swallowed (best-effort) |
//! | `mutate` | POST `{base}/mutate` | swallowed (best-effort) |

use crate::model::{clamp01, Model, SlotLayout, Solution, Term};
use crate::CompilerError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// HTTP client for the solver gateway service.
///
/// Cheap to clone; the inner `reqwest::Client` is reference-counted.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

// ── Wire payloads ─────────────────────────────────────────────────────────

/// Wire form of one constraint term.
#[derive(Debug, Serialize, Deserialize)]
pub struct TermPayload {
    /// Operator pattern over the decision slots.
    pub operator: String,
    /// Signed constraint weight.
    pub coefficient: f64,
    /// Human-readable description.
    #[serde(default)]
    pub meaning: String,
}

impl From<&Term> for TermPayload {
    fn from(term: &Term) -> Self {
        Self {
            operator: term.pattern.clone(),
            coefficient: term.coefficient,
            meaning: term.meaning.clone(),
        }
    }
}

impl From<TermPayload> for Term {
    fn from(payload: TermPayload) -> Self {
        Term {
            pattern: payload.operator,
            coefficient: payload.coefficient,
            meaning: payload.meaning,
        }
    }
}

/// Translate request body.
#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    mode: &'static str,
}

/// Model payload returned by translate and baseline calls.
#[derive(Debug, Deserialize)]
struct ModelPayload {
    terms: Vec<TermPayload>,
    #[serde(default)]
    energy: f64,
    #[serde(default = "one")]
    lambda: f64,
    #[serde(default)]
    phi: f64,
    #[serde(default)]
    gamma: f64,
    #[serde(default)]
    w2: f64,
}

fn one() -> f64 {
    1.0
}

impl ModelPayload {
    fn into_model(self) -> Model {
        Model {
            terms: self.terms.into_iter().map(Term::from).collect(),
            energy: self.energy,
            coherence: clamp01(self.lambda),
            integration: self.phi,
            decoherence: clamp01(self.gamma),
            drift: self.w2,
            layout: SlotLayout::standard(),
        }
    }
}

/// Solver tuning parameters sent with every solve request.
#[derive(Debug, Clone, Serialize)]
pub struct SolverParams {
    /// Named solver backend (e.g. `"ibm_fez"`).
    pub backend: String,
    /// Sampling count per solve.
    pub shots: u32,
    /// Iteration budget for the optimizer.
    pub max_iterations: u32,
    /// Circuit ansatz family.
    pub ansatz: String,
    /// Classical optimizer name.
    pub optimizer: String,
}

/// Solve request body.
#[derive(Debug, Serialize)]
struct SolveRequest<'a> {
    terms: Vec<TermPayload>,
    backend: &'a str,
    shots: u32,
    max_iterations: u32,
    ansatz: &'a str,
    optimizer: &'a str,
}

/// Solve response body.
#[derive(Debug, Deserialize)]
struct SolveResponse {
    optimal_state: String,
    probability: f64,
    energy: f64,
    #[serde(default)]
    measurements: HashMap<String, f64>,
}

/// Live quality reading from the metrics endpoint.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct QualityReading {
    /// Coherence amplitude λ in `[0, 1]`.
    pub lambda: f64,
    /// Decoherence γ in `[0, 1]`.
    pub gamma: f64,
    /// Drift (Wasserstein-2 distance from ideal).
    pub w2: f64,
    /// Integration φ.
    #[serde(default)]
    pub phi: f64,
}

impl QualityReading {
    /// The "perfect" reading assumed when the metrics endpoint is
    /// unreachable: full coherence, no decoherence, no drift.
    pub fn perfect() -> Self {
        Self {
            lambda: 1.0,
            gamma: 0.0,
            w2: 0.0,
            phi: crate::model::INTEGRATION_BASELINE,
        }
    }
}

/// Phase-correction request body.
#[derive(Debug, Serialize)]
struct CorrectRequest {
    lambda: f64,
    gamma: f64,
    correction_type: &'static str,
}

/// Structural-mutation request body.
#[derive(Debug, Serialize)]
struct MutateRequest {
    mutation_type: &'static str,
    fitness_function: &'static str,
}

// ── Client ────────────────────────────────────────────────────────────────

impl GatewayClient {
    /// Create a client for the given base URL with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
            timeout,
        }
    }

    /// Translate free-text intent into a constraint model.
    ///
    /// # Errors
    ///
    /// Returns [`CompilerError::Transport`] on connect/timeout, non-2xx
    /// status, or response parse failure.
    pub async fn translate(&self, text: &str) -> Result<Model, CompilerError> {
        let request = TranslateRequest {
            text,
            mode: "constraint_compilation",
        };

        let response = self
            .client
            .post(format!("{}/nlp-to-constraints", self.base_url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompilerError::Transport(format!("translate request failed: {e}")))?;

        let payload: ModelPayload = Self::parse(response, "translate").await?;
        Ok(payload.into_model())
    }

    /// Fetch the precompiled baseline fitness model.
    ///
    /// # Errors
    ///
    /// Returns [`CompilerError::Transport`] on connect/timeout, non-2xx
    /// status, or response parse failure.
    pub async fn baseline(&self) -> Result<Model, CompilerError> {
        let response = self
            .client
            .get(format!("{}/baseline-model", self.base_url))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| CompilerError::Transport(format!("baseline request failed: {e}")))?;

        let payload: ModelPayload = Self::parse(response, "baseline").await?;
        Ok(payload.into_model())
    }

    /// Submit a model's terms to the external solver.
    ///
    /// # Errors
    ///
    /// Returns [`CompilerError::Transport`] on connect/timeout, non-2xx
    /// status, or response parse failure.
    pub async fn solve(
        &self,
        terms: &[Term],
        params: &SolverParams,
    ) -> Result<Solution, CompilerError> {
        let request = SolveRequest {
            terms: terms.iter().map(TermPayload::from).collect(),
            backend: &params.backend,
            shots: params.shots,
            max_iterations: params.max_iterations,
            ansatz: &params.ansatz,
            optimizer: &params.optimizer,
        };

        let response = self
            .client
            .post(format!("{}/solve", self.base_url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompilerError::Transport(format!("solve request failed: {e}")))?;

        let payload: SolveResponse = Self::parse(response, "solve").await?;
        Ok(Solution {
            bit_state: payload.optimal_state,
            probability: payload.probability,
            energy: payload.energy,
            distribution: payload.measurements,
        })
    }

    /// Fetch the current live quality metrics.
    ///
    /// # Errors
    ///
    /// Returns [`CompilerError::Transport`] on connect/timeout, non-2xx
    /// status, or response parse failure.
    pub async fn metrics(&self) -> Result<QualityReading, CompilerError> {
        let response = self
            .client
            .get(format!("{}/metrics", self.base_url))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| CompilerError::Transport(format!("metrics request failed: {e}")))?;

        Self::parse(response, "metrics").await
    }

    /// Ask the backing service to invert its accumulated error field.
    ///
    /// Best-effort: the response body is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CompilerError::Transport`] on connect/timeout or non-2xx
    /// status. Callers swallow this after logging.
    pub async fn correct(&self, lambda: f64, gamma: f64) -> Result<(), CompilerError> {
        let request = CorrectRequest {
            lambda,
            gamma,
            correction_type: "phase_inversion",
        };

        let response = self
            .client
            .post(format!("{}/correct", self.base_url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompilerError::Transport(format!("correct request failed: {e}")))?;

        Self::check_status(response, "correct").await.map(|_| ())
    }

    /// Ask the backing service to evolve its internal search structure
    /// toward maximizing the combined coherence/integration objective.
    ///
    /// Best-effort: the response body is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CompilerError::Transport`] on connect/timeout or non-2xx
    /// status. Callers swallow this after logging.
    pub async fn mutate(&self) -> Result<(), CompilerError> {
        let request = MutateRequest {
            mutation_type: "structural",
            fitness_function: "maximize_lambda_phi",
        };

        let response = self
            .client
            .post(format!("{}/mutate", self.base_url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompilerError::Transport(format!("mutate request failed: {e}")))?;

        Self::check_status(response, "mutate").await.map(|_| ())
    }

    /// Check status and deserialize the body, mapping failures uniformly.
    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        call: &str,
    ) -> Result<T, CompilerError> {
        let response = Self::check_status(response, call).await?;
        response
            .json()
            .await
            .map_err(|e| CompilerError::Transport(format!("{call}: failed to parse response: {e}")))
    }

    /// Map non-success statuses to transport errors with body context.
    async fn check_status(
        response: reqwest::Response,
        call: &str,
    ) -> Result<reqwest::Response, CompilerError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        Err(CompilerError::Transport(format!(
            "{call}: gateway error {status}: {error_text}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_payload_round_trips_term_fields() {
        let term = Term::new("ZIIZ", -1.5, "coupled constraint");
        let payload = TermPayload::from(&term);
        assert_eq!(payload.operator, "ZIIZ");
        let back = Term::from(payload);
        assert_eq!(back, term);
    }

    #[test]
    fn test_model_payload_clamps_metric_ranges() {
        let payload = ModelPayload {
            terms: vec![],
            energy: 2.0,
            lambda: 1.7,
            phi: 5.0,
            gamma: -0.3,
            w2: 0.02,
        };
        let model = payload.into_model();
        assert!((model.coherence - 1.0).abs() < f64::EPSILON);
        assert!((model.decoherence - 0.0).abs() < f64::EPSILON);
        assert!((model.integration - 5.0).abs() < f64::EPSILON, "phi is unbounded");
    }

    #[test]
    fn test_perfect_reading_is_fully_coherent() {
        let reading = QualityReading::perfect();
        assert!((reading.lambda - 1.0).abs() < f64::EPSILON);
        assert!((reading.gamma - 0.0).abs() < f64::EPSILON);
        assert!((reading.w2 - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_client_strips_trailing_slash_from_base_url() {
        let client = GatewayClient::new("http://localhost:7777/v1/quantum/", Duration::from_secs(1));
        assert_eq!(client.base_url, "http://localhost:7777/v1/quantum");
    }

    #[test]
    fn test_solve_request_serializes_wire_contract() {
        let terms = vec![Term::new("ZI", 1.0, "t")];
        let request = SolveRequest {
            terms: terms.iter().map(TermPayload::from).collect(),
            backend: "ibm_fez",
            shots: 1024,
            max_iterations: 50,
            ansatz: "vqe",
            optimizer: "cobyla",
        };
        let json = serde_json::to_value(&request).unwrap_or_default();
        assert_eq!(json["shots"], 1024);
        assert_eq!(json["max_iterations"], 50);
        assert_eq!(json["backend"], "ibm_fez");
        assert_eq!(json["terms"][0]["operator"], "ZI");
    }
}
