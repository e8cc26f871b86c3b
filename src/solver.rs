//! Solver gateway: external solving with bounded local search fallback.
//!
//! ## Responsibility
//! Submit a combined model to the external solver; on any failure run the
//! bounded local search (100 uniform random bit-strings, keep the lowest
//! energy). Also owns [`evaluate_energy`], the multilinear pseudo-Boolean
//! scoring function both paths are defined against.
//!
//! ## Guarantees
//! - Always returns a solution whose `bit_state` width equals the model's
//!   term width.
//! - `evaluate_energy` is deterministic and total: out-of-range or missing
//!   bits score as cleared.
//! - The fallback's reported probability is a fixed confidence placeholder
//!   (0.95), not a computed value.

use crate::gateway::{GatewayClient, SolverParams};
use crate::metrics;
use crate::model::{Model, Solution, Sourced, NOOP_MARKER};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Fixed confidence reported for locally searched solutions.
///
/// Not probabilistic: the local search has no measurement distribution to
/// derive a probability from, so it reports this placeholder.
pub const FALLBACK_CONFIDENCE: f64 = 0.95;

/// Score a bit-state against a model.
///
/// For each term, every slot the pattern marks contributes a ±1 direction
/// (bit = 1 → −1, bit = 0 → +1; no-op slots contribute a neutral factor of
/// 1); the product across marked slots times the term's coefficient is
/// summed over all terms. Lower is better — the pipeline target is a
/// minimum, not a maximum.
///
/// Total: bits missing from a short `bit_state` score as cleared.
pub fn evaluate_energy(bit_state: &str, model: &Model) -> f64 {
    let bits = bit_state.as_bytes();
    model
        .terms
        .iter()
        .map(|term| {
            let mut direction = 1.0;
            for (i, marker) in term.pattern.bytes().enumerate() {
                if marker == NOOP_MARKER as u8 {
                    continue;
                }
                direction *= if bits.get(i) == Some(&b'1') { -1.0 } else { 1.0 };
            }
            term.coefficient * direction
        })
        .sum()
}

/// Submits models to the external solver, with bounded local fallback.
#[derive(Debug, Clone)]
pub struct SolverGateway {
    gateway: Arc<GatewayClient>,
    params: SolverParams,
    search_samples: usize,
}

impl SolverGateway {
    /// Create a solver gateway with the given tuning parameters and local
    /// search budget.
    pub fn new(gateway: Arc<GatewayClient>, params: SolverParams, search_samples: usize) -> Self {
        Self {
            gateway,
            params,
            search_samples,
        }
    }

    /// Solve the model for its lowest-energy bit assignment.
    ///
    /// Attempts the external solver first; any transport failure, timeout,
    /// or non-success status degrades silently to [`local_search`].
    ///
    /// # Panics
    ///
    /// This function never panics.
    ///
    /// [`local_search`]: Self::local_search
    pub async fn solve(&self, model: &Model) -> Sourced<Solution> {
        match self.gateway.solve(&model.terms, &self.params).await {
            Ok(solution) => Sourced::Remote(solution),
            Err(e) => {
                debug!(
                    target: "compiler::solver",
                    error = %e,
                    term_count = model.terms.len(),
                    "external solve failed, falling back to bounded local search"
                );
                metrics::inc_fallback("solve");
                Sourced::Fallback(self.local_search(model))
            }
        }
    }

    /// Bounded local search: sample uniform random bit-strings of the
    /// model's width and keep the lowest-energy candidate.
    ///
    /// The returned probability is [`FALLBACK_CONFIDENCE`], and the
    /// measurement distribution contains only the winning state.
    pub fn local_search(&self, model: &Model) -> Solution {
        let width = model.width();
        let mut rng = rand::thread_rng();

        let mut best: Option<(String, f64)> = None;
        for _ in 0..self.search_samples {
            let candidate: String = (0..width)
                .map(|_| if rng.gen::<bool>() { '1' } else { '0' })
                .collect();
            let energy = evaluate_energy(&candidate, model);
            if best.as_ref().map_or(true, |(_, e)| energy < *e) {
                best = Some((candidate, energy));
            }
        }

        // A zero sample budget degrades to the cleared state.
        let (best_state, best_energy) = match best {
            Some(found) => found,
            None => {
                let cleared = "0".repeat(width);
                let energy = evaluate_energy(&cleared, model);
                (cleared, energy)
            }
        };

        let mut distribution = HashMap::new();
        distribution.insert(best_state.clone(), FALLBACK_CONFIDENCE);

        Solution {
            bit_state: best_state,
            probability: FALLBACK_CONFIDENCE,
            energy: best_energy,
            distribution,
        }
    }
}
