//! Intent translation: free text → weighted constraint model.
//!
//! ## Responsibility
//! Prefer the remote translation service; on any failure fall back to the
//! fixed local pattern table. The fallback is silent by design — callers
//! see provenance through [`Sourced`], never an error.
//!
//! ## Guarantees
//! - Total: any input string (including empty) yields a model with ≥ 1 term.
//! - Deterministic locally: the table is fixed and ordered; matching is a
//!   case-insensitive substring scan and every matching entry contributes.
//!
//! ## NOT Responsible For
//! - Baseline knowledge (that belongs to `baseline`)
//! - Solving (that belongs to `solver`)

use crate::gateway::GatewayClient;
use crate::metrics;
use crate::model::{Model, Sourced, Term, STANDARD_WIDTH};
use std::sync::Arc;
use tracing::debug;

/// The fixed local compilation table, version 1.
///
/// `(trigger substring, operator pattern, coefficient, meaning)` — entries
/// are independent; multiple simultaneous matches are expected and all
/// contribute one term each. Slot indices follow
/// [`SlotLayout::standard`](crate::model::SlotLayout::standard): positive
/// coefficients reward setting the marked bit, negative ones reward
/// clearing it.
const PATTERN_TABLE: &[(&str, &str, f64, &str)] = &[
    ("nda", "ZIIIIIII", 2.0, "non-disclosure agreement required"),
    ("confidential", "ZIIIIIII", 1.5, "confidentiality clause requested"),
    ("net 30", "IZIIIIII", 1.0, "net-30 payment cadence"),
    ("net-30", "IZIIIIII", 1.0, "net-30 payment cadence"),
    ("upfront", "IZIIIIII", -1.2, "upfront payment preferred over net terms"),
    ("gold tier", "IIZIIIII", 2.5, "gold service tier"),
    ("premium", "IIZIIIII", 1.5, "premium tier preference"),
    ("enterprise", "IIIZIIII", 2.0, "enterprise-scale engagement"),
    ("startup", "IIIZIIII", -1.0, "small-scale engagement"),
    ("cloud", "IIIIZIII", 1.0, "cloud deployment target"),
    ("on-prem", "IIIIZIII", -1.5, "on-premises deployment target"),
    ("24/7", "IIIIIZII", 1.8, "round-the-clock enhanced support"),
    ("support", "IIIIIZII", 1.0, "enhanced support requested"),
    ("sla", "IIIZIZII", 0.9, "service level binds scope to support"),
    ("renew", "IIIIIIZI", 0.8, "automatic renewal"),
    ("exclusive", "IIIIIIIZ", 1.2, "exclusivity clause"),
];

/// Compile intent text against the local pattern table.
///
/// Scans the table in order against the lowercased input; every matching
/// trigger contributes one term. Zero matches yield a single identity term
/// so the output always has at least one term of the standard width.
pub fn compile_local(text: &str) -> Model {
    let haystack = text.to_lowercase();
    let terms: Vec<Term> = PATTERN_TABLE
        .iter()
        .filter(|(trigger, _, _, _)| haystack.contains(trigger))
        .map(|&(_, pattern, coefficient, meaning)| Term::new(pattern, coefficient, meaning))
        .collect();

    if terms.is_empty() {
        return Model::local(vec![Term::identity(STANDARD_WIDTH)]);
    }
    Model::local(terms)
}

/// Maps free-text intent to a constraint model, remote-first.
#[derive(Debug, Clone)]
pub struct IntentTranslator {
    gateway: Arc<GatewayClient>,
}

impl IntentTranslator {
    /// Create a translator backed by the given gateway client.
    pub fn new(gateway: Arc<GatewayClient>) -> Self {
        Self { gateway }
    }

    /// Translate intent text into a constraint model.
    ///
    /// Attempts the remote translation service; any transport failure,
    /// timeout, or non-success status degrades silently to
    /// [`compile_local`]. Intent content is never logged — lengths only.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub async fn translate(&self, text: &str) -> Sourced<Model> {
        match self.gateway.translate(text).await {
            Ok(model) => Sourced::Remote(model),
            Err(e) => {
                debug!(
                    target: "compiler::translate",
                    error = %e,
                    text_len = text.len(),
                    "remote translation failed, compiling locally"
                );
                metrics::inc_fallback("translate");
                Sourced::Fallback(compile_local(text))
            }
        }
    }
}
