//! Baseline fitness-model loader.
//!
//! Fetches the precompiled baseline model once per compiler lifetime and
//! memoizes the result — including the built-in fallback when the remote
//! fetch fails. There is no invalidation path: a degraded first load stays
//! cached until the owning [`Compiler`](crate::Compiler) is dropped.

use crate::gateway::GatewayClient;
use crate::metrics;
use crate::model::{Model, Sourced, Term};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// The built-in default baseline: generic pre-baked alignment terms used
/// when the remote baseline service is unavailable.
pub fn default_baseline() -> Model {
    Model::local(vec![
        Term::new("ZIIIIIII", 0.5, "accumulated preference for confidentiality"),
        Term::new("IIIIIZII", 0.3, "accumulated preference for enhanced support"),
        Term::new("IIIIIIIZ", -0.4, "historical penalty for exclusivity lock-in"),
    ])
}

/// Loads and memoizes the baseline fitness model.
#[derive(Debug)]
pub struct BaselineLoader {
    gateway: Arc<GatewayClient>,
    cached: OnceCell<Sourced<Model>>,
}

impl BaselineLoader {
    /// Create a loader backed by the given gateway client.
    pub fn new(gateway: Arc<GatewayClient>) -> Self {
        Self {
            gateway,
            cached: OnceCell::new(),
        }
    }

    /// Load the baseline model, memoized for this loader's lifetime.
    ///
    /// The first call attempts the remote fetch; failure degrades silently
    /// to [`default_baseline`]. Whatever the first call produced — remote
    /// answer or fallback — is what every later call returns.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub async fn load(&self) -> Sourced<Model> {
        self.cached
            .get_or_init(|| async {
                match self.gateway.baseline().await {
                    Ok(model) => Sourced::Remote(model),
                    Err(e) => {
                        debug!(
                            target: "compiler::baseline",
                            error = %e,
                            "remote baseline fetch failed, using built-in default"
                        );
                        metrics::inc_fallback("baseline");
                        Sourced::Fallback(default_baseline())
                    }
                }
            })
            .await
            .clone()
    }

    /// Whether a baseline (remote or fallback) has been cached yet.
    pub fn is_loaded(&self) -> bool {
        self.cached.initialized()
    }
}
