//! Core data types for the constraint-compilation pipeline.
//!
//! ## Responsibility
//! Immutable value types — weighted constraint [`Term`]s, the aggregate
//! [`Model`], candidate [`Solution`]s, the named [`SlotLayout`], and the
//! [`Sourced`] provenance wrapper — plus the model-combination rules.
//!
//! ## Guarantees
//! - A [`Model`] is never mutated after construction; combination always
//!   yields a new value.
//! - `coherence` and `decoherence` are clamped to `[0, 1]` at every
//!   construction site; `integration` is deliberately unbounded.
//! - Combination is total: mismatched term widths are padded with the no-op
//!   marker instead of raising.
//!
//! ## NOT Responsible For
//! - Scoring bit-states against a model (that belongs to `solver`)
//! - Rendering a solution for humans (that belongs to `collapse`)

use std::collections::HashMap;

/// Character marking a binary decision slot in an operator pattern.
pub const SLOT_MARKER: char = 'Z';

/// Character marking an ignored slot in an operator pattern.
pub const NOOP_MARKER: char = 'I';

/// Fixed integration baseline constant (Λφ, s⁻¹).
///
/// Carried through the pipeline as the `integration` metric of locally
/// compiled models and emitted as `phi` in telemetry. Not used in any
/// threshold comparison.
pub const INTEGRATION_BASELINE: f64 = 2.176435e-8;

/// Clamp a metric into `[0, 1]`, mapping NaN to the lower bound.
pub(crate) fn clamp01(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

// ── Term ──────────────────────────────────────────────────────────────────

/// One weighted constraint over a fixed-width string of decision slots.
///
/// `pattern` is a string over `{Z, I}` where each position corresponds to
/// one binary decision slot; `Z` means the term reads that slot, `I` means
/// the term ignores it. `coefficient` is a signed real — sign and magnitude
/// encode reward vs penalty strength, not probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    /// Operator pattern over the decision slots.
    pub pattern: String,
    /// Signed constraint weight (reward vs penalty strength).
    pub coefficient: f64,
    /// Human-readable description of the constraint.
    pub meaning: String,
}

impl Term {
    /// Create a new term.
    pub fn new(pattern: impl Into<String>, coefficient: f64, meaning: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            coefficient,
            meaning: meaning.into(),
        }
    }

    /// The identity term: all no-op markers, zero weight.
    ///
    /// Emitted when local compilation matches nothing, so every compiled
    /// model has at least one term.
    pub fn identity(width: usize) -> Self {
        Self {
            pattern: NOOP_MARKER.to_string().repeat(width),
            coefficient: 0.0,
            meaning: "no constraints".to_string(),
        }
    }

    /// Number of decision slots this term spans.
    pub fn width(&self) -> usize {
        self.pattern.len()
    }

    /// Whether the term reads the slot at `index`.
    pub fn reads_slot(&self, index: usize) -> bool {
        self.pattern
            .as_bytes()
            .get(index)
            .is_some_and(|&b| b != NOOP_MARKER as u8)
    }
}

// ── SlotLayout ────────────────────────────────────────────────────────────

/// One named decision slot: a stable name, a human label, and the bit index
/// it occupies in solution bit-states.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    /// Stable machine name (e.g. `"confidentiality"`).
    pub name: &'static str,
    /// Human-readable label used in collapsed artifacts.
    pub label: &'static str,
    /// Bit index in the solution bit-state.
    pub index: usize,
}

/// Explicit mapping from named boolean decisions to bit indices.
///
/// Carried alongside every [`Model`] so downstream consumers (notably the
/// artifact collapser) never rely on implicit positional coupling to
/// whatever term layout happened to be compiled upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotLayout {
    slots: Vec<Slot>,
}

/// Number of decision slots in the standard layout.
pub const STANDARD_WIDTH: usize = 8;

impl SlotLayout {
    /// The standard eight-slot decision layout, version 1.
    ///
    /// This table is the published contract between the local pattern table
    /// and the artifact collapser; changing slot order is a breaking change.
    pub fn standard() -> Self {
        Self {
            slots: vec![
                Slot {
                    name: "confidentiality",
                    label: "confidentiality clause (NDA)",
                    index: 0,
                },
                Slot {
                    name: "net_30_billing",
                    label: "net-30 payment cadence",
                    index: 1,
                },
                Slot {
                    name: "gold_tier",
                    label: "gold service tier",
                    index: 2,
                },
                Slot {
                    name: "enterprise_scope",
                    label: "enterprise-scale engagement",
                    index: 3,
                },
                Slot {
                    name: "cloud_deployment",
                    label: "cloud deployment target",
                    index: 4,
                },
                Slot {
                    name: "enhanced_support",
                    label: "enhanced 24/7 support",
                    index: 5,
                },
                Slot {
                    name: "auto_renewal",
                    label: "automatic renewal",
                    index: 6,
                },
                Slot {
                    name: "exclusivity",
                    label: "exclusivity clause",
                    index: 7,
                },
            ],
        }
    }

    /// Iterate the slots in fixed rendering order.
    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    /// Look up the bit index of a named decision.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.slots.iter().find(|s| s.name == name).map(|s| s.index)
    }

    /// Number of named decisions in this layout.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the layout carries no named decisions.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for SlotLayout {
    fn default() -> Self {
        Self::standard()
    }
}

// ── Model ─────────────────────────────────────────────────────────────────

/// A multiset of weighted constraint terms plus aggregate quality metrics.
///
/// Immutable once produced; [`Model::combine`] always yields a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Constraint terms. Duplicate operator patterns are allowed — later
    /// stages tolerate overlapping patterns.
    pub terms: Vec<Term>,
    /// Accumulated energy offset.
    pub energy: f64,
    /// Coherence λ in `[0, 1]`.
    pub coherence: f64,
    /// Integration φ — unbounded, carries a physical-style unit (s⁻¹).
    pub integration: f64,
    /// Decoherence γ in `[0, 1]`.
    pub decoherence: f64,
    /// Drift (w2) distance-from-ideal metric.
    pub drift: f64,
    /// Named decision layout this model's slots follow.
    pub layout: SlotLayout,
}

impl Model {
    /// Build a locally compiled model around `terms`.
    ///
    /// Local compilation carries no measured physical state: energy 0,
    /// coherence 1.0, decoherence 0, drift 0, integration at the fixed
    /// baseline constant.
    pub fn local(terms: Vec<Term>) -> Self {
        Self {
            terms,
            energy: 0.0,
            coherence: 1.0,
            integration: INTEGRATION_BASELINE,
            decoherence: 0.0,
            drift: 0.0,
            layout: SlotLayout::standard(),
        }
    }

    /// Width (slot count) of this model's terms.
    ///
    /// All terms within one model share the same width by invariant; this
    /// returns the maximum so a violated invariant degrades instead of
    /// misindexing.
    pub fn width(&self) -> usize {
        self.terms.iter().map(Term::width).max().unwrap_or(0)
    }

    /// Combine two models into a new one.
    ///
    /// Terms are concatenated as a multiset union (no dedup). Metrics
    /// aggregate as: energy sum, coherence min, decoherence max,
    /// integration and drift arithmetic mean. Commutative for exactly two
    /// inputs; for N-way combination use [`Model::combine_all`], which
    /// carries a running count so the averages stay order-independent.
    ///
    /// Mismatched term widths are guarded, not raised: shorter patterns are
    /// padded with the no-op marker to the wider width.
    pub fn combine(&self, other: &Model) -> Model {
        let width = self.width().max(other.width());
        let mut terms = Vec::with_capacity(self.terms.len() + other.terms.len());
        for term in self.terms.iter().chain(other.terms.iter()) {
            terms.push(pad_term(term, width));
        }

        let layout = if self.layout.is_empty() {
            other.layout.clone()
        } else {
            self.layout.clone()
        };

        Model {
            terms,
            energy: self.energy + other.energy,
            coherence: clamp01(self.coherence.min(other.coherence)),
            integration: (self.integration + other.integration) / 2.0,
            decoherence: clamp01(self.decoherence.max(other.decoherence)),
            drift: (self.drift + other.drift) / 2.0,
            layout,
        }
    }

    /// Combine any number of models with an explicit left fold.
    ///
    /// `min`/`max`/`sum` are associative, so only `integration` and `drift`
    /// need care: they are folded as count-weighted running averages, which
    /// makes the result independent of input order. Returns `None` for an
    /// empty input.
    pub fn combine_all<'a, I>(models: I) -> Option<Model>
    where
        I: IntoIterator<Item = &'a Model>,
    {
        let mut iter = models.into_iter();
        let first = iter.next()?;
        let mut acc = first.clone();
        let mut count = 1usize;

        for model in iter {
            let width = acc.width().max(model.width());
            let mut terms = Vec::with_capacity(acc.terms.len() + model.terms.len());
            for term in acc.terms.iter().chain(model.terms.iter()) {
                terms.push(pad_term(term, width));
            }
            let n = count as f64;
            acc = Model {
                terms,
                energy: acc.energy + model.energy,
                coherence: clamp01(acc.coherence.min(model.coherence)),
                integration: (acc.integration * n + model.integration) / (n + 1.0),
                decoherence: clamp01(acc.decoherence.max(model.decoherence)),
                drift: (acc.drift * n + model.drift) / (n + 1.0),
                layout: if acc.layout.is_empty() {
                    model.layout.clone()
                } else {
                    acc.layout
                },
            };
            count += 1;
        }

        Some(acc)
    }
}

/// Pad a term's pattern with no-op markers up to `width`.
fn pad_term(term: &Term, width: usize) -> Term {
    if term.pattern.len() >= width {
        return term.clone();
    }
    let mut pattern = term.pattern.clone();
    while pattern.len() < width {
        pattern.push(NOOP_MARKER);
    }
    Term {
        pattern,
        coefficient: term.coefficient,
        meaning: term.meaning.clone(),
    }
}

// ── Solution ──────────────────────────────────────────────────────────────

/// One candidate bit-assignment with its reported quality.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Binary decision string, same width as the terms it was evaluated
    /// against.
    pub bit_state: String,
    /// Reported probability in `(0, 1]`. For locally searched solutions
    /// this is a fixed confidence placeholder, not a computed value.
    pub probability: f64,
    /// Energy of the bit-state under the solved model (lower is better).
    pub energy: f64,
    /// Measurement distribution: bit-state → probability.
    pub distribution: HashMap<String, f64>,
}

// ── Sourced ───────────────────────────────────────────────────────────────

/// Where a pipeline stage's answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The remote service answered.
    Remote,
    /// The remote call failed and the documented local fallback was used.
    Fallback,
}

/// A value tagged with its provenance.
///
/// The silent-fallback policy means transport failures never surface as
/// errors — but callers and tests still need to distinguish a real remote
/// answer from a degraded local one.
#[derive(Debug, Clone, PartialEq)]
pub enum Sourced<T> {
    /// The remote service produced this value.
    Remote(T),
    /// A local fallback produced this value.
    Fallback(T),
}

impl<T> Sourced<T> {
    /// Borrow the inner value regardless of provenance.
    pub fn get(&self) -> &T {
        match self {
            Sourced::Remote(v) | Sourced::Fallback(v) => v,
        }
    }

    /// Consume the wrapper, discarding provenance.
    pub fn into_inner(self) -> T {
        match self {
            Sourced::Remote(v) | Sourced::Fallback(v) => v,
        }
    }

    /// The provenance tag.
    pub fn source(&self) -> Source {
        match self {
            Sourced::Remote(_) => Source::Remote,
            Sourced::Fallback(_) => Source::Fallback,
        }
    }

    /// Whether this value came from a local fallback.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Sourced::Fallback(_))
    }
}
