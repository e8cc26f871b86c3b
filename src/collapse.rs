//! Artifact collapsing: solution bit-state → human-readable summary.
//!
//! A pure, total function of its inputs — no I/O, no failure mode. Bit
//! positions are resolved through the explicit [`SlotLayout`] carried with
//! the model that produced the solution, so the rendering can never
//! silently misinterpret bits against a different term layout.

use crate::model::{SlotLayout, Solution};
use std::fmt::Write;

/// Render a solution as a fixed-order bulleted decision summary.
///
/// Each named slot in the layout becomes one bullet; a set bit reads as
/// "included", a cleared (or missing — short bit-states are guarded) bit
/// as "omitted". The solution's reported probability and energy close the
/// summary.
pub fn collapse(solution: &Solution, intent: &str, layout: &SlotLayout) -> String {
    let bits = solution.bit_state.as_bytes();
    let mut out = String::new();

    // Writing to a String cannot fail; errors are ignored by contract.
    let _ = writeln!(out, "Decision summary");
    let _ = writeln!(out, "  intent: {intent}");
    for slot in layout.iter() {
        let included = bits.get(slot.index) == Some(&b'1');
        let _ = writeln!(
            out,
            "  - {}: {}",
            slot.label,
            if included { "included" } else { "omitted" }
        );
    }
    let _ = writeln!(out, "  - confidence: {:.4}", solution.probability);
    let _ = write!(out, "  - energy: {:.4}", solution.energy);

    out
}
