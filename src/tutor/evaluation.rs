//! Evaluation sentinel extraction.
//!
//! Scaffolding-stage prompts instruct the model to end every reply with
//! exactly one line of the form `@Evaluation: PASS` or `@Evaluation: FAIL`.
//! The model is instructed, not constrained, so the sentinel may be absent
//! or mangled; a missing sentinel is always treated as FAIL by the caller
//! (fail-closed) so a formatting hiccup can never silently advance a
//! student.

use serde::{Deserialize, Serialize};

/// Marker the model must emit ahead of its verdict. Matched case-sensitively,
/// space included.
pub const EVALUATION_SENTINEL: &str = "@Evaluation: ";

/// Binary stage-evaluation verdict parsed from model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Evaluation {
    /// The student met the current stage's bar.
    Pass,
    /// The student has not yet met the bar.
    Fail,
}

impl Evaluation {
    /// Whether the verdict permits a stage advance.
    pub fn passed(&self) -> bool {
        matches!(self, Evaluation::Pass)
    }
}

/// Extract the evaluation verdict from raw completion text.
///
/// Scans for the first `@Evaluation: ` occurrence anywhere in the text
/// (conventionally the final line) and reads the verdict immediately after
/// it. Returns `None` when the sentinel is absent or malformed; callers must
/// treat `None` as FAIL.
pub fn extract_evaluation(completion: &str) -> Option<Evaluation> {
    let start = completion.find(EVALUATION_SENTINEL)? + EVALUATION_SENTINEL.len();
    let rest = &completion[start..];

    if rest.starts_with("PASS") {
        Some(Evaluation::Pass)
    } else if rest.starts_with("FAIL") {
        Some(Evaluation::Fail)
    } else {
        None
    }
}
