//! Importance scoring on the persistence path.
//!
//! [`score_event`] is a pure function over a parsed event; the
//! [`recorder`] submodule wires it in front of the session journal so
//! every persisted event carries a score.

pub mod recorder;

pub use recorder::{EventRecorder, JsonlRecorder, ScoringRecorder};

use crate::core::{ParsedEvent, Role};

/// Neutral starting score before contributions.
pub const BASE_SCORE: i32 = 50;

/// Content length above which the long-content penalty applies.
const LONG_CONTENT_LEN: usize = 2000;

/// Tool names that indicate a file edit (matched case-insensitively).
const FILE_EDIT_TOOLS: &[&str] = &["edit", "write", "notebookedit"];

/// Assigns an importance score in `[0, 100]` to an event.
///
/// Starts at the base score of 50 and applies additive contributions:
/// tool use +15, error +20, user prompt +10, code fence +10, file edit
/// +12, long content −5, system −20, hook −15. Pure and total: equal
/// inputs yield equal scores and nothing can make it fail.
#[must_use]
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub fn score_event(event: &ParsedEvent) -> u8 {
    let mut score = BASE_SCORE;

    if event.has_tool_use() {
        score += 15;
    }
    if event.is_error == Some(true) {
        score += 20;
    }
    if event.role == Some(Role::User) && event.event_type != "tool_result" {
        score += 10;
    }
    if event.content.contains("```") {
        score += 10;
    }
    if event
        .tool_name
        .as_deref()
        .is_some_and(|name| FILE_EDIT_TOOLS.contains(&name.to_ascii_lowercase().as_str()))
    {
        score += 12;
    }
    if event.content.len() > LONG_CONTENT_LEN {
        score -= 5;
    }
    if event.role == Some(Role::System) || event.event_type == "system" {
        score -= 20;
    }
    if event.event_type.starts_with("hook") || event.event_type.starts_with("custom_hook") {
        score -= 15;
    }

    score.clamp(0, 100) as u8
}
