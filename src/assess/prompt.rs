//! Assessment prompt builders.
//!
//! Both prompt variants render the chunk as a role- and tool-labelled
//! event dump and close with a literal JSON schema the provider must
//! answer with. The question-aware variant injects the user question and
//! swaps the rubric axes.

use std::fmt::Write;

use unicode_segmentation::UnicodeSegmentation;

use crate::core::{Chunk, Role};

/// Maximum graphemes of one event's content included in the dump.
const MAX_EVENT_GRAPHEMES: usize = 2000;

/// Builds the generic rating prompt for a chunk.
#[must_use]
pub fn build_generic_prompt(chunk: &Chunk) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are rating a fragment of a coding-assistant conversation for how much \
         durable project knowledge it carries.\n\n",
    );
    push_event_dump(&mut prompt, chunk);
    prompt.push_str(
        "\nRate the conversation fragment on three axes, each 1-10:\n\
         - relevance: how relevant is this to ongoing project work?\n\
         - signalDensity: how much concrete, non-filler information per line?\n\
         - reusability: how useful would this be in a future session on the same project?\n\n",
    );
    push_schema_instruction(
        &mut prompt,
        r#"{"relevance": <1-10>, "signalDensity": <1-10>, "reusability": <1-10>, "overallScore": <1-10>, "rationale": "<one sentence>"}"#,
    );
    prompt
}

/// Builds the question-aware rating prompt for a chunk.
#[must_use]
pub fn build_question_prompt(chunk: &Chunk, question: &str) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are rating a fragment of a coding-assistant conversation for how much \
         it helps answer this question:\n\nQUESTION: {question}\n",
    );
    push_event_dump(&mut prompt, chunk);
    prompt.push_str(
        "\nRate the conversation fragment on three axes, each 1-10:\n\
         - questionRelevance: how directly does this address the question?\n\
         - signalDensity: how much concrete, non-filler information per line?\n\
         - contextValue: how much useful background does it add even if not a direct answer?\n\n",
    );
    push_schema_instruction(
        &mut prompt,
        r#"{"questionRelevance": <1-10>, "signalDensity": <1-10>, "contextValue": <1-10>, "overallScore": <1-10>, "rationale": "<one sentence>"}"#,
    );
    prompt
}

fn push_event_dump(prompt: &mut String, chunk: &Chunk) {
    let _ = writeln!(
        prompt,
        "CONVERSATION FRAGMENT ({} events, ~{} tokens):",
        chunk.events.len(),
        chunk.token_estimate
    );
    for event in &chunk.events {
        prompt.push_str("---\n");
        let label = match event.role {
            Some(Role::User) => "USER",
            Some(Role::Assistant) => "ASSISTANT",
            Some(Role::System) => "SYSTEM",
            Some(Role::Tool) => "TOOL",
            None => "EVENT",
        };
        match &event.tool_name {
            Some(tool) => {
                let _ = writeln!(prompt, "[{label}:{tool}]");
            }
            None => {
                let _ = writeln!(prompt, "[{label}]");
            }
        }
        prompt.push_str(&truncate_graphemes(&event.content, MAX_EVENT_GRAPHEMES));
        prompt.push('\n');
        if let Some(output) = &event.tool_output
            && output != &event.content
        {
            let _ = writeln!(
                prompt,
                "[OUTPUT] {}",
                truncate_graphemes(output, MAX_EVENT_GRAPHEMES)
            );
        }
    }
    prompt.push_str("---\n");
}

fn push_schema_instruction(prompt: &mut String, schema: &str) {
    let _ = writeln!(
        prompt,
        "Respond with a single JSON object and nothing else:\n{schema}"
    );
}

/// Truncates at a grapheme boundary so multi-byte text never splits.
fn truncate_graphemes(text: &str, max: usize) -> String {
    let mut graphemes = text.grapheme_indices(true);
    match graphemes.nth(max) {
        Some((byte_index, _)) => format!("{}…", &text[..byte_index]),
        None => text.to_string(),
    }
}
