//! Context and prompt templating for answer composition
//!
//! The model call itself belongs to the client; this module only renders
//! retrieved commits into text.

use crate::types::CommitHit;

/// Instruction block placed ahead of the retrieved history
pub const SYSTEM_INSTRUCTIONS: &str = "You are a helpful Software Archaeologist. \
Based ONLY on the commit history provided below, answer the user's question. \
If the answer is not in the history, say so.";

/// Render hits as numbered commit blocks, in the given order
pub fn render_context(hits: &[CommitHit]) -> String {
    let mut context = String::new();
    for (i, hit) in hits.iter().enumerate() {
        let files = match &hit.files {
            Some(files) if !files.is_empty() => files.join(", "),
            Some(_) => "(none)".to_string(),
            None => "(not recorded)".to_string(),
        };
        context.push_str(&format!(
            "Commit {}:\nAuthor: {} | Date: {}\nFiles: {}\nMessage: {}\n\n",
            i + 1,
            hit.author,
            hit.date,
            files,
            hit.content
        ));
    }
    context
}

/// Full prompt for a question grounded in `context`
pub fn render_prompt(question: &str, context: &str) -> String {
    let context = if context.trim().is_empty() {
        "(no matching commits were found)"
    } else {
        context.trim_end()
    };
    format!(
        "{}\n\n--- COMMIT HISTORY ---\n{}\n\n--- USER QUESTION ---\n{}\n",
        SYSTEM_INSTRUCTIONS,
        context,
        question.trim()
    )
}
