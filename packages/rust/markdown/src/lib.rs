//! Article text handling at the generation boundary.
//!
//! The reviser may leave a note for the critic between `<FEEDBACK>` tags.
//! [`decode_revision`] splits that note out of the raw completion exactly once,
//! so nothing downstream ever parses the tags again. [`finalize_article`]
//! prepares an article for delivery to the caller.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use draftsmith_shared::RevisedArticle;

/// Opening tag of a note addressed to the critic.
pub const FEEDBACK_OPEN: &str = "<FEEDBACK>";

/// Closing tag of a note addressed to the critic.
pub const FEEDBACK_CLOSE: &str = "</FEEDBACK>";

/// Matches a feedback block. An unclosed block runs to the end of the text.
static FEEDBACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<FEEDBACK>(.*?)(?:</FEEDBACK>|\z)").expect("valid regex")
});

/// Split a raw reviser completion into the edited article and its note.
///
/// Multiple feedback blocks are joined with blank lines. Empty blocks yield no
/// note.
pub fn decode_revision(raw: &str) -> RevisedArticle {
    let notes: Vec<&str> = FEEDBACK_RE
        .captures_iter(raw)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|note| !note.is_empty())
        .collect();

    let note_to_critic = if notes.is_empty() {
        None
    } else {
        Some(notes.join("\n\n"))
    };

    let edited_article = finalize_article(raw);

    debug!(
        article_len = edited_article.len(),
        has_note = note_to_critic.is_some(),
        "decoded revision"
    );

    RevisedArticle {
        edited_article,
        note_to_critic,
    }
}

/// Remove every feedback block from `text`, leaving the rest untouched.
pub fn strip_feedback(text: &str) -> String {
    FEEDBACK_RE.replace_all(text, "").into_owned()
}

/// Produce the deliverable form of an article: feedback blocks removed and
/// surrounding whitespace trimmed. Everything else is kept byte for byte.
pub fn finalize_article(article: &str) -> String {
    strip_feedback(article).trim().to_string()
}
