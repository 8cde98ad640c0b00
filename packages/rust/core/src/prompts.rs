//! Prompt construction for each stage.
//!
//! Builders are pure: the date and every state field they need are passed
//! in, so prompts can be asserted on directly.

use serde::Serialize;

use draftsmith_markdown::{FEEDBACK_CLOSE, FEEDBACK_OPEN};
use draftsmith_shared::{Document, Message};

/// Literal the critic returns when no further revision is warranted.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Per-document content budget in the curation prompt. The curator only
/// needs enough text to judge relevance.
const CURATE_PREVIEW_CHARS: usize = 1_500;

/// Collapse runs of whitespace so multi-line literals read as one paragraph.
fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate `content` to at most `max_chars` characters, marking the cut.
pub(crate) fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        None => content.to_string(),
        Some((idx, _)) => {
            let truncated = &content[..idx];
            format!("{truncated}\n\n[... content truncated for context window ...]")
        }
    }
}

#[derive(Serialize)]
struct SourceView<'a> {
    source: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    content: String,
}

fn render_sources(docs: &[Document], max_chars: usize) -> String {
    let views: Vec<SourceView<'_>> = docs
        .iter()
        .map(|d| SourceView {
            source: &d.source,
            title: d.title.as_deref(),
            content: truncate_content(&d.content, max_chars),
        })
        .collect();
    // Serializing borrowed strings into a Vec cannot fail.
    serde_json::to_string(&views).unwrap_or_default()
}

/// Editor prompt asking for the most relevant source URLs as JSON.
pub fn curate(topic: &str, docs: &[Document], count: usize, today: &str) -> Vec<Message> {
    vec![
        Message::system(squash(&format!(
            r#"You are a personal newspaper editor.
            Your sole task is to return a list of URLs of the {count} most relevant articles
            for the provided topic or query as a JSON list of strings in this format:
            {{"urls": ["url1", "url2", "url3", "url4", "url5"]}}
            Only return URLs that appear in the list of articles."#
        ))),
        Message::user(format!(
            "Today's date is {today}.\nTopic or Query: {topic}\n\nHere is a list of articles:\n{}",
            render_sources(docs, CURATE_PREVIEW_CHARS)
        )),
    ]
}

/// Writer prompt producing the first draft.
pub fn write(topic: &str, docs: &[Document], max_source_chars: usize, today: &str) -> Vec<Message> {
    vec![
        Message::system(squash(
            "You are a personal newspaper writer. Your sole purpose is to write a
            well-written article about a topic using a list of articles.
            Write 5 paragraphs in markdown.",
        )),
        Message::user(format!(
            "Today's date is {today}.\n\
             Your task is to write a critically acclaimed article for me about the provided \
             query or topic based on the sources.\n\
             Here is a list of articles: {}\n\
             This is the topic: {topic}\n\
             Please return a well-written article based on the provided information.",
            render_sources(docs, max_source_chars)
        )),
    ]
}

/// Critic prompt. `previous` is the critique the article was revised
/// against; `note` is what the reviser left for the critic.
pub fn critique(article: &str, previous: Option<&str>, note: Option<&str>, today: &str) -> Vec<Message> {
    let mut context = String::new();
    if let Some(previous) = previous {
        context.push_str(&format!(
            "The writer has revised the article based on your previous critique: {previous}\n"
        ));
        if let Some(note) = note {
            context.push_str(&format!(
                "The writer left this feedback for you. It is only for you to see and is \
                 not part of the article: {note}\n"
            ));
        }
        context.push('\n');
    }

    vec![
        Message::system(squash(&format!(
            "You are a personal newspaper writing critique. Your sole purpose is to provide
            short feedback on a written article so the writer will know what to fix.
            Today's date is {today}.
            Your task is to provide a really short feedback on the article only if necessary.
            If you think the article is good, please return {DONE_SENTINEL}.
            You can provide feedback on the revised article or just return {DONE_SENTINEL}
            if you think the article is good.
            Please return a string of your critique or {DONE_SENTINEL}."
        ))),
        Message::user(format!("{context}This is the article: {article}")),
    ]
}

/// Editor prompt applying a critique to the article.
pub fn revise(article: &str, critique: &str) -> Vec<Message> {
    vec![
        Message::system(squash(
            "You are a personal newspaper editor. Your sole purpose is to edit a
            well-written article about a topic based on given critique.",
        )),
        Message::user(format!(
            "Your task is to edit the article based on the critique given.\n\
             This is the article: {article}\n\
             This is the critique: {critique}\n\
             Please return the edited article based on the critique given.\n\
             You may leave feedback about the critique encoded between {FEEDBACK_OPEN} tags \
             like this: {FEEDBACK_OPEN} here goes the feedback ...{FEEDBACK_CLOSE}"
        )),
    ]
}
