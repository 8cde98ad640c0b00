//! Core domain types for a Draftsmith run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A single retrieved source. `source` is the unique key within a result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Source URL.
    pub source: String,
    /// Content body extracted by the retrieval service.
    pub content: String,
    /// Page title, when the retrieval service reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Relevance score, when the retrieval service reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Document {
    /// Create a document with only source and content.
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
            title: None,
            score: None,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// The record threaded through every stage of one run.
///
/// Stages never mutate a state in place; each derives a new value with the
/// `with_*` helpers below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    /// Topic as given by the caller. Set once at run start.
    pub topic: String,
    /// Retrieved documents; narrowed by curation. `None` before search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_results: Option<Vec<Document>>,
    /// Current draft. `None` until the write stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article: Option<String>,
    /// Latest critique. `None` means the critic accepts the article.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critique: Option<String>,
    /// Note from the reviser to the critic. Never part of the article.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critic_note: Option<String>,
}

impl PipelineState {
    /// Initial state: only the topic is populated.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Default::default()
        }
    }

    pub fn with_search_results(&self, docs: Vec<Document>) -> Self {
        Self {
            search_results: Some(docs),
            ..self.clone()
        }
    }

    pub fn with_article(&self, article: String) -> Self {
        Self {
            article: Some(article),
            ..self.clone()
        }
    }

    /// Record the critic's verdict and consume any pending note.
    pub fn with_critique(&self, critique: Option<String>) -> Self {
        Self {
            critique,
            critic_note: None,
            ..self.clone()
        }
    }

    /// Replace the article with a revision and stash the reviser's note.
    pub fn with_revision(&self, revised: RevisedArticle) -> Self {
        Self {
            article: Some(revised.edited_article),
            critic_note: revised.note_to_critic,
            ..self.clone()
        }
    }
}

/// Reviser output, decoded once at the generation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisedArticle {
    /// The edited article with any note removed.
    pub edited_article: String,
    /// Note addressed to the critic only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_to_critic: Option<String>,
}

// ---------------------------------------------------------------------------
// Generation request types
// ---------------------------------------------------------------------------

/// Role of a message in a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single prompt message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Response mode requested from the generation service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

/// Sampling options for one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub response_format: ResponseFormat,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            response_format: ResponseFormat::Text,
        }
    }
}

/// An ordered prompt plus its options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub messages: Vec<Message>,
    pub options: GenerationOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let s = id.to_string();
        let parsed: RunId = s.parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn state_updates_leave_original_untouched() {
        let initial = PipelineState::new("rust async");
        let searched = initial.with_search_results(vec![Document::new("https://a", "a")]);
        let written = searched.with_article("draft".into());

        assert!(initial.search_results.is_none());
        assert!(searched.article.is_none());
        assert_eq!(written.article.as_deref(), Some("draft"));
        assert_eq!(written.search_results.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn critique_consumes_critic_note() {
        let state = PipelineState::new("topic")
            .with_article("draft".into())
            .with_revision(RevisedArticle {
                edited_article: "better draft".into(),
                note_to_critic: Some("kept the intro on purpose".into()),
            });
        assert_eq!(state.critic_note.as_deref(), Some("kept the intro on purpose"));

        let critiqued = state.with_critique(Some("shorten the ending".into()));
        assert!(critiqued.critic_note.is_none());
        assert_eq!(critiqued.article.as_deref(), Some("better draft"));
    }

    #[test]
    fn message_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::system("be brief")).expect("serialize");
        assert!(json.contains(r#""role":"system""#));
    }

    #[test]
    fn document_skips_missing_metadata() {
        let json = serde_json::to_string(&Document::new("https://a", "body")).expect("serialize");
        assert!(!json.contains("title"));
        assert!(!json.contains("score"));
    }
}
