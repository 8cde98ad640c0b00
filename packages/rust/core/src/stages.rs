//! The five stage functions: search, curate, write, critique, revise.
//!
//! Every stage takes the current [`PipelineState`] by reference and returns a
//! new one. None of them retry or loop; sequencing belongs to
//! [`crate::pipeline`].

use std::collections::HashSet;

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use draftsmith_generation::GenerationClient;
use draftsmith_retrieval::RetrievalClient;
use draftsmith_shared::{Document, DraftsmithError, PipelineConfig, PipelineState, Result};

use crate::prompts::{self, DONE_SENTINEL};

/// Date string embedded in prompts (`dd/mm/yyyy`).
fn today() -> String {
    chrono::Local::now().format("%d/%m/%Y").to_string()
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Turn a caller topic into a valid retrieval query.
///
/// Topics shorter than `min_len` characters are prefixed so the retrieval
/// service accepts them; longer topics pass through trimmed.
pub fn normalize_topic(topic: &str, min_len: usize, prefix: &str) -> Result<String> {
    let trimmed = topic.trim();
    if trimmed.is_empty() {
        return Err(DraftsmithError::invalid_topic("topic is empty"));
    }
    if trimmed.chars().count() < min_len {
        Ok(format!("{prefix}{trimmed}"))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Retrieve the top-K documents for the topic.
#[instrument(skip_all, fields(topic = %state.topic))]
pub async fn search(
    state: &PipelineState,
    retrieval: &RetrievalClient,
    config: &PipelineConfig,
) -> Result<PipelineState> {
    let query = normalize_topic(&state.topic, config.min_topic_len, &config.topic_prefix)?;

    let docs = retrieval.retrieve(&query, config.top_k).await?;
    let docs = dedup_by_source(docs);

    if docs.is_empty() {
        return Err(DraftsmithError::retrieval(format!(
            "no documents found for query '{query}'"
        )));
    }

    info!(%query, documents = docs.len(), "search complete");
    Ok(state.with_search_results(docs))
}

/// Keep the first document for every source URL.
fn dedup_by_source(docs: Vec<Document>) -> Vec<Document> {
    let mut seen = HashSet::new();
    docs.into_iter()
        .filter(|d| seen.insert(d.source.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Curate
// ---------------------------------------------------------------------------

/// JSON schema the curator must answer with.
#[derive(Debug, Deserialize)]
pub struct CurationResponse {
    pub urls: Vec<String>,
}

/// Narrow the search results to the sources the curator picked.
#[instrument(skip_all, fields(topic = %state.topic))]
pub async fn curate(
    state: &PipelineState,
    generation: &GenerationClient,
    config: &PipelineConfig,
) -> Result<PipelineState> {
    let docs = state
        .search_results
        .as_deref()
        .ok_or_else(|| DraftsmithError::invalid_state("curate requires search results"))?;

    let messages = prompts::curate(&state.topic, docs, config.curate_count, &today());
    let response: CurationResponse = generation.generate_json(messages).await?;

    let curated = select_sources(docs, &response.urls, config.curate_count);

    if curated.len() < config.curate_count.min(docs.len()) {
        warn!(
            requested = config.curate_count,
            returned = response.urls.len(),
            matched = curated.len(),
            "curator picked fewer usable sources than requested"
        );
    }
    info!(kept = curated.len(), of = docs.len(), "curation complete");

    Ok(state.with_search_results(curated))
}

/// Filter `docs` to those whose source is among the first `limit` distinct
/// `urls`. Unknown URLs are dropped; the original order is kept.
fn select_sources(docs: &[Document], urls: &[String], limit: usize) -> Vec<Document> {
    let mut picked: Vec<&str> = Vec::with_capacity(limit);
    for url in urls {
        let url = url.trim();
        if picked.len() == limit {
            break;
        }
        if !picked.contains(&url) {
            picked.push(url);
        }
    }

    for url in &picked {
        if !docs.iter().any(|d| d.source == *url) {
            debug!(url, "curator returned a URL not in the search results");
        }
    }

    docs.iter()
        .filter(|d| picked.contains(&d.source.as_str()))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Write
// ---------------------------------------------------------------------------

/// Produce the first draft from the curated sources.
#[instrument(skip_all, fields(topic = %state.topic))]
pub async fn write(
    state: &PipelineState,
    generation: &GenerationClient,
    config: &PipelineConfig,
) -> Result<PipelineState> {
    let docs = state
        .search_results
        .as_deref()
        .ok_or_else(|| DraftsmithError::invalid_state("write requires curated search results"))?;

    let messages = prompts::write(&state.topic, docs, config.max_source_chars, &today());
    let article = generation.generate_text(messages).await?;

    info!(article_len = article.len(), sources = docs.len(), "draft written");
    Ok(state.with_article(article))
}

// ---------------------------------------------------------------------------
// Critique
// ---------------------------------------------------------------------------

/// Interpret the critic's reply. `None` means accept.
///
/// Anything that does not contain the sentinel is a critique, so an odd
/// reply keeps the loop going rather than ending it early.
pub fn parse_verdict(response: &str) -> Option<String> {
    if response.contains(DONE_SENTINEL) {
        None
    } else {
        Some(response.trim().to_string())
    }
}

/// Ask the critic to accept the article or say what to fix.
#[instrument(skip_all, fields(topic = %state.topic))]
pub async fn critique(state: &PipelineState, generation: &GenerationClient) -> Result<PipelineState> {
    let article = state
        .article
        .as_deref()
        .ok_or_else(|| DraftsmithError::invalid_state("critique requires an article"))?;

    let messages = prompts::critique(
        article,
        state.critique.as_deref(),
        state.critic_note.as_deref(),
        &today(),
    );
    let response = generation.generate_text(messages).await?;
    let verdict = parse_verdict(&response);

    match &verdict {
        Some(critique) => info!(critique = %critique, "critic requested changes"),
        None => info!("critic accepted the article"),
    }
    Ok(state.with_critique(verdict))
}

// ---------------------------------------------------------------------------
// Revise
// ---------------------------------------------------------------------------

/// Edit the article according to the current critique.
#[instrument(skip_all, fields(topic = %state.topic))]
pub async fn revise(state: &PipelineState, generation: &GenerationClient) -> Result<PipelineState> {
    let article = state
        .article
        .as_deref()
        .ok_or_else(|| DraftsmithError::invalid_state("revise requires an article"))?;
    let critique = state
        .critique
        .as_deref()
        .ok_or_else(|| DraftsmithError::invalid_state("revise requires a critique"))?;

    let raw = generation.generate_text(prompts::revise(article, critique)).await?;
    let revised = draftsmith_markdown::decode_revision(&raw);
    if revised.edited_article.is_empty() {
        return Err(DraftsmithError::generation(
            "revision contained only feedback for the critic, no article",
        ));
    }

    info!(
        article_len = revised.edited_article.len(),
        has_note = revised.note_to_critic.is_some(),
        "article revised"
    );
    Ok(state.with_revision(revised))
}
