//! In-memory collaborators for stage and pipeline tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use draftsmith_generation::{GenerationClient, Generator};
use draftsmith_retrieval::{RetrievalClient, Retriever};
use draftsmith_shared::{
    Document, DraftsmithError, GenerationConfig, GenerationRequest, ResponseFormat, Result,
    RetrievalConfig,
};

/// `n` distinct documents with predictable sources.
pub fn docs(n: usize) -> Vec<Document> {
    (0..n)
        .map(|i| Document::new(format!("https://source-{i}.example"), format!("content of source {i}")))
        .collect()
}

pub fn generation(generator: Arc<dyn Generator>) -> GenerationClient {
    let config = GenerationConfig {
        max_retries: 0,
        ..Default::default()
    };
    GenerationClient::new(generator, &config).with_backoff(Duration::ZERO)
}

pub fn retrieval(retriever: Arc<dyn Retriever>) -> RetrievalClient {
    let config = RetrievalConfig {
        max_retries: 0,
        ..Default::default()
    };
    RetrievalClient::new(retriever, &config).with_backoff(Duration::ZERO)
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

/// Replays replies in order regardless of prompt; records every request.
pub struct ScriptedGenerator {
    replies: Mutex<Vec<String>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new<'a>(replies: impl IntoIterator<Item = &'a str>) -> Arc<Self> {
        let mut replies: Vec<String> = replies.into_iter().map(String::from).collect();
        replies.reverse();
        Arc::new(Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| DraftsmithError::generation("script exhausted"))
    }
}

// ---------------------------------------------------------------------------
// StageGenerator
// ---------------------------------------------------------------------------

/// Which stage issued a generation request, recognised from its prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Curate,
    Write,
    Critique,
    Revise,
}

fn classify(request: &GenerationRequest) -> Stage {
    let system = request
        .messages
        .first()
        .map(|m| m.content.as_str())
        .unwrap_or_default();
    if request.options.response_format == ResponseFormat::Json {
        Stage::Curate
    } else if system.contains("newspaper writer") {
        Stage::Write
    } else if system.contains("writing critique") {
        Stage::Critique
    } else {
        Stage::Revise
    }
}

/// Answers each stage from its own script. When a script runs dry its last
/// reply repeats, so a single critique reply means "always critique".
#[derive(Default)]
pub struct StageGenerator {
    scripts: Mutex<HashMap<Stage, Vec<String>>>,
    calls: Mutex<Vec<(Stage, GenerationRequest)>>,
}

impl StageGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<'a>(self, stage: Stage, replies: impl IntoIterator<Item = &'a str>) -> Self {
        let mut replies: Vec<String> = replies.into_iter().map(String::from).collect();
        replies.reverse();
        self.scripts.lock().unwrap().insert(stage, replies);
        self
    }

    pub fn calls(&self, stage: Stage) -> usize {
        self.calls.lock().unwrap().iter().filter(|(s, _)| *s == stage).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn requests(&self, stage: Stage) -> Vec<GenerationRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == stage)
            .map(|(_, r)| r.clone())
            .collect()
    }
}

#[async_trait]
impl Generator for StageGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let stage = classify(request);
        self.calls.lock().unwrap().push((stage, request.clone()));

        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts
            .get_mut(&stage)
            .ok_or_else(|| DraftsmithError::generation(format!("no script for {stage:?}")))?;
        match script.len() {
            0 => Err(DraftsmithError::generation(format!("empty script for {stage:?}"))),
            1 => Ok(script[0].clone()),
            _ => Ok(script.pop().unwrap_or_default()),
        }
    }
}

// ---------------------------------------------------------------------------
// StaticRetriever
// ---------------------------------------------------------------------------

/// Returns a fixed document set and records every query.
pub struct StaticRetriever {
    docs: Vec<Document>,
    queries: Mutex<Vec<(String, usize)>>,
}

impl StaticRetriever {
    pub fn new(docs: Vec<Document>) -> Arc<Self> {
        Arc::new(Self {
            docs,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        self.queries.lock().unwrap().push((query.to_string(), k));
        Ok(self.docs.iter().take(k).cloned().collect())
    }
}
