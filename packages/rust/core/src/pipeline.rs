//! End-to-end article pipeline: topic → search → curate → write → critique ⇄ revise.
//!
//! The orchestrator is a small state machine over [`Step`]. Stages only
//! transform state; every transition, the revise loop, and its bound live
//! here.

use std::time::{Duration, Instant};

use tracing::{Span, field, info, instrument, warn};

use draftsmith_generation::GenerationClient;
use draftsmith_retrieval::RetrievalClient;
use draftsmith_shared::{
    AppConfig, DraftsmithError, PipelineConfig, PipelineState, Result, RunId,
};

use crate::cancel::CancellationToken;
use crate::stages;

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Orchestrator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Search,
    Curate,
    Write,
    Critique,
    Revise,
    Done,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Curate => "curate",
            Self::Write => "write",
            Self::Critique => "critique",
            Self::Revise => "revise",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating the transition rule after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Next(Step),
    /// The critic still objects and no revisions remain.
    LimitReached,
}

/// Transition rule. `revisions` counts completed revise passes.
pub fn next_step(
    step: Step,
    state: &PipelineState,
    revisions: usize,
    max_revisions: usize,
) -> Transition {
    match step {
        Step::Search => Transition::Next(Step::Curate),
        Step::Curate => Transition::Next(Step::Write),
        Step::Write => Transition::Next(Step::Critique),
        Step::Critique => match state.critique {
            None => Transition::Next(Step::Done),
            Some(_) if revisions >= max_revisions => Transition::LimitReached,
            Some(_) => Transition::Next(Step::Revise),
        },
        Step::Revise => Transition::Next(Step::Critique),
        Step::Done => Transition::Next(Step::Done),
    }
}

// ---------------------------------------------------------------------------
// Results and progress
// ---------------------------------------------------------------------------

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct ArticleRun {
    /// Run identifier.
    pub run_id: RunId,
    /// Final article, feedback notes removed.
    pub article: String,
    /// Completed revise passes.
    pub revisions: usize,
    /// Critic invocations.
    pub critiques: usize,
    /// Sources the article was written from.
    pub sources: Vec<String>,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a step.
    fn stage(&self, step: Step);
    /// Called after each critique with the critic's verdict (`None` = accepted).
    fn critique(&self, round: usize, critique: Option<&str>);
    /// Called when the pipeline completes.
    fn done(&self, result: &ArticleRun);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _step: Step) {}
    fn critique(&self, _round: usize, _critique: Option<&str>) {}
    fn done(&self, _result: &ArticleRun) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Clients plus configuration for running articles. Cheap to clone; runs
/// never share state with each other.
#[derive(Clone)]
pub struct Pipeline {
    generation: GenerationClient,
    retrieval: RetrievalClient,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(generation: GenerationClient, retrieval: RetrievalClient, config: PipelineConfig) -> Self {
        Self {
            generation,
            retrieval,
            config,
        }
    }

    /// Build HTTP-backed clients from the application config.
    pub fn from_config(app: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            GenerationClient::from_config(&app.generation)?,
            RetrievalClient::from_config(&app.retrieval)?,
            PipelineConfig::from(app),
        ))
    }

    /// Run one topic to a finished article.
    ///
    /// Fails with the first stage error. When the critic never accepts, fails
    /// with [`DraftsmithError::RevisionLimitExceeded`] carrying the last article.
    #[instrument(skip_all, fields(topic = %topic, run_id = field::Empty))]
    pub async fn run(
        &self,
        topic: &str,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> Result<ArticleRun> {
        let start = Instant::now();
        let run_id = RunId::new();
        Span::current().record("run_id", field::display(&run_id));

        info!(max_revisions = self.config.max_revisions, "starting article pipeline");

        let mut state = PipelineState::new(topic);
        let mut step = Step::Search;
        let mut revisions = 0;
        let mut critiques = 0;

        while step != Step::Done {
            if cancel.is_cancelled() {
                warn!(%step, "run cancelled");
                return Err(DraftsmithError::Cancelled {
                    stage: step.to_string(),
                });
            }

            progress.stage(step);
            state = self.execute(step, &state).await?;

            match step {
                Step::Critique => {
                    critiques += 1;
                    progress.critique(critiques, state.critique.as_deref());
                }
                Step::Revise => revisions += 1,
                _ => {}
            }

            step = match next_step(step, &state, revisions, self.config.max_revisions) {
                Transition::Next(next) => next,
                Transition::LimitReached => {
                    warn!(revisions, "critic never accepted the article, giving up");
                    return Err(DraftsmithError::RevisionLimitExceeded {
                        revisions,
                        article: draftsmith_markdown::finalize_article(
                            state.article.as_deref().unwrap_or_default(),
                        ),
                        critique: state.critique.unwrap_or_default(),
                    });
                }
            };
        }

        let article = state
            .article
            .as_deref()
            .map(draftsmith_markdown::finalize_article)
            .ok_or_else(|| DraftsmithError::invalid_state("pipeline finished without an article"))?;

        let result = ArticleRun {
            run_id,
            article,
            revisions,
            critiques,
            sources: state
                .search_results
                .unwrap_or_default()
                .into_iter()
                .map(|d| d.source)
                .collect(),
            elapsed: start.elapsed(),
        };

        progress.done(&result);

        info!(
            revisions = result.revisions,
            critiques = result.critiques,
            sources = result.sources.len(),
            elapsed_ms = result.elapsed.as_millis() as u64,
            "article pipeline complete"
        );

        Ok(result)
    }

    /// Run one topic with no cancellation or progress, returning the article.
    pub async fn run_topic(&self, topic: &str) -> Result<String> {
        let result = self.run(topic, &CancellationToken::new(), &SilentProgress).await?;
        Ok(result.article)
    }

    async fn execute(&self, step: Step, state: &PipelineState) -> Result<PipelineState> {
        match step {
            Step::Search => stages::search(state, &self.retrieval, &self.config).await,
            Step::Curate => stages::curate(state, &self.generation, &self.config).await,
            Step::Write => stages::write(state, &self.generation, &self.config).await,
            Step::Critique => stages::critique(state, &self.generation).await,
            Step::Revise => stages::revise(state, &self.generation).await,
            Step::Done => Ok(state.clone()),
        }
    }
}

/// Load the user config, build HTTP clients, and run one topic.
pub async fn run(topic: &str) -> Result<String> {
    let app = draftsmith_shared::load_config()?;
    Pipeline::from_config(&app)?.run_topic(topic).await
}
