//! Article pipeline for Draftsmith.
//!
//! Turns a topic into a finished article: search for sources, curate the
//! most relevant, write a draft, then loop critique and revision until the
//! critic accepts or the revision ceiling is reached.

pub mod cancel;
pub mod pipeline;
pub mod prompts;
pub mod stages;

#[cfg(test)]
mod test_support;

pub use cancel::CancellationToken;
pub use pipeline::{ArticleRun, Pipeline, ProgressReporter, SilentProgress, Step, run};
