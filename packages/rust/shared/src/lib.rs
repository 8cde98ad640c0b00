//! Shared types, error model, and configuration for Draftsmith.
//!
//! This crate is the foundation depended on by all other Draftsmith crates.
//! It provides:
//! - [`DraftsmithError`]: the unified error type
//! - Domain types ([`Document`], [`PipelineState`], [`Message`], [`RunId`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, GenerationConfig, PipelineConfig, PipelineSettings, RetrievalConfig,
    api_key_from_env, config_dir, config_file_path, init_config, load_config, load_config_from,
    validate_api_keys,
};
pub use error::{DraftsmithError, Result};
pub use types::{
    Document, GenerationOptions, GenerationRequest, Message, PipelineState, ResponseFormat,
    RevisedArticle, Role, RunId,
};
