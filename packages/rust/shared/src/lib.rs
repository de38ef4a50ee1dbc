//! Shared types, error model, and configuration for newsreader.
//!
//! This crate is the foundation depended on by all other newsreader crates.
//! It provides:
//! - [`NewsReaderError`]: the unified error type
//! - Domain types ([`Article`], [`article_id`], event type names)
//! - Configuration ([`AppConfig`], [`SourceConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CollectorSettings, EventLogConfig, InferenceConfig, OperatorSettings,
    SearchConfig, SourceConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{NewsReaderError, Result};
pub use types::{ARTICLE_ID_PREFIX, Article, EVENT_COLLECTED, EVENT_PREPROCESSED, article_id};
