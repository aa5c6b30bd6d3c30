//! # guardrail-runtime
//!
//! Async checkpoint service for guardrail.
//!
//! This crate wraps the synchronous `guardrail-core` validator for services
//! that validate content on a tokio runtime.
//!
//! ## Important
//!
//! This crate is OPTIONAL. Verdicts come entirely from `guardrail-core`;
//! the runtime only changes where rules run and how often they run:
//! - Rules of one call are evaluated concurrently on the blocking pool
//! - Evaluations are cached by checkpoint version and content hash
//! - RETRY can be driven to completion against a `ContentSource`
//!
//! ## Example
//!
//! ```rust,ignore
//! use guardrail_runtime::{CheckpointService, RuntimeConfig};
//!
//! let service = CheckpointService::from_config(RuntimeConfig::default());
//! let result = service.validate(&guardrail, Content::text(draft)).await;
//! ```

pub mod cache;
pub mod config;
pub mod service;

pub use cache::{CacheKey, VerdictCache};
pub use config::{CacheConfig, RuntimeConfig};
pub use service::{CheckpointService, ContentSource};

use thiserror::Error;

/// Errors from the runtime.
///
/// Validation itself never fails; these come from collaborators.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Content source failed: {0}")]
    Source(String),

    #[error("Configuration error: {0}")]
    Config(#[from] guardrail_core::ConfigError),
}
