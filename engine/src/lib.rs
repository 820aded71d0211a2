//! Hafiz Engine Library
//!
//! This library provides the core functionality of the Hafiz assistant:
//! the quality-gated request workflow, the response cache, the session
//! memory store, and the LLM provider abstraction. It is used by the
//! API server binary and by integration tests.

/// Configuration management module
pub mod config;

/// Telemetry and Observability
pub mod telemetry;

/// LLM provider abstraction layer
pub mod llm;

/// Query intent classification labels
pub mod intent;

/// Typed response drafts and the final output envelope
pub mod response;

/// Response quality evaluation rubrics
pub mod evaluator;

/// Validated-response cache
pub mod cache;

/// Per-session conversation memory store
pub mod session;

/// Per-intent generators: prompts, draft parsing, fallbacks
pub mod generate;

/// Request workflow state machine
pub mod workflow;
