//! Configuration management
//!
//! Loads the Hafiz configuration from TOML at `~/.hafiz/config.toml`.
//! Every field has a default so a missing or partial file still yields a
//! runnable configuration. The Gemini API key is never stored in the
//! file; it is resolved from the environment variable named by
//! `llm.gemini.api_key_env`.
//!
//! # Configuration Sections
//!
//! - **core**: log level
//! - **llm**: provider selection and Gemini endpoint settings
//! - **workflow**: retry budget, quality thresholds, session window
//! - **server**: HTTP bind port

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// LLM provider configuration
    #[serde(default)]
    pub llm: LLMConfig,

    /// Workflow policy settings
    #[serde(default)]
    pub workflow: WorkflowSettings,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Selected provider; only "gemini" ships today
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    /// Gemini endpoint settings
    #[serde(default)]
    pub gemini: GeminiConfig,
}

/// Gemini endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API base URL
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

/// Workflow policy settings: retry bounds, thresholds, memory window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Turns retained per session (FIFO window)
    #[serde(default = "default_session_window")]
    pub session_window: usize,

    /// Most recent turns replayed into companion prompts
    #[serde(default = "default_prompt_history_turns")]
    pub prompt_history_turns: usize,

    /// Maximum quality retries per request
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Score accepted after retry exhaustion; below it the fallback wins
    #[serde(default = "default_acceptance_floor")]
    pub acceptance_floor: f64,

    /// Quality score recorded for substituted fallback responses
    #[serde(default = "default_fallback_quality_score")]
    pub fallback_quality_score: f64,

    /// Pass threshold for dua responses
    #[serde(default = "default_dua_threshold")]
    pub dua_threshold: f64,

    /// Pass threshold for companion answers
    #[serde(default = "default_companion_threshold")]
    pub companion_threshold: f64,

    /// Pass threshold for video lists
    #[serde(default = "default_video_threshold")]
    pub video_threshold: f64,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_temperature() -> f64 {
    0.3
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_session_window() -> usize {
    10
}

fn default_prompt_history_turns() -> usize {
    8
}

fn default_max_retries() -> usize {
    1
}

fn default_acceptance_floor() -> f64 {
    0.5
}

fn default_fallback_quality_score() -> f64 {
    0.3
}

fn default_dua_threshold() -> f64 {
    0.7
}

fn default_companion_threshold() -> f64 {
    0.6
}

fn default_video_threshold() -> f64 {
    0.5
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            timeout_secs: default_llm_timeout_secs(),
            gemini: GeminiConfig::default(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
            temperature: default_temperature(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            session_window: default_session_window(),
            prompt_history_turns: default_prompt_history_turns(),
            max_retries: default_max_retries(),
            acceptance_floor: default_acceptance_floor(),
            fallback_quality_score: default_fallback_quality_score(),
            dua_threshold: default_dua_threshold(),
            companion_threshold: default_companion_threshold(),
            video_threshold: default_video_threshold(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

fn default_port() -> u16 {
    8000
}

impl Config {
    /// Default configuration file path: `~/.hafiz/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".hafiz").join("config.toml"))
    }

    /// Load configuration from the default location, falling back to
    /// built-in defaults when the file does not exist.
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_path(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Resolve the provider API key from the configured environment variable
    pub fn resolve_api_key(&self) -> String {
        std::env::var(&self.llm.gemini.api_key_env).unwrap_or_default()
    }
}
