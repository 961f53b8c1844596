//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.softsell/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::quick::{QuickResponseEntry, default_entries};
use crate::core::state::Mode;
use crate::inference::providers::openai::DEFAULT_OPENAI_BASE_URL;
use crate::inference::{ModelParams, RetryPolicy};

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AssistantConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub quick_responses: Vec<QuickResponseEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub default_mode: Option<Mode>,
    pub greeting: Option<String>,
    pub quick_reply_delay_ms: Option<u64>,
    pub pre_request_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_GREETING: &str =
    "👋 Hi there! I'm SoftSell's virtual assistant. How can I help you today?";
pub const DEFAULT_QUICK_REPLY_DELAY_MS: u64 = 800;
pub const DEFAULT_PRE_REQUEST_DELAY_MS: u64 = 1000;
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 150;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant for SoftSell, a platform for selling software licenses.";

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub mode: Mode,
    pub greeting: String,
    pub quick_reply_delay: Duration,
    pub pre_request_delay: Duration,
    pub retry: RetryPolicy,
    pub api_key: Option<String>,
    pub base_url: String,
    pub params: ModelParams,
    pub quick_responses: Vec<QuickResponseEntry>,
}

/// Values that came from command-line flags (None = not specified).
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub mode: Option<Mode>,
    pub model: Option<String>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.softsell/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".softsell").join("config.toml"))
}

/// Load config from `~/.softsell/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `AssistantConfig::default()`.
pub fn load_config() -> Result<AssistantConfig, ConfigError> {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => {
            warn!("Could not determine home directory, using default config");
            Ok(AssistantConfig::default())
        }
    }
}

/// Load config from an explicit path, generating a default file if absent.
pub fn load_config_from(path: &Path) -> Result<AssistantConfig, ConfigError> {
    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(path);
        return Ok(AssistantConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: AssistantConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", redacted(&config));
    Ok(config)
}

/// Debug summary that never includes the API key.
fn redacted(config: &AssistantConfig) -> String {
    format!(
        "general={:?}, retry={:?}, model={:?}, base_url={:?}, api_key_set={}, quick_responses={}",
        config.general,
        config.retry,
        config.openai.model,
        config.openai.base_url,
        config.openai.api_key.is_some(),
        config.quick_responses.len()
    )
}

fn generate_default_config(path: &Path) {
    let default_content = r#"# SoftSell Assistant Configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# default_mode = "live"              # "live" or "mock" (env: SOFTSELL_MODE)
# greeting = "👋 Hi there! I'm SoftSell's virtual assistant. How can I help you today?"
# quick_reply_delay_ms = 800
# pre_request_delay_ms = 1000

# [openai]
# api_key = "sk-..."                 # Or set OPENAI_API_KEY env var
# base_url = "https://api.openai.com/v1"
# model = "gpt-3.5-turbo"
# temperature = 0.7
# max_tokens = 150
# system_prompt = "You are a helpful assistant for SoftSell, a platform for selling software licenses."

# [retry]
# max_attempts = 3                   # total attempts on rate limiting
# base_delay_ms = 1000               # doubles after each rate-limited attempt

# [[quick_responses]]
# trigger = "Is there a fee?"
# reply = "Yes, SoftSell charges a small processing fee. Check our website for details."
"#;

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
pub fn resolve(config: &AssistantConfig, cli: &CliOverrides) -> Result<ResolvedConfig, ConfigError> {
    resolve_with_env(config, cli, |key| std::env::var(key).ok())
}

/// Same as [`resolve`] with an explicit environment lookup.
pub fn resolve_with_env(
    config: &AssistantConfig,
    cli: &CliOverrides,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig, ConfigError> {
    // Mode: CLI → env → config → default
    let env_mode = match env("SOFTSELL_MODE") {
        Some(raw) => Some(parse_mode(&raw)?),
        None => None,
    };
    let mode = cli
        .mode
        .or(env_mode)
        .or(config.general.default_mode)
        .unwrap_or_default();

    // Model: CLI → env → config → default
    let model = cli
        .model
        .clone()
        .or_else(|| env("OPENAI_MODEL"))
        .or_else(|| config.openai.model.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    // API key: env → config
    let api_key = env("OPENAI_API_KEY").or_else(|| config.openai.api_key.clone());

    // Base URL: env → config → default
    let base_url = env("OPENAI_BASE_URL")
        .or_else(|| config.openai.base_url.clone())
        .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());

    let retry = RetryPolicy::new(
        config.retry.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
        Duration::from_millis(config.retry.base_delay_ms.unwrap_or(DEFAULT_BASE_DELAY_MS)),
    )
    .map_err(|e| ConfigError::Invalid(format!("[retry] {e}")))?;

    let temperature = config.openai.temperature.unwrap_or(DEFAULT_TEMPERATURE);
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ConfigError::Invalid(format!(
            "[openai] temperature must be between 0 and 2, got {temperature}"
        )));
    }

    let quick_responses = if config.quick_responses.is_empty() {
        default_entries()
    } else {
        config.quick_responses.clone()
    };
    for (i, entry) in quick_responses.iter().enumerate() {
        if let Some(defect) = entry.defect() {
            return Err(ConfigError::Invalid(format!(
                "[[quick_responses]] entry {} ({:?}): {defect}",
                i + 1,
                entry.trigger
            )));
        }
    }

    Ok(ResolvedConfig {
        mode,
        greeting: config
            .general
            .greeting
            .clone()
            .unwrap_or_else(|| DEFAULT_GREETING.to_string()),
        quick_reply_delay: Duration::from_millis(
            config
                .general
                .quick_reply_delay_ms
                .unwrap_or(DEFAULT_QUICK_REPLY_DELAY_MS),
        ),
        pre_request_delay: Duration::from_millis(
            config
                .general
                .pre_request_delay_ms
                .unwrap_or(DEFAULT_PRE_REQUEST_DELAY_MS),
        ),
        retry,
        api_key,
        base_url,
        params: ModelParams {
            model,
            system_prompt: config
                .openai
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature,
            max_tokens: config.openai.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        },
        quick_responses,
    })
}

fn parse_mode(raw: &str) -> Result<Mode, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "live" => Ok(Mode::Live),
        "mock" => Ok(Mode::Mock),
        other => Err(ConfigError::Invalid(format!(
            "SOFTSELL_MODE must be \"live\" or \"mock\", got {other:?}"
        ))),
    }
}
