//! Extraction configuration.
//!
//! Configuration is an immutable per-request snapshot. Each extraction call
//! builds one from the environment ([`ExtractionConfig::from_env`]) unless a
//! programmatic override is installed ([`set_config_override`]), in which
//! case the override is returned until [`reset_config_override`] is called.
//! Snapshots never leak state between requests.
//!
//! Environment keys are listed in the crate README; chains are
//! comma-separated engine names. Invalid values never fail a request: they
//! log a warning and fall back to the documented default.

use crate::core::mime::env_key_suffix;
use crate::error::ErrorKind;
use crate::types::Category;
use crate::{CcoreError, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, RwLock};

const ENGINE_ENV_PREFIX: &str = "CCORE_ENGINE_";

/// Default segment concurrency for the audio pipeline.
pub const DEFAULT_AUDIO_CONCURRENCY: usize = 3;
/// Inclusive bounds for segment concurrency.
pub const AUDIO_CONCURRENCY_RANGE: (usize, usize) = (1, 10);
/// Inclusive bounds for `fallback.max_attempts`.
pub const MAX_ATTEMPTS_RANGE: (usize, usize) = (1, 10);
/// Default overall extraction budget in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300;

/// What the router does when an engine in the chain fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnErrorPolicy {
    /// Move to the next engine silently.
    Next,
    /// Append a warning describing the failure, then move on.
    Warn,
    /// Abort the whole call on the first failure.
    Fail,
}

impl OnErrorPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "next" => Some(Self::Next),
            "warn" => Some(Self::Warn),
            "fail" => Some(Self::Fail),
            _ => None,
        }
    }
}

/// Fallback behavior for the extraction router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackPolicy {
    /// When false, the chain is truncated to its first engine.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cap on the number of engines attempted, clamped to [1, 10].
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Per-failure behavior.
    #[serde(default = "default_on_error")]
    pub on_error: OnErrorPolicy,

    /// Error kinds that abort immediately, bypassing `on_error`.
    #[serde(default)]
    pub fatal_errors: HashSet<ErrorKind>,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            on_error: default_on_error(),
            fatal_errors: HashSet::new(),
        }
    }
}

/// Audio pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Concurrent segment transcriptions, clamped to [1, 10].
    #[serde(default = "default_audio_concurrency")]
    pub concurrency: usize,

    /// STT provider override. Only honored together with `model`.
    #[serde(default)]
    pub provider: Option<String>,

    /// STT model override. Only honored together with `provider`.
    #[serde(default)]
    pub model: Option<String>,

    /// Per-segment retry attempts for transient backend errors.
    #[serde(default = "default_audio_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in milliseconds.
    #[serde(default = "default_audio_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff delay cap in milliseconds.
    #[serde(default = "default_audio_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_AUDIO_CONCURRENCY,
            provider: None,
            model: None,
            max_retries: default_audio_max_retries(),
            base_delay_ms: default_audio_base_delay_ms(),
            max_delay_ms: default_audio_max_delay_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_max_attempts() -> usize {
    10
}
fn default_on_error() -> OnErrorPolicy {
    OnErrorPolicy::Warn
}
fn default_audio_concurrency() -> usize {
    DEFAULT_AUDIO_CONCURRENCY
}
fn default_audio_max_retries() -> u32 {
    3
}
fn default_audio_base_delay_ms() -> u64 {
    500
}
fn default_audio_max_delay_ms() -> u64 {
    10_000
}
fn default_youtube_languages() -> Vec<String> {
    vec!["en".to_string(), "es".to_string(), "pt".to_string()]
}

/// Immutable configuration snapshot for one extraction request.
///
/// MIME-keyed engine chains are stored under normalized keys (the
/// `CCORE_ENGINE_<MIME>` suffix form) so environment and programmatic
/// configuration share one lookup space; use [`ExtractionConfig::with_mime_chain`]
/// rather than inserting into the map directly.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Engine chains keyed by normalized MIME key (`APPLICATION_PDF`,
    /// `IMAGE_*`).
    pub mime_engine_chains: HashMap<String, Vec<String>>,

    /// Engine chains keyed by category.
    pub category_engine_chains: HashMap<Category, Vec<String>>,

    /// Legacy single-engine override for document MIMEs.
    pub legacy_document_engine: Option<String>,

    /// Legacy single-engine override for URL extraction.
    pub legacy_url_engine: Option<String>,

    pub fallback: FallbackPolicy,

    /// Per-engine opaque option records, keyed by engine name.
    pub engine_options: HashMap<String, serde_json::Value>,

    pub audio: AudioConfig,

    /// Preferred YouTube caption languages, in priority order.
    pub youtube_languages: Vec<String>,

    /// Overall extraction budget in seconds.
    pub timeout_seconds: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            mime_engine_chains: HashMap::new(),
            category_engine_chains: HashMap::new(),
            legacy_document_engine: None,
            legacy_url_engine: None,
            fallback: FallbackPolicy::default(),
            engine_options: HashMap::new(),
            audio: AudioConfig::default(),
            youtube_languages: default_youtube_languages(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl ExtractionConfig {
    /// Build a snapshot from the current environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.legacy_document_engine = non_empty_env("CCORE_DOCUMENT_ENGINE");
        config.legacy_url_engine = non_empty_env("CCORE_URL_ENGINE");

        for (key, value) in std::env::vars() {
            let Some(suffix) = key.strip_prefix(ENGINE_ENV_PREFIX) else {
                continue;
            };
            let chain = parse_chain(&value);
            if chain.is_empty() {
                continue;
            }
            if let Some(category) = Category::parse(suffix) {
                // Category names win over bare top-level types where they
                // collide (audio, video, text).
                config.category_engine_chains.insert(category, chain);
            } else if !suffix.contains('_') {
                // A bare top-level type configures the wildcard: IMAGE
                // stands for image/*.
                config.mime_engine_chains.insert(format!("{suffix}_*"), chain);
            } else {
                config.mime_engine_chains.insert(suffix.to_string(), chain);
            }
        }

        if let Some(value) = non_empty_env("CCORE_FALLBACK_ENABLED") {
            match parse_bool(&value) {
                Some(enabled) => config.fallback.enabled = enabled,
                None => tracing::warn!(%value, "Invalid CCORE_FALLBACK_ENABLED, keeping default"),
            }
        }

        if let Some(value) = non_empty_env("CCORE_FALLBACK_MAX_ATTEMPTS") {
            config.fallback.max_attempts = parse_clamped(
                &value,
                "CCORE_FALLBACK_MAX_ATTEMPTS",
                MAX_ATTEMPTS_RANGE,
                config.fallback.max_attempts,
            );
        }

        if let Some(value) = non_empty_env("CCORE_FALLBACK_ON_ERROR") {
            match OnErrorPolicy::parse(&value) {
                Some(policy) => config.fallback.on_error = policy,
                None => tracing::warn!(%value, "Invalid CCORE_FALLBACK_ON_ERROR, keeping default"),
            }
        }

        if let Some(value) = non_empty_env("CCORE_FALLBACK_FATAL_ERRORS") {
            for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                match ErrorKind::parse_token(token) {
                    Some(kind) => {
                        config.fallback.fatal_errors.insert(kind);
                    }
                    None => tracing::warn!(token, "Unknown error kind in CCORE_FALLBACK_FATAL_ERRORS, dropping"),
                }
            }
        }

        if let Some(value) = non_empty_env("CCORE_AUDIO_CONCURRENCY") {
            config.audio.concurrency = parse_clamped(
                &value,
                "CCORE_AUDIO_CONCURRENCY",
                AUDIO_CONCURRENCY_RANGE,
                DEFAULT_AUDIO_CONCURRENCY,
            );
        }

        config.audio.provider = non_empty_env("CCORE_AUDIO_PROVIDER");
        config.audio.model = non_empty_env("CCORE_AUDIO_MODEL");

        if let Some(value) = non_empty_env("CCORE_AUDIO_MAX_RETRIES") {
            match value.parse() {
                Ok(retries) => config.audio.max_retries = retries,
                Err(_) => tracing::warn!(%value, "Invalid CCORE_AUDIO_MAX_RETRIES, keeping default"),
            }
        }
        if let Some(value) = non_empty_env("CCORE_AUDIO_BASE_DELAY_MS") {
            match value.parse() {
                Ok(ms) => config.audio.base_delay_ms = ms,
                Err(_) => tracing::warn!(%value, "Invalid CCORE_AUDIO_BASE_DELAY_MS, keeping default"),
            }
        }
        if let Some(value) = non_empty_env("CCORE_AUDIO_MAX_DELAY_MS") {
            match value.parse() {
                Ok(ms) => config.audio.max_delay_ms = ms,
                Err(_) => tracing::warn!(%value, "Invalid CCORE_AUDIO_MAX_DELAY_MS, keeping default"),
            }
        }

        if let Some(value) = non_empty_env("CCORE_YOUTUBE_LANGUAGES") {
            let languages = parse_chain(&value);
            if !languages.is_empty() {
                config.youtube_languages = languages;
            }
        }

        if let Some(value) = non_empty_env("CCORE_TIMEOUT_SECONDS") {
            match value.parse::<u64>() {
                Ok(seconds) if seconds > 0 => config.timeout_seconds = seconds,
                _ => tracing::warn!(%value, "Invalid CCORE_TIMEOUT_SECONDS, keeping default"),
            }
        }

        config
    }

    /// The active snapshot: the programmatic override when installed,
    /// otherwise a fresh read of the environment.
    pub fn snapshot() -> Arc<Self> {
        if let Some(config) = CONFIG_OVERRIDE
            .read()
            .ok()
            .and_then(|guard| guard.clone())
        {
            return config;
        }
        Arc::new(Self::from_env())
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CcoreError::validation(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let file: ConfigFile = toml::from_str(&content).map_err(|e| {
            CcoreError::validation(format!("Invalid TOML in {}: {}", path.as_ref().display(), e))
        })?;

        Ok(file.into_config())
    }

    /// Discover `ccore.toml` in the current directory or any parent.
    pub fn discover() -> Result<Option<Self>> {
        let mut current = std::env::current_dir().map_err(CcoreError::Io)?;

        loop {
            let candidate = current.join("ccore.toml");
            if candidate.exists() {
                return Ok(Some(Self::from_toml_file(candidate)?));
            }

            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            } else {
                break;
            }
        }

        Ok(None)
    }

    /// Register an engine chain for a MIME type or wildcard pattern.
    pub fn with_mime_chain(mut self, mime: &str, chain: Vec<String>) -> Self {
        self.mime_engine_chains.insert(env_key_suffix(mime), chain);
        self
    }

    /// Register an engine chain for a category.
    pub fn with_category_chain(mut self, category: Category, chain: Vec<String>) -> Self {
        self.category_engine_chains.insert(category, chain);
        self
    }

    /// Configured chain for an exact MIME type.
    pub fn chain_for_mime(&self, mime: &str) -> Option<&[String]> {
        self.mime_engine_chains
            .get(&env_key_suffix(mime))
            .map(Vec::as_slice)
    }

    /// Configured chain for the wildcard covering a MIME type.
    pub fn chain_for_wildcard(&self, mime: &str) -> Option<&[String]> {
        let wildcard = crate::core::mime::wildcard_of(mime)?;
        self.mime_engine_chains
            .get(&env_key_suffix(&wildcard))
            .map(Vec::as_slice)
    }

    /// Configured chain for a category.
    pub fn chain_for_category(&self, category: Category) -> Option<&[String]> {
        self.category_engine_chains.get(&category).map(Vec::as_slice)
    }
}

/// TOML-facing configuration shape; keys use canonical MIME strings.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    engines_by_mime: HashMap<String, Vec<String>>,
    #[serde(default)]
    engines_by_category: HashMap<String, Vec<String>>,
    #[serde(default)]
    document_engine: Option<String>,
    #[serde(default)]
    url_engine: Option<String>,
    #[serde(default)]
    fallback: Option<FallbackPolicy>,
    #[serde(default)]
    engine_options: HashMap<String, serde_json::Value>,
    #[serde(default)]
    audio: Option<AudioConfig>,
    #[serde(default)]
    youtube_languages: Option<Vec<String>>,
    #[serde(default)]
    timeout_seconds: Option<u64>,
}

impl ConfigFile {
    fn into_config(self) -> ExtractionConfig {
        let mut config = ExtractionConfig::default();

        for (mime, chain) in self.engines_by_mime {
            config.mime_engine_chains.insert(env_key_suffix(&mime), chain);
        }
        for (name, chain) in self.engines_by_category {
            match Category::parse(&name) {
                Some(category) => {
                    config.category_engine_chains.insert(category, chain);
                }
                None => tracing::warn!(category = %name, "Unknown category in config file, dropping"),
            }
        }

        config.legacy_document_engine = self.document_engine;
        config.legacy_url_engine = self.url_engine;
        if let Some(mut fallback) = self.fallback {
            let (lo, hi) = MAX_ATTEMPTS_RANGE;
            if fallback.max_attempts < lo || fallback.max_attempts > hi {
                tracing::warn!(
                    max_attempts = fallback.max_attempts,
                    "fallback.max_attempts out of range, using default"
                );
                fallback.max_attempts = default_max_attempts();
            }
            config.fallback = fallback;
        }
        config.engine_options = self.engine_options;
        if let Some(mut audio) = self.audio {
            let (lo, hi) = AUDIO_CONCURRENCY_RANGE;
            if audio.concurrency < lo || audio.concurrency > hi {
                tracing::warn!(
                    concurrency = audio.concurrency,
                    "audio.concurrency out of range, using default"
                );
                audio.concurrency = DEFAULT_AUDIO_CONCURRENCY;
            }
            config.audio = audio;
        }
        if let Some(languages) = self.youtube_languages {
            if !languages.is_empty() {
                config.youtube_languages = languages;
            }
        }
        if let Some(seconds) = self.timeout_seconds {
            if seconds > 0 {
                config.timeout_seconds = seconds;
            }
        }

        config
    }
}

static CONFIG_OVERRIDE: Lazy<RwLock<Option<Arc<ExtractionConfig>>>> = Lazy::new(|| RwLock::new(None));

/// Install a process-wide configuration override. While active, extraction
/// calls stop reading the environment and use this snapshot.
pub fn set_config_override(config: ExtractionConfig) {
    if let Ok(mut guard) = CONFIG_OVERRIDE.write() {
        *guard = Some(Arc::new(config));
    }
}

/// Remove the programmatic override; subsequent calls read the environment
/// again.
pub fn reset_config_override() {
    if let Ok(mut guard) = CONFIG_OVERRIDE.write() {
        *guard = None;
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_chain(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_clamped(value: &str, key: &str, range: (usize, usize), fallback: usize) -> usize {
    let (lo, hi) = range;
    match value.parse::<usize>() {
        Ok(parsed) if parsed >= lo && parsed <= hi => parsed,
        Ok(parsed) => {
            tracing::warn!(key, value = parsed, lo, hi, "Value out of range, using {fallback}");
            fallback
        }
        Err(_) => {
            tracing::warn!(key, value, "Not an integer, using {fallback}");
            fallback
        }
    }
}
