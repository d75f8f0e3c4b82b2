//! Speech-to-text backends.
//!
//! Transcription goes through OpenAI-compatible `/audio/transcriptions`
//! endpoints (multipart upload). Two provider presets ship by default:
//! `openai` and `groq`. A caller may override both provider and model
//! together; supplying one without the other logs a warning and falls back
//! to defaults, and an unknown provider logs an error and falls back, so
//! transcription always continues.

use crate::types::Source;
use crate::utils::http;
use crate::utils::retry::{RetryAction, RetryPolicy, retry_with_backoff};
use crate::{CcoreError, Result};
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_PROVIDER: &str = "openai";

struct ProviderPreset {
    name: &'static str,
    base_url: &'static str,
    key_env: &'static str,
    default_model: &'static str,
}

const PRESETS: &[ProviderPreset] = &[
    ProviderPreset {
        name: "openai",
        base_url: "https://api.openai.com/v1",
        key_env: "OPENAI_API_KEY",
        default_model: "whisper-1",
    },
    ProviderPreset {
        name: "groq",
        base_url: "https://api.groq.com/openai/v1",
        key_env: "GROQ_API_KEY",
        default_model: "whisper-large-v3",
    },
];

fn preset(name: &str) -> Option<&'static ProviderPreset> {
    PRESETS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// Whether any STT provider has credentials configured.
pub fn any_backend_configured() -> bool {
    PRESETS
        .iter()
        .any(|p| std::env::var(p.key_env).is_ok_and(|v| !v.is_empty()))
}

/// A resolved transcription backend.
#[derive(Debug, Clone)]
pub struct SttBackend {
    pub provider: String,
    pub model: String,
    base_url: String,
    key_env: &'static str,
}

impl SttBackend {
    /// Resolve the backend for a request, honoring the provider/model
    /// override pairing rules.
    pub fn resolve(source: &Source, config: &crate::core::config::AudioConfig) -> Self {
        let request_pair = paired_override(
            source.audio_provider.as_deref(),
            source.audio_model.as_deref(),
            "request",
        );
        let config_pair = paired_override(config.provider.as_deref(), config.model.as_deref(), "configuration");

        let (provider, model) = request_pair
            .or(config_pair)
            .unwrap_or_else(|| (DEFAULT_PROVIDER.to_string(), None));

        match preset(&provider) {
            Some(preset) => Self {
                provider: preset.name.to_string(),
                model: model.unwrap_or_else(|| preset.default_model.to_string()),
                base_url: preset.base_url.to_string(),
                key_env: preset.key_env,
            },
            None => {
                tracing::error!(provider = %provider, "Unknown STT provider, falling back to defaults");
                let fallback = preset(DEFAULT_PROVIDER).expect("default preset exists");
                Self {
                    provider: fallback.name.to_string(),
                    model: fallback.default_model.to_string(),
                    base_url: fallback.base_url.to_string(),
                    key_env: fallback.key_env,
                }
            }
        }
    }

    fn api_key(&self) -> Result<String> {
        std::env::var(self.key_env)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| CcoreError::Auth {
                message: format!("{} is not configured for STT provider '{}'", self.key_env, self.provider),
            })
    }

    /// Transcribe one audio file, retrying transient backend errors with
    /// exponential backoff within the given policy.
    pub async fn transcribe_file(
        &self,
        path: &Path,
        policy: &RetryPolicy,
        token: &CancellationToken,
    ) -> Result<String> {
        let key = self.api_key()?;
        let bytes = crate::core::io::read_file_async(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());
        let endpoint = format!("{}/audio/transcriptions", self.base_url);

        // Multipart bodies are not cloneable, so each attempt rebuilds the
        // form from the buffered bytes.
        retry_with_backoff(policy, token, |_| {
            let bytes = bytes.clone();
            let file_name = file_name.clone();
            let endpoint = endpoint.clone();
            let key = key.clone();
            let model = self.model.clone();
            async move {
                let part = match reqwest::multipart::Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str("audio/wav")
                {
                    Ok(part) => part,
                    Err(e) => return RetryAction::Fail(CcoreError::from(e)),
                };
                let form = reqwest::multipart::Form::new()
                    .part("file", part)
                    .text("model", model)
                    .text("response_format", "json");

                let sent = http::client()
                    .post(&endpoint)
                    .bearer_auth(&key)
                    .multipart(form)
                    .send()
                    .await;

                match sent {
                    Ok(response) => {
                        let status = response.status();
                        if !status.is_success() {
                            return RetryAction::from_result(Err(http::status_error(status, "stt")));
                        }
                        match response.json::<serde_json::Value>().await {
                            Ok(value) => match value.get("text").and_then(|t| t.as_str()) {
                                Some(text) => RetryAction::Success(text.trim().to_string()),
                                None => RetryAction::Fail(CcoreError::parse(
                                    "STT response is missing 'text'",
                                )),
                            },
                            Err(e) => RetryAction::Fail(CcoreError::from(e)),
                        }
                    }
                    Err(e) => {
                        if crate::utils::retry::is_retryable_reqwest_error(&e) {
                            RetryAction::Retry(CcoreError::from(e))
                        } else {
                            RetryAction::Fail(CcoreError::from(e))
                        }
                    }
                }
            }
        })
        .await
    }
}

/// Enforce the both-or-neither rule for provider/model overrides.
fn paired_override(
    provider: Option<&str>,
    model: Option<&str>,
    origin: &str,
) -> Option<(String, Option<String>)> {
    match (provider, model) {
        (Some(provider), Some(model)) => Some((provider.to_string(), Some(model.to_string()))),
        (Some(_), None) | (None, Some(_)) => {
            tracing::warn!(
                origin,
                "STT provider and model must be overridden together; falling back to defaults"
            );
            None
        }
        (None, None) => None,
    }
}
