//! Shared HTTP client plumbing for the network-facing engines.
//!
//! One process-wide `reqwest::Client` is shared by every engine; reqwest's
//! connection pool is safe for concurrent use and honors the standard
//! `HTTP_PROXY` / `HTTPS_PROXY` / `NO_PROXY` environment variables by
//! default.

use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

/// Browser-like User-Agent used for scrapes that gate on client identity.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

static CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .timeout(Duration::from_secs(120))
        .build()
        .unwrap_or_default()
});

/// The process-wide HTTP client.
pub fn client() -> &'static reqwest::Client {
    &CLIENT
}

/// Map an HTTP status to the error kind the router understands.
pub fn status_error(status: reqwest::StatusCode, context: &str) -> crate::CcoreError {
    use crate::CcoreError;
    match status.as_u16() {
        401 => CcoreError::Auth {
            message: format!("{context}: credentials rejected (401)"),
        },
        403 => CcoreError::Blocked {
            message: format!("{context}: access forbidden (403)"),
        },
        404 => CcoreError::NotFound {
            message: format!("{context}: resource not found (404)"),
        },
        408 => CcoreError::timeout(format!("{context}: request timeout (408)")),
        429 => CcoreError::RateLimit {
            message: format!("{context}: rate limited (429)"),
        },
        code if code >= 500 => CcoreError::network(format!("{context}: server error ({code})")),
        code => CcoreError::network(format!("{context}: unexpected status ({code})")),
    }
}

/// Send a request with exponential backoff on transient errors.
///
/// The request is cloned per attempt; bodies must therefore be buffered
/// (streaming bodies are not cloneable). Non-success statuses are mapped
/// through [`status_error`] and retried only when transient.
pub async fn send_with_retry(
    request: reqwest::RequestBuilder,
    policy: &crate::utils::retry::RetryPolicy,
    token: &tokio_util::sync::CancellationToken,
    context: &'static str,
) -> crate::Result<reqwest::Response> {
    use crate::utils::retry::{RetryAction, retry_with_backoff};

    retry_with_backoff(policy, token, |_| {
        let attempt = request.try_clone();
        async move {
            let Some(attempt) = attempt else {
                return RetryAction::Fail(crate::CcoreError::Internal(format!(
                    "{context}: request body is not cloneable for retry"
                )));
            };
            match attempt.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        RetryAction::Success(response)
                    } else {
                        RetryAction::from_result(Err(status_error(status, context)))
                    }
                }
                Err(e) => {
                    if crate::utils::retry::is_retryable_reqwest_error(&e) {
                        RetryAction::Retry(crate::CcoreError::from(e))
                    } else {
                        RetryAction::Fail(crate::CcoreError::from(e))
                    }
                }
            }
        }
    })
    .await
}

static PROXY_NOTICES: Lazy<Mutex<HashSet<&'static str>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Log, once per engine, that a hosted API performs its fetches server-side
/// and therefore cannot route the target request through a client-side proxy.
pub fn note_proxy_limitation(engine: &'static str) {
    let proxied = std::env::var("HTTP_PROXY").is_ok()
        || std::env::var("HTTPS_PROXY").is_ok()
        || std::env::var("http_proxy").is_ok()
        || std::env::var("https_proxy").is_ok();
    if !proxied {
        return;
    }

    if let Ok(mut seen) = PROXY_NOTICES.lock() {
        if seen.insert(engine) {
            tracing::info!(
                engine,
                "Hosted API fetches content server-side; the configured proxy only covers the API call itself"
            );
        }
    }
}
