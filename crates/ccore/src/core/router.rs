//! Extraction router: runs a resolved engine chain under the fallback
//! policy and the overall time budget.
//!
//! The router's loop moves through `Attempting(engine_i)` states until an
//! engine succeeds, the policy aborts, the deadline expires, or the chain is
//! exhausted. Engines run strictly sequentially; no engine starts until the
//! previous one has terminated. The router owns the budget: each invocation
//! gets only the remaining time, and on expiry the shared cancellation token
//! is fired so the in-flight engine can release its resources.

use crate::core::config::OnErrorPolicy;
use crate::error::{EngineAttempt, ErrorKind};
use crate::processors::registry::get_processor_registry;
use crate::processors::{Processor, ProcessorContext};
use crate::types::{ExtractionResult, Source};
use crate::{CcoreError, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Run the resolved chain for `source` and return the first success or a
/// composite failure.
pub async fn run_chain(
    source: &Source,
    mime: &str,
    chain: &[String],
    ctx: &ProcessorContext,
) -> Result<ExtractionResult> {
    let policy = &ctx.config.fallback;
    let timeout_seconds = source.timeout_seconds.unwrap_or(ctx.config.timeout_seconds);
    let deadline = Instant::now() + Duration::from_secs(timeout_seconds);

    // The resolver already caps the chain, but the policy is enforced here
    // too so directly-supplied chains behave identically.
    let effective_len = if policy.enabled {
        chain.len().min(policy.max_attempts.max(1))
    } else {
        chain.len().min(1)
    };
    let chain = &chain[..effective_len];

    let mut attempts: Vec<EngineAttempt> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    for engine_name in chain {
        ctx.check_cancelled()?;

        let Some(processor) = lookup(engine_name)? else {
            let attempt = EngineAttempt::new(
                engine_name.clone(),
                ErrorKind::EngineUnavailable,
                "engine is not registered",
            );
            if !apply_policy(&attempt, policy, &mut warnings, &mut attempts)? {
                return Err(abort_error(attempt));
            }
            continue;
        };

        if !processor.is_available() {
            let attempt = EngineAttempt::new(
                engine_name.clone(),
                ErrorKind::EngineUnavailable,
                format!(
                    "missing requirements: {}",
                    processor.capabilities().requires.join(", ")
                ),
            );
            if !apply_policy(&attempt, policy, &mut warnings, &mut attempts)? {
                return Err(abort_error(attempt));
            }
            continue;
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            ctx.cancel.cancel();
            return Err(timeout_error(&attempts));
        }

        tracing::debug!(engine = %engine_name, mime, "Attempting extraction");
        match tokio::time::timeout(remaining, processor.extract(source, ctx)).await {
            Err(_elapsed) => {
                // Budget expired mid-engine: signal cancellation so the
                // engine releases its resources, then surface Timeout.
                ctx.cancel.cancel();
                attempts.push(EngineAttempt::new(
                    engine_name.clone(),
                    ErrorKind::Timeout,
                    format!("overall budget of {timeout_seconds}s exceeded"),
                ));
                return Err(timeout_error(&attempts));
            }
            Ok(Ok(mut result)) => {
                result.metadata.extraction_engine = Some(engine_name.clone());
                if result.metadata.source.is_none() {
                    result.metadata.source = Some(source.describe());
                }
                result.metadata.extraction_time_ms = Some(ctx.elapsed_ms());
                result.metadata.content_length = Some(result.content.len());

                let mut all_warnings = warnings;
                all_warnings.extend(result.warnings);

                return Ok(ExtractionResult {
                    content: result.content,
                    engine_used: engine_name.clone(),
                    metadata: result.metadata,
                    warnings: all_warnings,
                });
            }
            Ok(Err(CcoreError::Cancelled)) => return Err(CcoreError::Cancelled),
            Ok(Err(err)) => {
                let attempt = EngineAttempt::new(engine_name.clone(), err.kind(), err.to_string());
                if policy.fatal_errors.contains(&attempt.kind) {
                    attempts.push(attempt);
                    return Err(err);
                }
                if policy.on_error == OnErrorPolicy::Fail {
                    attempts.push(attempt);
                    return Err(err);
                }
                if policy.on_error == OnErrorPolicy::Warn {
                    warnings.push(format!("Engine '{engine_name}' failed: {err}"));
                } else {
                    tracing::debug!(engine = %engine_name, error = %err, "Engine failed, trying next");
                }
                attempts.push(attempt);
            }
        }
    }

    Err(CcoreError::AllEnginesFailed {
        mime: mime.to_string(),
        attempts,
    })
}

/// Look up a processor without holding the registry lock across awaits.
fn lookup(engine_name: &str) -> Result<Option<Arc<dyn Processor>>> {
    let registry = get_processor_registry();
    let guard = registry
        .read()
        .map_err(|e| CcoreError::Internal(format!("Processor registry lock poisoned: {e}")))?;
    Ok(guard.get_by_name(engine_name))
}

/// Handle a pre-invocation failure (unregistered or unavailable engine)
/// according to the policy. Returns `Ok(false)` when the router must abort.
fn apply_policy(
    attempt: &EngineAttempt,
    policy: &crate::core::config::FallbackPolicy,
    warnings: &mut Vec<String>,
    attempts: &mut Vec<EngineAttempt>,
) -> Result<bool> {
    attempts.push(attempt.clone());
    if policy.fatal_errors.contains(&attempt.kind) || policy.on_error == OnErrorPolicy::Fail {
        return Ok(false);
    }
    if policy.on_error == OnErrorPolicy::Warn {
        warnings.push(format!("Engine '{}' skipped: {}", attempt.engine, attempt.message));
    } else {
        tracing::debug!(engine = %attempt.engine, reason = %attempt.message, "Engine skipped");
    }
    Ok(true)
}

fn abort_error(attempt: EngineAttempt) -> CcoreError {
    CcoreError::EngineUnavailable {
        engine: attempt.engine,
        message: attempt.message,
    }
}

fn timeout_error(attempts: &[EngineAttempt]) -> CcoreError {
    if attempts.is_empty() {
        return CcoreError::timeout("extraction budget exhausted");
    }
    let tried = attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    CcoreError::timeout(format!("extraction budget exhausted after: {tried}"))
}
