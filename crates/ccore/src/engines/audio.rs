//! Audio transcription pipeline.
//!
//! Long audio is split into contiguous fixed-length segments which are
//! transcribed concurrently under a counting admission gate, then
//! reassembled strictly in segment index order regardless of completion
//! order. Short files bypass segmentation entirely.
//!
//! A failed segment does not cancel its siblings; the pipeline waits for
//! every segment to reach a terminal state and reports partial failures
//! with a per-segment breakdown.

use crate::core::config::{AUDIO_CONCURRENCY_RANGE, DEFAULT_AUDIO_CONCURRENCY};
use crate::engines::stt::SttBackend;
use crate::error::SegmentFailure;
use crate::extraction::media;
use crate::processors::{Processor, ProcessorCapabilities, ProcessorContext};
use crate::types::{Category, ProcessorResult, Source, SourceOrigin};
use crate::utils::retry::RetryPolicy;
use crate::{CcoreError, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Audio longer than this is segmented (10 minutes).
pub const SEGMENT_THRESHOLD_SECONDS: f64 = 600.0;

const CAPABILITIES: ProcessorCapabilities = ProcessorCapabilities {
    name: "audio-transcriber",
    mime_types: &["audio/*"],
    extensions: &["mp3", "wav", "m4a", "aac", "flac", "ogg", "opus"],
    priority: 50,
    requires: &["ffmpeg", "stt-credentials"],
    category: Category::Audio,
};

pub struct AudioTranscriberEngine {
    availability: OnceCell<bool>,
}

impl AudioTranscriberEngine {
    pub fn new() -> Self {
        Self {
            availability: OnceCell::new(),
        }
    }
}

impl Default for AudioTranscriberEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Processor for AudioTranscriberEngine {
    fn capabilities(&self) -> &ProcessorCapabilities {
        &CAPABILITIES
    }

    fn is_available(&self) -> bool {
        *self.availability.get_or_init(|| {
            media::find_ffmpeg().is_some()
                && media::find_ffprobe().is_some()
                && crate::engines::stt::any_backend_configured()
        })
    }

    async fn extract(&self, source: &Source, ctx: &ProcessorContext) -> Result<ProcessorResult> {
        ctx.check_cancelled()?;

        let SourceOrigin::FilePath(path) = &source.origin else {
            return Err(CcoreError::unsupported("audio transcription requires a file source"));
        };

        transcribe_audio_file(path, source, ctx).await
    }
}

/// Clamp the requested segment concurrency into the allowed range, warning
/// and falling back to the default on invalid values.
fn resolve_concurrency(source: &Source, ctx: &ProcessorContext) -> usize {
    let requested = source.audio_concurrency.unwrap_or(ctx.config.audio.concurrency);
    let (lo, hi) = AUDIO_CONCURRENCY_RANGE;
    if requested < lo || requested > hi {
        tracing::warn!(
            requested,
            "Audio concurrency out of range [{lo}, {hi}], using {DEFAULT_AUDIO_CONCURRENCY}"
        );
        return DEFAULT_AUDIO_CONCURRENCY;
    }
    requested
}

/// Transcribe an audio file end to end. Shared by the audio engine and the
/// video demux engine, which re-enters here with its extracted track.
pub(crate) async fn transcribe_audio_file(
    path: &Path,
    source: &Source,
    ctx: &ProcessorContext,
) -> Result<ProcessorResult> {
    let backend = SttBackend::resolve(source, &ctx.config.audio);
    let policy = RetryPolicy::from_millis(
        ctx.config.audio.max_retries,
        ctx.config.audio.base_delay_ms,
        ctx.config.audio.max_delay_ms,
    );
    let concurrency = resolve_concurrency(source, ctx);

    let duration = media::probe_duration_seconds(path, &ctx.cancel).await?;

    let (transcript, segment_count) = if duration <= SEGMENT_THRESHOLD_SECONDS {
        let text = backend.transcribe_file(path, &policy, &ctx.cancel).await?;
        (text, 1)
    } else {
        transcribe_segmented(path, duration, concurrency, &backend, &policy, ctx).await?
    };

    let mut result = ProcessorResult::new(transcript, "text/plain");
    result
        .metadata
        .insert("durationSeconds", serde_json::json!((duration * 1000.0).round() / 1000.0));
    result.metadata.insert("segmentCount", serde_json::json!(segment_count));
    result.metadata.insert("sttProvider", serde_json::json!(backend.provider));
    result.metadata.insert("sttModel", serde_json::json!(backend.model));
    Ok(result)
}

async fn transcribe_segmented(
    path: &Path,
    duration: f64,
    concurrency: usize,
    backend: &SttBackend,
    policy: &RetryPolicy,
    ctx: &ProcessorContext,
) -> Result<(String, usize)> {
    let segment_count = (duration / SEGMENT_THRESHOLD_SECONDS).ceil() as usize;
    let segment_length = duration / segment_count as f64;

    // Scoped workspace: dropped on every exit path, including cancellation
    // and panics, taking the cut segments with it.
    let workspace = tempfile::tempdir().map_err(CcoreError::Io)?;

    tracing::debug!(
        segments = segment_count,
        segment_seconds = segment_length as u64,
        concurrency,
        "Segmenting audio for parallel transcription"
    );

    let mut segment_paths = Vec::with_capacity(segment_count);
    for index in 0..segment_count {
        ctx.check_cancelled()?;
        let segment_path = workspace.path().join(format!("segment-{index:03}.wav"));
        media::cut_audio_segment(
            path,
            &segment_path,
            index as f64 * segment_length,
            segment_length,
            &ctx.cancel,
        )
        .await?;
        segment_paths.push(segment_path);
    }

    // Counting admission gate: at most `concurrency` transcriptions hold a
    // slot at once; the rest queue. The gate is local to this call.
    let gate = Arc::new(Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();

    for (index, segment_path) in segment_paths.iter().enumerate() {
        let gate = Arc::clone(&gate);
        let backend = backend.clone();
        let policy = policy.clone();
        let token = ctx.cancel.clone();
        let segment_path = segment_path.clone();

        tasks.spawn(async move {
            let _permit = match gate.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (index, Err(CcoreError::Cancelled)),
            };
            if token.is_cancelled() {
                return (index, Err(CcoreError::Cancelled));
            }
            let result = backend.transcribe_file(&segment_path, &policy, &token).await;
            (index, result)
        });
    }

    let mut transcripts: Vec<Option<String>> = vec![None; segment_count];
    let mut failures: Vec<SegmentFailure> = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(text))) => transcripts[index] = Some(text),
            Ok((index, Err(err))) => {
                if matches!(err, CcoreError::Cancelled) {
                    return Err(CcoreError::Cancelled);
                }
                failures.push(SegmentFailure {
                    index,
                    kind: err.kind(),
                    message: err.to_string(),
                });
            }
            Err(join_err) => {
                return Err(CcoreError::Internal(format!("Segment task panicked: {join_err}")));
            }
        }
    }

    if !failures.is_empty() {
        failures.sort_by_key(|f| f.index);
        return Err(CcoreError::Transcription {
            message: format!("{} of {} segments failed", failures.len(), segment_count),
            segments: failures,
        });
    }

    // Assemble strictly in index order; completion order is irrelevant.
    let transcript = transcripts
        .into_iter()
        .map(|t| t.unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\n");

    Ok((transcript, segment_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ExtractionConfig;
    use tokio_util::sync::CancellationToken;

    fn ctx_with_concurrency(concurrency: usize) -> ProcessorContext {
        let mut config = ExtractionConfig::default();
        config.audio.concurrency = concurrency;
        ProcessorContext::new(Arc::new(config), CancellationToken::new())
    }

    #[test]
    fn test_resolve_concurrency_from_config() {
        let ctx = ctx_with_concurrency(4);
        assert_eq!(resolve_concurrency(&Source::file("/tmp/a.mp3"), &ctx), 4);
    }

    #[test]
    fn test_resolve_concurrency_source_override() {
        let ctx = ctx_with_concurrency(4);
        let source = Source::file("/tmp/a.mp3").with_audio_concurrency(2);
        assert_eq!(resolve_concurrency(&source, &ctx), 2);
    }

    #[test]
    fn test_resolve_concurrency_invalid_falls_back() {
        let ctx = ctx_with_concurrency(3);
        let zero = Source::file("/tmp/a.mp3").with_audio_concurrency(0);
        assert_eq!(resolve_concurrency(&zero, &ctx), DEFAULT_AUDIO_CONCURRENCY);

        let huge = Source::file("/tmp/a.mp3").with_audio_concurrency(15);
        assert_eq!(resolve_concurrency(&huge, &ctx), DEFAULT_AUDIO_CONCURRENCY);
    }

    #[test]
    fn test_segment_math() {
        // 35 minutes -> 4 segments of equal length.
        let duration = 35.0 * 60.0;
        let count = (duration / SEGMENT_THRESHOLD_SECONDS).ceil() as usize;
        assert_eq!(count, 4);
        let length = duration / count as f64;
        assert!((length - 525.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_rejects_raw_content() {
        let engine = AudioTranscriberEngine::new();
        let ctx = ProcessorContext::for_testing();
        let result = engine.extract(&Source::raw("audio?"), &ctx).await;
        assert!(matches!(result, Err(CcoreError::UnsupportedContent { .. })));
    }

    /// The admission gate bounds in-flight tasks; verified by counting
    /// concurrent holders with an atomic high-water mark.
    #[tokio::test]
    async fn test_admission_gate_bounds_concurrency() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let gate = Arc::new(Semaphore::new(3));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();

        for _ in 0..12 {
            let gate = Arc::clone(&gate);
            let in_flight = Arc::clone(&in_flight);
            let high_water = Arc::clone(&high_water);
            tasks.spawn(async move {
                let _permit = gate.acquire_owned().await.unwrap();
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                high_water.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            });
        }

        while tasks.join_next().await.is_some() {}
        assert!(high_water.load(Ordering::SeqCst) <= 3);
    }

    /// Results are assembled by segment index, not completion order.
    #[tokio::test]
    async fn test_assembly_is_index_ordered() {
        let mut tasks = JoinSet::new();
        // Later segments complete first.
        for index in 0..4usize {
            tasks.spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis((4 - index) as u64 * 10)).await;
                (index, format!("segment {index}"))
            });
        }

        let mut slots: Vec<Option<String>> = vec![None; 4];
        while let Some(Ok((index, text))) = tasks.join_next().await {
            slots[index] = Some(text);
        }

        let assembled = slots
            .into_iter()
            .map(|t| t.unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(assembled, "segment 0\nsegment 1\nsegment 2\nsegment 3");
    }
}
