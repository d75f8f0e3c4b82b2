//! Video engine: demux the audio track, then re-enter the audio pipeline.

use crate::extraction::media;
use crate::processors::{Processor, ProcessorCapabilities, ProcessorContext};
use crate::types::{Category, ProcessorResult, Source, SourceOrigin};
use crate::{CcoreError, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;

const CAPABILITIES: ProcessorCapabilities = ProcessorCapabilities {
    name: "video-demux",
    mime_types: &["video/*"],
    extensions: &["mp4", "mkv", "mov", "avi", "webm"],
    priority: 50,
    requires: &["ffmpeg", "stt-credentials"],
    category: Category::Video,
};

pub struct VideoDemuxEngine {
    availability: OnceCell<bool>,
}

impl VideoDemuxEngine {
    pub fn new() -> Self {
        Self {
            availability: OnceCell::new(),
        }
    }
}

impl Default for VideoDemuxEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Processor for VideoDemuxEngine {
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
            return Err(CcoreError::unsupported("video demux requires a file source"));
        };

        // Scoped temp artifact: released on success, failure, and
        // cancellation alike when `workspace` drops.
        let workspace = tempfile::tempdir().map_err(CcoreError::Io)?;
        let audio_path = workspace.path().join("audio-track.wav");

        media::demux_audio_track(path, &audio_path, &ctx.cancel).await?;

        let mut result = crate::engines::audio::transcribe_audio_file(&audio_path, source, ctx).await?;
        result.metadata.insert("demuxedFromVideo", serde_json::json!(true));
        result.metadata.source = Some(path.display().to_string());
        Ok(result)
    }
}
