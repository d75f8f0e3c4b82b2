//! ffmpeg/ffprobe subprocess helpers for the audio and video pipelines.
//!
//! Probing and cutting go through the system `ffprobe`/`ffmpeg` binaries,
//! driven with `tokio::process`. Child processes are spawned with
//! `kill_on_drop` and raced against the extraction's cancellation token, so
//! a cancelled call never leaves a stray encoder running.
//!
//! Binary discovery honors `CCORE_FFMPEG_PATH` / `CCORE_FFPROBE_PATH`
//! before walking `PATH`.

use crate::{CcoreError, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

fn locate_binary(env_override: &str, names: &[&str]) -> Option<PathBuf> {
    if let Some(value) = std::env::var_os(env_override).filter(|v| !v.is_empty()) {
        let candidate = PathBuf::from(value);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    let path_env = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_env) {
        for name in names {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Locate the ffmpeg binary, if installed.
pub fn find_ffmpeg() -> Option<PathBuf> {
    locate_binary("CCORE_FFMPEG_PATH", &["ffmpeg", "ffmpeg.exe"])
}

/// Locate the ffprobe binary, if installed.
pub fn find_ffprobe() -> Option<PathBuf> {
    locate_binary("CCORE_FFPROBE_PATH", &["ffprobe", "ffprobe.exe"])
}

async fn run_tool(
    binary: &Path,
    args: &[&str],
    token: &CancellationToken,
    what: &str,
) -> Result<Vec<u8>> {
    if token.is_cancelled() {
        return Err(CcoreError::Cancelled);
    }

    let mut command = Command::new(binary);
    command.args(args).kill_on_drop(true);

    let output = tokio::select! {
        _ = token.cancelled() => return Err(CcoreError::Cancelled),
        output = command.output() => output.map_err(CcoreError::Io)?,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CcoreError::parse(format!(
            "{what} failed ({}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}

/// Probe the container duration of a media file in seconds.
pub async fn probe_duration_seconds(input: &Path, token: &CancellationToken) -> Result<f64> {
    let ffprobe = find_ffprobe()
        .ok_or_else(|| CcoreError::EngineUnavailable {
            engine: "ffprobe".to_string(),
            message: "ffprobe binary not found on PATH".to_string(),
        })?;

    let input_str = input.to_string_lossy();
    let args = [
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=nw=1:nk=1",
        input_str.as_ref(),
    ];

    let stdout = run_tool(&ffprobe, &args, token, "ffprobe").await?;
    let text = String::from_utf8_lossy(&stdout);
    let first = text.lines().next().unwrap_or_default().trim();

    first
        .parse::<f64>()
        .map_err(|_| CcoreError::parse(format!("ffprobe returned a non-numeric duration: '{first}'")))
}

/// Cut `[start, start + duration)` out of an audio file into a mono 16 kHz
/// WAV, the shape the STT backends accept.
pub async fn cut_audio_segment(
    input: &Path,
    output: &Path,
    start_seconds: f64,
    duration_seconds: f64,
    token: &CancellationToken,
) -> Result<()> {
    let ffmpeg = ffmpeg_or_unavailable()?;

    let start = format!("{start_seconds:.3}");
    let duration = format!("{duration_seconds:.3}");
    let input_str = input.to_string_lossy();
    let output_str = output.to_string_lossy();
    let args = [
        "-v",
        "error",
        "-y",
        "-ss",
        start.as_str(),
        "-t",
        duration.as_str(),
        "-i",
        input_str.as_ref(),
        "-vn",
        "-acodec",
        "pcm_s16le",
        "-ar",
        "16000",
        "-ac",
        "1",
        output_str.as_ref(),
    ];

    run_tool(&ffmpeg, &args, token, "ffmpeg segment cut").await?;
    Ok(())
}

/// Extract the audio track of a video file into a mono 16 kHz WAV.
pub async fn demux_audio_track(input: &Path, output: &Path, token: &CancellationToken) -> Result<()> {
    let ffmpeg = ffmpeg_or_unavailable()?;

    let input_str = input.to_string_lossy();
    let output_str = output.to_string_lossy();
    let args = [
        "-v",
        "error",
        "-y",
        "-i",
        input_str.as_ref(),
        "-vn",
        "-acodec",
        "pcm_s16le",
        "-ar",
        "16000",
        "-ac",
        "1",
        output_str.as_ref(),
    ];

    run_tool(&ffmpeg, &args, token, "ffmpeg audio demux").await?;
    Ok(())
}

fn ffmpeg_or_unavailable() -> Result<PathBuf> {
    find_ffmpeg().ok_or_else(|| CcoreError::EngineUnavailable {
        engine: "ffmpeg".to_string(),
        message: "ffmpeg binary not found on PATH".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_binary_env_override_must_exist() {
        // A bogus override must not be returned.
        unsafe { std::env::set_var("CCORE_TEST_TOOL_PATH", "/nonexistent/tool") };
        assert!(locate_binary("CCORE_TEST_TOOL_PATH", &["definitely-not-a-real-tool"]).is_none());
        unsafe { std::env::remove_var("CCORE_TEST_TOOL_PATH") };
    }

    #[tokio::test]
    async fn test_probe_missing_input_errors() {
        if find_ffprobe().is_none() {
            return;
        }
        let token = CancellationToken::new();
        let result = probe_duration_seconds(Path::new("/nonexistent/clip.mp3"), &token).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        if find_ffprobe().is_none() {
            return;
        }
        let token = CancellationToken::new();
        token.cancel();
        let result = probe_duration_seconds(Path::new("/nonexistent/clip.mp3"), &token).await;
        assert!(matches!(result, Err(CcoreError::Cancelled)));
    }
}
