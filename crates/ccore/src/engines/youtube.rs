//! YouTube transcript engine.
//!
//! Obtains a transcript for a YouTube URL without downloading the video:
//! scrape the watch page with a browser-like User-Agent, pull the caption
//! track list out of the embedded player response, pick a track by language
//! priority, and fetch it in the `json3` timed-text format.
//!
//! A valid video with no caption tracks is a success with empty content and
//! explanatory metadata, not an error.

use crate::processors::{Processor, ProcessorCapabilities, ProcessorContext};
use crate::types::{Category, ProcessorResult, Source, SourceOrigin};
use crate::utils::http::{self, send_with_retry};
use crate::utils::retry::RetryPolicy;
use crate::{CcoreError, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

const CAPABILITIES: ProcessorCapabilities = ProcessorCapabilities {
    name: "youtube-transcript",
    mime_types: &[crate::core::mime::YOUTUBE_MIME_TYPE],
    extensions: &[],
    priority: 60,
    requires: &[],
    category: Category::Youtube,
};

static VIDEO_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"[?&]v=([A-Za-z0-9_-]{6,})").expect("valid regex"),
        Regex::new(r"youtu\.be/([A-Za-z0-9_-]{6,})").expect("valid regex"),
        Regex::new(r"/shorts/([A-Za-z0-9_-]{6,})").expect("valid regex"),
        Regex::new(r"/embed/([A-Za-z0-9_-]{6,})").expect("valid regex"),
    ]
});

static OG_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<meta[^>]*property=["']og:title["'][^>]*content=["']([^"']*)["']"#).expect("valid regex")
});
static OG_TITLE_REVERSED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<meta[^>]*content=["']([^"']*)["'][^>]*property=["']og:title["']"#).expect("valid regex")
});
static NAME_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<meta[^>]*name=["']title["'][^>]*content=["']([^"']*)["']"#).expect("valid regex")
});
static TITLE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<title[^>]*>([^<]*)</title>").expect("valid regex"));

/// Extract the video ID from a YouTube URL.
pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(url).map(|c| c[1].to_string()))
}

/// Pull the page title out of watch-page HTML, trying `og:title`, then
/// `name="title"`, then the `<title>` tag. Returns `None` when all are
/// missing; the caller synthesizes a fallback.
pub fn extract_page_title(html: &str) -> Option<String> {
    let raw = OG_TITLE
        .captures(html)
        .or_else(|| OG_TITLE_REVERSED.captures(html))
        .or_else(|| NAME_TITLE.captures(html))
        .map(|c| c[1].to_string())
        .or_else(|| {
            TITLE_TAG.captures(html).map(|c| {
                c[1].trim()
                    .trim_end_matches("- YouTube")
                    .trim()
                    .to_string()
            })
        })?;

    let title = decode_html_entities(&raw);
    if title.is_empty() { None } else { Some(title) }
}

fn decode_html_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .trim()
        .to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode", default)]
    language_code: String,
    /// `"asr"` marks auto-generated tracks.
    #[serde(default)]
    kind: Option<String>,
}

impl CaptionTrack {
    fn is_auto_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// Extract the `captionTracks` JSON array embedded in the player response.
///
/// The watch page inlines the player response as JavaScript; the array is
/// located textually and sliced out with a string-aware bracket scan, then
/// parsed as JSON.
fn extract_caption_tracks(html: &str) -> Result<Vec<CaptionTrack>> {
    let Some(key_pos) = html.find("\"captionTracks\":") else {
        return Ok(Vec::new());
    };
    let array_start = key_pos + "\"captionTracks\":".len();
    let slice = &html[array_start..];

    let Some(json) = balanced_array(slice) else {
        return Err(CcoreError::parse("captionTracks array is malformed"));
    };

    serde_json::from_str(json)
        .map_err(|e| CcoreError::parse_with_source("Failed to parse captionTracks", e))
}

/// Slice the leading balanced `[...]` from `text`, honoring JSON string
/// escapes.
fn balanced_array(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.first() != Some(&b'[') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Walk the preferred languages and pick the first matching track: an exact
/// manual track wins over the auto-generated variant of the same language.
/// When nothing matches, the first available track is used with a warning.
fn select_track<'a>(
    tracks: &'a [CaptionTrack],
    preferred_languages: &[String],
    warnings: &mut Vec<String>,
) -> &'a CaptionTrack {
    for language in preferred_languages {
        if let Some(track) = tracks
            .iter()
            .find(|t| t.language_code == *language && !t.is_auto_generated())
        {
            return track;
        }
        if let Some(track) = tracks.iter().find(|t| t.language_code == *language) {
            return track;
        }
    }

    let first = &tracks[0];
    warnings.push(format!(
        "No caption track matched preferred languages [{}]; using '{}'",
        preferred_languages.join(", "),
        first.language_code
    ));
    first
}

/// One caption cue in the time-coded transcript form.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TranscriptCue {
    pub start_ms: u64,
    pub duration_ms: u64,
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct Json3Transcript {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    #[serde(rename = "tStartMs", default)]
    start_ms: u64,
    #[serde(rename = "dDurationMs", default)]
    duration_ms: u64,
    #[serde(default)]
    segs: Option<Vec<Json3Seg>>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

fn parse_json3_transcript(body: &str) -> Result<Vec<TranscriptCue>> {
    let transcript: Json3Transcript = serde_json::from_str(body)
        .map_err(|e| CcoreError::parse_with_source("Failed to parse timed-text response", e))?;

    let cues = transcript
        .events
        .into_iter()
        .filter_map(|event| {
            let text = event
                .segs?
                .into_iter()
                .map(|seg| seg.utf8)
                .collect::<String>()
                .replace('\n', " ")
                .trim()
                .to_string();
            if text.is_empty() {
                return None;
            }
            Some(TranscriptCue {
                start_ms: event.start_ms,
                duration_ms: event.duration_ms,
                text,
            })
        })
        .collect();

    Ok(cues)
}

pub struct YouTubeTranscriptEngine;

impl YouTubeTranscriptEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for YouTubeTranscriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Processor for YouTubeTranscriptEngine {
    fn capabilities(&self) -> &ProcessorCapabilities {
        &CAPABILITIES
    }

    async fn extract(&self, source: &Source, ctx: &ProcessorContext) -> Result<ProcessorResult> {
        ctx.check_cancelled()?;

        let SourceOrigin::Url(url) = &source.origin else {
            return Err(CcoreError::unsupported("youtube engine requires a URL source"));
        };

        let video_id = extract_video_id(url)
            .ok_or_else(|| CcoreError::parse(format!("Could not extract a YouTube video ID from '{url}'")))?;

        let policy = RetryPolicy::default();
        let watch_url = format!("https://www.youtube.com/watch?v={video_id}");
        let request = http::client()
            .get(&watch_url)
            .header(reqwest::header::USER_AGENT, http::BROWSER_USER_AGENT)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9");
        let response = send_with_retry(request, &policy, &ctx.cancel, "youtube").await?;
        let html = response.text().await.map_err(CcoreError::from)?;

        ctx.check_cancelled()?;

        // A missing title is non-fatal.
        let title = extract_page_title(&html).unwrap_or_else(|| format!("YouTube Video {video_id}"));

        let tracks = extract_caption_tracks(&html)?;
        if tracks.is_empty() {
            let mut result = ProcessorResult::new("", "text/plain");
            result.metadata.title = Some(title);
            result.metadata.insert("video_id", serde_json::json!(video_id));
            result.metadata.insert("error", serde_json::json!("no_captions"));
            result.metadata.insert("message", serde_json::json!("No captions available"));
            return Ok(result);
        }

        let mut warnings = Vec::new();
        let track = select_track(&tracks, &ctx.config.youtube_languages, &mut warnings);

        let separator = if track.base_url.contains('?') { '&' } else { '?' };
        let transcript_url = format!("{}{}fmt=json3", track.base_url, separator);
        let request = http::client()
            .get(&transcript_url)
            .header(reqwest::header::USER_AGENT, http::BROWSER_USER_AGENT);
        let response = send_with_retry(request, &policy, &ctx.cancel, "youtube-timedtext").await?;
        let body = response.text().await.map_err(CcoreError::from)?;

        ctx.check_cancelled()?;

        let cues = parse_json3_transcript(&body)?;
        if cues.is_empty() {
            return Err(CcoreError::unsupported(format!(
                "Caption track '{}' produced no text",
                track.language_code
            )));
        }

        let plain_text = cues.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n");

        let mut result = ProcessorResult::new(plain_text, "text/plain");
        result.metadata.title = Some(title);
        result.metadata.source = Some(watch_url);
        result.metadata.insert("video_id", serde_json::json!(video_id));
        result.metadata.insert("captionLanguage", serde_json::json!(track.language_code));
        result
            .metadata
            .insert("autoGenerated", serde_json::json!(track.is_auto_generated()));
        result
            .metadata
            .insert("timedTranscript", serde_json::to_value(&cues)?);
        result.warnings = warnings;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id_variants() {
        let id = "dQw4w9WgXcQ";
        let urls = [
            format!("https://www.youtube.com/watch?v={id}"),
            format!("https://www.youtube.com/watch?feature=shared&v={id}"),
            format!("https://youtu.be/{id}"),
            format!("https://www.youtube.com/shorts/{id}"),
            format!("https://www.youtube.com/embed/{id}"),
        ];
        for url in &urls {
            assert_eq!(extract_video_id(url).as_deref(), Some(id), "url {url}");
        }

        assert_eq!(extract_video_id("https://www.youtube.com/feed/library"), None);
    }

    #[test]
    fn test_extract_page_title_fallback_chain() {
        let og = r#"<meta property="og:title" content="From OG"><title>From Tag - YouTube</title>"#;
        assert_eq!(extract_page_title(og).as_deref(), Some("From OG"));

        let name = r#"<meta name="title" content="From Name"><title>From Tag - YouTube</title>"#;
        assert_eq!(extract_page_title(name).as_deref(), Some("From Name"));

        let tag_only = "<title>From Tag - YouTube</title>";
        assert_eq!(extract_page_title(tag_only).as_deref(), Some("From Tag"));

        assert_eq!(extract_page_title("<html><body></body></html>"), None);
    }

    #[test]
    fn test_extract_page_title_decodes_entities() {
        let html = r#"<meta property="og:title" content="Q&amp;A: Rust &#39;async&#39;">"#;
        assert_eq!(extract_page_title(html).as_deref(), Some("Q&A: Rust 'async'"));
    }

    #[test]
    fn test_extract_caption_tracks() {
        let html = r#"prefix "captionTracks":[{"baseUrl":"https://yt.example/tt?lang=en","languageCode":"en"},{"baseUrl":"https://yt.example/tt?lang=pt&kind=asr","languageCode":"pt","kind":"asr"}] suffix"#;
        let tracks = extract_caption_tracks(html).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].language_code, "en");
        assert!(!tracks[0].is_auto_generated());
        assert!(tracks[1].is_auto_generated());
        // JSON unicode escapes decode in parsing.
        assert!(tracks[1].base_url.contains("&kind=asr"));
    }

    #[test]
    fn test_extract_caption_tracks_absent() {
        let tracks = extract_caption_tracks("<html>no captions here</html>").unwrap();
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_balanced_array_with_nested_strings() {
        let text = r#"[{"a":"tricky ] bracket","b":[1,2]}] trailing"#;
        assert_eq!(balanced_array(text), Some(r#"[{"a":"tricky ] bracket","b":[1,2]}]"#));
        assert_eq!(balanced_array("not an array"), None);
        assert_eq!(balanced_array("[unterminated"), None);
    }

    fn track(lang: &str, kind: Option<&str>) -> CaptionTrack {
        CaptionTrack {
            base_url: format!("https://yt.example/tt?lang={lang}"),
            language_code: lang.to_string(),
            kind: kind.map(String::from),
        }
    }

    #[test]
    fn test_select_track_prefers_manual_over_asr() {
        let tracks = vec![track("en", Some("asr")), track("en", None)];
        let mut warnings = Vec::new();
        let selected = select_track(&tracks, &["en".to_string()], &mut warnings);
        assert!(!selected.is_auto_generated());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_select_track_language_priority() {
        let tracks = vec![track("de", None), track("pt", None)];
        let languages = vec!["en".to_string(), "es".to_string(), "pt".to_string()];
        let mut warnings = Vec::new();
        let selected = select_track(&tracks, &languages, &mut warnings);
        assert_eq!(selected.language_code, "pt");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_select_track_fallback_warns() {
        let tracks = vec![track("ja", Some("asr"))];
        let languages = vec!["en".to_string()];
        let mut warnings = Vec::new();
        let selected = select_track(&tracks, &languages, &mut warnings);
        assert_eq!(selected.language_code, "ja");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("ja"));
    }

    #[test]
    fn test_parse_json3_transcript() {
        let body = r#"{
            "events": [
                {"tStartMs": 0, "dDurationMs": 2000, "segs": [{"utf8": "Hello "}, {"utf8": "world"}]},
                {"tStartMs": 2000, "dDurationMs": 1000},
                {"tStartMs": 3000, "dDurationMs": 1500, "segs": [{"utf8": "\n"}]},
                {"tStartMs": 4500, "dDurationMs": 1200, "segs": [{"utf8": "second line"}]}
            ]
        }"#;
        let cues = parse_json3_transcript(body).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "Hello world");
        assert_eq!(cues[0].start_ms, 0);
        assert_eq!(cues[1].text, "second line");
        assert_eq!(cues[1].start_ms, 4500);
    }

    #[test]
    fn test_parse_json3_transcript_invalid() {
        assert!(parse_json3_transcript("<xml/>").is_err());
    }

    #[tokio::test]
    async fn test_rejects_non_url_sources() {
        let engine = YouTubeTranscriptEngine::new();
        let ctx = ProcessorContext::for_testing();
        let result = engine.extract(&Source::raw("text"), &ctx).await;
        assert!(matches!(result, Err(CcoreError::UnsupportedContent { .. })));
    }

    #[tokio::test]
    async fn test_malformed_url_is_parse_error() {
        let engine = YouTubeTranscriptEngine::new();
        let ctx = ProcessorContext::for_testing();
        let result = engine
            .extract(&Source::url("https://www.youtube.com/feed/library"), &ctx)
            .await;
        assert!(matches!(result, Err(CcoreError::Parse { .. })));
    }
}
