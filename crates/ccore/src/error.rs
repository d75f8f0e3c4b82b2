//! Error types for ccore.
//!
//! All fallible operations return [`Result`], built on a single [`CcoreError`]
//! enum. The enum mirrors the router's error taxonomy: every variant maps to
//! an [`ErrorKind`] token that the fallback policy can match against
//! (`fatal_errors`, retry classification), while the variant itself carries
//! the human-readable context.
//!
//! # Error Handling Philosophy
//!
//! **System errors bubble up unchanged:**
//! - `CcoreError::Io` (from `std::io::Error`) - file system and permission
//!   errors surface as-is so users can report real system problems.
//!
//! **Pipeline errors are classified:**
//! - Transient kinds (`Network`, `RateLimit`, `Timeout`) are retried inside
//!   engines with exponential backoff.
//! - Terminal kinds (`Auth`, `NotFound`, `Parse`, `UnsupportedContent`) end
//!   the current engine's attempt and hand control back to the router.
use thiserror::Error;

/// Result type alias using `CcoreError`.
pub type Result<T> = std::result::Result<T, CcoreError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all ccore operations.
#[derive(Debug, Error)]
pub enum CcoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An explicitly requested engine name is not registered.
    #[error("Engine not found: {0}")]
    EngineNotFound(String),

    /// The engine is registered but its dependencies or credentials are
    /// missing at runtime.
    #[error("Engine '{engine}' unavailable: {message}")]
    EngineUnavailable { engine: String, message: String },

    /// The resolver produced no candidates for the MIME type.
    #[error("No engine available for MIME type: {0}")]
    NoEngineAvailable(String),

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// The backend signalled throttling; retry with backoff.
    #[error("Rate limited: {message}")]
    RateLimit { message: String },

    /// Credentials rejected; terminal for the engine that hit it.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// The remote host refused to serve us (HTTP 403 or a known block
    /// signature). Surfaced distinctly so callers can present specific
    /// guidance.
    #[error("Blocked by remote host: {message}")]
    Blocked { message: String },

    /// The backend says the resource does not exist.
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Parse error: {message}")]
    Parse {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// The engine recognizes it cannot handle this payload.
    #[error("Unsupported content: {message}")]
    UnsupportedContent { message: String },

    #[error("Timed out: {message}")]
    Timeout { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    /// Audio transcription failed for one or more segments. Siblings are
    /// allowed to finish before this is assembled, so `segments` carries the
    /// full per-segment breakdown.
    #[error("Transcription failed: {message}")]
    Transcription {
        message: String,
        segments: Vec<SegmentFailure>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Every engine in the resolved chain failed. `attempts` preserves the
    /// order in which engines were tried.
    #[error("All engines failed for '{mime}': {}", format_attempts(.attempts))]
    AllEnginesFailed {
        mime: String,
        attempts: Vec<EngineAttempt>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_attempts(attempts: &[EngineAttempt]) -> String {
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl CcoreError {
    /// Create a `Network` error.
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a `Network` error with source.
    pub fn network_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a `Parse` error.
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a `Parse` error with source.
    pub fn parse_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Parse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a `Validation` error.
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            source: None,
        }
    }

    /// Create a `Serialization` error.
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization {
            message: message.into(),
            source: None,
        }
    }

    /// Create an `UnsupportedContent` error.
    pub fn unsupported<S: Into<String>>(message: S) -> Self {
        Self::UnsupportedContent { message: message.into() }
    }

    /// Create a `Timeout` error.
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout { message: message.into() }
    }

    /// The classification token for this error, used by the fallback policy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::EngineNotFound(_) => ErrorKind::EngineNotFound,
            Self::EngineUnavailable { .. } => ErrorKind::EngineUnavailable,
            Self::NoEngineAvailable(_) => ErrorKind::NoEngineAvailable,
            Self::Network { .. } => ErrorKind::Network,
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::Blocked { .. } => ErrorKind::Blocked,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::UnsupportedContent { .. } => ErrorKind::UnsupportedContent,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Transcription { .. } => ErrorKind::Transcription,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Serialization { .. } => ErrorKind::Serialization,
            Self::AllEnginesFailed { .. } => ErrorKind::AllEnginesFailed,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the error is worth retrying with backoff inside an engine.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::RateLimit { .. } | Self::Timeout { .. }
        )
    }
}

impl From<serde_json::Error> for CcoreError {
    fn from(err: serde_json::Error) -> Self {
        CcoreError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for CcoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return CcoreError::Timeout {
                message: err.to_string(),
            };
        }
        if let Some(status) = err.status() {
            return match status.as_u16() {
                401 => CcoreError::Auth {
                    message: err.to_string(),
                },
                403 => CcoreError::Blocked {
                    message: err.to_string(),
                },
                404 => CcoreError::NotFound {
                    message: err.to_string(),
                },
                429 => CcoreError::RateLimit {
                    message: err.to_string(),
                },
                _ => CcoreError::network_with_source(format!("HTTP {status}"), err),
            };
        }
        CcoreError::Network {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

/// Classification token for an error, independent of the carried context.
///
/// Tokens are the snake_case names accepted by `CCORE_FALLBACK_FATAL_ERRORS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Io,
    EngineNotFound,
    EngineUnavailable,
    NoEngineAvailable,
    Network,
    RateLimit,
    Auth,
    Blocked,
    NotFound,
    Parse,
    UnsupportedContent,
    Timeout,
    Cancelled,
    Transcription,
    Validation,
    Serialization,
    AllEnginesFailed,
    Internal,
}

impl ErrorKind {
    /// The snake_case token used in configuration and attempt records.
    pub fn as_token(&self) -> &'static str {
        match self {
            Self::Io => "io",
            Self::EngineNotFound => "engine_not_found",
            Self::EngineUnavailable => "engine_unavailable",
            Self::NoEngineAvailable => "no_engine_available",
            Self::Network => "network",
            Self::RateLimit => "rate_limit",
            Self::Auth => "auth",
            Self::Blocked => "blocked",
            Self::NotFound => "not_found",
            Self::Parse => "parse",
            Self::UnsupportedContent => "unsupported_content",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Transcription => "transcription",
            Self::Validation => "validation",
            Self::Serialization => "serialization",
            Self::AllEnginesFailed => "all_engines_failed",
            Self::Internal => "internal",
        }
    }

    /// Parse a configuration token. Unknown tokens return `None` so callers
    /// can warn and drop them.
    pub fn parse_token(token: &str) -> Option<Self> {
        let kind = match token.trim().to_ascii_lowercase().as_str() {
            "io" => Self::Io,
            "engine_not_found" => Self::EngineNotFound,
            "engine_unavailable" => Self::EngineUnavailable,
            "no_engine_available" => Self::NoEngineAvailable,
            "network" => Self::Network,
            "rate_limit" => Self::RateLimit,
            "auth" => Self::Auth,
            "blocked" => Self::Blocked,
            "not_found" => Self::NotFound,
            "parse" => Self::Parse,
            "unsupported_content" => Self::UnsupportedContent,
            "timeout" => Self::Timeout,
            "cancelled" => Self::Cancelled,
            "transcription" => Self::Transcription,
            "validation" => Self::Validation,
            "serialization" => Self::Serialization,
            "all_engines_failed" => Self::AllEnginesFailed,
            "internal" => Self::Internal,
            _ => return None,
        };
        Some(kind)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_token())
    }
}

/// One engine's terminal outcome inside a failed extraction, in attempt order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EngineAttempt {
    pub engine: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl EngineAttempt {
    pub fn new(engine: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for EngineAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.engine, self.kind, self.message)
    }
}

/// Terminal failure of a single audio segment.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SegmentFailure {
    pub index: usize,
    pub kind: ErrorKind,
    pub message: String,
}

impl std::fmt::Display for SegmentFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "segment {} ({}): {}", self.index, self.kind, self.message)
    }
}
