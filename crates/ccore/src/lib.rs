//! ccore - Content Extraction Core
//!
//! ccore turns heterogeneous content sources — URLs, local files (PDF,
//! Office, text/HTML/Markdown, audio, video), YouTube links, and raw text —
//! into a uniform structured extraction result: cleaned textual content
//! plus metadata. Downstream LLM cleanup and summarization consume the
//! result; they are not part of this crate.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ccore::{Source, extract_sync};
//!
//! # fn main() -> ccore::Result<()> {
//! let result = extract_sync(&Source::file("document.pdf"))?;
//! println!("{} (via {})", result.content, result.engine_used);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Processor registry** (`processors`): catalog of extraction engines
//!   with capability-based, priority-ordered lookup
//! - **Engine resolver** (`core::resolver`): explicit override → configured
//!   MIME/wildcard/category chains → legacy config → auto-detect
//! - **Extraction router** (`core::router`): runs the chain under the
//!   fallback policy and the overall time budget
//! - **Engines** (`engines`): document formats, the URL cascade, audio
//!   segmentation with bounded-concurrency transcription, video demux, and
//!   YouTube transcripts
//!
//! # Configuration
//!
//! Each request snapshots configuration from `CCORE_*` environment
//! variables (see the README for the full table), unless a programmatic
//! override is installed with [`set_config_override`].

pub mod core;
pub mod engines;
pub mod error;
pub mod extraction;
pub mod processors;
pub mod types;
pub mod utils;

pub use error::{CcoreError, EngineAttempt, ErrorKind, Result, SegmentFailure};
pub use types::{Category, ExtractionResult, Metadata, OutputFormat, ProcessorResult, Source, SourceOrigin};

pub use core::config::{
    AudioConfig, ExtractionConfig, FallbackPolicy, OnErrorPolicy, reset_config_override, set_config_override,
};

pub use core::extractor::{
    classify_source, extract, extract_file, extract_file_sync, extract_string, extract_string_sync, extract_sync,
    extract_url, extract_url_sync, extract_with_config, extract_with_config_sync, is_youtube_url,
};

pub use core::mime::{
    HTML_MIME_TYPE, MARKDOWN_MIME_TYPE, PDF_MIME_TYPE, PLAIN_TEXT_MIME_TYPE, URL_MIME_TYPE, YOUTUBE_MIME_TYPE,
    detect_mime_type, detect_mime_type_from_bytes,
};

pub use core::resolver::resolve_engine_chain;

pub use processors::registry::{ProcessorRegistry, get_processor_registry};
pub use processors::{Processor, ProcessorCapabilities, ProcessorContext};

pub use engines::{ensure_initialized, register_default_processors};
