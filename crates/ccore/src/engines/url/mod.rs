//! URL engine cascade.
//!
//! Engines form a prioritized cascade: `firecrawl` (65) > `jina` (60) >
//! `headless` (55) > `basic` (40). Availability gating collapses the
//! cascade naturally when credentials or local dependencies are missing.
//! All engines share one contract: input URL, output cleaned main-content
//! markdown plus final URL and title metadata.

pub mod basic;
pub mod firecrawl;
pub mod headless;
pub mod jina;

pub use basic::BasicUrlEngine;
pub use firecrawl::FirecrawlEngine;
pub use headless::HeadlessEngine;
pub use jina::JinaEngine;

pub(crate) use crate::utils::http::send_with_retry;
use crate::{CcoreError, Result};

/// The URL carried by a source, or `UnsupportedContent` for other origins.
pub(crate) fn require_url(source: &crate::types::Source) -> Result<&str> {
    match &source.origin {
        crate::types::SourceOrigin::Url(url) => Ok(url),
        _ => Err(CcoreError::unsupported("URL engines require a URL source")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::http::status_error;

    #[test]
    fn test_transient_statuses_are_retryable() {
        let server_error = status_error(reqwest::StatusCode::from_u16(502).unwrap(), "test");
        assert!(server_error.is_transient());

        let rate_limited = status_error(reqwest::StatusCode::from_u16(429).unwrap(), "test");
        assert!(rate_limited.is_transient());

        let not_found = status_error(reqwest::StatusCode::from_u16(404).unwrap(), "test");
        assert!(!not_found.is_transient());
    }

    #[test]
    fn test_require_url() {
        assert!(require_url(&crate::types::Source::url("https://a.example")).is_ok());
        assert!(require_url(&crate::types::Source::raw("text")).is_err());
    }

    #[test]
    fn test_cascade_priorities() {
        use crate::processors::Processor;
        let firecrawl = FirecrawlEngine::new();
        let jina = JinaEngine::new();
        let headless = HeadlessEngine::new();
        let basic = BasicUrlEngine::new();

        assert_eq!(firecrawl.capabilities().priority, 65);
        assert_eq!(jina.capabilities().priority, 60);
        assert_eq!(headless.capabilities().priority, 55);
        assert_eq!(basic.capabilities().priority, 40);
    }
}
