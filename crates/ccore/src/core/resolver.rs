//! Engine chain resolution.
//!
//! Pure dispatch logic: given a MIME type, an optional explicit override,
//! the configuration snapshot, and the registry, produce the ordered engine
//! chain the router will attempt. The resolver performs no I/O and no error
//! classification; it returns engine names only.
//!
//! Resolution order (first non-empty source wins, except the explicit
//! override which replaces everything):
//!
//! 1. Explicit caller override (verbatim; unknown names fail fast)
//! 2. Configured chain for the exact MIME type
//! 3. Configured chain for the wildcard (`image/*`)
//! 4. Configured chain for the category
//! 5. Legacy single-engine config (document or URL)
//! 6. Auto-detect from the registry, ordered by availability and priority

use crate::core::config::{ExtractionConfig, OnErrorPolicy};
use crate::core::mime::category_for_mime;
use crate::processors::registry::ProcessorRegistry;
use crate::types::Category;
use crate::{CcoreError, Result};

/// Resolve the engine chain for a MIME type.
///
/// The returned chain is non-empty and already capped by the fallback
/// policy (`enabled == false` truncates to one engine; `max_attempts` caps
/// the length).
pub fn resolve_engine_chain(
    mime: &str,
    explicit: Option<&[String]>,
    config: &ExtractionConfig,
    registry: &ProcessorRegistry,
) -> Result<Vec<String>> {
    if let Some(explicit) = explicit {
        if explicit.is_empty() {
            return Err(CcoreError::validation("Explicit engine override is empty"));
        }
        // The override is used verbatim: no fallback to configured or
        // auto-detected chains, and a missing engine fails before any I/O.
        for name in explicit {
            if registry.get_by_name(name).is_none() {
                return Err(CcoreError::EngineNotFound(name.clone()));
            }
        }
        return Ok(cap_chain(explicit.to_vec(), config));
    }

    if let Some(chain) = config.chain_for_mime(mime) {
        let sanitized = sanitize_chain(chain, config, registry)?;
        if !sanitized.is_empty() {
            return Ok(cap_chain(sanitized, config));
        }
    }

    if let Some(chain) = config.chain_for_wildcard(mime) {
        let sanitized = sanitize_chain(chain, config, registry)?;
        if !sanitized.is_empty() {
            return Ok(cap_chain(sanitized, config));
        }
    }

    let category = category_for_mime(mime);
    if let Some(chain) = config.chain_for_category(category) {
        let sanitized = sanitize_chain(chain, config, registry)?;
        if !sanitized.is_empty() {
            return Ok(cap_chain(sanitized, config));
        }
    }

    if let Some(legacy) = legacy_engine_for(category, config) {
        let sanitized = sanitize_chain(std::slice::from_ref(legacy), config, registry)?;
        if !sanitized.is_empty() {
            return Ok(cap_chain(sanitized, config));
        }
    }

    let auto: Vec<String> = registry
        .find_by_mime(mime)
        .iter()
        .map(|p| p.capabilities().name.to_string())
        .collect();
    if !auto.is_empty() {
        return Ok(cap_chain(auto, config));
    }

    Err(CcoreError::NoEngineAvailable(mime.to_string()))
}

fn legacy_engine_for(category: Category, config: &ExtractionConfig) -> Option<&String> {
    match category {
        Category::Urls | Category::Youtube => config.legacy_url_engine.as_ref(),
        Category::Documents | Category::Text | Category::Images => config.legacy_document_engine.as_ref(),
        Category::Audio | Category::Video => None,
    }
}

/// Drop configured engine names that are not registered, warning for each.
/// Under `on_error = fail` an unknown name fails the resolution instead.
fn sanitize_chain(
    chain: &[String],
    config: &ExtractionConfig,
    registry: &ProcessorRegistry,
) -> Result<Vec<String>> {
    let mut sanitized = Vec::with_capacity(chain.len());
    for name in chain {
        if registry.get_by_name(name).is_some() {
            sanitized.push(name.clone());
        } else if config.fallback.on_error == OnErrorPolicy::Fail {
            return Err(CcoreError::EngineNotFound(name.clone()));
        } else {
            tracing::warn!(engine = %name, "Configured engine is not registered, dropping from chain");
        }
    }
    Ok(sanitized)
}

fn cap_chain(mut chain: Vec<String>, config: &ExtractionConfig) -> Vec<String> {
    let cap = if config.fallback.enabled {
        config.fallback.max_attempts.max(1)
    } else {
        1
    };
    chain.truncate(cap);
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::{Processor, ProcessorCapabilities, ProcessorContext};
    use crate::types::{ProcessorResult, Source};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Stub {
        caps: ProcessorCapabilities,
        available: bool,
    }

    #[async_trait]
    impl Processor for Stub {
        fn capabilities(&self) -> &ProcessorCapabilities {
            &self.caps
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn extract(&self, _: &Source, _: &ProcessorContext) -> crate::Result<ProcessorResult> {
            Ok(ProcessorResult::new("", "text/plain"))
        }
    }

    fn registry() -> ProcessorRegistry {
        let mut registry = ProcessorRegistry::new();
        let entries: &[(&'static str, &'static [&'static str], i32, bool)] = &[
            ("pdf-vlm", &["application/pdf"], 80, false),
            ("pdf-text", &["application/pdf"], 60, true),
            ("office", &["application/vnd.oasis.opendocument.text"], 50, true),
        ];
        for (name, mimes, priority, available) in entries {
            registry
                .register(Arc::new(Stub {
                    caps: ProcessorCapabilities {
                        name,
                        mime_types: mimes,
                        extensions: &[],
                        priority: *priority,
                        requires: &[],
                        category: Category::Documents,
                    },
                    available: *available,
                }))
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_explicit_override_is_verbatim() {
        let registry = registry();
        let config = ExtractionConfig::default()
            .with_mime_chain("application/pdf", vec!["office".to_string()]);

        let chain = resolve_engine_chain(
            "application/pdf",
            Some(&["pdf-text".to_string()][..]),
            &config,
            &registry,
        )
        .unwrap();
        assert_eq!(chain, vec!["pdf-text"]);
    }

    #[test]
    fn test_explicit_override_unknown_engine_fails_fast() {
        let registry = registry();
        let config = ExtractionConfig::default();

        let result = resolve_engine_chain(
            "application/pdf",
            Some(&["pymupdf".to_string()][..]),
            &config,
            &registry,
        );
        assert!(matches!(result, Err(CcoreError::EngineNotFound(name)) if name == "pymupdf"));
    }

    #[test]
    fn test_exact_mime_beats_category() {
        let registry = registry();
        let config = ExtractionConfig::default()
            .with_mime_chain("application/pdf", vec!["pdf-text".to_string()])
            .with_category_chain(Category::Documents, vec!["office".to_string()]);

        let chain = resolve_engine_chain("application/pdf", None, &config, &registry).unwrap();
        assert_eq!(chain, vec!["pdf-text"]);
    }

    #[test]
    fn test_wildcard_beats_category() {
        let registry = registry();
        let config = ExtractionConfig::default()
            .with_mime_chain("application/*", vec!["pdf-text".to_string()])
            .with_category_chain(Category::Documents, vec!["office".to_string()]);

        let chain = resolve_engine_chain("application/pdf", None, &config, &registry).unwrap();
        assert_eq!(chain, vec!["pdf-text"]);
    }

    #[test]
    fn test_category_chain_applies() {
        let registry = registry();
        let config = ExtractionConfig::default()
            .with_category_chain(Category::Documents, vec!["office".to_string()]);

        let chain = resolve_engine_chain("application/pdf", None, &config, &registry).unwrap();
        assert_eq!(chain, vec!["office"]);
    }

    #[test]
    fn test_legacy_document_engine() {
        let registry = registry();
        let config = ExtractionConfig {
            legacy_document_engine: Some("office".to_string()),
            ..Default::default()
        };

        let chain = resolve_engine_chain("application/pdf", None, &config, &registry).unwrap();
        assert_eq!(chain, vec!["office"]);
    }

    #[test]
    fn test_auto_detect_orders_by_availability() {
        let registry = registry();
        let config = ExtractionConfig::default();

        // pdf-vlm has higher priority but is unavailable; pdf-text leads.
        let chain = resolve_engine_chain("application/pdf", None, &config, &registry).unwrap();
        assert_eq!(chain, vec!["pdf-text", "pdf-vlm"]);
    }

    #[test]
    fn test_no_engine_available() {
        let registry = registry();
        let config = ExtractionConfig::default();

        let result = resolve_engine_chain("audio/mpeg", None, &config, &registry);
        assert!(matches!(result, Err(CcoreError::NoEngineAvailable(mime)) if mime == "audio/mpeg"));
    }

    #[test]
    fn test_unknown_configured_engine_dropped_with_fallback() {
        let registry = registry();
        let config = ExtractionConfig::default().with_mime_chain(
            "application/pdf",
            vec!["docling".to_string(), "pdf-text".to_string()],
        );

        let chain = resolve_engine_chain("application/pdf", None, &config, &registry).unwrap();
        assert_eq!(chain, vec!["pdf-text"]);
    }

    #[test]
    fn test_unknown_configured_engine_fails_under_fail_policy() {
        let registry = registry();
        let mut config = ExtractionConfig::default().with_mime_chain(
            "application/pdf",
            vec!["docling".to_string(), "pdf-text".to_string()],
        );
        config.fallback.on_error = OnErrorPolicy::Fail;

        let result = resolve_engine_chain("application/pdf", None, &config, &registry);
        assert!(matches!(result, Err(CcoreError::EngineNotFound(name)) if name == "docling"));
    }

    #[test]
    fn test_all_unknown_falls_through_to_auto() {
        let registry = registry();
        let config = ExtractionConfig::default()
            .with_mime_chain("application/pdf", vec!["docling".to_string()]);

        let chain = resolve_engine_chain("application/pdf", None, &config, &registry).unwrap();
        assert_eq!(chain, vec!["pdf-text", "pdf-vlm"]);
    }

    #[test]
    fn test_chain_capped_by_max_attempts() {
        let registry = registry();
        let mut config = ExtractionConfig::default();
        config.fallback.max_attempts = 1;

        let chain = resolve_engine_chain("application/pdf", None, &config, &registry).unwrap();
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_fallback_disabled_truncates_to_one() {
        let registry = registry();
        let mut config = ExtractionConfig::default();
        config.fallback.enabled = false;

        let chain = resolve_engine_chain("application/pdf", None, &config, &registry).unwrap();
        assert_eq!(chain, vec!["pdf-text"]);
    }
}
