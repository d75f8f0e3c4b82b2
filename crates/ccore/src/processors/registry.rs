//! Processor registration and capability-based lookup.
//!
//! The registry catalogs every engine that can produce a `ProcessorResult`
//! and answers ordered queries by MIME type, category, extension, or name.
//! Content is fixed after startup; lookups take the read side of the lock
//! and never mutate.
//!
//! # Ordering
//!
//! All multi-result queries order by: availability (available engines
//! first), priority (descending), then registration order. Priority
//! expresses editorial preference; availability gating keeps the resolver
//! from returning an engine the environment cannot run; registration order
//! makes ties reproducible.

use crate::processors::Processor;
use crate::{CcoreError, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Validate an engine name before registration.
fn validate_engine_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CcoreError::validation("Engine name cannot be empty"));
    }
    if name.contains(char::is_whitespace) {
        return Err(CcoreError::validation(format!(
            "Engine name '{name}' cannot contain whitespace"
        )));
    }
    Ok(())
}

/// Catalog of registered processors.
pub struct ProcessorRegistry {
    /// Registration order is preserved; it is the final tie-break.
    processors: Vec<Arc<dyn Processor>>,
    by_name: HashMap<String, usize>,
}

impl ProcessorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            processors: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register a processor.
    ///
    /// # Errors
    ///
    /// Fails with `Validation` if the name is invalid or another processor
    /// with the same name is already registered.
    pub fn register(&mut self, processor: Arc<dyn Processor>) -> Result<()> {
        let name = processor.capabilities().name;
        validate_engine_name(name)?;

        if self.by_name.contains_key(name) {
            return Err(CcoreError::validation(format!(
                "Engine '{name}' is already registered"
            )));
        }

        self.by_name.insert(name.to_string(), self.processors.len());
        self.processors.push(processor);
        Ok(())
    }

    /// Look up a processor by engine name.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn Processor>> {
        self.by_name.get(name).map(|&idx| Arc::clone(&self.processors[idx]))
    }

    /// All processors claiming `mime`, exact matches before wildcard
    /// matches, each group ordered by availability, priority, registration.
    pub fn find_by_mime(&self, mime: &str) -> Vec<Arc<dyn Processor>> {
        let exact = self.ordered(|p| p.capabilities().claims_exact(mime));
        let mut result = exact;
        for processor in self.ordered(|p| {
            !p.capabilities().claims_exact(mime) && p.capabilities().claims_wildcard(mime)
        }) {
            result.push(processor);
        }
        result
    }

    /// All processors in a category, ordered.
    pub fn find_by_category(&self, category: crate::types::Category) -> Vec<Arc<dyn Processor>> {
        self.ordered(|p| p.capabilities().category == category)
    }

    /// All processors recognizing a file extension, ordered. Secondary hint
    /// only; MIME lookup is authoritative.
    pub fn find_by_extension(&self, ext: &str) -> Vec<Arc<dyn Processor>> {
        self.ordered(|p| p.capabilities().claims_extension(ext))
    }

    /// Names of all engines whose requirements are currently satisfied.
    pub fn available_engines(&self) -> Vec<String> {
        self.processors
            .iter()
            .filter(|p| p.is_available())
            .map(|p| p.capabilities().name.to_string())
            .collect()
    }

    /// Names of all registered engines, in registration order.
    pub fn list(&self) -> Vec<String> {
        self.processors
            .iter()
            .map(|p| p.capabilities().name.to_string())
            .collect()
    }

    fn ordered<F>(&self, filter: F) -> Vec<Arc<dyn Processor>>
    where
        F: Fn(&Arc<dyn Processor>) -> bool,
    {
        let mut matches: Vec<(usize, bool, i32)> = self
            .processors
            .iter()
            .enumerate()
            .filter(|(_, p)| filter(p))
            .map(|(idx, p)| (idx, p.is_available(), p.capabilities().priority))
            .collect();

        // Available first, then priority desc; sort_by is stable so
        // registration order breaks remaining ties.
        matches.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)));

        matches
            .into_iter()
            .map(|(idx, _, _)| Arc::clone(&self.processors[idx]))
            .collect()
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global processor registry singleton.
pub static PROCESSOR_REGISTRY: Lazy<Arc<RwLock<ProcessorRegistry>>> =
    Lazy::new(|| Arc::new(RwLock::new(ProcessorRegistry::new())));

/// Get the global processor registry.
pub fn get_processor_registry() -> Arc<RwLock<ProcessorRegistry>> {
    PROCESSOR_REGISTRY.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::{ProcessorCapabilities, ProcessorContext};
    use crate::types::{Category, ProcessorResult, Source};
    use async_trait::async_trait;

    struct MockProcessor {
        caps: ProcessorCapabilities,
        available: bool,
    }

    impl MockProcessor {
        fn new(caps: ProcessorCapabilities, available: bool) -> Arc<Self> {
            Arc::new(Self { caps, available })
        }
    }

    #[async_trait]
    impl Processor for MockProcessor {
        fn capabilities(&self) -> &ProcessorCapabilities {
            &self.caps
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn extract(&self, _: &Source, _: &ProcessorContext) -> Result<ProcessorResult> {
            Ok(ProcessorResult::new("mock", "text/plain"))
        }
    }

    const fn caps(
        name: &'static str,
        mime_types: &'static [&'static str],
        priority: i32,
        category: Category,
    ) -> ProcessorCapabilities {
        ProcessorCapabilities {
            name,
            mime_types,
            extensions: &[],
            priority,
            requires: &[],
            category,
        }
    }

    #[test]
    fn test_register_and_get_by_name() {
        let mut registry = ProcessorRegistry::new();
        registry
            .register(MockProcessor::new(
                caps("pdf-text", &["application/pdf"], 50, Category::Documents),
                true,
            ))
            .unwrap();

        assert!(registry.get_by_name("pdf-text").is_some());
        assert!(registry.get_by_name("missing").is_none());
    }

    #[test]
    fn test_register_duplicate_name_fails() {
        let mut registry = ProcessorRegistry::new();
        registry
            .register(MockProcessor::new(
                caps("dup", &["text/plain"], 50, Category::Text),
                true,
            ))
            .unwrap();

        let result = registry.register(MockProcessor::new(
            caps("dup", &["text/html"], 60, Category::Text),
            true,
        ));
        assert!(matches!(result, Err(CcoreError::Validation { .. })));
    }

    #[test]
    fn test_register_invalid_names() {
        let mut registry = ProcessorRegistry::new();

        let result = registry.register(MockProcessor::new(
            caps("", &["text/plain"], 50, Category::Text),
            true,
        ));
        assert!(result.is_err());

        let result = registry.register(MockProcessor::new(
            caps("has space", &["text/plain"], 50, Category::Text),
            true,
        ));
        assert!(result.is_err());
    }

    #[test]
    fn test_find_by_mime_priority_order() {
        let mut registry = ProcessorRegistry::new();
        registry
            .register(MockProcessor::new(
                caps("low", &["application/pdf"], 10, Category::Documents),
                true,
            ))
            .unwrap();
        registry
            .register(MockProcessor::new(
                caps("high", &["application/pdf"], 90, Category::Documents),
                true,
            ))
            .unwrap();

        let found = registry.find_by_mime("application/pdf");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].capabilities().name, "high");
        assert_eq!(found[1].capabilities().name, "low");
    }

    #[test]
    fn test_find_by_mime_availability_before_priority() {
        let mut registry = ProcessorRegistry::new();
        registry
            .register(MockProcessor::new(
                caps("fancy-but-missing", &["application/pdf"], 90, Category::Documents),
                false,
            ))
            .unwrap();
        registry
            .register(MockProcessor::new(
                caps("plain-but-ready", &["application/pdf"], 10, Category::Documents),
                true,
            ))
            .unwrap();

        let found = registry.find_by_mime("application/pdf");
        assert_eq!(found[0].capabilities().name, "plain-but-ready");
        assert_eq!(found[1].capabilities().name, "fancy-but-missing");
    }

    #[test]
    fn test_find_by_mime_registration_order_breaks_ties() {
        let mut registry = ProcessorRegistry::new();
        registry
            .register(MockProcessor::new(
                caps("first", &["text/plain"], 50, Category::Text),
                true,
            ))
            .unwrap();
        registry
            .register(MockProcessor::new(
                caps("second", &["text/plain"], 50, Category::Text),
                true,
            ))
            .unwrap();

        let found = registry.find_by_mime("text/plain");
        assert_eq!(found[0].capabilities().name, "first");
        assert_eq!(found[1].capabilities().name, "second");
    }

    #[test]
    fn test_find_by_mime_exact_before_wildcard() {
        let mut registry = ProcessorRegistry::new();
        registry
            .register(MockProcessor::new(
                caps("wildcard", &["image/*"], 90, Category::Images),
                true,
            ))
            .unwrap();
        registry
            .register(MockProcessor::new(
                caps("exact", &["image/png"], 10, Category::Images),
                true,
            ))
            .unwrap();

        let found = registry.find_by_mime("image/png");
        assert_eq!(found[0].capabilities().name, "exact");
        assert_eq!(found[1].capabilities().name, "wildcard");

        let jpeg = registry.find_by_mime("image/jpeg");
        assert_eq!(jpeg.len(), 1);
        assert_eq!(jpeg[0].capabilities().name, "wildcard");
    }

    #[test]
    fn test_find_by_category_and_extension() {
        let mut registry = ProcessorRegistry::new();
        registry
            .register(Arc::new(MockProcessor {
                caps: ProcessorCapabilities {
                    name: "office",
                    mime_types: &["application/vnd.oasis.opendocument.text"],
                    extensions: &["odt", "docx"],
                    priority: 50,
                    requires: &[],
                    category: Category::Documents,
                },
                available: true,
            }))
            .unwrap();

        assert_eq!(registry.find_by_category(Category::Documents).len(), 1);
        assert_eq!(registry.find_by_category(Category::Audio).len(), 0);
        assert_eq!(registry.find_by_extension("docx").len(), 1);
        assert_eq!(registry.find_by_extension("xlsx").len(), 0);
    }

    #[test]
    fn test_available_engines_filters() {
        let mut registry = ProcessorRegistry::new();
        registry
            .register(MockProcessor::new(
                caps("ready", &["text/plain"], 50, Category::Text),
                true,
            ))
            .unwrap();
        registry
            .register(MockProcessor::new(
                caps("broken", &["text/plain"], 50, Category::Text),
                false,
            ))
            .unwrap();

        let available = registry.available_engines();
        assert!(available.contains(&"ready".to_string()));
        assert!(!available.contains(&"broken".to_string()));

        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn test_global_registry_access() {
        let registry = get_processor_registry();
        let _ = registry
            .read()
            .expect("Failed to acquire read lock on processor registry in test")
            .list();
    }
}
