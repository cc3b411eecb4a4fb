//! Ordered extractor registry: the URL dispatcher.
//!
//! Extractors are tried in registration order and the first match wins. The
//! registry is built once and shared read-only, so lookups need no locking.

use std::sync::Arc;

use tracing::debug;

use super::{Extractor, RedGifs, Reddit};

/// A registration-ordered collection of extractors.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Registers an extractor after all previously registered ones.
    #[tracing::instrument(skip(self, extractor), fields(kind = extractor.kind()))]
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        debug!(host = extractor.host(), "Registering extractor");
        self.extractors.push(extractor);
    }

    /// Returns the number of registered extractors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    /// Returns true if no extractors are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Returns the kinds of all registered extractors, in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.kind()).collect()
    }

    /// Returns the first extractor claiming `url`.
    #[must_use]
    #[tracing::instrument(skip(self))]
    pub fn find(&self, url: &str) -> Option<Arc<dyn Extractor>> {
        let found = self.extractors.iter().find(|e| e.matches(url)).cloned();
        match &found {
            Some(extractor) => debug!(kind = extractor.kind(), "Extractor matched"),
            None => debug!("No extractor matched"),
        }
        found
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("extractors", &self.kinds())
            .finish()
    }
}

/// Builds the registry of built-in extractors in their fixed order.
#[must_use]
pub fn build_default_registry() -> ExtractorRegistry {
    let mut registry = ExtractorRegistry::new();
    registry.register(Arc::new(Reddit::new()));
    registry.register(Arc::new(RedGifs::new()));
    registry
}
