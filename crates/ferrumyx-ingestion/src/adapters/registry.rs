//! The process-global document-source registry (§9: one of the only two
//! permissible global mutable statics, alongside the embedding model
//! registry). Built once at startup from the configured adapters and
//! never mutated afterward; safe for concurrent reads from every request.

use std::sync::{Arc, OnceLock};

use super::SourceAdapter;

pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        Self { adapters }
    }

    /// The PDF adapter registers a bare `"pdf"` source type; the ontology
    /// adapter registers the `"ontology"` prefix and matches any
    /// `ontology_<kind>` scope.
    pub fn resolve(&self, source_type: &str) -> Option<&Arc<dyn SourceAdapter>> {
        self.adapters.iter().find(|a| {
            let owned = a.source_type();
            owned == source_type || (owned == "ontology" && source_type.starts_with("ontology_"))
        })
    }
}

static GLOBAL: OnceLock<AdapterRegistry> = OnceLock::new();

/// Installs the process-global registry. Must be called exactly once
/// during startup; a second call is a programming error.
pub fn install(registry: AdapterRegistry) {
    GLOBAL.set(registry).unwrap_or_else(|_| panic!("adapter registry already installed"));
}

pub fn global() -> &'static AdapterRegistry {
    GLOBAL.get().expect("adapter registry not installed")
}
