//! The process-global embedding model registry (§9: one of the only two
//! permissible global mutable statics, alongside the adapter registry).
//! Initialized once at startup from `AppConfig`, immutable thereafter.

use std::collections::HashMap;

use ferrumyx_common::config::EmbeddingModelConfig;

use crate::error::{EmbedError, Result};

#[derive(Debug, Clone)]
pub struct ModelRegistryEntry {
    pub dimensions: usize,
    pub default_version: String,
    pub max_batch_size: usize,
    pub default_batch_size: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelRegistryEntry>,
}

impl ModelRegistry {
    /// Validates `max_batch_size > 0` at registration time, per §4.6's
    /// supplemental detail: this is what guarantees the effective batch
    /// size resolution chain can never bottom out at zero.
    pub fn from_config(models: &[EmbeddingModelConfig]) -> Result<Self> {
        let mut map = HashMap::new();
        for m in models {
            if m.max_batch_size == 0 {
                return Err(EmbedError::InvalidInput(format!(
                    "model {} has max_batch_size = 0",
                    m.model_name
                )));
            }
            map.insert(
                m.model_name.clone(),
                ModelRegistryEntry {
                    dimensions: m.dimensions,
                    default_version: m.default_version.clone(),
                    max_batch_size: m.max_batch_size,
                    default_batch_size: m.default_batch_size.min(m.max_batch_size),
                },
            );
        }
        Ok(Self { models: map })
    }

    /// Unknown model names fail fast.
    pub fn get(&self, model_name: &str) -> Result<&ModelRegistryEntry> {
        self.models
            .get(model_name)
            .ok_or_else(|| EmbedError::InvalidInput(format!("unknown model: {model_name}")))
    }

    /// Resolution order (§4.6): explicit `batch_size` argument (if `0 <
    /// batch_size <= max_batch_size`) -> model's `default_batch_size` ->
    /// `max_batch_size` as final fallback. A non-positive explicit value is
    /// treated as "unset", not an error.
    pub fn effective_batch_size(&self, model_name: &str, requested: Option<usize>) -> Result<usize> {
        let entry = self.get(model_name)?;
        if let Some(requested) = requested {
            if requested > 0 && requested <= entry.max_batch_size {
                return Ok(requested);
            }
        }
        if entry.default_batch_size > 0 {
            return Ok(entry.default_batch_size);
        }
        Ok(entry.max_batch_size)
    }
}
