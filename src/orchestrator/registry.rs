//! Explicit mapping from feature id to the generator that handles it

use super::generator::{ChangeGenerator, ScriptedGenerator};
use crate::models::FeatureDescriptor;
use crate::parser::parse_feature_id;
use crate::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Feature id -> handler, with a default for unregistered ids.
///
/// Ids are keyed by their numeric ordinal, so `"7"` and `"007"` name the same
/// feature.
pub struct GeneratorRegistry {
    default: Box<dyn ChangeGenerator>,
    handlers: BTreeMap<u64, Box<dyn ChangeGenerator>>,
}

impl GeneratorRegistry {
    pub fn new(default: Box<dyn ChangeGenerator>) -> Self {
        Self {
            default,
            handlers: BTreeMap::new(),
        }
    }

    /// Register a dedicated handler for one feature id
    pub fn register(&mut self, id: &str, handler: Box<dyn ChangeGenerator>) -> Result<()> {
        let Some((_, ordinal)) = parse_feature_id(id) else {
            anyhow::bail!("Invalid feature id '{}': must start with a number", id);
        };
        if self.handlers.insert(ordinal, handler).is_some() {
            tracing::warn!(feature = %id, "replacing previously registered handler");
        }
        Ok(())
    }

    /// Register a [`ScriptedGenerator`] for every `[handlers]` entry.
    ///
    /// Relative reply paths are resolved against `root`.
    pub fn register_scripted(&mut self, root: &Path, handlers: &BTreeMap<String, PathBuf>) -> Result<()> {
        for (id, path) in handlers {
            self.register(id, Box::new(ScriptedGenerator::new(root.join(path))))?;
        }
        Ok(())
    }

    /// Handler for a feature, falling back to the default
    pub fn resolve(&self, feature: &FeatureDescriptor) -> &dyn ChangeGenerator {
        self.handlers
            .get(&feature.ordinal)
            .map(|handler| handler.as_ref())
            .unwrap_or_else(|| self.default.as_ref())
    }

    pub fn is_registered(&self, feature: &FeatureDescriptor) -> bool {
        self.handlers.contains_key(&feature.ordinal)
    }
}
