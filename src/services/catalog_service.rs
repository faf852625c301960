//! Feature catalog - discovers and orders backlog descriptors
//!
//! The ascending ordinal order produced here is the only execution order;
//! the engine never reorders or parallelizes features.

use crate::error::EngineError;
use crate::models::{EngineState, FeatureDescriptor, Phase};
use crate::parser::{parse_descriptor, parse_feature_id};
use crate::Result;
use anyhow::Context;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Read-only view of the backlog directory
#[derive(Debug, Clone)]
pub struct FeatureCatalog {
    backlog_dir: PathBuf,
}

impl FeatureCatalog {
    pub fn new(backlog_dir: impl Into<PathBuf>) -> Self {
        Self {
            backlog_dir: backlog_dir.into(),
        }
    }

    pub fn backlog_dir(&self) -> &Path {
        &self.backlog_dir
    }

    /// All descriptors in the backlog, sorted by ordinal.
    ///
    /// Files without a leading ordinal are skipped with a warning. Two files
    /// sharing an ordinal are a fatal `EngineError::DuplicateFeature`.
    /// A missing backlog directory is an empty backlog.
    pub fn discover(&self) -> Result<Vec<FeatureDescriptor>> {
        if !self.backlog_dir.exists() {
            tracing::debug!(dir = %self.backlog_dir.display(), "backlog directory missing");
            return Ok(Vec::new());
        }

        let mut by_ordinal: BTreeMap<u64, FeatureDescriptor> = BTreeMap::new();

        let entries = std::fs::read_dir(&self.backlog_dir)
            .with_context(|| format!("Failed to read backlog {}", self.backlog_dir.display()))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        for path in paths {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                tracing::warn!(path = %path.display(), "skipping descriptor with non UTF-8 name");
                continue;
            };
            if file_name.starts_with('.') {
                continue;
            }

            let Some((id, ordinal)) = parse_feature_id(file_name) else {
                tracing::warn!(file = file_name, "skipping descriptor without ordinal id");
                continue;
            };

            if let Some(existing) = by_ordinal.get(&ordinal) {
                return Err(EngineError::DuplicateFeature {
                    id,
                    first: existing.path.clone(),
                    second: path,
                }
                .into());
            }

            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read descriptor {}", path.display()))?;
            by_ordinal.insert(ordinal, parse_descriptor(&path, id, ordinal, &content));
        }

        Ok(by_ordinal.into_values().collect())
    }

    /// Descriptors not yet in `completed_features`, in execution order
    pub fn list_pending(&self, state: &EngineState) -> Result<Vec<FeatureDescriptor>> {
        let pending: Vec<_> = self
            .discover()?
            .into_iter()
            .filter(|f| !state.is_completed(&f.id))
            .collect();
        Ok(pending)
    }

    /// Descriptor for a feature already in flight
    pub fn find(&self, id: &str, phase: Phase) -> Result<FeatureDescriptor> {
        let ordinal = id.parse::<u64>().ok();
        self.discover()?
            .into_iter()
            .find(|f| f.id == id || Some(f.ordinal) == ordinal)
            .ok_or_else(|| {
                EngineError::MissingDescriptor {
                    id: id.to_string(),
                    phase,
                }
                .into()
            })
    }
}
