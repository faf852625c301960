//! StateStore - progress.json persistence

use super::schema::validate_state;
use crate::error::EngineError;
use crate::models::EngineState;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Durable, validated record of engine progress
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load persisted state, or the initial state if none exists.
    ///
    /// A file that fails to parse or validate is a fatal
    /// `EngineError::InvalidState`; it is never repaired.
    pub fn load(&self) -> Result<EngineState> {
        self.ensure_parent()?;

        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no state file, starting fresh");
            return Ok(EngineState::initial());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| EngineError::InvalidState {
                path: self.path.clone(),
                reason: format!("not valid JSON: {}", e),
            })?;

        let state = validate_state(&value).map_err(|reason| EngineError::InvalidState {
            path: self.path.clone(),
            reason,
        })?;

        tracing::debug!(
            path = %self.path.display(),
            phase = %state.phase,
            completed = state.completed_features.len(),
            "state loaded"
        );
        Ok(state)
    }

    /// Persist the full state atomically.
    ///
    /// Keys are written in sorted order so logically identical states produce
    /// byte-identical files.
    pub fn save(&self, state: &EngineState) -> Result<()> {
        let parent = self.ensure_parent()?;

        let content = Self::encode(state)?;

        let mut temp_file = NamedTempFile::new_in(&parent)
            .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.flush()?;
        temp_file.as_file().sync_all()?;
        temp_file
            .persist(&self.path)
            .map_err(|e| anyhow::anyhow!("Failed to persist {}: {}", self.path.display(), e))?;

        tracing::debug!(path = %self.path.display(), phase = %state.phase, "state saved");
        Ok(())
    }

    /// Deterministic encoding used by `save`
    pub fn encode(state: &EngineState) -> Result<String> {
        // serde_json's default map is ordered by key
        let value = serde_json::to_value(state).context("Failed to serialize state")?;
        let mut content =
            serde_json::to_string_pretty(&value).context("Failed to serialize state")?;
        content.push('\n');
        Ok(content)
    }

    fn ensure_parent(&self) -> Result<PathBuf> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
        Ok(parent)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::Phase;
    use tempfile::TempDir;

    fn store_in(temp: &TempDir) -> StateStore {
        StateStore::new(temp.path().join("state/progress.json"))
    }

    #[test]
    fn test_load_missing_returns_initial_and_creates_dir() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        let state = store.load().unwrap();

        assert_eq!(state, EngineState::initial());
        assert!(temp.path().join("state").is_dir());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        let mut state = EngineState::initial()
            .transition(Phase::Planning)
            .select_feature("002");
        state.completed_features.insert("001".to_string());
        store.save(&state).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_save_is_deterministic() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        let state = EngineState::initial().transition(Phase::Planning);
        store.save(&state).unwrap();
        let first = std::fs::read(store.path()).unwrap();
        store.save(&store.load().unwrap()).unwrap();
        let second = std::fs::read(store.path()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_keys_sorted() {
        let content = StateStore::encode(&EngineState::initial()).unwrap();
        let completed = content.find("\"completed_features\"").unwrap();
        let current = content.find("\"current_feature\"").unwrap();
        let history = content.find("\"history\"").unwrap();
        let phase = content.find("\"phase\"").unwrap();
        let version = content.find("\"schema_version\"").unwrap();
        assert!(completed < current && current < history && history < phase && phase < version);
        assert!(content.ends_with("}\n"));
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        std::fs::create_dir_all(temp.path().join("state")).unwrap();
        std::fs::write(
            store.path(),
            r#"{"completed_features": [], "current_feature": null, "history": []}"#,
        )
        .unwrap();

        let err = store.load().unwrap_err();
        let engine_err = err.downcast_ref::<EngineError>().unwrap();
        assert_eq!(engine_err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("Invalid state structure"));
    }

    #[test]
    fn test_garbage_is_fatal_and_untouched() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        std::fs::create_dir_all(temp.path().join("state")).unwrap();
        std::fs::write(store.path(), "{not json").unwrap();

        assert!(store.load().is_err());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "{not json");
    }
}
