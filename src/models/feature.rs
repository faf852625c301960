use serde::Serialize;
use std::path::PathBuf;

/// One backlog entry, derived fresh on every engine invocation
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FeatureDescriptor {
    /// Identifier as written in the file name (e.g. "001")
    pub id: String,

    /// Numeric value of `id`; the sort and dedup key
    pub ordinal: u64,

    /// Descriptor file
    pub path: PathBuf,

    /// Human-readable title, if the descriptor declares one
    pub title: Option<String>,

    /// Opaque specification text
    pub spec: String,

    /// Command run by the verifier, if declared
    pub verify_command: Option<String>,
}

impl FeatureDescriptor {
    /// Title for display, falling back to the file name
    pub fn display_name(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None => self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| self.id.clone()),
        }
    }
}
