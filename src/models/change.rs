use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Literal every diff-shaped change must begin with
pub const DIFF_MARKER: &str = "diff --git";

/// Wire format agreed with the generator for one deployment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeFormat {
    /// Unified diff against the working tree
    #[default]
    Diff,
    /// JSON `{"files": {path: content}}`
    FileMap,
}

impl fmt::Display for ChangeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeFormat::Diff => f.write_str("diff"),
            ChangeFormat::FileMap => f.write_str("file-map"),
        }
    }
}

/// A not-yet-applied modification, alive for one apply attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposedChange {
    /// Generator reported that nothing needs to change
    Empty,
    /// Unified diff text
    Diff(String),
    /// Repository-relative path -> full replacement content
    FileMap(BTreeMap<String, String>),
}

impl ProposedChange {
    pub fn is_empty(&self) -> bool {
        matches!(self, ProposedChange::Empty)
    }

    /// Short description for logs
    pub fn summary(&self) -> String {
        match self {
            ProposedChange::Empty => "no-op".to_string(),
            ProposedChange::Diff(text) => format!("diff ({} lines)", text.lines().count()),
            ProposedChange::FileMap(files) => format!("file-map ({} files)", files.len()),
        }
    }

    /// Render back into its wire form, for diagnostics
    pub fn to_wire(&self) -> String {
        match self {
            ProposedChange::Empty => String::new(),
            ProposedChange::Diff(text) => text.clone(),
            ProposedChange::FileMap(files) => {
                serde_json::to_string_pretty(&serde_json::json!({ "files": files }))
                    .unwrap_or_default()
            }
        }
    }
}

/// Wire shape of a file-map response
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FileMapResponse {
    pub files: BTreeMap<String, String>,
}
