//! Change applicator - validates and applies a proposed change
//!
//! Diff-shaped changes are applied with `git apply` and fully rolled back on
//! failure. File-map changes overwrite files one by one; a failed write
//! rejects the whole change and the caller resets the tree.

use super::git_service::GitRepo;
use crate::models::{ProposedChange, DIFF_MARKER};
use crate::parser::validate_relative_path;
use crate::Result;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Outcome of one apply attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Change is in the working tree (or there was nothing to apply)
    Applied,
    /// Change was refused; the reason is fed back to the generator
    Rejected(String),
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied)
    }
}

pub struct ChangeApplicator<'a> {
    repo: &'a GitRepo,
    /// Paths a change may never touch (engine state, the backlog)
    protected: Vec<PathBuf>,
}

impl<'a> ChangeApplicator<'a> {
    pub fn new(repo: &'a GitRepo, protected: Vec<PathBuf>) -> Self {
        Self { repo, protected }
    }

    /// Apply `change` to the working tree.
    ///
    /// `Err` is reserved for infrastructure failures (git missing, rollback
    /// failing); an unusable change is `Ok(ApplyOutcome::Rejected)`.
    pub async fn apply(&self, change: &ProposedChange) -> Result<ApplyOutcome> {
        match change {
            ProposedChange::Empty => Ok(ApplyOutcome::Applied),
            ProposedChange::Diff(text) => self.apply_diff(text).await,
            ProposedChange::FileMap(files) => Ok(self.apply_file_map(files)),
        }
    }

    async fn apply_diff(&self, text: &str) -> Result<ApplyOutcome> {
        if !text.starts_with(DIFF_MARKER) {
            return Ok(ApplyOutcome::Rejected(format!(
                "patch does not begin with `{}`",
                DIFF_MARKER
            )));
        }

        if let Some(path) = diff_paths(text).into_iter().find(|p| self.is_protected(Path::new(p))) {
            return Ok(ApplyOutcome::Rejected(format!(
                "patch touches protected path {}",
                path
            )));
        }

        let mut patch = NamedTempFile::new()?;
        patch.write_all(text.as_bytes())?;
        patch.flush()?;

        let output = self.repo.apply_patch(patch.path()).await?;
        if output.success {
            tracing::info!("patch applied");
            return Ok(ApplyOutcome::Applied);
        }

        tracing::warn!(code = ?output.code, "git apply rejected patch, restoring working tree");
        self.repo.reset_hard().await?;
        Ok(ApplyOutcome::Rejected(format!(
            "git apply failed: {}",
            output.message()
        )))
    }

    fn apply_file_map(&self, files: &BTreeMap<String, String>) -> ApplyOutcome {
        for path in files.keys() {
            if let Err(e) = validate_relative_path(path) {
                return ApplyOutcome::Rejected(e.to_string());
            }
            if self.is_protected(Path::new(path)) {
                return ApplyOutcome::Rejected(format!("refusing to write protected path {}", path));
            }
        }

        for (path, content) in files {
            let target = self.repo.root().join(path);
            if let Err(e) = write_file(&target, content) {
                tracing::warn!(path = %path, error = %e, "file write failed");
                return ApplyOutcome::Rejected(format!("failed to write {}: {}", path, e));
            }
            tracing::debug!(path = %path, bytes = content.len(), "file written");
        }

        tracing::info!(files = files.len(), "file map applied");
        ApplyOutcome::Applied
    }

    fn is_protected(&self, path: &Path) -> bool {
        let normalized: PathBuf = path
            .components()
            .filter(|c| matches!(c, std::path::Component::Normal(_)))
            .collect();
        normalized.starts_with(".git") || self.protected.iter().any(|p| normalized.starts_with(p))
    }
}

/// Repository paths named by the file headers of a patch
fn diff_paths(text: &str) -> Vec<String> {
    let mut paths = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("diff --git ") {
            if let Some((a, b)) = rest.split_once(" b/") {
                paths.push(a.trim_start_matches("a/").to_string());
                paths.push(b.to_string());
            }
        } else if let Some(rest) = line
            .strip_prefix("+++ ")
            .or_else(|| line.strip_prefix("--- "))
            .or_else(|| line.strip_prefix("rename from "))
            .or_else(|| line.strip_prefix("rename to "))
        {
            let path = rest.split('\t').next().unwrap_or(rest);
            if path != "/dev/null" {
                let path = path
                    .strip_prefix("a/")
                    .or_else(|| path.strip_prefix("b/"))
                    .unwrap_or(path);
                paths.push(path.to_string());
            }
        }
    }
    paths
}

fn write_file(target: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(target, content)
}
