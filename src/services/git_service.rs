//! Git service - working tree inspection and checked git invocations
//!
//! Read-only inspection (status, HEAD) goes through `git2`; mutations run the
//! `git` CLI so hooks, credentials and `git apply` behave as they do for a
//! human operator. Every CLI call is bounded by a timeout and its exit status
//! is always checked by the caller.

use crate::error::EngineError;
use crate::Result;
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Captured result of one git invocation
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    /// stderr if present, otherwise stdout
    pub fn message(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Repository the engine delivers into
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
    /// Engine-owned paths relative to `root`; never staged, cleaned or counted as changes
    excluded: Vec<String>,
    /// Input paths (the backlog) that rollback must never delete
    preserved: Vec<String>,
    timeout: Duration,
}

impl GitRepo {
    /// Open the repository at `root`
    pub fn open(root: impl Into<PathBuf>, excluded: &[PathBuf], timeout: Duration) -> Result<Self> {
        let root = root.into();
        let repo = git2::Repository::open(&root).map_err(|e| {
            EngineError::Repository(format!("{}: {}", root.display(), e.message()))
        })?;

        let excluded: Vec<String> = excluded
            .iter()
            .filter_map(|p| relative_to(&root, p))
            .filter(|p| !p.is_empty())
            .collect();
        ensure_local_excludes(&repo, &excluded)?;

        Ok(Self {
            root,
            excluded,
            preserved: Vec::new(),
            timeout,
        })
    }

    /// Treat `paths` as operator-owned: never staged, reverted, cleaned or
    /// counted as a change.
    ///
    /// Unlike engine-owned paths they are not hidden from git, so an
    /// operator can still commit them.
    pub fn preserving(mut self, paths: &[PathBuf]) -> Self {
        self.preserved = paths
            .iter()
            .filter_map(|p| relative_to(&self.root, p))
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn repository(&self) -> Result<git2::Repository> {
        git2::Repository::open(&self.root)
            .with_context(|| format!("Failed to open repository {}", self.root.display()))
    }

    /// Engine-owned or preserved: never staged, reverted or counted as a change
    fn is_excluded(&self, path: &str) -> bool {
        self.excluded
            .iter()
            .chain(self.preserved.iter())
            .any(|ex| path == ex || path.starts_with(&format!("{}/", ex)))
    }

    /// Status entries that differ from HEAD, outside engine-owned and preserved paths
    fn changes(&self) -> Result<Vec<(String, git2::Status)>> {
        let repo = self.repository()?;
        let mut options = git2::StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);

        let statuses = repo
            .statuses(Some(&mut options))
            .context("Failed to read working tree status")?;

        let changes = statuses
            .iter()
            .filter(|entry| entry.status() != git2::Status::CURRENT)
            .filter_map(|entry| entry.path().map(|path| (path.to_string(), entry.status())))
            .filter(|(path, _)| !self.is_excluded(path))
            .collect();
        Ok(changes)
    }

    /// Paths that differ from HEAD (staged, unstaged or untracked)
    pub fn changed_paths(&self) -> Result<Vec<String>> {
        Ok(self.changes()?.into_iter().map(|(path, _)| path).collect())
    }

    /// Whether the working tree differs from the last commit
    pub fn is_dirty(&self) -> Result<bool> {
        Ok(!self.changed_paths()?.is_empty())
    }

    /// Summary line of the HEAD commit, if any commit exists
    pub fn head_summary(&self) -> Result<Option<String>> {
        let repo = self.repository()?;
        let head = match repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e).context("Failed to resolve HEAD"),
        };
        let commit = head.peel_to_commit().context("HEAD is not a commit")?;
        Ok(commit.summary().map(str::to_string))
    }

    /// Run `git <args>` in the repository root and capture the outcome
    pub async fn run(&self, args: &[&str]) -> Result<GitOutput> {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(args = ?args, "git");

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "git {} timed out after {}s",
                    args.join(" "),
                    self.timeout.as_secs()
                )
            })?
            .context("Command 'git' not found. Please ensure it is installed and in your PATH.")?;

        Ok(GitOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Run `git <args>` and fail on a non-zero exit
    pub async fn run_checked(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args).await?;
        if !output.success {
            anyhow::bail!(
                "git {} failed with exit code {:?}: {}",
                args.join(" "),
                output.code,
                output.message()
            );
        }
        Ok(output.stdout)
    }

    /// Apply a patch file to the working tree; the caller checks `success`
    pub async fn apply_patch(&self, patch: &Path) -> Result<GitOutput> {
        let patch = patch.to_string_lossy();
        self.run(&["apply", "--whitespace=nowarn", patch.as_ref()]).await
    }

    /// Restore every changed path to HEAD.
    ///
    /// Engine-owned and preserved paths are left alone, including tracked
    /// edits to them, so an operator can revise the backlog mid-run.
    pub async fn reset_hard(&self) -> Result<()> {
        let changes = self.changes()?;
        let tracked: Vec<&str> = changes
            .iter()
            .filter(|(_, status)| *status != git2::Status::WT_NEW)
            .map(|(path, _)| path.as_str())
            .collect();

        if !tracked.is_empty() {
            // Unstage first so paths added to the index become untracked
            let mut args = vec!["--literal-pathspecs", "reset", "--quiet", "HEAD", "--"];
            args.extend(tracked.iter().copied());
            self.run_checked(&args).await?;

            let in_head: Vec<&str> = changes
                .iter()
                .filter(|(_, status)| {
                    *status != git2::Status::WT_NEW && !status.contains(git2::Status::INDEX_NEW)
                })
                .map(|(path, _)| path.as_str())
                .collect();
            if !in_head.is_empty() {
                let mut args = vec!["--literal-pathspecs", "checkout", "--quiet", "HEAD", "--"];
                args.extend(in_head.iter().copied());
                self.run_checked(&args).await?;
            }
        }

        let patterns: Vec<String> = self
            .excluded
            .iter()
            .chain(self.preserved.iter())
            .map(|p| format!("/{}/", p))
            .collect();
        let mut args = vec!["clean", "-fd", "--quiet"];
        for pattern in &patterns {
            args.push("-e");
            args.push(pattern);
        }
        self.run_checked(&args).await?;
        Ok(())
    }

    /// Stage every change outside engine-owned and preserved paths.
    ///
    /// Goes through the index directly: a git pathspec naming an ignored
    /// directory makes `git add` fail.
    pub fn stage_all(&self) -> Result<()> {
        let repo = self.repository()?;
        let mut index = repo.index().context("Failed to read the index")?;

        let mut skip_owned = |path: &Path, _spec: &[u8]| -> i32 {
            let path = path.to_string_lossy().replace('\\', "/");
            if self.is_excluded(&path) {
                1
            } else {
                0
            }
        };
        index
            .update_all(["*"].iter(), Some(&mut skip_owned as &mut git2::IndexMatchedPath))
            .context("Failed to stage tracked changes")?;
        index
            .add_all(
                ["*"].iter(),
                git2::IndexAddOption::DEFAULT,
                Some(&mut skip_owned as &mut git2::IndexMatchedPath),
            )
            .context("Failed to stage new files")?;
        index.write().context("Failed to write the index")?;
        Ok(())
    }

    /// Create one commit from the index and return its id
    pub async fn commit(&self, message: &str) -> Result<String> {
        self.run_checked(&["commit", "--quiet", "-m", message]).await?;
        let sha = self.run_checked(&["rev-parse", "HEAD"]).await?;
        Ok(sha.trim().to_string())
    }

    /// Push HEAD to `remote`, optionally to an explicit branch
    pub async fn push(&self, remote: &str, branch: Option<&str>) -> Result<GitOutput> {
        let refspec = match branch {
            Some(branch) => format!("HEAD:refs/heads/{}", branch),
            None => "HEAD".to_string(),
        };
        self.run(&["push", "--quiet", remote, &refspec]).await
    }
}

/// Record engine-owned paths in `.git/info/exclude` so no git command ever
/// stages, reports or cleans them
fn ensure_local_excludes(repo: &git2::Repository, excluded: &[String]) -> Result<()> {
    if excluded.is_empty() {
        return Ok(());
    }

    let info_dir = repo.path().join("info");
    let exclude_path = info_dir.join("exclude");
    let existing = std::fs::read_to_string(&exclude_path).unwrap_or_default();

    let missing: Vec<String> = excluded
        .iter()
        .map(|p| format!("/{}/", p))
        .filter(|rule| !existing.lines().any(|line| line.trim() == rule))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    std::fs::create_dir_all(&info_dir)?;
    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str("# deliverd engine state\n");
    for rule in missing {
        content.push_str(&rule);
        content.push('\n');
    }
    std::fs::write(&exclude_path, content)
        .with_context(|| format!("Failed to write {}", exclude_path.display()))?;
    Ok(())
}

/// `path` relative to `root` as a forward-slash string, if it lies inside it
fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let relative = if path.is_absolute() {
        path.strip_prefix(root).ok()?.to_path_buf()
    } else {
        path.to_path_buf()
    };
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}
