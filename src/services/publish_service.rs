//! Publisher - commits and pushes an applied change

use super::git_service::GitRepo;
use crate::models::{FeatureDescriptor, GitConfig};
use crate::Result;

/// Outcome of publishing one feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// One commit created (and pushed, when enabled)
    Committed { sha: String },
    /// Working tree matched HEAD; nothing to commit
    NoOp,
}

pub struct Publisher<'a> {
    repo: &'a GitRepo,
    config: &'a GitConfig,
}

impl<'a> Publisher<'a> {
    pub fn new(repo: &'a GitRepo, config: &'a GitConfig) -> Self {
        Self { repo, config }
    }

    /// Deterministic commit message identifying the feature
    pub fn commit_message(&self, feature: &FeatureDescriptor) -> String {
        commit_message(&self.config.commit_prefix, feature)
    }

    /// Whether HEAD already carries this feature's commit
    pub fn already_published(&self, feature: &FeatureDescriptor) -> Result<bool> {
        let expected = self.commit_message(feature);
        Ok(self.repo.head_summary()?.as_deref() == Some(expected.as_str()))
    }

    /// Commit and push the working tree if it differs from HEAD.
    ///
    /// Any git failure, including a rejected push, is returned as an error and
    /// must abort the run.
    pub async fn publish(&self, feature: &FeatureDescriptor) -> Result<PublishOutcome> {
        let changed = self.repo.changed_paths()?;
        if changed.is_empty() {
            tracing::info!(feature = %feature.id, "working tree unchanged, nothing to publish");
            return Ok(PublishOutcome::NoOp);
        }
        tracing::debug!(feature = %feature.id, files = ?changed, "publishing changes");

        self.repo.stage_all()?;
        let message = self.commit_message(feature);
        let sha = self.repo.commit(&message).await?;
        tracing::info!(feature = %feature.id, sha = %sha, "committed");

        if self.config.push {
            self.push().await?;
            tracing::info!(feature = %feature.id, remote = %self.config.remote, "pushed");
        }

        Ok(PublishOutcome::Committed { sha })
    }

    /// Push HEAD to the configured remote; a non-zero exit is an error
    pub async fn push(&self) -> Result<()> {
        let output = self
            .repo
            .push(&self.config.remote, self.config.branch.as_deref())
            .await?;
        if !output.success {
            anyhow::bail!(
                "git push to '{}' failed with exit code {:?}: {}",
                self.config.remote,
                output.code,
                output.message()
            );
        }
        Ok(())
    }
}

/// `<prefix>: implement feature <id>[ <title>]`
pub fn commit_message(prefix: &str, feature: &FeatureDescriptor) -> String {
    let mut message = format!("{}: implement feature {}", prefix, feature.id);
    if let Some(title) = &feature.title {
        let title: String = title.split_whitespace().collect::<Vec<_>>().join(" ");
        if !title.is_empty() {
            message.push(' ');
            message.push_str(&title.to_lowercase());
        }
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::git_service::test_support::{commit_count, init_repo};
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn feature(id: &str, title: Option<&str>) -> FeatureDescriptor {
        FeatureDescriptor {
            id: id.to_string(),
            ordinal: id.parse().unwrap(),
            path: PathBuf::from(format!("features/{}-x.md", id)),
            title: title.map(str::to_string),
            spec: String::new(),
            verify_command: None,
        }
    }

    fn setup(push: bool) -> (TempDir, TempDir, git2::Repository, GitRepo, GitConfig) {
        let work = TempDir::new().unwrap();
        let remote = TempDir::new().unwrap();
        git2::Repository::init_bare(remote.path()).unwrap();
        let raw = init_repo(work.path(), &[("README.md", "readme\n")]);
        raw.remote("origin", remote.path().to_str().unwrap()).unwrap();

        let repo = GitRepo::open(
            work.path(),
            &[PathBuf::from("deliverd/state")],
            Duration::from_secs(30),
        )
        .unwrap();
        let config = GitConfig {
            push,
            ..GitConfig::default()
        };
        (work, remote, raw, repo, config)
    }

    #[test]
    fn test_commit_message() {
        assert_eq!(
            commit_message("autonomous", &feature("001", Some("Persist  Knowledge Pack"))),
            "autonomous: implement feature 001 persist knowledge pack"
        );
        assert_eq!(
            commit_message("bot", &feature("002", None)),
            "bot: implement feature 002"
        );
    }

    #[tokio::test]
    async fn test_noop_when_tree_unchanged() {
        let (_work, _remote, raw, repo, config) = setup(true);
        let publisher = Publisher::new(&repo, &config);

        let outcome = publisher.publish(&feature("002", None)).await.unwrap();

        assert_eq!(outcome, PublishOutcome::NoOp);
        assert_eq!(commit_count(&raw), 1);
    }

    #[tokio::test]
    async fn test_commit_and_push() {
        let (work, remote, raw, repo, config) = setup(true);
        std::fs::create_dir_all(work.path().join("src")).unwrap();
        std::fs::write(work.path().join("src/bar.py"), "print('bar')\n").unwrap();
        std::fs::create_dir_all(work.path().join("deliverd/state")).unwrap();
        std::fs::write(work.path().join("deliverd/state/progress.json"), "{}").unwrap();
        let publisher = Publisher::new(&repo, &config);
        let feature = feature("002", None);

        let outcome = publisher.publish(&feature).await.unwrap();

        let PublishOutcome::Committed { sha } = outcome else {
            panic!("expected a commit");
        };
        assert_eq!(commit_count(&raw), 2);
        assert!(!repo.is_dirty().unwrap());
        assert!(publisher.already_published(&feature).unwrap());

        let head = raw.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.id().to_string(), sha);
        assert!(head.message().unwrap().contains("002"));
        let tree = head.tree().unwrap();
        assert!(tree.get_path(std::path::Path::new("src/bar.py")).is_ok());
        assert!(tree.get_path(std::path::Path::new("deliverd/state/progress.json")).is_err());

        let bare = git2::Repository::open_bare(remote.path()).unwrap();
        let pushed = bare
            .references()
            .unwrap()
            .filter_map(|r| r.ok())
            .filter_map(|r| r.target())
            .any(|oid| oid.to_string() == sha);
        assert!(pushed);
    }

    #[tokio::test]
    async fn test_backlog_drafts_stay_out_of_commit() {
        let (work, _remote, raw, repo, config) = setup(false);
        let repo = repo.preserving(&[PathBuf::from("features")]);
        std::fs::create_dir_all(work.path().join("features")).unwrap();
        std::fs::write(work.path().join("features/003-draft.md"), "# Draft\n").unwrap();
        std::fs::write(work.path().join("bar.py"), "bar = 1\n").unwrap();
        let publisher = Publisher::new(&repo, &config);

        let outcome = publisher.publish(&feature("002", None)).await.unwrap();

        assert!(matches!(outcome, PublishOutcome::Committed { .. }));
        let tree = raw.head().unwrap().peel_to_commit().unwrap().tree().unwrap();
        assert!(tree.get_path(std::path::Path::new("bar.py")).is_ok());
        assert!(tree.get_path(std::path::Path::new("features/003-draft.md")).is_err());
        assert!(work.path().join("features/003-draft.md").exists());
    }

    #[tokio::test]
    async fn test_push_failure_is_error() {
        let (work, _remote, _raw, repo, _) = setup(true);
        let config = GitConfig {
            remote: "nowhere".to_string(),
            ..GitConfig::default()
        };
        std::fs::write(work.path().join("new.txt"), "x").unwrap();
        let publisher = Publisher::new(&repo, &config);

        let err = publisher.publish(&feature("003", None)).await.unwrap_err();
        assert!(err.to_string().contains("git push"));
    }

    #[tokio::test]
    async fn test_push_disabled() {
        let (work, remote, raw, repo, config) = setup(false);
        std::fs::write(work.path().join("new.txt"), "x").unwrap();
        let publisher = Publisher::new(&repo, &config);

        let outcome = publisher.publish(&feature("004", None)).await.unwrap();

        assert!(matches!(outcome, PublishOutcome::Committed { .. }));
        assert_eq!(commit_count(&raw), 2);
        let bare = git2::Repository::open_bare(remote.path()).unwrap();
        let branches = bare
            .references()
            .unwrap()
            .filter_map(|r| r.ok())
            .filter(|r| r.name().map_or(false, |n| n.starts_with("refs/heads/")))
            .count();
        assert_eq!(branches, 0);
    }
}
