//! Shared fixtures: git repositories with a backlog and a scripted generator

#![allow(dead_code)]

use async_trait::async_trait;
use deliverd::models::{ChangeFormat, EngineConfig};
use deliverd::orchestrator::{ChangeGenerator, GenerationRequest, GeneratorRegistry};
use deliverd::{Engine, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Generator replying from a fixed script, recording every request
#[derive(Clone, Default)]
pub struct FakeGenerator {
    replies: Arc<Vec<String>>,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl FakeGenerator {
    /// Replies are used in order; the last one repeats
    pub fn new<S: AsRef<str>>(replies: &[S]) -> Self {
        Self {
            replies: Arc::new(replies.iter().map(|r| r.as_ref().to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChangeGenerator for FakeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt());
        let reply = self
            .replies
            .get(n)
            .or_else(|| self.replies.last())
            .cloned()
            .unwrap_or_default();
        Ok(reply)
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// A working repository plus a bare remote named `origin`
pub struct Fixture {
    pub work: TempDir,
    pub remote: TempDir,
    pub repo: git2::Repository,
    pub config: EngineConfig,
}

impl Fixture {
    /// Repository whose initial commit holds `files` (backlog included)
    pub fn new(files: &[(&str, &str)]) -> Self {
        let work = TempDir::new().unwrap();
        let remote = TempDir::new().unwrap();
        git2::Repository::init_bare(remote.path()).unwrap();

        let repo = git2::Repository::init(work.path()).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Test User").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();
            config.set_bool("commit.gpgsign", false).unwrap();
        }
        repo.remote("origin", remote.path().to_str().unwrap()).unwrap();

        let mut all = vec![("README.md", "# project\n")];
        all.extend_from_slice(files);
        for (path, content) in &all {
            let full = work.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        commit_all(&repo, "initial commit");

        let mut config = EngineConfig::default();
        config.git.push = false;
        config.change_format = ChangeFormat::FileMap;

        Self {
            work,
            remote,
            repo,
            config,
        }
    }

    pub fn root(&self) -> &Path {
        self.work.path()
    }

    pub fn state_path(&self) -> PathBuf {
        self.root().join(&self.config.state_path)
    }

    pub fn write_state(&self, json: &str) {
        let path = self.state_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, json).unwrap();
    }

    pub fn read_state(&self) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(self.state_path()).unwrap()).unwrap()
    }

    pub fn engine(&self, generator: &FakeGenerator) -> Result<Engine> {
        let registry = GeneratorRegistry::new(Box::new(generator.clone()));
        Engine::with_registry(self.root(), self.config.clone(), registry)
    }

    pub fn commit_count(&self) -> usize {
        let mut walk = self.repo.revwalk().unwrap();
        walk.push_head().unwrap();
        walk.count()
    }

    pub fn head_message(&self) -> String {
        let head = self.repo.head().unwrap().peel_to_commit().unwrap();
        head.message().unwrap().to_string()
    }

    pub fn head_has(&self, path: &str) -> bool {
        let head = self.repo.head().unwrap().peel_to_commit().unwrap();
        head.tree().unwrap().get_path(Path::new(path)).is_ok()
    }

    /// Whether the bare remote received `HEAD`
    pub fn remote_has_head(&self) -> bool {
        let head = self.repo.head().unwrap().peel_to_commit().unwrap().id();
        let bare = git2::Repository::open_bare(self.remote.path()).unwrap();
        let found = bare
            .references()
            .unwrap()
            .filter_map(|r| r.ok())
            .filter_map(|r| r.target())
            .any(|oid| oid == head);
        found
    }
}

/// Stage everything and commit with `message`
pub fn commit_all(repo: &git2::Repository, message: &str) {
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = repo.signature().unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap();
}

/// File-map reply writing one file
pub fn file_map(path: &str, content: &str) -> String {
    serde_json::json!({ "files": { path: content } }).to_string()
}
