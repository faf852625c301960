pub mod approve;
pub mod init;
pub mod pending;
pub mod run;
pub mod status;
pub mod step;

use crate::engine::Transition;
use crate::models::{EngineConfig, Phase, CONFIG_PATH};
use crate::Result;
use anyhow::Context;
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Repository root and config location resolved from global flags
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub config_path: PathBuf,
}

impl Workspace {
    /// Resolve `--root` (default: current dir) and `--config`
    /// (default: `<root>/deliverd/config.toml`)
    pub fn resolve(root: Option<PathBuf>, config: Option<PathBuf>) -> Result<Self> {
        let root = match root {
            Some(root) => root,
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        let config_path = config.unwrap_or_else(|| root.join(CONFIG_PATH));
        Ok(Self { root, config_path })
    }

    pub fn load_config(&self) -> Result<EngineConfig> {
        EngineConfig::load_from(&self.config_path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Print one persisted transition
pub(crate) fn print_transition(transition: &Transition) {
    let feature = transition
        .feature
        .as_deref()
        .map(|id| format!(" [{}]", id))
        .unwrap_or_default();
    let line = format!(
        "{} {} → {}{}",
        transition.to.emoji(),
        transition.from,
        transition.to,
        feature
    );
    let line = match transition.to {
        Phase::Completed => line.green().bold(),
        Phase::Verify => line.blue(),
        Phase::Implement => line.cyan(),
        _ => line.normal(),
    };
    match &transition.note {
        Some(note) => println!("{}  {}", line, note.bright_black()),
        None => println!("{}", line),
    }
}
