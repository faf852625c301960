use super::ChangeFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Location of the config file relative to the repository root
pub const CONFIG_PATH: &str = "deliverd/config.toml";

/// Engine configuration (deliverd/config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding one descriptor file per feature
    pub backlog_dir: PathBuf,

    /// Global conventions prepended to every generation request
    pub conventions_path: PathBuf,

    /// Persisted engine state
    pub state_path: PathBuf,

    /// Wire format requested from the generator
    pub change_format: ChangeFormat,

    /// Record approval automatically (false = wait for `deliverd approve`)
    pub auto_approve: bool,

    /// Feature id -> file holding a prepared reply, bypassing the generator
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub handlers: BTreeMap<String, PathBuf>,

    pub generator: GeneratorConfig,

    pub git: GitConfig,

    pub verify: VerifyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backlog_dir: PathBuf::from("features"),
            conventions_path: PathBuf::from("deliverd/conventions.md"),
            state_path: PathBuf::from("deliverd/state/progress.json"),
            change_format: ChangeFormat::default(),
            auto_approve: true,
            handlers: BTreeMap::new(),
            generator: GeneratorConfig::default(),
            git: GitConfig::default(),
            verify: VerifyConfig::default(),
        }
    }
}

/// Reasoning service backend
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorProvider {
    #[default]
    Claude,
    Codex,
    Gemini,
    /// OpenAI-compatible HTTP endpoint (requires the `api-direct` feature)
    Api,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub provider: GeneratorProvider,

    /// Model name passed to the backend
    pub model: Option<String>,

    /// Override the CLI executable (defaults to the provider's name)
    pub command: Option<String>,

    /// Upper bound for one generation request
    pub timeout_secs: u64,

    /// Chat-completions endpoint for the `api` provider
    pub api_url: String,

    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: GeneratorProvider::default(),
            model: None,
            command: None,
            timeout_secs: 900,
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Remote pushed to after every commit
    pub remote: String,

    /// Remote branch; defaults to the branch checked out
    pub branch: Option<String>,

    /// Disable to commit locally only
    pub push: bool,

    /// First word of every feature commit message
    pub commit_prefix: String,

    pub timeout_secs: u64,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            branch: None,
            push: true,
            commit_prefix: "autonomous".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    pub timeout_secs: u64,

    /// Shell used to run verify commands (`<shell> -c <command>`)
    pub shell: String,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            shell: "sh".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load config from deliverd/config.toml, falling back to defaults
    pub fn load(project_root: &Path) -> anyhow::Result<Self> {
        Self::load_from(&project_root.join(CONFIG_PATH))
    }

    /// Load config from an explicit file
    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: EngineConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", config_path.display(), e))?;
        Ok(config)
    }

    /// Save config to deliverd/config.toml
    pub fn save(&self, project_root: &Path) -> anyhow::Result<()> {
        self.save_to(&project_root.join(CONFIG_PATH))
    }

    /// Save config to an explicit file
    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Directory owned by the engine (state file, rejected proposals).
    ///
    /// Paths under it are never staged, committed or cleaned.
    pub fn state_dir(&self) -> PathBuf {
        self.state_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}
